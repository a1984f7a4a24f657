//! Content editing operations.
//!
//! Every operation is a plain mutation of a [`Document`] that reports
//! failures through [`Result`]. The store wraps them with fingerprinting,
//! persistence and change notifications; nothing here persists or emits.
//!
//! Page arguments are positional indices, sections and buttons are
//! addressed by id.

use super::model::{Button, DeletedAt, DeletedItem, Document, HistoryEntry, Page, Section};
use crate::error::{LinkAppError, Result};
use crate::url::{host_of, normalize_url};
use chrono::Utc;
use serde_json::Map;
use std::collections::BTreeMap;

/// Upper bound on buttons per section.
pub const MAX_BUTTONS_PER_SECTION: usize = 500;

/// Title of the section quick-add drops links into.
pub const INBOX_TITLE: &str = "Inbox";

/// Outcome of [`Document::quick_add_to_inbox`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuickAdd {
    Added {
        section_id: String,
        section_name: String,
        button_id: String,
        /// Host of the link, empty when it has none
        host: String,
    },
    /// A button with the same link already sits in the inbox
    AlreadyPresent,
}

// ============================================================================
// Helpers
// ============================================================================

/// `prefix-<millis>`, suffixed with a counter when the id is taken.
fn fresh_id(prefix: &str, taken: impl Fn(&str) -> bool) -> String {
    let base = format!("{prefix}-{}", Utc::now().timestamp_millis());
    if !taken(&base) {
        return base;
    }
    let mut n = 1;
    loop {
        let candidate = format!("{base}-{n}");
        if !taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Insert position after removing the dragged item from `from` and dropping
/// it in front of `target` (indices of the list before removal).
pub fn drop_position(from: usize, target: usize, len_after_removal: usize) -> usize {
    let at = if from < target {
        target.saturating_sub(1)
    } else {
        target
    };
    at.min(len_after_removal)
}

fn page_not_found(index: usize) -> LinkAppError {
    LinkAppError::not_found("page", index.to_string())
}

fn section_mut<'a>(page: &'a mut Page, section_id: &str) -> Result<&'a mut Section> {
    page.sections
        .get_mut(section_id)
        .ok_or_else(|| LinkAppError::not_found("section", section_id))
}

impl Document {
    pub fn page_mut(&mut self, index: usize) -> Result<&mut Page> {
        self.pages.get_mut(index).ok_or_else(|| page_not_found(index))
    }

    pub fn contains_page_id(&self, id: &str) -> bool {
        self.pages.iter().any(|p| p.id == id)
    }

    pub fn contains_section_id(&self, id: &str) -> bool {
        self.pages.iter().any(|p| p.sections.contains_key(id))
    }

    pub fn contains_button_id(&self, id: &str) -> bool {
        self.pages
            .iter()
            .flat_map(|p| p.sections.values())
            .any(|s| s.buttons.iter().any(|b| b.id == id))
    }

    pub fn fresh_page_id(&self) -> String {
        fresh_id("page", |id| self.contains_page_id(id))
    }

    pub fn fresh_section_id(&self) -> String {
        fresh_id("section", |id| self.contains_section_id(id))
    }

    pub fn fresh_button_id(&self) -> String {
        fresh_id("button", |id| self.contains_button_id(id))
    }

    // ========================================================================
    // Pages
    // ========================================================================

    /// Appends a page with one default section and button and makes it
    /// current. Returns the new page id.
    pub fn add_page(&mut self) -> String {
        let page_id = self.fresh_page_id();
        let section_id = self.fresh_section_id();
        let button_id = self.fresh_button_id();

        let mut sections = BTreeMap::new();
        sections.insert(
            section_id.clone(),
            Section {
                text: "New Section".to_string(),
                buttons: vec![Button::new(button_id, "New button", "")],
                ..Section::default()
            },
        );
        self.pages.push(Page {
            id: page_id.clone(),
            name: format!("Page {}", self.pages.len() + 1),
            sections,
            sections_order: vec![section_id],
            extra: Map::new(),
        });
        self.current_page_index = self.pages.len() - 1;
        page_id
    }

    pub fn rename_page(&mut self, index: usize, name: &str) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(LinkAppError::invalid_operation("Page name cannot be empty!"));
        }
        self.page_mut(index)?.name = name.to_string();
        Ok(())
    }

    pub fn switch_page(&mut self, index: usize) -> Result<()> {
        if index >= self.pages.len() {
            return Err(page_not_found(index));
        }
        self.current_page_index = index;
        Ok(())
    }

    /// Moves the page at `index` into the deletion history.
    ///
    /// Removing the only page leaves an empty `Main` page behind.
    pub fn delete_page(&mut self, index: usize) -> Result<()> {
        if index >= self.pages.len() {
            return Err(page_not_found(index));
        }
        let page = self.pages.remove(index);
        self.deleted_items_history.push(HistoryEntry {
            page_id: Some(page.id.clone()),
            page_name: Some(page.name.clone()),
            section_id: None,
            section_name: None,
            page_index: Some(index as i64),
            section_index: None,
            button_index: None,
            deleted_at: Some(DeletedAt::Millis(Utc::now().timestamp_millis())),
            item: DeletedItem::Page {
                snapshot: Some(page),
            },
        });

        if self.pages.is_empty() {
            let id = self.fresh_page_id();
            self.pages.push(Page {
                id,
                name: "Main".to_string(),
                ..Page::default()
            });
            self.current_page_index = 0;
        } else if self.current_page_index >= self.pages.len() {
            self.current_page_index = self.pages.len() - 1;
        }
        Ok(())
    }

    /// Drag-and-drop reorder: drops page `from` in front of `target`.
    /// Keeps the current page selected. Returns the final index.
    pub fn move_page(&mut self, from: usize, target: usize) -> Result<usize> {
        if from >= self.pages.len() {
            return Err(page_not_found(from));
        }
        let moved = self.pages.remove(from);
        let at = drop_position(from, target, self.pages.len());
        self.pages.insert(at, moved);

        let cur = self.current_page_index;
        if cur == from {
            self.current_page_index = at;
        } else if from < cur && at >= cur {
            self.current_page_index = cur - 1;
        } else if from > cur && at <= cur {
            self.current_page_index = cur + 1;
        }
        Ok(at)
    }

    /// Swaps the current page one or more slots left/right and follows it.
    /// Returns `false` when the move would leave the page list.
    pub fn shift_current_page(&mut self, delta: isize) -> bool {
        if self.pages.len() < 2 {
            return false;
        }
        let from = self.current_page_index;
        let Some(to) = from.checked_add_signed(delta) else {
            return false;
        };
        if to >= self.pages.len() || to == from {
            return false;
        }
        let moved = self.pages.remove(from);
        self.pages.insert(to, moved);
        self.current_page_index = to;
        true
    }

    // ========================================================================
    // Sections
    // ========================================================================

    pub fn add_section(&mut self, page_index: usize, title: Option<&str>) -> Result<String> {
        if page_index >= self.pages.len() {
            return Err(page_not_found(page_index));
        }
        let section_id = self.fresh_section_id();
        let text = title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or("New Section")
            .to_string();

        let page = self.page_mut(page_index)?;
        page.sections.insert(
            section_id.clone(),
            Section {
                text,
                ..Section::default()
            },
        );
        page.sections_order.push(section_id.clone());
        Ok(section_id)
    }

    pub fn rename_section(&mut self, page_index: usize, section_id: &str, text: &str) -> Result<()> {
        let text = text.trim();
        if text.is_empty() {
            return Err(LinkAppError::invalid_operation("Section name cannot be empty!"));
        }
        let page = self.page_mut(page_index)?;
        section_mut(page, section_id)?.text = text.to_string();
        Ok(())
    }

    /// Moves a section with all its buttons into the deletion history.
    pub fn delete_section(&mut self, page_index: usize, section_id: &str) -> Result<()> {
        let page = self.page_mut(page_index)?;
        let position = page.section_position(section_id);
        let section = page
            .sections
            .remove(section_id)
            .ok_or_else(|| LinkAppError::not_found("section", section_id))?;
        page.sections_order.retain(|id| id != section_id);

        let entry = HistoryEntry {
            page_id: Some(page.id.clone()),
            page_name: Some(page.name.clone()),
            section_id: Some(section_id.to_string()),
            section_name: Some(section.text),
            page_index: Some(page_index as i64),
            section_index: position.map(|p| p as i64),
            button_index: None,
            deleted_at: Some(DeletedAt::now_iso()),
            item: DeletedItem::Section {
                buttons: section.buttons,
            },
        };
        self.deleted_items_history.push(entry);
        Ok(())
    }

    /// Drag-and-drop reorder of a section within its page.
    pub fn move_section(&mut self, page_index: usize, section_id: &str, target: usize) -> Result<usize> {
        let page = self.page_mut(page_index)?;
        let from = page
            .section_position(section_id)
            .ok_or_else(|| LinkAppError::not_found("section", section_id))?;
        let moved = page.sections_order.remove(from);
        let at = drop_position(from, target, page.sections_order.len());
        page.sections_order.insert(at, moved);
        Ok(at)
    }

    pub fn set_collapsed(&mut self, page_index: usize, section_id: &str, collapsed: bool) -> Result<()> {
        let page = self.page_mut(page_index)?;
        section_mut(page, section_id)?.collapsed = Some(collapsed);
        Ok(())
    }

    /// Flips the fold state of a section and returns the new state.
    pub fn toggle_collapsed(&mut self, page_index: usize, section_id: &str) -> Result<bool> {
        let page = self.page_mut(page_index)?;
        let section = section_mut(page, section_id)?;
        let next = !section.collapsed.unwrap_or(false);
        section.collapsed = Some(next);
        Ok(next)
    }

    /// Folds or unfolds every section on a page. Returns how many sections
    /// were touched.
    pub fn set_all_collapsed(&mut self, page_index: usize, collapsed: bool) -> Result<usize> {
        let page = self.page_mut(page_index)?;
        for section in page.sections.values_mut() {
            section.collapsed = Some(collapsed);
        }
        Ok(page.sections.len())
    }

    // ========================================================================
    // Buttons
    // ========================================================================

    pub fn add_button(&mut self, page_index: usize, section_id: &str, text: &str, href: &str) -> Result<String> {
        let button_id = self.fresh_button_id();
        let page = self.page_mut(page_index)?;
        let section = section_mut(page, section_id)?;
        if section.buttons.len() >= MAX_BUTTONS_PER_SECTION {
            return Err(LinkAppError::invalid_operation(format!(
                "Maximum {MAX_BUTTONS_PER_SECTION} buttons per section!"
            )));
        }
        let text = match text.trim() {
            "" => "New button",
            t => t,
        };
        section
            .buttons
            .push(Button::new(button_id.clone(), text, normalize_url(href)));
        Ok(button_id)
    }

    pub fn edit_button(
        &mut self,
        page_index: usize,
        section_id: &str,
        button_id: &str,
        text: &str,
        href: &str,
    ) -> Result<()> {
        let text = text.trim();
        if text.is_empty() {
            return Err(LinkAppError::invalid_operation("Button name cannot be empty!"));
        }
        let page = self.page_mut(page_index)?;
        let button = section_mut(page, section_id)?
            .buttons
            .iter_mut()
            .find(|b| b.id == button_id)
            .ok_or_else(|| LinkAppError::not_found("button", button_id))?;
        button.text = text.to_string();
        button.href = normalize_url(href);
        Ok(())
    }

    /// Moves a button into the deletion history.
    pub fn delete_button(&mut self, page_index: usize, section_id: &str, button_id: &str) -> Result<()> {
        let page = self.page_mut(page_index)?;
        let (page_id, page_name) = (page.id.clone(), page.name.clone());
        let section_index = page.section_position(section_id).map(|p| p as i64);
        let section = section_mut(page, section_id)?;
        let button_index = section
            .buttons
            .iter()
            .position(|b| b.id == button_id)
            .ok_or_else(|| LinkAppError::not_found("button", button_id))?;
        let button = section.buttons.remove(button_index);

        let entry = HistoryEntry {
            page_id: Some(page_id),
            page_name: Some(page_name),
            section_id: Some(section_id.to_string()),
            section_name: Some(section.text.clone()),
            page_index: Some(page_index as i64),
            section_index,
            button_index: Some(button_index as i64),
            deleted_at: Some(DeletedAt::now_iso()),
            item: DeletedItem::Button {
                name: button.text,
                link: button.href,
            },
        };
        self.deleted_items_history.push(entry);
        Ok(())
    }

    /// Drag-and-drop of a button, possibly into another section of the same
    /// page. `target` indexes the destination list as it looked before the
    /// drag started.
    pub fn move_button(
        &mut self,
        page_index: usize,
        from_section: &str,
        button_id: &str,
        to_section: &str,
        target: usize,
    ) -> Result<usize> {
        let page = self.page_mut(page_index)?;
        if !page.sections.contains_key(to_section) {
            return Err(LinkAppError::not_found("section", to_section));
        }
        let source = section_mut(page, from_section)?;
        let from = source
            .buttons
            .iter()
            .position(|b| b.id == button_id)
            .ok_or_else(|| LinkAppError::not_found("button", button_id))?;
        let moved = source.buttons.remove(from);

        let destination = section_mut(page, to_section)?;
        let at = if from_section == to_section {
            drop_position(from, target, destination.buttons.len())
        } else {
            target.min(destination.buttons.len())
        };
        destination.buttons.insert(at, moved);
        Ok(at)
    }

    /// Puts a link at the top of the page's `Inbox` section, creating the
    /// section at the top of the page when it does not exist.
    pub fn quick_add_to_inbox(&mut self, page_index: usize, text: &str, href: &str) -> Result<QuickAdd> {
        if page_index >= self.pages.len() {
            return Err(page_not_found(page_index));
        }
        let href = normalize_url(href);
        let new_section_id = self.fresh_section_id();
        let button_id = self.fresh_button_id();
        let page = self.page_mut(page_index)?;

        let existing = page
            .sections
            .iter()
            .find(|(_, s)| s.text.eq_ignore_ascii_case(INBOX_TITLE))
            .map(|(id, _)| id.clone());
        let section_id = match existing {
            Some(id) => id,
            None => {
                page.sections.insert(
                    new_section_id.clone(),
                    Section {
                        text: INBOX_TITLE.to_string(),
                        ..Section::default()
                    },
                );
                page.sections_order.insert(0, new_section_id.clone());
                new_section_id
            }
        };

        let section = section_mut(page, &section_id)?;
        let lowered = href.to_lowercase();
        if !href.is_empty() && section.buttons.iter().any(|b| b.href.to_lowercase() == lowered) {
            return Ok(QuickAdd::AlreadyPresent);
        }

        let text = match text.trim() {
            "" if !href.is_empty() => href.as_str(),
            "" => "New button",
            t => t,
        };
        section
            .buttons
            .insert(0, Button::new(button_id.clone(), text, href.clone()));
        Ok(QuickAdd::Added {
            section_id,
            section_name: section.text.clone(),
            button_id,
            host: host_of(&href).unwrap_or_default().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(doc: &Document) -> Vec<&str> {
        doc.pages.iter().map(|p| p.id.as_str()).collect()
    }

    #[test]
    fn test_drop_position() {
        // dragging right: the slot left behind shifts the target by one
        assert_eq!(drop_position(0, 3, 4), 2);
        // dragging left keeps the target
        assert_eq!(drop_position(3, 1, 4), 1);
        // past the end clamps
        assert_eq!(drop_position(1, 99, 4), 4);
    }

    #[test]
    fn test_add_page_becomes_current() {
        let mut doc = Document::default_document();
        let id = doc.add_page();
        assert_eq!(doc.pages.len(), 4);
        assert_eq!(doc.current_page_index, 3);
        let page = &doc.pages[3];
        assert_eq!(page.id, id);
        assert_eq!(page.name, "Page 4");
        assert_eq!(page.sections_order.len(), 1);
    }

    #[test]
    fn test_add_page_ids_are_unique() {
        let mut doc = Document::default_document();
        let a = doc.add_page();
        let b = doc.add_page();
        assert_ne!(a, b);
    }

    #[test]
    fn test_rename_page_rejects_blank() {
        let mut doc = Document::default_document();
        assert!(doc.rename_page(0, "  ").is_err());
        doc.rename_page(0, " Work ").unwrap();
        assert_eq!(doc.pages[0].name, "Work");
        assert!(doc.rename_page(9, "x").unwrap_err().is_not_found());
    }

    #[test]
    fn test_delete_page_records_snapshot() {
        let mut doc = Document::default_document();
        doc.current_page_index = 2;
        doc.delete_page(2).unwrap();
        assert_eq!(doc.pages.len(), 2);
        assert_eq!(doc.current_page_index, 1);

        let entry = doc.deleted_items_history.last().unwrap();
        assert_eq!(entry.page_id.as_deref(), Some("page-3"));
        assert_eq!(entry.page_index, Some(2));
        match &entry.item {
            DeletedItem::Page { snapshot } => {
                assert_eq!(snapshot.as_ref().unwrap().name, "Page 3")
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_delete_last_page_leaves_main() {
        let mut doc = Document::default_document();
        doc.pages.truncate(1);
        doc.delete_page(0).unwrap();
        assert_eq!(doc.pages.len(), 1);
        assert_eq!(doc.pages[0].name, "Main");
        assert_eq!(doc.current_page_index, 0);
    }

    #[test]
    fn test_move_page_right_and_current_follows() {
        let mut doc = Document::default_document();
        doc.current_page_index = 0;
        // drop page-1 in front of slot 2 (before page-3)
        let at = doc.move_page(0, 2).unwrap();
        assert_eq!(at, 1);
        assert_eq!(ids(&doc), vec!["page-2", "page-1", "page-3"]);
        assert_eq!(doc.current_page_index, 1);
    }

    #[test]
    fn test_move_page_adjusts_other_current() {
        let mut doc = Document::default_document();
        doc.current_page_index = 1;
        doc.move_page(2, 0).unwrap();
        assert_eq!(ids(&doc), vec!["page-3", "page-1", "page-2"]);
        assert_eq!(doc.current_page_index, 2);
    }

    #[test]
    fn test_shift_current_page() {
        let mut doc = Document::default_document();
        assert!(!doc.shift_current_page(-1));
        assert!(doc.shift_current_page(1));
        assert_eq!(ids(&doc), vec!["page-2", "page-1", "page-3"]);
        assert_eq!(doc.current_page_index, 1);
    }

    #[test]
    fn test_delete_section_goes_to_history() {
        let mut doc = Document::default_document();
        doc.delete_section(0, "section-1").unwrap();
        assert!(doc.pages[0].sections.is_empty());
        assert!(doc.pages[0].sections_order.is_empty());

        let entry = doc.deleted_items_history.last().unwrap();
        assert_eq!(entry.section_name.as_deref(), Some("New Section"));
        assert_eq!(entry.section_index, Some(0));
        assert!(matches!(&entry.item, DeletedItem::Section { buttons } if buttons.len() == 1));
    }

    #[test]
    fn test_move_section_down() {
        let mut doc = Document::default_document();
        let a = doc.add_section(0, Some("A")).unwrap();
        let b = doc.add_section(0, Some("B")).unwrap();
        // order: section-1, a, b -> drop section-1 at the end
        doc.move_section(0, "section-1", 3).unwrap();
        assert_eq!(doc.pages[0].sections_order, vec![a, b, "section-1".to_string()]);
    }

    #[test]
    fn test_set_all_collapsed() {
        let mut doc = Document::default_document();
        doc.add_section(0, None).unwrap();
        assert_eq!(doc.set_all_collapsed(0, true).unwrap(), 2);
        assert!(doc.pages[0].sections.values().all(|s| s.collapsed == Some(true)));
        assert!(!doc.toggle_collapsed(0, "section-1").unwrap());
    }

    #[test]
    fn test_add_button_normalizes_href() {
        let mut doc = Document::default_document();
        let id = doc.add_button(0, "section-1", "Rust", "rust-lang.org").unwrap();
        let button = doc.pages[0].sections["section-1"]
            .buttons
            .iter()
            .find(|b| b.id == id)
            .unwrap();
        assert_eq!(button.href, "https://rust-lang.org");
    }

    #[test]
    fn test_edit_button() {
        let mut doc = Document::default_document();
        doc.edit_button(0, "section-1", "button-1", "Docs", "//docs.rs").unwrap();
        let button = &doc.pages[0].sections["section-1"].buttons[0];
        assert_eq!(button.text, "Docs");
        assert_eq!(button.href, "https://docs.rs");
        assert!(doc.edit_button(0, "section-1", "nope", "x", "").unwrap_err().is_not_found());
    }

    #[test]
    fn test_delete_button_records_provenance() {
        let mut doc = Document::default_document();
        doc.edit_button(0, "section-1", "button-1", "Docs", "docs.rs").unwrap();
        doc.delete_button(0, "section-1", "button-1").unwrap();
        assert!(doc.pages[0].sections["section-1"].buttons.is_empty());

        let entry = doc.deleted_items_history.last().unwrap();
        assert_eq!(entry.button_index, Some(0));
        assert_eq!(entry.section_id.as_deref(), Some("section-1"));
        assert!(matches!(
            &entry.item,
            DeletedItem::Button { name, link } if name == "Docs" && link == "https://docs.rs"
        ));
        assert!(matches!(entry.deleted_at, Some(DeletedAt::Text(_))));
    }

    #[test]
    fn test_move_button_within_and_across_sections() {
        let mut doc = Document::default_document();
        let b2 = doc.add_button(0, "section-1", "two", "").unwrap();
        let b3 = doc.add_button(0, "section-1", "three", "").unwrap();
        // button-1 dropped in front of slot 2 lands at index 1
        let at = doc.move_button(0, "section-1", "button-1", "section-1", 2).unwrap();
        assert_eq!(at, 1);
        let order: Vec<_> = doc.pages[0].sections["section-1"].buttons.iter().map(|b| b.id.clone()).collect();
        assert_eq!(order, vec![b2.clone(), "button-1".to_string(), b3.clone()]);

        let other = doc.add_section(0, Some("Other")).unwrap();
        let at = doc.move_button(0, "section-1", &b3, &other, 10).unwrap();
        assert_eq!(at, 0);
        assert_eq!(doc.pages[0].sections[&other].buttons[0].id, b3);
        assert_eq!(doc.pages[0].sections["section-1"].buttons.len(), 2);
    }

    #[test]
    fn test_quick_add_creates_inbox_and_skips_duplicates() {
        let mut doc = Document::default_document();
        let first = doc
            .quick_add_to_inbox(0, "Example", "Example.com/path")
            .unwrap();
        let section_id = match first {
            QuickAdd::Added {
                section_id, host, ..
            } => {
                assert_eq!(host, "Example.com");
                section_id
            }
            QuickAdd::AlreadyPresent => panic!("expected a new button"),
        };
        assert_eq!(doc.pages[0].sections_order[0], section_id);

        let again = doc
            .quick_add_to_inbox(0, "Dup", "https://example.com/PATH")
            .unwrap();
        assert_eq!(again, QuickAdd::AlreadyPresent);
        assert_eq!(doc.pages[0].sections[&section_id].buttons.len(), 1);
    }
}
