//! Restoring soft-deleted items.
//!
//! A restore takes a [`HistoryEntry`] out of `deletedItemsHistory` and puts
//! the item back into the document. Where it lands depends on the
//! [`RestoreStrategy`]. Every successful restore hands back an
//! [`UndoToken`] that reverses it.

use chrono::Utc;
use linkapp_core::document::{Button, DeletedItem, Document, HistoryEntry, Page, Section};
use linkapp_core::events::{AppEvent, ToastLevel};
use linkapp_core::history::prune_history;
use linkapp_core::{LinkAppError, Result};
use linkapp_infrastructure::DocumentStore;
use std::collections::HashSet;

const RESTORED: &str = "Restored";
const PARENT_MISSING: &str = "parent missing";

/// Where a restored item goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RestoreStrategy {
    /// Back to its original page/section; fails when those are gone
    #[default]
    Auto,
    /// Like `Auto`, recreating the page and section from the entry when missing
    RecreateParents,
    /// Into a page named `Restored` and a section whose title starts with
    /// `Restored`, both created on demand
    ToRestored,
}

/// What a restore put back, so it can be taken out again.
#[derive(Debug, Clone, PartialEq)]
pub enum UndoToken {
    Button {
        page_id: String,
        section_id: String,
        button_id: String,
        entry: HistoryEntry,
    },
    Section {
        page_id: String,
        section_id: String,
        entry: HistoryEntry,
    },
    Page {
        page_id: String,
        entry: HistoryEntry,
    },
}

impl UndoToken {
    pub fn entry(&self) -> &HistoryEntry {
        match self {
            Self::Button { entry, .. } | Self::Section { entry, .. } | Self::Page { entry, .. } => entry,
        }
    }
}

/// `index` clamped into `0..=len`; a missing index means "at the end".
fn clamp_index(index: Option<i64>, len: usize) -> usize {
    match index {
        Some(i) if i <= 0 => 0,
        Some(i) => usize::try_from(i).map_or(len, |i| i.min(len)),
        None => len,
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// A button id that is free in `doc` and not already handed out.
fn claim_button_id(doc: &Document, wanted: &str, claimed: &mut HashSet<String>) -> String {
    if !wanted.is_empty() && !doc.contains_button_id(wanted) && claimed.insert(wanted.to_string()) {
        return wanted.to_string();
    }
    let base = doc.fresh_button_id();
    let mut candidate = base.clone();
    let mut n = 0;
    while doc.contains_button_id(&candidate) || claimed.contains(&candidate) {
        n += 1;
        candidate = format!("{base}-{n}");
    }
    claimed.insert(candidate.clone());
    candidate
}

fn page_by_id(doc: &Document, page_id: Option<&str>) -> Option<usize> {
    page_id.and_then(|id| doc.page_index_by_id(id))
}

/// Page named by the entry, created from its provenance when missing.
fn ensure_page(doc: &mut Document, entry: &HistoryEntry) -> usize {
    if let Some(index) = page_by_id(doc, entry.page_id.as_deref()) {
        return index;
    }
    let id = match non_empty(entry.page_id.as_deref()) {
        Some(id) => id.to_string(),
        None => doc.fresh_page_id(),
    };
    let name = non_empty(entry.page_name.as_deref()).unwrap_or(RESTORED);
    doc.pages.push(Page {
        id,
        name: name.to_string(),
        ..Page::default()
    });
    doc.pages.len() - 1
}

/// Section named by the entry on page `page_index`, created when missing.
fn ensure_section(doc: &mut Document, page_index: usize, entry: &HistoryEntry, fallback: &str) -> String {
    if let Some(id) = entry.section_id.as_deref() {
        if doc.pages[page_index].sections.contains_key(id) {
            return id.to_string();
        }
    }
    let id = match non_empty(entry.section_id.as_deref()) {
        Some(id) if !doc.contains_section_id(id) => id.to_string(),
        _ => doc.fresh_section_id(),
    };
    let text = non_empty(entry.section_name.as_deref()).unwrap_or(fallback).to_string();
    let page = &mut doc.pages[page_index];
    page.sections.insert(
        id.clone(),
        Section {
            text,
            ..Section::default()
        },
    );
    page.sections_order.push(id.clone());
    id
}

fn restored_page(doc: &mut Document) -> usize {
    if let Some(index) = doc
        .pages
        .iter()
        .position(|p| p.name.trim().eq_ignore_ascii_case(RESTORED))
    {
        return index;
    }
    let id = doc.fresh_page_id();
    doc.pages.push(Page {
        id,
        name: RESTORED.to_string(),
        ..Page::default()
    });
    doc.pages.len() - 1
}

fn restored_section(doc: &mut Document, page_index: usize) -> String {
    let existing = doc.pages[page_index]
        .ordered_sections()
        .find(|(_, s)| s.text.trim().to_lowercase().starts_with("restored"))
        .map(|(id, _)| id.clone());
    if let Some(id) = existing {
        return id;
    }
    let id = doc.fresh_section_id();
    let page = &mut doc.pages[page_index];
    page.sections.insert(
        id.clone(),
        Section {
            text: RESTORED.to_string(),
            ..Section::default()
        },
    );
    page.sections_order.push(id.clone());
    id
}

fn parent_missing() -> LinkAppError {
    LinkAppError::invalid_operation(PARENT_MISSING)
}

// ============================================================================
// Restore
// ============================================================================

/// Puts entry `index` back into `doc`. Returns the undo token and the
/// message to show. `doc` is untouched on error.
fn restore_entry(doc: &mut Document, index: usize, strategy: RestoreStrategy) -> Result<(UndoToken, String)> {
    let entry = doc
        .deleted_items_history
        .get(index)
        .cloned()
        .ok_or_else(|| LinkAppError::not_found("history entry", index.to_string()))?;

    let restored = match &entry.item {
        DeletedItem::Button { name, link } => restore_button(doc, &entry, name, link, strategy)?,
        DeletedItem::Section { buttons } => restore_section(doc, &entry, buttons, strategy)?,
        DeletedItem::Page { snapshot } => restore_page(doc, &entry, snapshot.as_ref()),
        DeletedItem::Unknown { kind, .. } => {
            return Err(LinkAppError::invalid_operation(format!(
                "Unknown history item type '{kind}'"
            )));
        }
    };

    doc.deleted_items_history.remove(index);
    Ok(restored)
}

fn restore_button(
    doc: &mut Document,
    entry: &HistoryEntry,
    name: &str,
    link: &str,
    strategy: RestoreStrategy,
) -> Result<(UndoToken, String)> {
    let label = non_empty(Some(name)).unwrap_or(RESTORED).to_string();
    let button_id = doc.fresh_button_id();

    let (page_index, section_id, at_end, message) = match strategy {
        RestoreStrategy::Auto => {
            let page_index = page_by_id(doc, entry.page_id.as_deref()).ok_or_else(parent_missing)?;
            let section_id = entry
                .section_id
                .clone()
                .filter(|id| doc.pages[page_index].sections.contains_key(id))
                .ok_or_else(parent_missing)?;
            let message = format!(
                "Button \"{label}\" restored to {} / {}",
                non_empty(entry.page_name.as_deref()).unwrap_or("Page"),
                non_empty(entry.section_name.as_deref()).unwrap_or("Section"),
            );
            (page_index, section_id, false, message)
        }
        RestoreStrategy::RecreateParents => {
            let page_index = ensure_page(doc, entry);
            let fallback = non_empty(Some(name)).unwrap_or(RESTORED).to_string();
            let section_id = ensure_section(doc, page_index, entry, &fallback);
            let message = format!("Button \"{label}\" restored (recreated parents)");
            (page_index, section_id, false, message)
        }
        RestoreStrategy::ToRestored => {
            let page_index = restored_page(doc);
            let section_id = restored_section(doc, page_index);
            let message = format!("Button \"{label}\" restored to “{RESTORED}”");
            (page_index, section_id, true, message)
        }
    };

    let text = non_empty(Some(name)).unwrap_or("Restored button");
    let page = &mut doc.pages[page_index];
    let page_id = page.id.clone();
    let buttons = &mut page
        .sections
        .get_mut(&section_id)
        .ok_or_else(parent_missing)?
        .buttons;
    let at = if at_end {
        buttons.len()
    } else {
        clamp_index(entry.button_index, buttons.len())
    };
    buttons.insert(at, Button::new(button_id.clone(), text, link));

    let token = UndoToken::Button {
        page_id,
        section_id,
        button_id,
        entry: entry.clone(),
    };
    Ok((token, message))
}

fn restore_section(
    doc: &mut Document,
    entry: &HistoryEntry,
    buttons: &[Button],
    strategy: RestoreStrategy,
) -> Result<(UndoToken, String)> {
    let title = non_empty(entry.section_name.as_deref())
        .unwrap_or("Restored section")
        .to_string();

    let (page_index, at_end, message) = match strategy {
        RestoreStrategy::Auto => {
            let page_index = page_by_id(doc, entry.page_id.as_deref()).ok_or_else(parent_missing)?;
            let message = format!(
                "Section \"{title}\" restored to page: {}",
                non_empty(entry.page_name.as_deref()).unwrap_or("Page"),
            );
            (page_index, false, message)
        }
        RestoreStrategy::RecreateParents => {
            let page_index = ensure_page(doc, entry);
            (page_index, false, format!("Section \"{title}\" restored (recreated parents)"))
        }
        RestoreStrategy::ToRestored => {
            let page_index = restored_page(doc);
            (page_index, true, format!("Section \"{title}\" restored to “{RESTORED}”"))
        }
    };

    let section_id = match non_empty(entry.section_id.as_deref()) {
        Some(id) if !doc.contains_section_id(id) => id.to_string(),
        _ => doc.fresh_section_id(),
    };
    let mut claimed = HashSet::new();
    let buttons: Vec<Button> = buttons
        .iter()
        .map(|b| {
            let mut button = b.clone();
            button.id = claim_button_id(doc, &b.id, &mut claimed);
            if button.text.trim().is_empty() {
                button.text = "Restored button".to_string();
            }
            button
        })
        .collect();

    let page = &mut doc.pages[page_index];
    page.sections.insert(
        section_id.clone(),
        Section {
            text: title,
            buttons,
            ..Section::default()
        },
    );
    let at = if at_end {
        page.sections_order.len()
    } else {
        clamp_index(entry.section_index, page.sections_order.len())
    };
    page.sections_order.insert(at, section_id.clone());

    let token = UndoToken::Section {
        page_id: page.id.clone(),
        section_id,
        entry: entry.clone(),
    };
    Ok((token, message))
}

/// Pages always go back to where they were; the strategy does not apply.
fn restore_page(doc: &mut Document, entry: &HistoryEntry, snapshot: Option<&Page>) -> (UndoToken, String) {
    let mut page = match snapshot {
        Some(page) => page.clone(),
        None => Page {
            id: entry.page_id.clone().unwrap_or_default(),
            ..Page::default()
        },
    };
    if page.name.trim().is_empty() {
        page.name = non_empty(entry.page_name.as_deref())
            .unwrap_or("Restored page")
            .to_string();
    }
    if page.id.is_empty() || doc.contains_page_id(&page.id) {
        page.id = doc.fresh_page_id();
    }

    let message = format!(
        "Page \"{}\" restored",
        non_empty(entry.page_name.as_deref()).unwrap_or(&page.name)
    );
    let page_id = page.id.clone();
    let at = clamp_index(entry.page_index, doc.pages.len());
    doc.pages.insert(at, page);
    doc.current_page_index = at;

    let token = UndoToken::Page {
        page_id,
        entry: entry.clone(),
    };
    (token, message)
}

// ============================================================================
// Undo
// ============================================================================

fn undo_restore(doc: &mut Document, token: &UndoToken) -> Result<()> {
    match token {
        UndoToken::Button {
            page_id,
            section_id,
            button_id,
            ..
        } => {
            let page_index = doc
                .page_index_by_id(page_id)
                .ok_or_else(|| LinkAppError::not_found("page", page_id))?;
            let buttons = &mut doc.pages[page_index]
                .sections
                .get_mut(section_id)
                .ok_or_else(|| LinkAppError::not_found("section", section_id))?
                .buttons;
            let at = buttons
                .iter()
                .position(|b| &b.id == button_id)
                .ok_or_else(|| LinkAppError::not_found("button", button_id))?;
            buttons.remove(at);
        }
        UndoToken::Section {
            page_id, section_id, ..
        } => {
            let page_index = doc
                .page_index_by_id(page_id)
                .ok_or_else(|| LinkAppError::not_found("page", page_id))?;
            let page = &mut doc.pages[page_index];
            page.sections
                .remove(section_id)
                .ok_or_else(|| LinkAppError::not_found("section", section_id))?;
            page.sections_order.retain(|id| id != section_id);
        }
        UndoToken::Page { page_id, .. } => {
            let page_index = doc
                .page_index_by_id(page_id)
                .ok_or_else(|| LinkAppError::not_found("page", page_id))?;
            doc.pages.remove(page_index);
            if doc.pages.is_empty() {
                let id = doc.fresh_page_id();
                doc.pages.push(Page {
                    id,
                    name: "Main".to_string(),
                    ..Page::default()
                });
            }
        }
    }
    doc.current_page_index = doc.current_page_index.min(doc.pages.len().saturating_sub(1));
    doc.deleted_items_history.push(token.entry().clone());
    Ok(())
}

/// Deletion history operations with user feedback.
#[derive(Debug, Clone)]
pub struct HistoryService {
    store: DocumentStore,
}

impl HistoryService {
    pub fn new(store: DocumentStore) -> Self {
        Self { store }
    }

    fn toast(&self, level: ToastLevel, message: impl Into<String>) {
        self.store.events().emit(&AppEvent::toast(level, message));
    }

    /// History entries, oldest first.
    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.store.get().deleted_items_history.clone()
    }

    pub fn restore(&self, index: usize, strategy: RestoreStrategy) -> Option<UndoToken> {
        match self.store.try_update(|doc| restore_entry(doc, index, strategy)) {
            Ok((token, message)) => {
                tracing::debug!(index, ?strategy, "History entry restored");
                self.toast(ToastLevel::Info, message);
                Some(token)
            }
            Err(LinkAppError::NotFound { .. }) => {
                tracing::error!(index, "Invalid restore index");
                self.toast(ToastLevel::Error, "Item not found in history!");
                None
            }
            Err(LinkAppError::InvalidOperation(message)) if message == PARENT_MISSING => {
                self.toast(ToastLevel::Warning, "Parent container not found");
                None
            }
            Err(e) => {
                self.toast(ToastLevel::Error, e.to_string());
                None
            }
        }
    }

    /// Reverses a restore. Returns `false` when the restored item is gone.
    pub fn undo(&self, token: &UndoToken) -> bool {
        match self.store.try_update(|doc| undo_restore(doc, token)) {
            Ok(()) => {
                self.toast(ToastLevel::Info, "Undone");
                true
            }
            Err(e) => {
                tracing::warn!("Undo failed: {e}");
                self.toast(ToastLevel::Warning, "Nothing to undo");
                false
            }
        }
    }

    /// Drops one entry for good.
    pub fn delete_entry(&self, index: usize) -> bool {
        let removed = self.store.update(|doc| {
            if index < doc.deleted_items_history.len() {
                doc.deleted_items_history.remove(index);
                Ok(true)
            } else {
                Ok(false)
            }
        });
        removed.unwrap_or(false)
    }

    pub fn clear(&self) -> bool {
        let cleared = self
            .store
            .update(|doc| {
                doc.deleted_items_history.clear();
                Ok(())
            })
            .is_some();
        if cleared {
            self.toast(ToastLevel::Success, "History cleared");
        }
        cleared
    }

    /// Applies the TTL and size limits now. Returns how many entries went.
    pub fn prune(&self) -> usize {
        self.store
            .update(|doc| Ok(prune_history(&mut doc.deleted_items_history, Utc::now())))
            .unwrap_or(0)
    }
}
