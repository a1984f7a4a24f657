//! Page, section and button editing.

use linkapp_core::document::{Document, QuickAdd};
use linkapp_core::events::{AppEvent, ToastLevel};
use linkapp_core::{LinkAppError, Result};
use linkapp_infrastructure::DocumentStore;

/// Toast for a failed edit: validation messages are shown as they are,
/// missing entities get the usual "... not found!" wording.
fn failure(err: &LinkAppError) -> (ToastLevel, String) {
    match err {
        LinkAppError::InvalidOperation(message) => (ToastLevel::Warning, message.clone()),
        LinkAppError::NotFound {
            entity_type: "page",
            ..
        } => (ToastLevel::Error, "Page not found!".to_string()),
        LinkAppError::NotFound {
            entity_type: "section",
            ..
        } => (ToastLevel::Error, "Section not found!".to_string()),
        LinkAppError::NotFound {
            entity_type: "button",
            ..
        } => (ToastLevel::Error, "Button not found!".to_string()),
        other => (ToastLevel::Error, other.to_string()),
    }
}

/// Editing operations with user feedback.
///
/// Every method goes through [`DocumentStore::try_update`], so content
/// changes mark the document dirty and everything is persisted. Failures
/// leave the document untouched and surface as a toast; the return value
/// is `None`/`false` in that case.
#[derive(Debug, Clone)]
pub struct ContentService {
    store: DocumentStore,
}

impl ContentService {
    pub fn new(store: DocumentStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    fn toast(&self, level: ToastLevel, message: impl Into<String>) {
        self.store.events().emit(&AppEvent::toast(level, message));
    }

    fn apply<T>(
        &self,
        f: impl FnOnce(&mut Document) -> Result<T>,
        on_error: impl FnOnce(&LinkAppError) -> (ToastLevel, String),
    ) -> Option<T> {
        match self.store.try_update(f) {
            Ok(value) => Some(value),
            Err(e) => {
                let (level, message) = on_error(&e);
                self.toast(level, message);
                None
            }
        }
    }

    pub fn current_page_index(&self) -> usize {
        self.store.get().current_page_index
    }

    // ========================================================================
    // Pages
    // ========================================================================

    /// Appends a page and switches to it.
    pub fn add_page(&self) -> Option<String> {
        let (id, count) = self.apply(|doc| Ok((doc.add_page(), doc.pages.len())), failure)?;
        self.toast(ToastLevel::Success, format!("Page {count} created!"));
        Some(id)
    }

    pub fn rename_page(&self, index: usize, name: &str) -> bool {
        let done = self.apply(|doc| doc.rename_page(index, name), failure).is_some();
        if done {
            self.toast(ToastLevel::Success, "Page renamed");
        }
        done
    }

    pub fn switch_page(&self, index: usize) -> bool {
        self.apply(
            |doc| doc.switch_page(index),
            |_| (ToastLevel::Warning, "Page not found".to_string()),
        )
        .is_some()
    }

    pub fn delete_page(&self, index: usize) -> bool {
        let done = self.apply(|doc| doc.delete_page(index), failure).is_some();
        if done {
            self.toast(ToastLevel::Info, "Page moved to History.");
        }
        done
    }

    /// Drops page `from` in front of `target`. Returns its final index.
    pub fn move_page(&self, from: usize, target: usize) -> Option<usize> {
        let at = self.apply(|doc| doc.move_page(from, target), failure)?;
        if at != from {
            self.toast(ToastLevel::Info, "Page reordered");
        }
        Some(at)
    }

    /// Keyboard-style move of the current page. Silent when it cannot move.
    pub fn shift_current_page(&self, delta: isize) -> bool {
        self.apply(|doc| Ok(doc.shift_current_page(delta)), failure)
            .unwrap_or(false)
    }

    // ========================================================================
    // Sections
    // ========================================================================

    pub fn add_section(&self, page_index: usize, title: Option<&str>) -> Option<String> {
        let id = self.apply(
            |doc| doc.add_section(page_index, title),
            |e| match e {
                LinkAppError::NotFound { .. } => {
                    (ToastLevel::Error, "Please create a page first!".to_string())
                }
                other => failure(other),
            },
        )?;
        self.toast(ToastLevel::Success, "Section added!");
        Some(id)
    }

    pub fn rename_section(&self, page_index: usize, section_id: &str, text: &str) -> bool {
        let done = self
            .apply(|doc| doc.rename_section(page_index, section_id, text), failure)
            .is_some();
        if done {
            self.toast(ToastLevel::Success, "Section saved!");
        }
        done
    }

    pub fn delete_section(&self, page_index: usize, section_id: &str) -> bool {
        let done = self
            .apply(|doc| doc.delete_section(page_index, section_id), failure)
            .is_some();
        if done {
            self.toast(ToastLevel::Info, "Section deleted. Check History to restore.");
        }
        done
    }

    pub fn move_section(&self, page_index: usize, section_id: &str, target: usize) -> Option<usize> {
        let at = self.apply(|doc| doc.move_section(page_index, section_id, target), failure)?;
        self.toast(ToastLevel::Info, "Section reordered");
        Some(at)
    }

    pub fn set_collapsed(&self, page_index: usize, section_id: &str, collapsed: bool) -> bool {
        self.apply(|doc| doc.set_collapsed(page_index, section_id, collapsed), failure)
            .is_some()
    }

    pub fn toggle_collapsed(&self, page_index: usize, section_id: &str) -> Option<bool> {
        self.apply(|doc| doc.toggle_collapsed(page_index, section_id), failure)
    }

    pub fn set_all_collapsed(&self, page_index: usize, collapsed: bool) -> Option<usize> {
        self.apply(|doc| doc.set_all_collapsed(page_index, collapsed), failure)
    }

    // ========================================================================
    // Buttons
    // ========================================================================

    pub fn add_button(&self, page_index: usize, section_id: &str, text: &str, href: &str) -> Option<String> {
        let id = self.apply(
            |doc| doc.add_button(page_index, section_id, text, href),
            |e| match e {
                LinkAppError::NotFound { .. } => (
                    ToastLevel::Error,
                    "Section not found on current page!".to_string(),
                ),
                other => failure(other),
            },
        )?;
        self.toast(ToastLevel::Success, "Button added!");
        Some(id)
    }

    pub fn edit_button(
        &self,
        page_index: usize,
        section_id: &str,
        button_id: &str,
        text: &str,
        href: &str,
    ) -> bool {
        let done = self
            .apply(
                |doc| doc.edit_button(page_index, section_id, button_id, text, href),
                failure,
            )
            .is_some();
        if done {
            self.toast(ToastLevel::Success, "Button saved!");
        }
        done
    }

    pub fn delete_button(&self, page_index: usize, section_id: &str, button_id: &str) -> bool {
        let done = self
            .apply(|doc| doc.delete_button(page_index, section_id, button_id), failure)
            .is_some();
        if done {
            self.toast(ToastLevel::Info, "Button deleted. Check History to restore.");
        }
        done
    }

    pub fn move_button(
        &self,
        page_index: usize,
        from_section: &str,
        button_id: &str,
        to_section: &str,
        target: usize,
    ) -> Option<usize> {
        self.apply(
            |doc| doc.move_button(page_index, from_section, button_id, to_section, target),
            failure,
        )
    }

    pub fn quick_add_to_inbox(&self, page_index: usize, text: &str, href: &str) -> Option<QuickAdd> {
        let outcome = self.apply(
            |doc| doc.quick_add_to_inbox(page_index, text, href),
            |e| match e {
                LinkAppError::NotFound { .. } => {
                    (ToastLevel::Error, "Target page not found!".to_string())
                }
                other => failure(other),
            },
        )?;
        match &outcome {
            QuickAdd::Added {
                section_name, host, ..
            } => {
                let message = if host.is_empty() {
                    format!("Added to {section_name}")
                } else {
                    format!("Added to {section_name} — {host}")
                };
                self.toast(ToastLevel::Success, message);
            }
            QuickAdd::AlreadyPresent => self.toast(ToastLevel::Info, "Already in Inbox"),
        }
        Some(outcome)
    }
}
