//! Structural repair of a decoded document.
//!
//! Raw-JSON repair (wrong types, legacy schema) happens in the
//! infrastructure migration chain before decoding. What is left here are
//! the invariants a well-typed document can still violate.

use super::model::{Document, Page};
use std::collections::HashSet;

/// Brings `doc` back into a consistent shape. Returns `true` when anything
/// changed.
///
/// Idempotent: running it twice gives the same result as running it once.
pub fn migrate(doc: &mut Document) -> bool {
    let mut changed = false;

    if doc.pages.is_empty() {
        tracing::warn!("No pages found, creating default page");
        doc.pages.push(Page::default_numbered(1));
        changed = true;
    }

    if doc.current_page_index >= doc.pages.len() {
        doc.current_page_index = 0;
        changed = true;
    }

    for (idx, page) in doc.pages.iter_mut().enumerate() {
        if page.name.trim().is_empty() {
            page.name = format!("Page {}", idx + 1);
            changed = true;
        }
        changed |= repair_sections_order(page);
    }

    changed
}

/// Makes `sections_order` a permutation of the section keys: unknown and
/// duplicate ids are dropped, missing keys are appended.
fn repair_sections_order(page: &mut Page) -> bool {
    let mut seen = HashSet::new();
    let before = page.sections_order.len();
    page.sections_order
        .retain(|id| page.sections.contains_key(id) && seen.insert(id.clone()));
    let mut changed = page.sections_order.len() != before;

    for id in page.sections.keys() {
        if !seen.contains(id) {
            page.sections_order.push(id.clone());
            changed = true;
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::model::Section;

    fn page_with(ids: &[&str], order: &[&str]) -> Page {
        let mut page = Page {
            id: "p".into(),
            name: "P".into(),
            ..Page::default()
        };
        for id in ids {
            page.sections.insert(id.to_string(), Section::default());
        }
        page.sections_order = order.iter().map(|s| s.to_string()).collect();
        page
    }

    #[test]
    fn test_empty_pages_get_default_page() {
        let mut doc = Document::empty();
        assert!(migrate(&mut doc));
        assert_eq!(doc.pages.len(), 1);
        assert_eq!(doc.pages[0].name, "Page 1");
    }

    #[test]
    fn test_out_of_range_index_is_reset() {
        let mut doc = Document::default_document();
        doc.pages.truncate(2);
        doc.current_page_index = 5;
        migrate(&mut doc);
        assert_eq!(doc.current_page_index, 0);
    }

    #[test]
    fn test_blank_names_get_positional_default() {
        let mut doc = Document::default_document();
        doc.pages[1].name = "   ".into();
        migrate(&mut doc);
        assert_eq!(doc.pages[1].name, "Page 2");
    }

    #[test]
    fn test_sections_order_becomes_permutation() {
        let mut doc = Document::empty();
        doc.pages.push(page_with(&["a", "b", "c"], &["c", "ghost", "c", "a"]));
        migrate(&mut doc);
        assert_eq!(doc.pages[0].sections_order, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_migrate_is_idempotent() {
        let mut doc = Document::empty();
        doc.pages.push(page_with(&["x", "y"], &["y", "y", "z"]));
        doc.pages.push(page_with(&[], &[]));
        doc.pages[1].name.clear();
        doc.current_page_index = 9;

        migrate(&mut doc);
        let once = doc.clone();
        assert!(!migrate(&mut doc));
        assert_eq!(doc, once);
    }
}
