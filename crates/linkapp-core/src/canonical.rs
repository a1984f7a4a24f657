//! Canonical content fingerprint.
//!
//! Only what ends up in an export counts as content: pages and the
//! deletion history. UI state such as `collapsed` and fields the app does
//! not understand are left out, object keys are sorted and arrays keep
//! their order. Two documents with equal fingerprints differ only in
//! things the user would not call "unsaved changes".

use crate::document::{Button, DeletedItem, Document, HistoryEntry, Page};
use serde_json::{Map, Value, json};

/// Stable string form of a document's content.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentFingerprint(String);

impl ContentFingerprint {
    pub fn of(doc: &Document) -> Self {
        Self(sorted(&canonical_content(doc)).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// The content subtree in canonical shape (keys not yet sorted).
pub fn canonical_content(doc: &Document) -> Value {
    json!({
        "pages": doc.pages.iter().map(canonical_page).collect::<Vec<_>>(),
        "deletedItemsHistory": doc
            .deleted_items_history
            .iter()
            .map(canonical_history)
            .collect::<Vec<_>>(),
    })
}

fn id_or_null(id: &str) -> Value {
    if id.is_empty() {
        Value::Null
    } else {
        Value::String(id.to_string())
    }
}

fn canonical_page(page: &Page) -> Value {
    let mut sections = Map::new();
    for id in &page.sections_order {
        let value = match page.sections.get(id) {
            Some(section) => json!({
                "text": section.text,
                "buttons": section.buttons.iter().map(canonical_button).collect::<Vec<_>>(),
            }),
            None => json!({ "text": "", "buttons": [] }),
        };
        sections.insert(id.clone(), value);
    }
    json!({
        "id": id_or_null(&page.id),
        "name": page.name,
        "sectionsOrder": page.sections_order,
        "sections": sections,
    })
}

fn canonical_button(button: &Button) -> Value {
    let mut out = Map::new();
    out.insert("id".into(), id_or_null(&button.id));
    out.insert("text".into(), json!(button.text));
    out.insert("href".into(), json!(button.href));
    for (key, value) in [
        ("icon", &button.icon),
        ("color", &button.color),
        ("note", &button.note),
    ] {
        if let Some(v) = value.as_deref().filter(|v| !v.is_empty()) {
            out.insert(key.into(), json!(v));
        }
    }
    if let Some(tags) = button.tags.as_ref().filter(|t| !t.is_empty()) {
        out.insert("tags".into(), json!(tags));
    }
    Value::Object(out)
}

fn canonical_history(entry: &HistoryEntry) -> Value {
    let buttons: Vec<Value> = match &entry.item {
        DeletedItem::Section { buttons } => buttons
            .iter()
            .map(|b| json!({ "id": id_or_null(&b.id), "text": b.text, "href": b.href }))
            .collect(),
        _ => Vec::new(),
    };
    json!({
        "type": entry.item.type_name(),
        "pageId": entry.page_id.as_deref().map_or(Value::Null, id_or_null),
        "pageName": entry.page_name.as_deref().unwrap_or(""),
        "sectionId": entry.section_id.as_deref().map_or(Value::Null, id_or_null),
        "sectionName": entry.section_name.as_deref().unwrap_or(""),
        "buttons": buttons,
    })
}

/// Rebuilds `value` with every object's keys in sorted order.
fn sorted(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = Map::new();
            for key in keys {
                out.insert(key.clone(), sorted(&map[key]));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_collapsed_does_not_change_fingerprint() {
        let mut doc = Document::default_document();
        let before = ContentFingerprint::of(&doc);
        doc.set_collapsed(0, "section-1", true).unwrap();
        assert_eq!(before, ContentFingerprint::of(&doc));
    }

    #[test]
    fn test_content_edit_changes_fingerprint() {
        let mut doc = Document::default_document();
        let before = ContentFingerprint::of(&doc);
        doc.rename_page(1, "Reading").unwrap();
        assert_ne!(before, ContentFingerprint::of(&doc));
    }

    #[test]
    fn test_unknown_fields_and_index_are_ignored() {
        let mut doc = Document::default_document();
        let before = ContentFingerprint::of(&doc);
        doc.extra.insert("__exportedAt".into(), json!("2024-01-01"));
        doc.pages[0].extra.insert("color".into(), json!("red"));
        doc.current_page_index = 2;
        assert_eq!(before, ContentFingerprint::of(&doc));
    }

    #[test]
    fn test_empty_optional_button_fields_are_skipped() {
        let mut doc = Document::default_document();
        let before = ContentFingerprint::of(&doc);
        let button = &mut doc.pages[0].sections.get_mut("section-1").unwrap().buttons[0];
        button.icon = Some(String::new());
        button.tags = Some(Vec::new());
        assert_eq!(before, ContentFingerprint::of(&doc));

        doc.pages[0].sections.get_mut("section-1").unwrap().buttons[0].note = Some("read later".into());
        assert_ne!(before, ContentFingerprint::of(&doc));
    }

    #[test]
    fn test_keys_are_sorted() {
        let fp = ContentFingerprint::of(&Document::default_document());
        let text = fp.as_str();
        assert!(text.starts_with(r#"{"deletedItemsHistory":[],"pages":[{"id":"page-1","name":"Page 1","sections":"#));
    }

    #[test]
    fn test_history_entries_count() {
        let mut doc = Document::default_document();
        let before = ContentFingerprint::of(&doc);
        doc.delete_button(0, "section-1", "button-1").unwrap();
        let after_delete = ContentFingerprint::of(&doc);
        assert_ne!(before, after_delete);
        assert!(after_delete.as_str().contains(r#""type":"button""#));
    }
}
