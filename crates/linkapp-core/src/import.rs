//! Recognizing LinkApp exports among arbitrary JSON files.

use serde_json::Value;

/// Signature written into every export.
pub const APP_SIGNATURE: &str = "LinkApp";

/// Schema version written into every export.
pub const EXPORT_SCHEMA: u64 = 2;

/// Envelope keys an export adds on top of the document.
pub const ENVELOPE_KEYS: [&str; 3] = ["__app", "__schema", "__exportedAt"];

/// An object with a `pages` array whose items are objects, each with an
/// object (or no) `sections` field.
pub fn is_likely_link_app_object(value: &Value) -> bool {
    let Some(pages) = value.get("pages").and_then(Value::as_array) else {
        return false;
    };
    pages.iter().all(|page| {
        page.is_object()
            && match page.get("sections") {
                None | Some(Value::Null) => true,
                Some(sections) => sections.is_object() || sections.is_array(),
            }
    })
}

/// Soft check used before offering to import a file: either the export
/// signature is present or the structure looks right.
pub fn sniff_link_app_text(text: &str) -> bool {
    let Ok(value) = serde_json::from_str::<Value>(text) else {
        return false;
    };
    let signed = value.get("__app").and_then(Value::as_str) == Some(APP_SIGNATURE)
        || value
            .get("__schema")
            .and_then(Value::as_f64)
            .is_some_and(|v| v >= 1.0);
    signed || is_likely_link_app_object(&value)
}
