//! Raw-JSON upgrade and repair of persisted documents.
//!
//! Anything read from storage, a provider or an import goes through
//! [`decode_document`]: version detection, the schema chain, structural
//! repair of wrong-typed fields, then typed decoding. Typed invariants are
//! restored afterwards by `linkapp_core::document::migrate`.

use super::registry::MigrationRegistry;
use super::traits::{Migration, MigrationChain, TypedMigration};
use anyhow::{Context, Result};
use linkapp_core::document::Document;
use linkapp_core::LinkAppError;
use linkapp_core::import::ENVELOPE_KEYS;
use semver::Version;
use serde_json::{Map, Value, json};
use std::sync::{Arc, OnceLock};

/// Flat schema: one implicit page, sections at the document root.
pub const SCHEMA_V1: Version = Version::new(1, 0, 0);
/// Nested schema: `pages[].sections`. Exports carry `__schema: 2`.
pub const SCHEMA_V2: Version = Version::new(2, 0, 0);

/// Moves root-level `sections` into the first page.
#[derive(Debug)]
pub struct FlatToNestedPages;

impl Migration for FlatToNestedPages {
    fn from_version(&self) -> Version {
        SCHEMA_V1
    }

    fn to_version(&self) -> Version {
        SCHEMA_V2
    }

    fn description(&self) -> &str {
        "move root sections into the first page"
    }
}

fn has_sections(page: &Map<String, Value>) -> bool {
    page.get("sections")
        .and_then(Value::as_object)
        .is_some_and(|s| !s.is_empty())
}

impl TypedMigration<Value> for FlatToNestedPages {
    fn migrate(&self, mut data: Value) -> Result<Value> {
        let root = data
            .as_object_mut()
            .context("document root is not an object")?;
        let Some(sections) = root.remove("sections") else {
            return Ok(data);
        };

        let pages = root
            .entry("pages")
            .or_insert_with(|| Value::Array(Vec::new()));
        if !pages.is_array() {
            *pages = Value::Array(Vec::new());
        }
        if let Some(list) = pages.as_array_mut() {
            if list.first().is_none_or(|p| !p.is_object()) {
                list.insert(0, json!({ "id": "page-1", "name": "Page 1" }));
            }
            if let Some(first) = list.first_mut().and_then(Value::as_object_mut) {
                if !has_sections(first) {
                    tracing::info!("Migrating legacy flat sections into the first page");
                    first.insert("sections".into(), sections);
                    first.remove("sectionsOrder");
                }
            }
        }
        Ok(data)
    }
}

fn registry() -> &'static MigrationRegistry<Value> {
    static REGISTRY: OnceLock<MigrationRegistry<Value>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut registry = MigrationRegistry::new(SCHEMA_V2);
        // a single statically known step always continues the chain
        if let Err(e) = registry.register(Arc::new(FlatToNestedPages)) {
            tracing::error!("Failed to register document migration: {e:#}");
        }
        registry
    })
}

/// Major schema version declared by `__schema`, either a number or a
/// version string. Zero, fractions, negatives and unreadable text count as
/// no declaration.
fn declared_version(raw: &Value) -> Option<Version> {
    let major = match raw.get("__schema")? {
        Value::Number(n) => n.as_u64()?,
        Value::String(s) => {
            let s = s.trim();
            match Version::parse(s) {
                Ok(version) => version.major,
                Err(_) => s.parse::<u64>().ok()?,
            }
        }
        _ => return None,
    };
    (major >= 1).then(|| Version::new(major, 0, 0))
}

/// Schema version of a raw document.
///
/// A usable `__schema` wins, a root `sections` object means the flat
/// schema, anything else is the nested schema.
pub fn detect_version(raw: &Value) -> Version {
    if let Some(version) = declared_version(raw) {
        return version;
    }
    if let Some(schema) = raw.get("__schema") {
        tracing::debug!(%schema, "Ignoring unusable __schema, detecting from shape");
    }
    if raw.get("sections").is_some_and(Value::is_object) {
        SCHEMA_V1
    } else {
        SCHEMA_V2
    }
}

/// Runs the schema chain and drops the export envelope.
pub fn upgrade(mut raw: Value) -> Result<Value> {
    anyhow::ensure!(raw.is_object(), "document root is not an object");
    let version = detect_version(&raw);
    if let Some(root) = raw.as_object_mut() {
        for key in ENVELOPE_KEYS {
            root.remove(key);
        }
    }
    registry().migrate_to_latest(raw, &version)
}

// ============================================================================
// Structural repair
// ============================================================================

/// Replaces numbers with their string form and removes anything else that
/// is not a string.
fn coerce_string(obj: &mut Map<String, Value>, key: &str) {
    match obj.get(key) {
        None | Some(Value::String(_)) => {}
        Some(Value::Number(n)) => {
            let text = n.to_string();
            obj.insert(key.to_string(), Value::String(text));
        }
        Some(_) => {
            obj.remove(key);
        }
    }
}

fn coerce_index(obj: &mut Map<String, Value>, key: &str) {
    if obj.get(key).is_some_and(|v| !v.is_i64()) {
        obj.remove(key);
    }
}

fn repair_button(button: &mut Map<String, Value>) {
    for key in ["id", "text", "href", "icon", "color", "note"] {
        coerce_string(button, key);
    }
    match button.get_mut("tags") {
        Some(Value::Array(tags)) => tags.retain(Value::is_string),
        Some(_) => {
            button.remove("tags");
        }
        None => {}
    }
}

fn repair_buttons(value: Option<&mut Value>) -> Value {
    let mut buttons = match value.map(Value::take) {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    };
    buttons.retain(Value::is_object);
    for button in buttons.iter_mut().filter_map(Value::as_object_mut) {
        repair_button(button);
    }
    Value::Array(buttons)
}

fn repair_page(page: &mut Map<String, Value>) {
    coerce_string(page, "id");
    coerce_string(page, "name");

    if !page.get("sections").is_some_and(Value::is_object) {
        page.insert("sections".into(), Value::Object(Map::new()));
    }
    let mut section_ids = Vec::new();
    if let Some(Value::Object(sections)) = page.get_mut("sections") {
        sections.retain(|_, section| section.is_object());
        for (id, section) in sections.iter_mut() {
            section_ids.push(id.clone());
            if let Some(section) = section.as_object_mut() {
                coerce_string(section, "text");
                if section.get("collapsed").is_some_and(|v| !v.is_boolean()) {
                    section.remove("collapsed");
                }
                let buttons = repair_buttons(section.get_mut("buttons"));
                section.insert("buttons".into(), buttons);
            }
        }
    }

    match page.get_mut("sectionsOrder") {
        Some(Value::Array(order)) => order.retain(Value::is_string),
        _ => {
            let order = section_ids.into_iter().map(Value::String).collect();
            page.insert("sectionsOrder".into(), Value::Array(order));
        }
    }
}

fn repair_history_entry(entry: &mut Map<String, Value>) -> bool {
    if !entry.get("type").is_some_and(Value::is_string) {
        return false;
    }
    for key in ["pageId", "pageName", "sectionId", "sectionName", "name", "link"] {
        coerce_string(entry, key);
    }
    for key in ["pageIndex", "sectionIndex", "buttonIndex"] {
        coerce_index(entry, key);
    }
    if entry
        .get("deletedAt")
        .is_some_and(|v| !(v.is_number() || v.is_string()))
    {
        entry.remove("deletedAt");
    }
    if entry.contains_key("buttons") {
        let buttons = repair_buttons(entry.get_mut("buttons"));
        entry.insert("buttons".into(), buttons);
    }
    for key in ["snapshot", "page"] {
        match entry.get_mut(key) {
            Some(Value::Object(page)) => repair_page(page),
            Some(_) => {
                entry.remove(key);
            }
            None => {}
        }
    }
    true
}

/// Fixes wrong-typed fields so the document decodes.
///
/// `pages` that is not an array becomes the default pages, a missing or
/// negative `currentPageIndex` becomes 0, a non-array history becomes empty.
/// Items of the wrong shape are dropped.
pub fn repair(mut raw: Value) -> Result<Value> {
    let root = raw
        .as_object_mut()
        .context("document root is not an object")?;

    match root.get_mut("pages") {
        Some(Value::Array(pages)) => {
            let before = pages.len();
            pages.retain(Value::is_object);
            if pages.len() != before {
                tracing::warn!(dropped = before - pages.len(), "Dropped malformed pages");
            }
        }
        _ => {
            tracing::warn!("Invalid pages structure, resetting to defaults");
            root.insert(
                "pages".into(),
                serde_json::to_value(Document::default_document().pages)?,
            );
        }
    }
    if let Some(Value::Array(pages)) = root.get_mut("pages") {
        for page in pages.iter_mut().filter_map(Value::as_object_mut) {
            repair_page(page);
        }
    }

    if !root.get("currentPageIndex").is_some_and(Value::is_u64) {
        root.insert("currentPageIndex".into(), json!(0));
    }

    match root.get_mut("deletedItemsHistory") {
        Some(Value::Array(entries)) => {
            entries.retain_mut(|e| e.as_object_mut().is_some_and(repair_history_entry));
        }
        _ => {
            root.insert("deletedItemsHistory".into(), Value::Array(Vec::new()));
        }
    }

    Ok(raw)
}

/// Full pipeline from raw JSON to a typed document (not yet `migrate`d).
pub fn decode_document(raw: Value) -> Result<Document> {
    let repaired = repair(upgrade(raw)?)?;
    serde_json::from_value(repaired).context("document does not match the expected schema")
}

/// [`decode_document`] over text.
pub fn parse_document(text: &str) -> Result<Document> {
    let raw: Value = serde_json::from_str(text).context("document is not valid JSON")?;
    decode_document(raw)
}

/// Validates and normalizes an imported export.
///
/// The imported fields are laid over a fresh default document so omitted
/// top-level fields fall back to defaults. The result has not been through
/// `migrate` yet.
pub fn prepare_import(text: &str) -> linkapp_core::Result<Document> {
    let raw: Value = serde_json::from_str(text)?;
    let Value::Object(imported) = raw else {
        return Err(LinkAppError::invalid_import(
            "Import failed: JSON root is not an object",
        ));
    };
    let page_count = match imported.get("pages") {
        Some(Value::Array(pages)) => pages.len(),
        _ => {
            return Err(LinkAppError::invalid_import(
                "Invalid data structure: 'pages' array not found",
            ));
        }
    };

    let mut merged = match serde_json::to_value(Document::default_document())? {
        Value::Object(defaults) => defaults,
        _ => Map::new(),
    };
    merged.extend(imported);

    let index_ok = merged
        .get("currentPageIndex")
        .and_then(Value::as_u64)
        .is_some_and(|i| (i as usize) < page_count);
    if !index_ok {
        merged.insert("currentPageIndex".into(), json!(0));
    }
    if !merged.get("deletedItemsHistory").is_some_and(Value::is_array) {
        merged.insert("deletedItemsHistory".into(), Value::Array(Vec::new()));
    }

    decode_document(Value::Object(merged)).map_err(|e| LinkAppError::invalid_import(format!("{e:#}")))
}
