//! Document domain model.
//!
//! These types mirror the persisted JSON layout (camelCase keys). Every level
//! keeps the fields it does not know about in an `extra` map so that imports
//! and older data survive a load/save cycle untouched.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Root value holding all user content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Index of the page shown to the user, in `[0, pages.len())`
    #[serde(default)]
    pub current_page_index: usize,
    #[serde(default)]
    pub pages: Vec<Page>,
    /// Soft-deleted items, oldest first
    #[serde(default)]
    pub deleted_items_history: Vec<HistoryEntry>,
    /// Top-level fields carried by imports that the app does not interpret
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A named tab of sections.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub sections: BTreeMap<String, Section>,
    /// Display order of `sections`; kept a permutation of its keys
    #[serde(default)]
    pub sections_order: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A titled group of buttons.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Section {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub buttons: Vec<Button>,
    /// UI-only fold state, never part of the content fingerprint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collapsed: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A single link.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Button {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub text: String,
    /// Normalized absolute URL, or empty when no link is set
    #[serde(default)]
    pub href: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A soft-deleted item plus where it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub item: DeletedItem,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_index: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_index: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button_index: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DeletedAt>,
}

/// Payload of a history entry, tagged by `type`.
#[derive(Debug, Clone, PartialEq)]
pub enum DeletedItem {
    Button {
        name: String,
        link: String,
    },
    Section {
        buttons: Vec<Button>,
    },
    Page {
        snapshot: Option<Page>,
    },
    /// Entries written by newer versions; kept verbatim but never restorable
    Unknown {
        kind: String,
        fields: Map<String, Value>,
    },
}

impl DeletedItem {
    /// The `type` tag as persisted.
    pub fn type_name(&self) -> &str {
        match self {
            Self::Button { .. } => "button",
            Self::Section { .. } => "section",
            Self::Page { .. } => "page",
            Self::Unknown { kind, .. } => kind,
        }
    }
}

/// Wire form of the payloads this version understands.
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum KnownItem {
    Button {
        #[serde(default)]
        name: String,
        #[serde(default)]
        link: String,
    },
    Section {
        #[serde(default)]
        buttons: Vec<Button>,
    },
    Page {
        #[serde(default, alias = "page")]
        snapshot: Option<Page>,
    },
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum KnownItemRef<'a> {
    Button {
        name: &'a str,
        link: &'a str,
    },
    Section {
        buttons: &'a [Button],
    },
    Page {
        #[serde(skip_serializing_if = "Option::is_none")]
        snapshot: Option<&'a Page>,
    },
}

impl Serialize for DeletedItem {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;

        let known = match self {
            Self::Button { name, link } => KnownItemRef::Button { name, link },
            Self::Section { buttons } => KnownItemRef::Section { buttons },
            Self::Page { snapshot } => KnownItemRef::Page {
                snapshot: snapshot.as_ref(),
            },
            Self::Unknown { kind, fields } => {
                let mut map = serializer.serialize_map(None)?;
                map.serialize_entry("type", kind)?;
                for (key, value) in fields.iter().filter(|(key, _)| *key != "type") {
                    map.serialize_entry(key, value)?;
                }
                return map.end();
            }
        };
        known.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for DeletedItem {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::Error;

        let mut fields = Map::<String, Value>::deserialize(deserializer)?;
        let kind = match fields.get("type") {
            Some(Value::String(kind)) => kind.clone(),
            Some(_) => return Err(D::Error::custom("history entry `type` is not a string")),
            None => return Err(D::Error::missing_field("type")),
        };
        if !matches!(kind.as_str(), "button" | "section" | "page") {
            fields.remove("type");
            return Ok(Self::Unknown { kind, fields });
        }
        let known = KnownItem::deserialize(Value::Object(fields)).map_err(D::Error::custom)?;
        Ok(match known {
            KnownItem::Button { name, link } => Self::Button { name, link },
            KnownItem::Section { buttons } => Self::Section { buttons },
            KnownItem::Page { snapshot } => Self::Page { snapshot },
        })
    }
}

/// Deletion timestamp. Older data stored epoch millis, newer data ISO-8601.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DeletedAt {
    Millis(i64),
    Fractional(f64),
    Text(String),
}

impl DeletedAt {
    /// Deletion time for "now" in the ISO form new entries use.
    pub fn now_iso() -> Self {
        Self::Text(Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true))
    }

    /// Epoch millis, or `None` when the value cannot be interpreted.
    ///
    /// Zero and empty strings count as "no timestamp".
    pub fn timestamp_millis(&self) -> Option<i64> {
        match self {
            Self::Millis(0) => None,
            Self::Millis(ms) => Some(*ms),
            Self::Fractional(ms) if ms.is_finite() && *ms != 0.0 => Some(*ms as i64),
            Self::Fractional(_) => None,
            Self::Text(text) => parse_timestamp(text.trim()),
        }
    }
}

fn parse_timestamp(text: &str) -> Option<i64> {
    if text.is_empty() {
        return None;
    }
    if let Ok(at) = DateTime::parse_from_rfc3339(text) {
        return Some(at.timestamp_millis());
    }
    let date = NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc().timestamp_millis())
}

// ============================================================================
// Defaults
// ============================================================================

impl Page {
    /// The page the app ships with in slot `n` (1-based).
    pub fn default_numbered(n: usize) -> Self {
        let section_id = format!("section-{n}");
        let mut sections = BTreeMap::new();
        sections.insert(
            section_id.clone(),
            Section {
                text: "New Section".to_string(),
                buttons: vec![Button::new(format!("button-{n}"), "New button", "")],
                ..Section::default()
            },
        );
        Self {
            id: format!("page-{n}"),
            name: format!("Page {n}"),
            sections,
            sections_order: vec![section_id],
            extra: Map::new(),
        }
    }

    /// Section ids in display order, skipping ids that have no section.
    pub fn ordered_sections(&self) -> impl Iterator<Item = (&String, &Section)> {
        self.sections_order
            .iter()
            .filter_map(|id| self.sections.get_key_value(id))
    }

    pub fn section_position(&self, section_id: &str) -> Option<usize> {
        self.sections_order.iter().position(|id| id == section_id)
    }
}

impl Button {
    pub fn new(id: impl Into<String>, text: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            href: href.into(),
            ..Self::default()
        }
    }
}

impl Document {
    /// Three pages with one section and one empty button each.
    pub fn default_document() -> Self {
        Self {
            current_page_index: 0,
            pages: (1..=3).map(Page::default_numbered).collect(),
            deleted_items_history: Vec::new(),
            extra: Map::new(),
        }
    }

    /// A skeleton with no pages; `migrate` turns it into something usable.
    pub fn empty() -> Self {
        Self {
            current_page_index: 0,
            pages: Vec::new(),
            deleted_items_history: Vec::new(),
            extra: Map::new(),
        }
    }

    pub fn current_page(&self) -> Option<&Page> {
        self.pages.get(self.current_page_index)
    }

    pub fn page_index_by_id(&self, page_id: &str) -> Option<usize> {
        self.pages.iter().position(|p| p.id == page_id)
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::default_document()
    }
}
