//! Save-slot domain model.

use crate::document::Document;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Long-lived workspace or point-in-time snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotKind {
    /// Slots written before kinds existed are workspaces
    #[default]
    Workspace,
    Snapshot,
}

impl SlotKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Workspace => "workspace",
            Self::Snapshot => "snapshot",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Workspace => "Workspace",
            Self::Snapshot => "Snapshot",
        }
    }
}

impl fmt::Display for SlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SlotKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "workspace" => Ok(Self::Workspace),
            "snapshot" => Ok(Self::Snapshot),
            other => Err(format!("unknown slot kind '{other}'")),
        }
    }
}

/// A named, independently persisted clone of the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveSlot {
    pub id: String,
    #[serde(default)]
    pub kind: SlotKind,
    #[serde(default)]
    pub name: String,
    /// Epoch millis
    #[serde(default)]
    pub created_at: i64,
    /// Epoch millis
    #[serde(default)]
    pub updated_at: i64,
    pub data: Document,
    /// Soft-delete marker (epoch millis)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<i64>,
}

impl SaveSlot {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn name_matches(&self, name: &str) -> bool {
        self.name.to_lowercase() == name.to_lowercase()
    }
}

/// Slot id to slot, as persisted under the sessions key.
pub type SlotTable = BTreeMap<String, SaveSlot>;
