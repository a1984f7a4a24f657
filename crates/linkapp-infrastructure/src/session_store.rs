//! Workspaces and snapshots: named copies of the document kept under
//! `linkapp-sessions`, plus the "active save" pointer used by Save.

use crate::document_store::DocumentStore;
use chrono::{Local, Utc};
use linkapp_core::document::Document;
use linkapp_core::events::{AppEvent, AppEventBus, ToastLevel};
use linkapp_core::session::{SaveSlot, SlotKind, SlotTable};
use linkapp_core::storage::{ACTIVE_SAVE_KEY, KeyValueStore, SESSIONS_KEY};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn newest_first(mut slots: Vec<SaveSlot>) -> Vec<SaveSlot> {
    slots.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    slots
}

/// The slot table. Cheap to clone.
#[derive(Clone)]
pub struct SessionStore {
    kv: Arc<dyn KeyValueStore>,
    store: DocumentStore,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore").finish_non_exhaustive()
    }
}

impl SessionStore {
    pub fn new(kv: Arc<dyn KeyValueStore>, store: DocumentStore) -> Self {
        Self { kv, store }
    }

    fn events(&self) -> &AppEventBus {
        self.store.events()
    }

    fn toast(&self, level: ToastLevel, message: impl Into<String>) {
        self.events().emit(&AppEvent::toast(level, message));
    }

    /// The `workspace`-only view keyed by the active name.
    pub fn saves(&self) -> Saves {
        Saves {
            sessions: self.clone(),
        }
    }

    /// Reads the table. Unreadable tables are empty and unreadable slots
    /// are skipped.
    fn read(&self) -> SlotTable {
        let raw = match self.kv.get_item(SESSIONS_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return SlotTable::new(),
            Err(e) => {
                tracing::warn!("Failed to read session list: {e}");
                return SlotTable::new();
            }
        };
        let entries: BTreeMap<String, Value> = match serde_json::from_str(&raw) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Session list is corrupt, treating as empty: {e}");
                return SlotTable::new();
            }
        };
        entries
            .into_iter()
            .filter_map(|(id, value)| match serde_json::from_value::<SaveSlot>(value) {
                Ok(slot) => Some((id, slot)),
                Err(e) => {
                    tracing::warn!(id = %id, "Skipping unreadable session: {e}");
                    None
                }
            })
            .collect()
    }

    fn write(&self, table: &SlotTable) -> bool {
        let result = serde_json::to_string(table)
            .map_err(linkapp_core::LinkAppError::from)
            .and_then(|json| self.kv.set_item(SESSIONS_KEY, &json));
        match result {
            Ok(()) => {
                self.events().emit(&AppEvent::SessionsUpdated);
                true
            }
            Err(e) => {
                tracing::error!("Session list write failed: {e}");
                self.toast(ToastLevel::Error, "Failed to save session list");
                false
            }
        }
    }

    fn create(&self, name: &str, kind: SlotKind, data: Document) -> Option<String> {
        let name = match name.trim() {
            "" => format!("{} {}", kind.label(), Local::now().format("%Y-%m-%d %H:%M:%S")),
            trimmed => trimmed.to_string(),
        };
        let id = format!("sess-{}", Uuid::now_v7());
        let now = now_millis();

        let mut table = self.read();
        table.insert(
            id.clone(),
            SaveSlot {
                id: id.clone(),
                kind,
                name,
                created_at: now,
                updated_at: now,
                data,
                deleted_at: None,
            },
        );
        if !self.write(&table) {
            return None;
        }

        let message = match kind {
            SlotKind::Snapshot => "Snapshot created",
            SlotKind::Workspace => "Workspace saved",
        };
        self.toast(ToastLevel::Success, message);
        tracing::debug!(id = %id, kind = %kind, "Created save slot");
        Some(id)
    }

    /// Stores a copy of the current document as a new slot. A blank name
    /// becomes `<Kind> <local time>`.
    pub fn save(&self, name: &str, kind: SlotKind) -> Option<String> {
        let data = self.store.get().clone();
        self.create(name, kind, data)
    }

    pub fn get(&self, id: &str) -> Option<SaveSlot> {
        self.read().remove(id)
    }

    /// Live slots of every kind, most recently updated first.
    pub fn list(&self) -> Vec<SaveSlot> {
        newest_first(
            self.read()
                .into_values()
                .filter(|slot| !slot.is_deleted())
                .collect(),
        )
    }

    /// Soft-deleted slots, most recently updated first.
    pub fn trash(&self) -> Vec<SaveSlot> {
        newest_first(
            self.read()
                .into_values()
                .filter(SaveSlot::is_deleted)
                .collect(),
        )
    }

    /// Live slots of `kind`, most recently updated first.
    pub fn list_by_kind(&self, kind: SlotKind) -> Vec<SaveSlot> {
        newest_first(
            self.read()
                .into_values()
                .filter(|slot| !slot.is_deleted() && slot.kind == kind)
                .collect(),
        )
    }

    pub fn list_workspaces(&self) -> Vec<SaveSlot> {
        self.list_by_kind(SlotKind::Workspace)
    }

    pub fn list_snapshots(&self) -> Vec<SaveSlot> {
        self.list_by_kind(SlotKind::Snapshot)
    }

    /// A blank `name` keeps the old one but still bumps `updatedAt`.
    pub fn rename(&self, id: &str, name: &str) -> bool {
        let mut table = self.read();
        let Some(slot) = table.get_mut(id) else {
            return false;
        };
        let trimmed = name.trim();
        if !trimmed.is_empty() {
            slot.name = trimmed.to_string();
        }
        slot.updated_at = now_millis();
        self.write(&table);
        self.toast(ToastLevel::Info, "Session renamed");
        true
    }

    /// Soft delete.
    pub fn delete(&self, id: &str) -> bool {
        let mut table = self.read();
        let Some(slot) = table.get_mut(id) else {
            return false;
        };
        slot.deleted_at = Some(now_millis());
        self.write(&table);
        self.toast(ToastLevel::Info, "Moved to trash");
        true
    }

    /// Replaces the current document with the slot's copy and makes the
    /// slot the active save.
    pub fn load(&self, id: &str) -> bool {
        let Some(slot) = self.get(id) else {
            self.toast(ToastLevel::Error, "Session not found");
            return false;
        };
        self.saves().set_active_name(&slot.name);
        self.store.load(Some(slot.data));
        tracing::info!(id = %id, name = %slot.name, "Session loaded");
        self.toast(ToastLevel::Success, format!("Session loaded: {}", slot.name));
        true
    }

    /// Copies a slot into a brand-new workspace and opens it.
    ///
    /// A blank `new_name` becomes `<name> (restored <date>)`.
    pub fn restore_to_workspace(&self, id: &str, new_name: &str) -> Option<String> {
        let Some(source) = self.get(id) else {
            self.toast(ToastLevel::Error, "Snapshot not found");
            return None;
        };
        let title = match new_name.trim() {
            "" => format!(
                "{} (restored {})",
                source.name,
                Local::now().format("%Y-%m-%d")
            ),
            trimmed => trimmed.to_string(),
        };
        let new_id = self.create(&title, SlotKind::Workspace, source.data)?;
        self.load(&new_id);
        Some(new_id)
    }
}

/// Workspace-only wrapper used by Save / Save As / Open.
#[derive(Debug, Clone)]
pub struct Saves {
    sessions: SessionStore,
}

impl Saves {
    /// Empty when nothing is active or the key cannot be read.
    pub fn active_name(&self) -> String {
        match self.sessions.kv.get_item(ACTIVE_SAVE_KEY) {
            Ok(name) => name.unwrap_or_default(),
            Err(e) => {
                tracing::warn!("Failed to read active save name: {e}");
                String::new()
            }
        }
    }

    pub fn set_active_name(&self, name: &str) {
        let name = name.trim().to_string();
        if let Err(e) = self.sessions.kv.set_item(ACTIVE_SAVE_KEY, &name) {
            tracing::warn!("Failed to store active save name: {e}");
        }
        self.sessions
            .events()
            .emit(&AppEvent::ActiveSaveChanged { name });
    }

    pub fn list(&self) -> Vec<SaveSlot> {
        self.sessions.list_workspaces()
    }

    /// Saves the current document under `name`.
    ///
    /// An existing slot with the same name (any kind, case-insensitive) is
    /// overwritten and becomes a live workspace; otherwise a new workspace
    /// is created. Either way `name` becomes the active save.
    pub fn upsert(&self, name: &str) -> bool {
        let target = name.trim();
        if target.is_empty() {
            return false;
        }

        let mut table = self.sessions.read();
        let existing = table.values_mut().find(|slot| slot.name_matches(target));
        let saved = match existing {
            Some(slot) => {
                slot.kind = SlotKind::Workspace;
                slot.data = self.sessions.store.get().clone();
                slot.updated_at = now_millis();
                slot.deleted_at = None;
                let written = self.sessions.write(&table);
                if written {
                    self.sessions
                        .toast(ToastLevel::Success, format!("Saved to “{target}”"));
                }
                written
            }
            None => self.sessions.save(target, SlotKind::Workspace).is_some(),
        };

        self.set_active_name(target);
        if saved {
            self.sessions.events().emit(&AppEvent::StorageSaved {
                at: Utc::now(),
                by: "saves".to_string(),
            });
        }
        saved
    }

    /// Re-saves under the active name. `false` when nothing is active.
    pub fn save_active(&self) -> bool {
        let name = self.active_name();
        if name.is_empty() {
            return false;
        }
        self.upsert(&name)
    }

    /// Loads the live slot whose name matches, case-insensitively.
    pub fn open_by_name(&self, name: &str) -> bool {
        let wanted = name.trim();
        let found = self
            .sessions
            .list()
            .into_iter()
            .find(|slot| slot.name_matches(wanted));
        match found {
            Some(slot) => self.sessions.load(&slot.id),
            None => false,
        }
    }
}
