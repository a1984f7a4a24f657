use async_trait::async_trait;
use chrono::{Duration, Utc};
use linkapp_core::document::{DeletedAt, DeletedItem, Document, HistoryEntry, migrate};
use linkapp_core::events::{AppEvent, AppEventBus, EventKind};
use linkapp_core::provider::StateProvider;
use linkapp_core::storage::{DATA_KEY, KeyValueStore};
use linkapp_core::{LinkAppError, Result};
use linkapp_infrastructure::{
    DocumentStore, FileKeyValueStore, MemoryKeyValueStore, PhaseBOutcome, SessionStore,
};
use serde_json::json;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

fn memory_store() -> (DocumentStore, Arc<MemoryKeyValueStore>, AppEventBus) {
    let kv = Arc::new(MemoryKeyValueStore::new());
    let bus = AppEventBus::new();
    let store = DocumentStore::new(kv.clone(), bus.clone());
    (store, kv, bus)
}

fn toasts(bus: &AppEventBus) -> Arc<Mutex<Vec<String>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    bus.on(EventKind::Toast, move |event| {
        if let AppEvent::Toast(toast) = event {
            sink.lock().unwrap().push(toast.message.clone());
        }
    });
    seen
}

fn button_entry(name: &str, deleted_at: DeletedAt) -> HistoryEntry {
    HistoryEntry {
        item: DeletedItem::Button {
            name: name.to_string(),
            link: "https://example.com".to_string(),
        },
        page_id: Some("page-1".into()),
        page_name: Some("Page 1".into()),
        section_id: Some("section-1".into()),
        section_name: Some("New Section".into()),
        page_index: None,
        section_index: None,
        button_index: Some(0),
        deleted_at: Some(deleted_at),
    }
}

// ============================================================================
// Bootstrap and migration
// ============================================================================

#[test]
fn test_first_run_yields_three_default_pages() {
    let (store, _, _) = memory_store();
    store.initialize();

    let doc = store.get();
    assert_eq!(doc.current_page_index, 0);
    assert_eq!(doc.pages.len(), 3);
    for (i, page) in doc.pages.iter().enumerate() {
        assert_eq!(page.name, format!("Page {}", i + 1));
        assert_eq!(page.sections.len(), 1);
        let (_, section) = page.ordered_sections().next().unwrap();
        assert_eq!(section.text, "New Section");
        assert_eq!(section.buttons.len(), 1);
        assert_eq!(section.buttons[0].text, "New button");
        assert_eq!(section.buttons[0].href, "");
    }
}

#[test]
fn test_out_of_range_page_index_is_clamped_on_load() {
    let (store, kv, _) = memory_store();
    let raw = json!({
        "pages": [{"id": "a", "name": "A"}, {"id": "b", "name": "B"}],
        "currentPageIndex": 5
    });
    kv.set_item(DATA_KEY, &raw.to_string()).unwrap();

    store.initialize();

    assert_eq!(store.get().current_page_index, 0);
    assert_eq!(store.get().pages.len(), 2);
}

#[test]
fn test_legacy_flat_schema_loads_into_first_page() {
    let (store, kv, _) = memory_store();
    let raw = json!({
        "sections": {"s1": {"text": "Legacy", "buttons": []}},
        "currentPageIndex": 0
    });
    kv.set_item(DATA_KEY, &raw.to_string()).unwrap();

    store.initialize();

    let doc = store.get();
    assert_eq!(doc.pages.len(), 1);
    assert_eq!(doc.pages[0].sections["s1"].text, "Legacy");
    assert_eq!(doc.pages[0].name, "Page 1");
}

#[test]
fn test_migrate_is_idempotent_on_messy_input() {
    let (store, kv, _) = memory_store();
    let raw = json!({
        "pages": [
            {"id": "p", "name": " ", "sections": {"a": {}, "b": {}}, "sectionsOrder": ["b", "ghost", "b"]}
        ],
        "currentPageIndex": 3
    });
    kv.set_item(DATA_KEY, &raw.to_string()).unwrap();
    store.initialize();

    let once = store.get().clone();
    let mut twice = once.clone();
    assert!(!migrate(&mut twice));
    assert_eq!(once, twice);
    assert_eq!(once.pages[0].sections_order, vec!["b", "a"]);
    assert_eq!(once.pages[0].name, "Page 1");
}

// ============================================================================
// Update contract
// ============================================================================

#[test]
fn test_update_reflects_exactly_the_mutation() {
    let (store, _, _) = memory_store();
    store.initialize();
    let mut expected = store.get().clone();
    expected.pages[1].name = "Renamed".into();

    store.update(|doc| {
        doc.pages[1].name = "Renamed".into();
        Ok(())
    });

    assert_eq!(*store.get(), expected);
}

#[test]
fn test_collapse_toggle_persists_without_dirtying() {
    let (store, kv, bus) = memory_store();
    store.initialize();
    let updates = Arc::new(Mutex::new(0));
    let sink = Arc::clone(&updates);
    bus.on(EventKind::StorageUpdated, move |_| *sink.lock().unwrap() += 1);

    store.update(|doc| doc.toggle_collapsed(0, "section-1"));

    assert!(!store.is_dirty());
    assert_eq!(*updates.lock().unwrap(), 1);
    let persisted = kv.get_item(DATA_KEY).unwrap().unwrap();
    assert!(persisted.contains("\"collapsed\":true"));
}

#[test]
fn test_quota_failure_toasts_and_keeps_memory_intact() {
    let kv = Arc::new(MemoryKeyValueStore::with_quota(4096));
    let bus = AppEventBus::new();
    let store = DocumentStore::new(kv.clone(), bus.clone());
    store.initialize();
    let persisted = kv.get_item(DATA_KEY).unwrap();
    let seen = toasts(&bus);

    let long = "x".repeat(8192);
    store.update(|doc| doc.rename_page(0, &long));

    assert_eq!(store.get().pages[0].name, long);
    assert_eq!(kv.get_item(DATA_KEY).unwrap(), persisted);
    assert_eq!(*seen.lock().unwrap(), vec!["Failed to save data"]);
}

// ============================================================================
// History pruning
// ============================================================================

#[test]
fn test_save_prunes_expired_and_excess_history() {
    let (store, _, _) = memory_store();
    store.initialize();
    let old = Utc::now() - Duration::days(31);
    let fresh = Utc::now() - Duration::days(1);

    store.update(|doc| {
        doc.deleted_items_history
            .push(button_entry("expired", DeletedAt::Millis(old.timestamp_millis())));
        doc.deleted_items_history
            .push(button_entry("expired-iso", DeletedAt::Text(old.to_rfc3339())));
        for i in 0..205 {
            doc.deleted_items_history.push(button_entry(
                &format!("keep-{i}"),
                DeletedAt::Millis(fresh.timestamp_millis()),
            ));
        }
        Ok(())
    });

    let doc = store.get();
    assert_eq!(doc.deleted_items_history.len(), 200);
    let names: Vec<_> = doc
        .deleted_items_history
        .iter()
        .map(|e| match &e.item {
            DeletedItem::Button { name, .. } => name.clone(),
            _ => String::new(),
        })
        .collect();
    assert_eq!(names.first().map(String::as_str), Some("keep-5"));
    assert_eq!(names.last().map(String::as_str), Some("keep-204"));
}

#[test]
fn test_load_prunes_history() {
    let (store, _, _) = memory_store();
    let mut doc = Document::default_document();
    let old = Utc::now() - Duration::days(45);
    doc.deleted_items_history
        .push(button_entry("gone", DeletedAt::Millis(old.timestamp_millis())));
    doc.deleted_items_history
        .push(button_entry("kept", DeletedAt::Text("not a date".into())));

    store.load(Some(doc));

    assert_eq!(store.get().deleted_items_history.len(), 1);
}

// ============================================================================
// Import / export
// ============================================================================

#[test]
fn test_export_import_round_trip() {
    let (store, _, _) = memory_store();
    store.initialize();
    store.update(|doc| {
        let id = doc.add_section(0, Some("Work"))?;
        doc.add_button(0, &id, "Docs", "docs.rs")?;
        doc.delete_button(0, "section-1", "button-1")
    });
    let before = store.get().clone();
    let text = store.export_snapshot().unwrap();

    store.reset();
    assert!(store.import_snapshot(&text));

    let after = store.get();
    assert_eq!(after.pages, before.pages);
    assert_eq!(after.deleted_items_history, before.deleted_items_history);
    assert!(!after.extra.contains_key("__app"));
}

#[test]
fn test_import_without_pages_is_rejected() {
    let (store, _, bus) = memory_store();
    store.initialize();
    store.update(|doc| doc.rename_page(0, "Mine"));
    let before = store.get().clone();
    let seen = toasts(&bus);

    assert!(!store.import_snapshot(r#"{"foo": 1}"#));
    assert!(!store.import_snapshot("[]"));

    assert_eq!(*store.get(), before);
    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            "Failed to import data: Invalid data structure: 'pages' array not found",
            "Failed to import data: Import failed: JSON root is not an object",
        ]
    );
}

#[test]
fn test_import_with_unreadable_schema_uses_shape() {
    for schema in ["0", "2.5", "\"v2\""] {
        let (store, _, _) = memory_store();
        store.initialize();
        let text = format!(r#"{{"__schema": {schema}, "pages": [{{"id": "p", "name": "P"}}]}}"#);

        assert!(store.import_snapshot(&text), "__schema {schema}");
        assert_eq!(store.get().pages.len(), 1);
        assert_eq!(store.get().pages[0].name, "P");
    }
}

#[test]
fn test_import_clears_dirty() {
    let (store, _, _) = memory_store();
    store.initialize();
    store.update(|doc| doc.rename_page(0, "Dirty"));
    assert!(store.is_dirty());

    assert!(store.import_snapshot(r#"{"pages": [{"id": "x", "name": "X"}]}"#));

    assert!(!store.is_dirty());
    assert_eq!(store.get().pages[0].name, "X");
}

// ============================================================================
// Phase B
// ============================================================================

struct FakeProvider {
    stored: Mutex<Option<String>>,
    saves: Mutex<Vec<String>>,
    delay_ms: u64,
    fail: bool,
}

impl FakeProvider {
    fn with(stored: Option<String>) -> Self {
        Self {
            stored: Mutex::new(stored),
            saves: Mutex::new(Vec::new()),
            delay_ms: 0,
            fail: false,
        }
    }
}

#[async_trait]
impl StateProvider for FakeProvider {
    async fn load_app_state(&self) -> Result<Option<String>> {
        if self.delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
        }
        if self.fail {
            return Err(LinkAppError::storage("provider offline"));
        }
        Ok(self.stored.lock().unwrap().clone())
    }

    async fn save_app_state(&self, text: &str) -> Result<()> {
        self.saves.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

fn with_provider(provider: FakeProvider) -> (DocumentStore, Arc<FakeProvider>, AppEventBus) {
    let (store, _, bus) = memory_store();
    let provider = Arc::new(provider);
    let store = store.with_state_provider(provider.clone());
    (store, provider, bus)
}

#[tokio::test]
async fn test_phase_b_without_provider() {
    let (store, _, _) = memory_store();
    assert_eq!(store.initialize().completion().await, PhaseBOutcome::NoProvider);
}

#[tokio::test]
async fn test_phase_b_replaces_differing_content() {
    let text = json!({"pages": [{"id": "remote", "name": "Remote"}]}).to_string();
    let (store, _, bus) = with_provider(FakeProvider::with(Some(text)));
    let loaded = Arc::new(Mutex::new(0));
    let sink = Arc::clone(&loaded);
    bus.on(EventKind::StorageLoaded, move |_| *sink.lock().unwrap() += 1);

    let outcome = store.initialize().completion().await;

    assert_eq!(outcome, PhaseBOutcome::Replaced);
    assert_eq!(store.get().pages[0].name, "Remote");
    assert_eq!(*loaded.lock().unwrap(), 2);
}

#[tokio::test]
async fn test_phase_b_leaves_identical_content_alone() {
    let (seed, _, _) = memory_store();
    seed.initialize();
    let same = serde_json::to_string(&*seed.get()).unwrap();
    let (store, _, _) = with_provider(FakeProvider::with(Some(same)));

    assert_eq!(store.initialize().completion().await, PhaseBOutcome::Unchanged);
}

#[tokio::test]
async fn test_phase_b_failures_are_contained() {
    let (store, _, _) = with_provider(FakeProvider::with(Some("{broken".into())));
    assert!(matches!(
        store.initialize().completion().await,
        PhaseBOutcome::Invalid(_)
    ));
    assert_eq!(store.get().pages.len(), 3);

    let mut failing = FakeProvider::with(None);
    failing.fail = true;
    let (store, _, _) = with_provider(failing);
    assert!(matches!(
        store.initialize().completion().await,
        PhaseBOutcome::Failed(_)
    ));

    let (store, _, _) = with_provider(FakeProvider::with(None));
    assert_eq!(store.initialize().completion().await, PhaseBOutcome::Empty);
}

#[tokio::test]
async fn test_phase_b_can_be_cancelled() {
    let text = json!({"pages": [{"id": "remote", "name": "Remote"}]}).to_string();
    let mut slow = FakeProvider::with(Some(text));
    slow.delay_ms = 5_000;
    let (store, _, _) = with_provider(slow);

    let handle = store.initialize();
    handle.cancel();

    assert_eq!(handle.completion().await, PhaseBOutcome::Cancelled);
    assert_eq!(store.get().pages[0].name, "Page 1");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_save_forwards_to_provider() {
    let (store, provider, _) = with_provider(FakeProvider::with(None));
    store.initialize().completion().await;

    store.update(|doc| doc.rename_page(0, "Forwarded"));

    for _ in 0..50 {
        if provider
            .saves
            .lock()
            .unwrap()
            .iter()
            .any(|s| s.contains("Forwarded"))
        {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("provider never received the update");
}

#[tokio::test(flavor = "current_thread")]
async fn test_flush_waits_for_forwarded_writes() {
    let (store, provider, _) = with_provider(FakeProvider::with(None));
    store.initialize().completion().await;

    store.update(|doc| doc.rename_page(1, "Flushed"));
    store.flush().await;

    let saves = provider.saves.lock().unwrap();
    assert!(saves.last().unwrap().contains("Flushed"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_provider_sees_saves_in_order() {
    let (store, provider, _) = with_provider(FakeProvider::with(None));
    store.initialize().completion().await;

    for i in 0..500 {
        store.update(|doc| doc.rename_page(0, &format!("n{i}")));
    }
    store.flush().await;

    let counters: Vec<u32> = provider
        .saves
        .lock()
        .unwrap()
        .iter()
        .filter_map(|text| {
            let doc: serde_json::Value = serde_json::from_str(text).unwrap();
            doc["pages"][0]["name"].as_str()?.strip_prefix('n')?.parse().ok()
        })
        .collect();
    assert!(counters.windows(2).all(|w| w[0] < w[1]), "{counters:?}");
    assert_eq!(counters.last(), Some(&499));
}

// ============================================================================
// File-backed persistence
// ============================================================================

#[test]
fn test_file_store_survives_restart() {
    let dir = TempDir::new().unwrap();
    {
        let kv = Arc::new(FileKeyValueStore::open(dir.path()).unwrap());
        let store = DocumentStore::new(kv.clone(), AppEventBus::new());
        store.initialize();
        store.update(|doc| doc.rename_page(2, "Persisted"));
        SessionStore::new(kv, store).saves().upsert("Work");
    }

    let kv = Arc::new(FileKeyValueStore::open(dir.path()).unwrap());
    let store = DocumentStore::new(kv.clone(), AppEventBus::new());
    store.initialize();
    assert_eq!(store.get().pages[2].name, "Persisted");

    let sessions = SessionStore::new(kv, store);
    assert_eq!(sessions.saves().active_name(), "Work");
    assert_eq!(sessions.list_workspaces().len(), 1);
}
