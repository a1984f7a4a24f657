//! The single source of truth for the LinkApp document.
//!
//! [`DocumentStore`] owns the live [`Document`], persists it to a
//! [`KeyValueStore`] under `linkapp-data`, optionally mirrors it to a
//! [`StateProvider`], and announces every lifecycle step on the event bus.
//!
//! Every failure is logged and turned into an error toast; none of them
//! propagates far enough to corrupt the in-memory document.

use crate::migration::{decode_document, parse_document, prepare_import};
use chrono::Utc;
use linkapp_core::canonical::ContentFingerprint;
use linkapp_core::document::{Document, migrate};
use linkapp_core::events::{AppEvent, AppEventBus, EventKind, SubscriptionId, ToastLevel};
use linkapp_core::history::prune_history;
use linkapp_core::import::{APP_SIGNATURE, EXPORT_SCHEMA};
use linkapp_core::provider::StateProvider;
use linkapp_core::storage::{DATA_KEY, KeyValueStore};
use linkapp_core::{LinkAppError, Result};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{
    Arc, Mutex, MutexGuard, OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// How the provider phase of [`DocumentStore::initialize`] ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseBOutcome {
    /// No provider configured, the local copy is authoritative
    NoProvider,
    /// The provider had nothing stored
    Empty,
    /// The provider's copy matches the local one
    Unchanged,
    /// The provider's copy replaced the local one
    Replaced,
    /// The provider's copy could not be read as a document
    Invalid(String),
    /// The provider itself failed
    Failed(String),
    Cancelled,
}

enum PhaseB {
    Done(PhaseBOutcome),
    Running(JoinHandle<PhaseBOutcome>),
}

/// Handle to the asynchronous provider phase of initialization.
///
/// Phase A has always completed (and announced `StorageLoaded`) by the time
/// this handle exists. Dropping the handle does not cancel phase B.
pub struct InitHandle {
    cancel: CancellationToken,
    phase_b: PhaseB,
}

impl InitHandle {
    /// Requests cancellation. A replacement that has already been applied
    /// stays applied.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_running(&self) -> bool {
        matches!(&self.phase_b, PhaseB::Running(handle) if !handle.is_finished())
    }

    /// Waits for phase B to settle.
    pub async fn completion(self) -> PhaseBOutcome {
        match self.phase_b {
            PhaseB::Done(outcome) => outcome,
            PhaseB::Running(handle) => handle
                .await
                .unwrap_or_else(|e| PhaseBOutcome::Failed(e.to_string())),
        }
    }
}

impl std::fmt::Debug for InitHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitHandle")
            .field("cancelled", &self.cancel.is_cancelled())
            .field("running", &self.is_running())
            .finish()
    }
}

enum Forward {
    Write(String),
    /// Answered once every write queued before it has finished
    Flush(oneshot::Sender<()>),
}

/// Drains the queue one message at a time so the provider sees writes in
/// the order they were saved. A burst of queued writes collapses into the
/// newest one.
async fn run_forwarder(provider: Arc<dyn StateProvider>, mut queue: mpsc::UnboundedReceiver<Forward>) {
    while let Some(message) = queue.recv().await {
        let mut latest = match message {
            Forward::Write(json) => json,
            Forward::Flush(done) => {
                let _ = done.send(());
                continue;
            }
        };
        let mut flushed = Vec::new();
        while let Ok(next) = queue.try_recv() {
            match next {
                Forward::Write(json) => latest = json,
                Forward::Flush(done) => flushed.push(done),
            }
        }
        if let Err(e) = provider.save_app_state(&latest).await {
            tracing::warn!("saveAppState failed: {e}");
        }
        for done in flushed {
            let _ = done.send(());
        }
    }
    tracing::debug!("State provider writer stopped");
}

struct Inner {
    doc: RwLock<Document>,
    dirty: AtomicBool,
    kv: Arc<dyn KeyValueStore>,
    provider: OnceLock<Arc<dyn StateProvider>>,
    events: AppEventBus,
    subscriptions: Mutex<Vec<(EventKind, SubscriptionId)>>,
    /// Queue of the worker that writes to the state provider in save order
    forwarder: Mutex<Option<mpsc::UnboundedSender<Forward>>>,
}

impl Inner {
    fn set_dirty(&self, dirty: bool) {
        if self.dirty.swap(dirty, Ordering::SeqCst) != dirty {
            self.events.emit(&AppEvent::StorageDirty { dirty });
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let subscriptions = self
            .subscriptions
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        for (kind, id) in subscriptions.drain(..) {
            self.events.off(kind, id);
        }
    }
}

/// Cloneable handle to the document store.
#[derive(Clone)]
pub struct DocumentStore {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentStore")
            .field("dirty", &self.is_dirty())
            .field("has_provider", &self.inner.provider.get().is_some())
            .finish()
    }
}

impl DocumentStore {
    /// Creates a store holding the default document. Call
    /// [`initialize`](Self::initialize) to load persisted content.
    pub fn new(kv: Arc<dyn KeyValueStore>, events: AppEventBus) -> Self {
        let inner = Arc::new(Inner {
            doc: RwLock::new(Document::default_document()),
            dirty: AtomicBool::new(false),
            kv,
            provider: OnceLock::new(),
            events: events.clone(),
            subscriptions: Mutex::new(Vec::new()),
            forwarder: Mutex::new(None),
        });

        // loaded and saved both mean "nothing unsaved"
        let mut subscriptions = Vec::new();
        for kind in [EventKind::StorageLoaded, EventKind::StorageSaved] {
            let weak = Arc::downgrade(&inner);
            let id = events.on(kind, move |_| {
                if let Some(inner) = weak.upgrade() {
                    inner.set_dirty(false);
                }
            });
            subscriptions.push((kind, id));
        }
        *inner
            .subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = subscriptions;

        Self { inner }
    }

    /// Attaches the external persistence channel. Only the first provider
    /// is kept.
    pub fn with_state_provider(self, provider: Arc<dyn StateProvider>) -> Self {
        if self.inner.provider.set(provider).is_err() {
            tracing::warn!("State provider already configured, ignoring another one");
        }
        self
    }

    pub fn events(&self) -> &AppEventBus {
        &self.inner.events
    }

    fn read(&self) -> RwLockReadGuard<'_, Document> {
        self.inner.doc.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Document> {
        self.inner.doc.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn toast(&self, level: ToastLevel, message: impl Into<String>) {
        self.inner.events.emit(&AppEvent::toast(level, message));
    }

    // ========================================================================
    // Initialization
    // ========================================================================

    /// Two-phase load.
    ///
    /// Phase A runs synchronously: read `linkapp-data` (defaults when absent
    /// or unreadable), upgrade, migrate, persist, announce `StorageLoaded`.
    /// Phase B asks the state provider for its copy on the current tokio
    /// runtime and replaces the local document when the two differ.
    pub fn initialize(&self) -> InitHandle {
        let doc = match self.inner.kv.get_item(DATA_KEY) {
            Ok(Some(text)) => match parse_document(&text) {
                Ok(doc) => {
                    tracing::info!("Data loaded from key-value store");
                    doc
                }
                Err(e) => {
                    tracing::error!("Failed to load data, using defaults: {e:#}");
                    Document::default_document()
                }
            },
            Ok(None) => {
                tracing::info!("No saved data found, using defaults");
                Document::default_document()
            }
            Err(e) => {
                tracing::error!("Failed to read data, using defaults: {e}");
                Document::default_document()
            }
        };
        self.install(doc);
        self.save();
        self.inner
            .events
            .emit(&AppEvent::StorageLoaded(self.snapshot()));

        let cancel = CancellationToken::new();
        let phase_b = match self.inner.provider.get() {
            None => PhaseB::Done(PhaseBOutcome::NoProvider),
            Some(provider) => match tokio::runtime::Handle::try_current() {
                Ok(runtime) => {
                    let store = self.clone();
                    let provider = Arc::clone(provider);
                    let token = cancel.clone();
                    PhaseB::Running(runtime.spawn(async move {
                        tokio::select! {
                            biased;
                            _ = token.cancelled() => {
                                tracing::debug!("Provider load cancelled");
                                PhaseBOutcome::Cancelled
                            }
                            outcome = store.load_from_provider(provider) => outcome,
                        }
                    }))
                }
                Err(_) => {
                    tracing::warn!("No async runtime, skipping state provider load");
                    PhaseB::Done(PhaseBOutcome::Failed("no async runtime".into()))
                }
            },
        };

        InitHandle { cancel, phase_b }
    }

    async fn load_from_provider(&self, provider: Arc<dyn StateProvider>) -> PhaseBOutcome {
        let raw = match provider.load_app_state().await {
            Ok(Some(raw)) => raw,
            Ok(None) => return PhaseBOutcome::Empty,
            Err(e) => {
                tracing::warn!("loadAppState failed: {e}");
                return PhaseBOutcome::Failed(e.to_string());
            }
        };
        let value: Value = match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Provider state is invalid JSON, skipping: {e}");
                return PhaseBOutcome::Invalid(e.to_string());
            }
        };

        let current = serde_json::to_string(&*self.read());
        if current.ok() == serde_json::to_string(&value).ok() {
            return PhaseBOutcome::Unchanged;
        }

        match decode_document(value) {
            Ok(doc) => {
                self.install(doc);
                self.save();
                self.inner
                    .events
                    .emit(&AppEvent::StorageLoaded(self.snapshot()));
                tracing::info!("Data loaded from state provider (override)");
                PhaseBOutcome::Replaced
            }
            Err(e) => {
                tracing::warn!("Provider state is not a valid document, skipping: {e:#}");
                PhaseBOutcome::Invalid(format!("{e:#}"))
            }
        }
    }

    /// Replaces the live document with a migrated `doc`.
    fn install(&self, mut doc: Document) {
        migrate(&mut doc);
        *self.write() = doc;
    }

    // ========================================================================
    // Read / write
    // ========================================================================

    /// Structural repair of the live document. Returns whether anything
    /// changed. Does not persist.
    pub fn migrate(&self) -> bool {
        migrate(&mut self.write())
    }

    /// Read access to the live document. Do not hold the guard across
    /// calls that write.
    pub fn get(&self) -> RwLockReadGuard<'_, Document> {
        self.read()
    }

    /// A shared copy of the current document.
    pub fn snapshot(&self) -> Arc<Document> {
        Arc::new(self.read().clone())
    }

    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.load(Ordering::SeqCst)
    }

    /// Applies `f` to the live document, then persists and announces
    /// `StorageUpdated`.
    ///
    /// The document is marked dirty only when its canonical content changed,
    /// so UI-only edits such as collapsing a section persist without making
    /// the document dirty. When `f` fails, whatever it already changed stays
    /// in place and nothing is persisted or announced.
    pub fn try_update<T>(&self, f: impl FnOnce(&mut Document) -> Result<T>) -> Result<T> {
        let (result, changed) = {
            let mut doc = self.write();
            let before = ContentFingerprint::of(&doc);
            let result = f(&mut doc);
            let changed = result.is_ok() && ContentFingerprint::of(&doc) != before;
            (result, changed)
        };

        let value = result.inspect_err(|e| {
            tracing::error!("Failed to update data: {e}");
        })?;
        if changed {
            self.inner.set_dirty(true);
        }
        self.save();
        self.inner
            .events
            .emit(&AppEvent::StorageUpdated(self.snapshot()));
        Ok(value)
    }

    /// [`try_update`](Self::try_update) that reports failures as a toast.
    pub fn update<T>(&self, f: impl FnOnce(&mut Document) -> Result<T>) -> Option<T> {
        match self.try_update(f) {
            Ok(value) => Some(value),
            Err(_) => {
                self.toast(ToastLevel::Error, "Failed to update data");
                None
            }
        }
    }

    /// Prunes history and writes the document to `linkapp-data`, then
    /// forwards the same text to the state provider without waiting.
    pub fn save(&self) -> bool {
        let json = {
            let mut doc = self.write();
            let pruned = prune_history(&mut doc.deleted_items_history, Utc::now());
            if pruned > 0 {
                tracing::debug!(pruned, "Pruned deletion history before save");
            }
            serde_json::to_string(&*doc)
        };
        let json = match json {
            Ok(json) => json,
            Err(e) => {
                tracing::error!("Failed to serialize data: {e}");
                self.toast(ToastLevel::Error, "Failed to save data");
                return false;
            }
        };

        if let Err(e) = self.inner.kv.set_item(DATA_KEY, &json) {
            tracing::error!("Failed to save: {e}");
            self.toast(ToastLevel::Error, "Failed to save data");
            return false;
        }

        self.forward_to_provider(json);
        true
    }

    fn forwarder(&self) -> MutexGuard<'_, Option<mpsc::UnboundedSender<Forward>>> {
        self.inner
            .forwarder
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn forward_to_provider(&self, json: String) {
        let Some(provider) = self.inner.provider.get() else {
            return;
        };
        let mut forwarder = self.forwarder();
        let mut message = Forward::Write(json);
        if let Some(queue) = forwarder.as_ref() {
            match queue.send(message) {
                Ok(()) => return,
                // the worker's runtime is gone, start a new one below
                Err(mpsc::error::SendError(returned)) => message = returned,
            }
        }
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let (queue, receiver) = mpsc::unbounded_channel();
                runtime.spawn(run_forwarder(Arc::clone(provider), receiver));
                if queue.send(message).is_err() {
                    tracing::warn!("State provider writer exited before the first write");
                }
                *forwarder = Some(queue);
            }
            Err(_) => tracing::debug!("No async runtime, not forwarding to state provider"),
        }
    }

    /// Waits until every write forwarded to the state provider so far has
    /// finished. Short-lived callers use this before the runtime goes away.
    pub async fn flush(&self) {
        let (done, finished) = oneshot::channel();
        let queued = match self.forwarder().as_ref() {
            Some(queue) => queue.send(Forward::Flush(done)).is_ok(),
            None => false,
        };
        if queued && finished.await.is_err() {
            tracing::warn!("State provider writer stopped before flushing");
        }
    }

    /// Replaces the document wholesale (an empty skeleton when `next` is
    /// `None`): prune, migrate, persist, announce `StorageUpdated` then
    /// `StorageLoaded`, clear dirty.
    ///
    /// Returns `false` when persisting failed; the new document is live
    /// either way.
    pub fn load(&self, next: Option<Document>) -> bool {
        let mut doc = next.unwrap_or_else(Document::empty);
        prune_history(&mut doc.deleted_items_history, Utc::now());
        self.install(doc);
        let persisted = self.save();

        let snapshot = self.snapshot();
        self.inner
            .events
            .emit(&AppEvent::StorageUpdated(Arc::clone(&snapshot)));
        self.inner.events.emit(&AppEvent::StorageLoaded(snapshot));
        self.inner.set_dirty(false);
        persisted
    }

    // ========================================================================
    // Export / import / reset
    // ========================================================================

    fn export_text(&self) -> Result<String> {
        let mut value = serde_json::to_value(&*self.read())?;
        let root = value
            .as_object_mut()
            .ok_or_else(|| LinkAppError::internal("document did not serialize to an object"))?;
        root.insert("__app".into(), APP_SIGNATURE.into());
        root.insert("__schema".into(), EXPORT_SCHEMA.into());
        root.insert("__exportedAt".into(), Utc::now().to_rfc3339().into());
        Ok(serde_json::to_string_pretty(&value)?)
    }

    /// Pretty JSON of the document with the export signature envelope.
    pub fn export_snapshot(&self) -> Option<String> {
        match self.export_text() {
            Ok(text) => {
                tracing::info!("Data exported to JSON");
                Some(text)
            }
            Err(e) => {
                tracing::error!("Failed to export data: {e}");
                self.toast(ToastLevel::Error, "Failed to export data");
                None
            }
        }
    }

    /// Validates `text` and loads it. On failure the current document is
    /// untouched and an error toast explains why.
    pub fn import_snapshot(&self, text: &str) -> bool {
        match prepare_import(text) {
            Ok(doc) => {
                tracing::info!(pages = doc.pages.len(), "Importing data");
                self.load(Some(doc))
            }
            Err(e) => {
                tracing::error!("Failed to import data: {e}");
                self.toast(ToastLevel::Error, format!("Failed to import data: {e}"));
                false
            }
        }
    }

    /// Back to the default document.
    pub fn reset(&self) {
        *self.write() = Document::default_document();
        self.save();
        tracing::info!("Data reset to defaults");

        let snapshot = self.snapshot();
        self.inner
            .events
            .emit(&AppEvent::StorageLoaded(Arc::clone(&snapshot)));
        self.inner.events.emit(&AppEvent::StorageUpdated(snapshot));
        self.toast(ToastLevel::Info, "Data reset to defaults");
        self.inner.set_dirty(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryKeyValueStore;
    use linkapp_core::events::Event;
    use std::sync::Mutex;

    fn store() -> (DocumentStore, Arc<MemoryKeyValueStore>, AppEventBus) {
        let kv = Arc::new(MemoryKeyValueStore::new());
        let bus = AppEventBus::new();
        let store = DocumentStore::new(kv.clone(), bus.clone());
        (store, kv, bus)
    }

    fn record(bus: &AppEventBus, kinds: &[EventKind]) -> Arc<Mutex<Vec<EventKind>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        for &kind in kinds {
            let sink = Arc::clone(&seen);
            bus.on(kind, move |event| sink.lock().unwrap().push(event.kind()));
        }
        seen
    }

    #[test]
    fn test_initialize_without_data_persists_defaults() {
        let (store, kv, _) = store();
        store.initialize();
        assert_eq!(*store.get(), Document::default_document());
        assert!(kv.get_item(DATA_KEY).unwrap().is_some());
    }

    #[test]
    fn test_initialize_with_corrupt_data_falls_back() {
        let (store, kv, _) = store();
        kv.set_item(DATA_KEY, "{not json").unwrap();
        store.initialize();
        assert_eq!(store.get().pages.len(), 3);
    }

    #[test]
    fn test_update_marks_dirty_only_on_content_change() {
        let (store, _, bus) = store();
        store.initialize();
        let seen = record(&bus, &[EventKind::StorageDirty, EventKind::StorageUpdated]);

        store.update(|doc| doc.set_collapsed(0, "section-1", true)).unwrap();
        assert!(!store.is_dirty());

        store.update(|doc| doc.rename_page(0, "Home")).unwrap();
        assert!(store.is_dirty());
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                EventKind::StorageUpdated,
                EventKind::StorageDirty,
                EventKind::StorageUpdated
            ]
        );
    }

    #[test]
    fn test_failed_update_toasts_and_skips_persist() {
        let (store, kv, bus) = store();
        store.initialize();
        let before = kv.get_item(DATA_KEY).unwrap();
        let seen = record(&bus, &[EventKind::Toast, EventKind::StorageUpdated]);

        let out = store.update(|doc| doc.rename_page(9, "x"));

        assert!(out.is_none());
        assert_eq!(*seen.lock().unwrap(), vec![EventKind::Toast]);
        assert_eq!(kv.get_item(DATA_KEY).unwrap(), before);
    }

    #[test]
    fn test_saved_acknowledgment_clears_dirty() {
        let (store, _, bus) = store();
        store.initialize();
        store.update(|doc| doc.rename_page(0, "Home"));
        assert!(store.is_dirty());
        bus.emit(&AppEvent::StorageSaved {
            at: Utc::now(),
            by: "test".into(),
        });
        assert!(!store.is_dirty());
    }

    #[test]
    fn test_dropping_store_unsubscribes() {
        let (store, _, bus) = store();
        assert_eq!(bus.listener_count(EventKind::StorageSaved), 1);
        drop(store);
        assert_eq!(bus.listener_count(EventKind::StorageSaved), 0);
    }

    #[test]
    fn test_export_carries_envelope() {
        let (store, _, _) = store();
        store.initialize();
        let text = store.export_snapshot().unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["__app"], "LinkApp");
        assert_eq!(value["__schema"], 2);
        assert!(value["__exportedAt"].is_string());
        assert_eq!(value["pages"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_reset_restores_defaults_and_toasts() {
        let (store, _, bus) = store();
        store.initialize();
        store.update(|doc| doc.rename_page(0, "Home"));
        let toasts = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&toasts);
        bus.on(EventKind::Toast, move |event| {
            if let AppEvent::Toast(toast) = event {
                sink.lock().unwrap().push(toast.message.clone());
            }
        });

        store.reset();

        assert_eq!(*store.get(), Document::default_document());
        assert!(!store.is_dirty());
        assert_eq!(*toasts.lock().unwrap(), vec!["Data reset to defaults"]);
    }

    #[test]
    fn test_load_none_gives_one_default_page() {
        let (store, _, _) = store();
        assert!(store.load(None));
        assert_eq!(store.get().pages.len(), 1);
        assert_eq!(store.get().pages[0].name, "Page 1");
    }
}
