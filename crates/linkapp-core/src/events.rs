//! Typed publish/subscribe.
//!
//! [`EventBus`] is a cloneable handle to a shared registry of handlers keyed
//! by event kind. Components receive the bus at construction time instead of
//! reaching for a global, so the wiring is visible in their signatures.
//!
//! Handlers run on the emitting thread, outside the registry lock: a handler
//! may subscribe, unsubscribe or emit again without deadlocking.
//!
//! # Example
//!
//! ```ignore
//! let bus = EventBus::<AppEvent>::new();
//! let id = bus.on(EventKind::StorageDirty, |event| {
//!     if let AppEvent::StorageDirty { dirty } = event {
//!         println!("dirty = {dirty}");
//!     }
//! });
//! bus.emit(&AppEvent::StorageDirty { dirty: true });
//! bus.off(EventKind::StorageDirty, id);
//! ```

use crate::config::Theme;
use crate::document::Document;
use crate::search::SearchEntry;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// Something that can travel over an [`EventBus`].
pub trait Event: Send + Sync + 'static {
    /// Discriminant handlers subscribe to.
    type Kind: Copy + Eq + Hash + fmt::Debug + Send + Sync + 'static;

    fn kind(&self) -> Self::Kind;
}

/// Handle returned by [`EventBus::on`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct Registry<E: Event> {
    next_id: u64,
    handlers: HashMap<E::Kind, Vec<(SubscriptionId, Handler<E>)>>,
}

impl<E: Event> Registry<E> {
    fn remove(&mut self, kind: E::Kind, id: SubscriptionId) -> bool {
        let Some(list) = self.handlers.get_mut(&kind) else {
            return false;
        };
        let before = list.len();
        list.retain(|(sid, _)| *sid != id);
        let removed = list.len() != before;
        if list.is_empty() {
            self.handlers.remove(&kind);
        }
        removed
    }
}

pub struct EventBus<E: Event> {
    registry: Arc<Mutex<Registry<E>>>,
}

impl<E: Event> Clone for EventBus<E> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<E: Event> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Event> fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = lock(&self.registry);
        let total: usize = registry.handlers.values().map(Vec::len).sum();
        f.debug_struct("EventBus").field("handlers", &total).finish()
    }
}

fn lock<E: Event>(registry: &Mutex<Registry<E>>) -> MutexGuard<'_, Registry<E>> {
    // a panicking handler never runs under the lock, so the data is intact
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<E: Event> EventBus<E> {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                next_id: 0,
                handlers: HashMap::new(),
            })),
        }
    }

    fn insert(&self, kind: E::Kind, handler: Handler<E>, id: Option<SubscriptionId>) -> SubscriptionId {
        let mut registry = lock(&self.registry);
        let id = id.unwrap_or_else(|| {
            registry.next_id += 1;
            SubscriptionId(registry.next_id)
        });
        registry.handlers.entry(kind).or_default().push((id, handler));
        id
    }

    /// Subscribes `handler` to every event of `kind`.
    pub fn on<F>(&self, kind: E::Kind, handler: F) -> SubscriptionId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.insert(kind, Arc::new(handler), None)
    }

    /// Removes a subscription. Returns `false` if it was already gone.
    pub fn off(&self, kind: E::Kind, id: SubscriptionId) -> bool {
        lock(&self.registry).remove(kind, id)
    }

    /// Subscribes `handler` for the next event of `kind` only.
    pub fn once<F>(&self, kind: E::Kind, handler: F) -> SubscriptionId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = {
            let mut registry = lock(&self.registry);
            registry.next_id += 1;
            SubscriptionId(registry.next_id)
        };
        let registry: Weak<Mutex<Registry<E>>> = Arc::downgrade(&self.registry);
        let fired = AtomicBool::new(false);
        let wrapper = move |event: &E| {
            if fired.swap(true, Ordering::SeqCst) {
                return;
            }
            if let Some(registry) = registry.upgrade() {
                lock(&registry).remove(kind, id);
            }
            handler(event);
        };
        self.insert(kind, Arc::new(wrapper), Some(id))
    }

    /// Delivers `event` to every current subscriber of its kind, in
    /// subscription order. Returns the number of handlers invoked.
    pub fn emit(&self, event: &E) -> usize {
        let handlers: Vec<Handler<E>> = {
            let registry = lock(&self.registry);
            match registry.handlers.get(&event.kind()) {
                Some(list) => list.iter().map(|(_, h)| Arc::clone(h)).collect(),
                None => return 0,
            }
        };
        for handler in &handlers {
            handler(event);
        }
        handlers.len()
    }

    pub fn listener_count(&self, kind: E::Kind) -> usize {
        lock(&self.registry)
            .handlers
            .get(&kind)
            .map_or(0, Vec::len)
    }
}

// ============================================================================
// Application events
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToastLevel {
    Success,
    Info,
    Warning,
    Error,
}

impl fmt::Display for ToastLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Success => "success",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// A user-facing notification. Presenting it is up to the subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub level: ToastLevel,
    pub message: String,
}

/// Everything the LinkApp components announce.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// A document was (re)loaded wholesale
    StorageLoaded(Arc<Document>),
    /// The live document changed and was persisted
    StorageUpdated(Arc<Document>),
    StorageDirty { dirty: bool },
    /// Content was saved somewhere the user considers durable
    StorageSaved { at: DateTime<Utc>, by: String },
    SessionsUpdated,
    ActiveSaveChanged { name: String },
    Toast(Toast),
    SearchResults { query: String, results: Vec<SearchEntry> },
    ThemeChanged { theme: Theme },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    StorageLoaded,
    StorageUpdated,
    StorageDirty,
    StorageSaved,
    SessionsUpdated,
    ActiveSaveChanged,
    Toast,
    SearchResults,
    ThemeChanged,
}

impl Event for AppEvent {
    type Kind = EventKind;

    fn kind(&self) -> EventKind {
        match self {
            Self::StorageLoaded(_) => EventKind::StorageLoaded,
            Self::StorageUpdated(_) => EventKind::StorageUpdated,
            Self::StorageDirty { .. } => EventKind::StorageDirty,
            Self::StorageSaved { .. } => EventKind::StorageSaved,
            Self::SessionsUpdated => EventKind::SessionsUpdated,
            Self::ActiveSaveChanged { .. } => EventKind::ActiveSaveChanged,
            Self::Toast(_) => EventKind::Toast,
            Self::SearchResults { .. } => EventKind::SearchResults,
            Self::ThemeChanged { .. } => EventKind::ThemeChanged,
        }
    }
}

impl AppEvent {
    pub fn toast(level: ToastLevel, message: impl Into<String>) -> Self {
        Self::Toast(Toast {
            level,
            message: message.into(),
        })
    }
}

pub type AppEventBus = EventBus<AppEvent>;
