//! Live search over the document.
//!
//! [`SearchService`] keeps a flat index of the current document and
//! rebuilds it whenever the store announces new content. Results are
//! returned and also published as [`AppEvent::SearchResults`], so a view
//! that subscribes once stays current while the user keeps typing or
//! editing.

use linkapp_core::document::Document;
use linkapp_core::events::{AppEvent, AppEventBus, EventKind, SubscriptionId};
use linkapp_core::search::{DEFAULT_SEARCH_LIMIT, SearchEntry, build_search_index, search_in_index};
use linkapp_infrastructure::DocumentStore;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Default)]
struct SearchState {
    index: Vec<SearchEntry>,
    last_query: String,
}

struct Inner {
    state: Mutex<SearchState>,
    limit: usize,
    events: AppEventBus,
    subscriptions: Mutex<Vec<(EventKind, SubscriptionId)>>,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, SearchState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn rebuild(&self, doc: &Document) {
        let index = build_search_index(doc);
        let query = {
            let mut state = self.state();
            state.index = index;
            state.last_query.clone()
        };
        if !query.is_empty() {
            self.run(&query);
        }
    }

    /// Runs `query` and publishes the hits. The state lock is released
    /// before emitting so subscribers may search again.
    fn run(&self, query: &str) -> Vec<SearchEntry> {
        let query = query.trim();
        let results = {
            let mut state = self.state();
            state.last_query = query.to_string();
            search_in_index(&state.index, query, self.limit)
        };
        self.events.emit(&AppEvent::SearchResults {
            query: query.to_string(),
            results: results.clone(),
        });
        results
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

/// Cloneable handle to the search index. Dropping the last handle
/// unsubscribes from the store's events.
#[derive(Clone)]
pub struct SearchService {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SearchService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state();
        f.debug_struct("SearchService")
            .field("entries", &state.index.len())
            .field("last_query", &state.last_query)
            .finish()
    }
}

impl SearchService {
    pub fn new(store: &DocumentStore) -> Self {
        Self::with_limit(store, DEFAULT_SEARCH_LIMIT)
    }

    pub fn with_limit(store: &DocumentStore, limit: usize) -> Self {
        let events = store.events().clone();
        let inner = Arc::new(Inner {
            state: Mutex::new(SearchState {
                index: build_search_index(&store.get()),
                last_query: String::new(),
            }),
            limit,
            events: events.clone(),
            subscriptions: Mutex::new(Vec::new()),
        });

        let mut subscriptions = Vec::new();
        for kind in [EventKind::StorageUpdated, EventKind::StorageLoaded] {
            let weak = Arc::downgrade(&inner);
            let id = events.on(kind, move |event| {
                let (AppEvent::StorageUpdated(doc) | AppEvent::StorageLoaded(doc)) = event else {
                    return;
                };
                if let Some(inner) = weak.upgrade() {
                    inner.rebuild(doc);
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

    /// Case-insensitive substring search. An empty query clears the
    /// results.
    pub fn search(&self, query: &str) -> Vec<SearchEntry> {
        self.inner.run(query)
    }

    /// Forgets the last query and publishes an empty result set.
    pub fn clear(&self) {
        self.inner.run("");
    }

    pub fn last_query(&self) -> String {
        self.inner.state().last_query.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.state().index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
