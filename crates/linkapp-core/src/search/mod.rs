//! Flat search index over all pages.

mod index;

pub use index::{DEFAULT_SEARCH_LIMIT, EntryType, SearchEntry, build_search_index, search_in_index};
