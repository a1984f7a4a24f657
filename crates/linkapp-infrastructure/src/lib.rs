pub mod config_service;
pub mod document_store;
pub mod kv;
pub mod migration;
pub mod paths;
pub mod session_store;
pub mod state_provider;
pub mod storage;

pub use crate::config_service::ConfigService;
pub use crate::document_store::{DocumentStore, InitHandle, PhaseBOutcome};
pub use crate::kv::{FileKeyValueStore, MemoryKeyValueStore};
pub use crate::paths::LinkAppPaths;
pub use crate::session_store::{Saves, SessionStore};
pub use crate::state_provider::FileStateProvider;
