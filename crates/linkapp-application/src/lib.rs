//! Application layer for LinkApp.
//!
//! Services composed over the [`DocumentStore`]: they run the pure document
//! operations through the store's update contract and announce the outcome
//! as toasts, the way the UI expects.
//!
//! [`DocumentStore`]: linkapp_infrastructure::DocumentStore

pub mod content_service;
pub mod history_service;
pub mod search_service;

pub use content_service::ContentService;
pub use history_service::{HistoryService, RestoreStrategy, UndoToken};
pub use search_service::SearchService;
