//! Domain layer for LinkApp.
//!
//! Holds the document model (pages, sections, buttons, deletion history),
//! the pure operations over it, and the traits the infrastructure layer
//! implements. Nothing in this crate touches the file system.

pub mod canonical;
pub mod config;
pub mod document;
pub mod error;
pub mod events;
pub mod history;
pub mod import;
pub mod provider;
pub mod search;
pub mod session;
pub mod storage;
pub mod url;

// Re-export common error type
pub use error::{LinkAppError, Result};

pub use document::{Button, Document, HistoryEntry, Page, Section};
pub use events::{AppEvent, EventBus, EventKind, Toast, ToastLevel};
