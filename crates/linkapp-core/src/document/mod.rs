//! The LinkApp document: pages holding sections holding buttons.

pub mod migrate;
pub mod model;
pub mod ops;

pub use migrate::migrate;
pub use model::{Button, DeletedAt, DeletedItem, Document, HistoryEntry, Page, Section};
pub use ops::QuickAdd;
