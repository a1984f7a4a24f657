//! Save slots: named copies of the whole document.

pub mod model;

pub use model::{SaveSlot, SlotKind, SlotTable};
