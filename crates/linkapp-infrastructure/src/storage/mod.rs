//! Crash-safe file writes shared by the config file and the file-backed
//! key-value store.

mod atomic;
mod atomic_toml;

pub use atomic::{FileLock, write_atomic};
pub use atomic_toml::AtomicTomlFile;
