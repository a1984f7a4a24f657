//! Key-value persistence boundary.

use crate::error::Result;

/// Key holding the serialized document.
pub const DATA_KEY: &str = "linkapp-data";
/// Key holding the save-slot table.
pub const SESSIONS_KEY: &str = "linkapp-sessions";
/// Key holding the active workspace name.
pub const ACTIVE_SAVE_KEY: &str = "linkapp-active-save-name";

/// String-to-string store with local, synchronous semantics.
///
/// Implementations report quota and I/O failures as errors; callers decide
/// whether that is fatal (it never is for LinkApp).
pub trait KeyValueStore: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>>;

    fn set_item(&self, key: &str, value: &str) -> Result<()>;

    fn remove_item(&self, key: &str) -> Result<()>;

    /// All keys currently stored, in no particular order.
    fn keys(&self) -> Result<Vec<String>>;
}
