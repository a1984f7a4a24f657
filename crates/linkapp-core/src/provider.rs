//! Optional external persistence channel.

use async_trait::async_trait;

use crate::error::Result;

/// Host-provided storage that outlives the local key-value store, such as a
/// state file owned by a desktop shell.
///
/// Having no provider is the normal case. The document store only ever
/// uses one opportunistically: loads may replace the local copy, saves are
/// fire-and-forget.
#[async_trait]
pub trait StateProvider: Send + Sync {
    /// Returns the serialized document, or `None` when nothing is stored.
    async fn load_app_state(&self) -> Result<Option<String>>;

    async fn save_app_state(&self, text: &str) -> Result<()>;
}
