//! File-backed [`StateProvider`].

use async_trait::async_trait;
use linkapp_core::provider::StateProvider;
use linkapp_core::Result;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Keeps the serialized document in a single file, standing in for the
/// state a desktop shell would own.
#[derive(Debug, Clone)]
pub struct FileStateProvider {
    path: PathBuf,
    /// One write at a time; they share the tmp file
    write_lock: Arc<Mutex<()>>,
}

impl FileStateProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl StateProvider for FileStateProvider {
    async fn load_app_state(&self) -> Result<Option<String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) if text.trim().is_empty() => Ok(None),
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save_app_state(&self, text: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, text).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        tracing::debug!(path = %self.path.display(), bytes = text.len(), "Saved app state");
        Ok(())
    }
}
