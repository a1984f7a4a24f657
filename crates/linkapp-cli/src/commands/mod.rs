pub mod config;
pub mod content;
pub mod data;
pub mod history;
pub mod sessions;

use anyhow::{Context, Result};
use linkapp_application::{ContentService, HistoryService};
use linkapp_core::events::{AppEvent, AppEventBus, EventKind, ToastLevel};
use linkapp_infrastructure::{
    ConfigService, DocumentStore, FileKeyValueStore, FileStateProvider, LinkAppPaths,
    PhaseBOutcome, SessionStore,
};
use std::sync::Arc;

/// Everything a command needs, wired against the on-disk stores.
pub struct App {
    pub paths: LinkAppPaths,
    pub store: DocumentStore,
    pub content: ContentService,
    pub history: HistoryService,
    pub sessions: SessionStore,
    pub config: ConfigService,
}

fn print_toast(level: ToastLevel, message: &str) {
    match level {
        ToastLevel::Success => println!("✅ {message}"),
        ToastLevel::Info => println!("ℹ️  {message}"),
        ToastLevel::Warning => eprintln!("⚠️  {message}"),
        ToastLevel::Error => eprintln!("❌ {message}"),
    }
}

impl App {
    /// Opens the stores under `paths` and loads the document, waiting for
    /// the state file when `with_state` is set.
    pub async fn open(paths: LinkAppPaths, with_state: bool) -> Result<Self> {
        let events = AppEventBus::new();
        events.on(EventKind::Toast, |event| {
            if let AppEvent::Toast(toast) = event {
                print_toast(toast.level, &toast.message);
            }
        });

        let kv = Arc::new(
            FileKeyValueStore::open(paths.kv_dir())
                .with_context(|| format!("Failed to open {}", paths.kv_dir().display()))?,
        );
        let mut store = DocumentStore::new(kv.clone(), events.clone());
        if with_state {
            store = store.with_state_provider(Arc::new(FileStateProvider::new(paths.state_file())));
        }

        match store.initialize().completion().await {
            PhaseBOutcome::Replaced => tracing::info!("Using document from state file"),
            PhaseBOutcome::Invalid(reason) | PhaseBOutcome::Failed(reason) => {
                tracing::warn!("Ignoring state file: {reason}")
            }
            outcome => tracing::debug!(?outcome, "State file checked"),
        }

        let config = ConfigService::new(paths.config_file(), events.clone());
        config.load();

        Ok(Self {
            content: ContentService::new(store.clone()),
            history: HistoryService::new(store.clone()),
            sessions: SessionStore::new(kv, store.clone()),
            paths,
            store,
            config,
        })
    }

    /// Page index argument, defaulting to the current page.
    pub fn page(&self, page: Option<usize>) -> usize {
        page.unwrap_or_else(|| self.content.current_page_index())
    }

    /// Autosaves into the active save when enabled and there is unsaved
    /// content, then waits for state file writes.
    pub async fn finish(&self) {
        if self.store.is_dirty() && self.config.get().autosave {
            let saves = self.sessions.saves();
            if !saves.active_name().is_empty() {
                saves.save_active();
            }
        }
        self.store.flush().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_open_bootstraps_files() {
        let dir = TempDir::new().unwrap();
        let app = App::open(LinkAppPaths::at(dir.path()), true).await.unwrap();
        assert_eq!(app.store.get().pages.len(), 3);

        app.content.rename_page(0, "Home");
        app.finish().await;

        assert!(app.paths.kv_dir().join("linkapp-data.json").exists());
        let state = std::fs::read_to_string(app.paths.state_file()).unwrap();
        assert!(state.contains("Home"));
    }

    #[tokio::test]
    async fn test_state_file_wins_on_next_open() {
        let dir = TempDir::new().unwrap();
        let paths = LinkAppPaths::at(dir.path());
        {
            let app = App::open(paths.clone(), true).await.unwrap();
            app.finish().await;
        }
        let mut doc: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(paths.state_file()).unwrap()).unwrap();
        doc["pages"][0]["name"] = "From shell".into();
        std::fs::write(paths.state_file(), doc.to_string()).unwrap();

        let app = App::open(paths.clone(), true).await.unwrap();
        assert_eq!(app.store.get().pages[0].name, "From shell");

        let app = App::open(paths, false).await.unwrap();
        assert_eq!(app.store.get().pages[0].name, "From shell");
    }

    #[tokio::test]
    async fn test_finish_autosaves_active_workspace() {
        let dir = TempDir::new().unwrap();
        let app = App::open(LinkAppPaths::at(dir.path()), false).await.unwrap();
        assert!(app.sessions.saves().upsert("Work"));

        app.content.rename_page(1, "Changed");
        assert!(app.store.is_dirty());
        app.finish().await;

        let slot = &app.sessions.saves().list()[0];
        assert_eq!(slot.name, "Work");
        assert_eq!(slot.data.pages[1].name, "Changed");
        assert!(!app.store.is_dirty());
    }
}
