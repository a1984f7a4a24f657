//! Cached access to `config.toml`.

use crate::storage::AtomicTomlFile;
use linkapp_core::config::{AppConfig, Theme};
use linkapp_core::events::{AppEvent, AppEventBus};
use linkapp_core::Result;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

/// Loads the config once and keeps it cached.
///
/// A missing or unreadable file yields the defaults; the broken file is left
/// alone until the next successful `save`.
#[derive(Debug, Clone)]
pub struct ConfigService {
    file: Arc<AtomicTomlFile<AppConfig>>,
    config: Arc<RwLock<Option<AppConfig>>>,
    events: AppEventBus,
}

impl ConfigService {
    pub fn new(path: PathBuf, events: AppEventBus) -> Self {
        Self {
            file: Arc::new(AtomicTomlFile::new(path)),
            config: Arc::new(RwLock::new(None)),
            events,
        }
    }

    /// Re-reads the file, replacing the cache.
    pub fn load(&self) -> AppConfig {
        let loaded = match self.file.load() {
            Ok(Some(config)) => config,
            Ok(None) => {
                tracing::debug!(path = %self.file.path().display(), "No config file, using defaults");
                AppConfig::default()
            }
            Err(e) => {
                tracing::warn!(path = %self.file.path().display(), "Failed to read config, using defaults: {e}");
                AppConfig::default()
            }
        };
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = Some(loaded.clone());
        loaded
    }

    pub fn get(&self) -> AppConfig {
        {
            let cached = self.config.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(config) = cached.as_ref() {
                return config.clone();
            }
        }
        self.load()
    }

    /// Writes `config` and updates the cache.
    pub fn save(&self, config: &AppConfig) -> Result<()> {
        self.file.save(config).inspect_err(|e| {
            tracing::error!("Failed to save config: {e}");
        })?;
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = Some(config.clone());
        Ok(())
    }

    /// Sets one preference by key and persists it.
    pub fn set(&self, key: &str, value: &str) -> Result<AppConfig> {
        let before = self.get();
        let mut config = before.clone();
        config.set_value(key, value)?;
        self.save(&config)?;
        if config.theme != before.theme {
            self.events.emit(&AppEvent::ThemeChanged {
                theme: config.theme,
            });
        }
        Ok(config)
    }

    pub fn set_theme(&self, theme: Theme) -> Result<()> {
        self.set("theme", theme.as_str()).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkapp_core::events::EventKind;
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn service(dir: &TempDir) -> (ConfigService, AppEventBus) {
        let bus = AppEventBus::new();
        let service = ConfigService::new(dir.path().join("config.toml"), bus.clone());
        (service, bus)
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let (service, _) = service(&dir);
        assert_eq!(service.get(), AppConfig::default());
    }

    #[test]
    fn test_corrupt_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("config.toml"), "theme = [").unwrap();
        let (service, _) = service(&dir);
        assert_eq!(service.load(), AppConfig::default());
    }

    #[test]
    fn test_set_theme_persists_and_notifies() {
        let dir = TempDir::new().unwrap();
        let (service, bus) = service(&dir);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        bus.on(EventKind::ThemeChanged, move |event| {
            if let AppEvent::ThemeChanged { theme } = event {
                sink.lock().unwrap().push(*theme);
            }
        });

        service.set_theme(Theme::Sea).unwrap();
        // same theme again is not a change
        service.set_theme(Theme::Sea).unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![Theme::Sea]);
        let (reopened, _) = self::service(&dir);
        assert_eq!(reopened.get().theme, Theme::Sea);
    }

    #[test]
    fn test_set_rejects_unknown_key() {
        let dir = TempDir::new().unwrap();
        let (service, _) = service(&dir);
        assert!(service.set("volume", "11").is_err());
        assert!(!dir.path().join("config.toml").exists());
    }
}
