//! Where LinkApp keeps its files.
//!
//! ```text
//! ~/.config/linkapp/           # config directory
//! └── config.toml              # AppConfig
//!
//! ~/.local/share/linkapp/      # data directory
//! ├── kv/                      # FileKeyValueStore, one file per key
//! │   ├── linkapp-data.json
//! │   └── linkapp-sessions.json
//! └── state.json               # FileStateProvider
//! ```
//!
//! Setting `LINKAPP_HOME` puts both directories under that one root, which
//! is what tests and portable installs want.

use linkapp_core::{LinkAppError, Result};
use std::path::{Path, PathBuf};

const APP_DIR: &str = "linkapp";

/// Environment variable overriding every LinkApp path.
pub const HOME_ENV: &str = "LINKAPP_HOME";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkAppPaths {
    config_dir: PathBuf,
    data_dir: PathBuf,
}

impl LinkAppPaths {
    /// Resolves from `LINKAPP_HOME`, falling back to the platform
    /// directories.
    pub fn resolve() -> Result<Self> {
        match std::env::var_os(HOME_ENV) {
            Some(home) if !home.is_empty() => Ok(Self::at(PathBuf::from(home))),
            _ => Self::platform(),
        }
    }

    /// Platform config and data directories (XDG on Linux).
    pub fn platform() -> Result<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| LinkAppError::config("Cannot find config directory"))?;
        let data_dir = dirs::data_dir()
            .ok_or_else(|| LinkAppError::config("Cannot find data directory"))?;
        Ok(Self {
            config_dir: config_dir.join(APP_DIR),
            data_dir: data_dir.join(APP_DIR),
        })
    }

    /// Everything under a single root.
    pub fn at(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            config_dir: root.join("config"),
            data_dir: root.join("data"),
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    pub fn kv_dir(&self) -> PathBuf {
        self.data_dir.join("kv")
    }

    pub fn state_file(&self) -> PathBuf {
        self.data_dir.join("state.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_root_layout() {
        let paths = LinkAppPaths::at("/tmp/la");
        assert_eq!(paths.config_file(), PathBuf::from("/tmp/la/config/config.toml"));
        assert_eq!(paths.kv_dir(), PathBuf::from("/tmp/la/data/kv"));
        assert_eq!(paths.state_file(), PathBuf::from("/tmp/la/data/state.json"));
    }
}
