//! Error types for LinkApp.

use thiserror::Error;

/// Everything that can go wrong between the document and its storage.
///
/// Storage boundaries convert their failures into one of these, log it and
/// surface it as a toast. None of them is fatal to the live document.
#[derive(Error, Debug, Clone)]
pub enum LinkAppError {
    /// A page, section, button, slot or history entry that is not there
    #[error("Entity not found: {entity_type} '{id}'")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    #[error("IO error: {message}")]
    Io { message: String },

    /// Key-value backend refused the operation (quota, disabled storage)
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {format} - {message}")]
    Serialization {
        /// `JSON` or `TOML`
        format: &'static str,
        message: String,
    },

    /// Import text failed validation; shown to the user as is
    #[error("{0}")]
    InvalidImport(String),

    /// A content edit was rejected (empty name, section full)
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Bug or unexpected upstream failure, including migration chain errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LinkAppError {
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    pub fn invalid_import(message: impl Into<String>) -> Self {
        Self::InvalidImport(message.into())
    }

    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    pub fn is_serialization(&self) -> bool {
        matches!(self, Self::Serialization { .. })
    }

    pub fn is_invalid_import(&self) -> bool {
        matches!(self, Self::InvalidImport(_))
    }

    fn serialization(format: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Serialization {
            format,
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for LinkAppError {
    fn from(err: std::io::Error) -> Self {
        Self::io(format!("{err} (kind: {:?})", err.kind()))
    }
}

impl From<serde_json::Error> for LinkAppError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization("JSON", err)
    }
}

impl From<toml::de::Error> for LinkAppError {
    fn from(err: toml::de::Error) -> Self {
        Self::serialization("TOML", err)
    }
}

impl From<toml::ser::Error> for LinkAppError {
    fn from(err: toml::ser::Error) -> Self {
        Self::serialization("TOML", err)
    }
}

impl From<anyhow::Error> for LinkAppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(format!("{err:#}"))
    }
}

impl From<String> for LinkAppError {
    fn from(message: String) -> Self {
        Self::Internal(message)
    }
}

pub type Result<T> = std::result::Result<T, LinkAppError>;
