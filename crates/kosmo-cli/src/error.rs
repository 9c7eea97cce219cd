//! Error types for the CLI

/// CLI Result type
pub type Result<T> = std::result::Result<T, Error>;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Platform(#[from] kosmo_common::Error),

    #[error("entry not found: {path}")]
    EntryNotFound { path: String },

    #[error("configuration error: {message}")]
    Config { message: String },

    #[error("validation error: {message}")]
    Validation { message: String },

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
        }
    }

    pub fn entry_not_found(path: impl Into<String>) -> Self {
        Error::EntryNotFound { path: path.into() }
    }

    /// Whether this error means a store entry was simply absent
    ///
    /// `install` falls back to the product defaults when the user's
    /// config repo has no entry for a module.
    pub fn is_entry_not_found(&self) -> bool {
        matches!(self, Error::EntryNotFound { .. })
    }
}
