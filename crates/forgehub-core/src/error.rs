//! Error taxonomy shared by every forge.

use forgehub_models::ModelError;
use thiserror::Error;

use crate::archive::ArchiveError;
use crate::http::HttpError;

/// Errors raised by forge operations
#[derive(Debug, Error)]
pub enum ForgeError {
    /// Module, release or package buffer is absent
    #[error("Module not found: {0}")]
    NotFound(String),

    /// The forge does not implement this operation
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// A remote call failed for a reason other than not-found
    #[error("Transport error: {0}")]
    Transport(String),

    /// An archive or metadata document could not be read
    #[error("Malformed data: {0}")]
    Malformed(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ForgeError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Whether an aggregating forge should move on to the next sub-forge.
    pub fn is_skippable(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::Unsupported(_))
    }
}

impl From<ModelError> for ForgeError {
    fn from(err: ModelError) -> Self {
        Self::Malformed(err.to_string())
    }
}

impl From<serde_json::Error> for ForgeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}

impl From<ArchiveError> for ForgeError {
    fn from(err: ArchiveError) -> Self {
        Self::Malformed(err.to_string())
    }
}

impl From<HttpError> for ForgeError {
    fn from(err: HttpError) -> Self {
        if err.is_not_found() {
            Self::NotFound(err.url().to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<tokio::task::JoinError> for ForgeError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Io(std::io::Error::other(err))
    }
}

/// Result type alias for forge operations
pub type Result<T> = std::result::Result<T, ForgeError>;
