use thiserror::Error;

/// Errors raised while building domain values from metadata documents
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid module name '{0}': expected author-name")]
    InvalidName(String),
}
