// bison-core/src/error.rs

use thiserror::Error;

/// Convenience alias used throughout the crate
pub type Result<T> = std::result::Result<T, BisonError>;

/// All errors surfaced by the public API
///
/// Validation errors (`InvalidQuery`, `InvalidUpdate`, `InvalidPath`,
/// `InvalidCollectionName`, `InvalidDocument`) are raised before any state is
/// touched; after one of them the database and the query cache are exactly as
/// they were before the call. I/O errors leave dirty flags set so the write
/// can be retried.
#[derive(Debug, Error)]
pub enum BisonError {
    #[error("no such collection: '{0}'")]
    CollectionNotFound(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("invalid update: {0}")]
    InvalidUpdate(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("invalid collection name: {0:?}")]
    InvalidCollectionName(String),

    #[error("invalid document: {0}")]
    InvalidDocument(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(String),
}

impl From<serde_json::Error> for BisonError {
    fn from(err: serde_json::Error) -> Self {
        BisonError::Parse(err.to_string())
    }
}
