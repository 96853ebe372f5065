//! Error types for the skillpad-store crate.
//!
//! All storage operations return [`StoreError`] via [`StoreResult`].

use std::path::PathBuf;

use thiserror::Error;

/// Alias for `Result<T, StoreError>`.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in the storage layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the store file failed.
    #[error("store file `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization or deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The store file exists but is not a JSON object.
    #[error("store file `{path}` is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    /// The requested record was not found.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// An invalid argument was provided to a store operation.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}
