//! Error types for nano-beam.

use thiserror::Error;

use crate::engine::observer::ObserverError;

/// Result type alias for nano-beam operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for nano-beam.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error (rejected before any search step runs).
    #[error("configuration error: {0}")]
    Config(String),

    /// The observer failed; the step it was reporting was discarded.
    #[error("observer error: {0}")]
    Observer(#[from] ObserverError),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
