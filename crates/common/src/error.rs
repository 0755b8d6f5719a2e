//! Error types for Courseware

use thiserror::Error;

/// Result type alias using Courseware Error
pub type Result<T> = std::result::Result<T, Error>;

/// Courseware error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Stored {kind} {id} is not a JSON object")]
    CorruptEntity { kind: String, id: String },
}
