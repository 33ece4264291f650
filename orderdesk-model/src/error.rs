//! Error types for the order model.

use thiserror::Error;

/// Errors raised by strict decoding and model validation.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("malformed content: {0}")]
    MalformedContent(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type ModelResult<T> = Result<T, ModelError>;
