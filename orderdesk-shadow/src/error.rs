//! Error types for the shadow store.

use thiserror::Error;

/// DuckDB error prefixes that mean the database itself is gone, not just
/// one statement.
const FATAL_DUCKDB_PREFIXES: &[&str] = &[
    "IO Error",
    "Connection Error",
    "FATAL Error",
    "Out of Memory Error",
];

/// All errors that can occur in shadow store operations.
#[derive(Debug, Error)]
pub enum ShadowError {
    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("source record {0} is already mirrored")]
    DuplicateMirror(i64),

    #[error("malformed content: {0}")]
    MalformedContent(String),

    #[error("record {0} was modified concurrently")]
    Conflict(i64),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ShadowError {
    /// Fatal errors abort the current sync run; anything else is a
    /// per-record failure that the batch absorbs.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Unavailable(_) | Self::Io(_) => true,
            Self::DuckDb(e) => {
                let msg = e.to_string();
                FATAL_DUCKDB_PREFIXES.iter().any(|p| msg.starts_with(p))
            }
            _ => false,
        }
    }

    /// Errors worth retrying as-is after a short wait.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Conflict(_))
    }
}

pub type ShadowResult<T> = Result<T, ShadowError>;
