use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("an index rebuild is already in progress")]
    RebuildInProgress,

    #[error("failed to index {path}: {reason}")]
    Indexing { path: String, reason: String },

    #[error("path violation for {}: {reason}", path.display())]
    PathViolation { path: PathBuf, reason: &'static str },

    #[error("invalid glob pattern: {0}")]
    Glob(#[from] globset::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("index invariant violated: {0}")]
    Corrupted(String),
}

impl Error {
    pub(crate) fn invalid_query(message: impl Into<String>) -> Self {
        Self::InvalidQuery(message.into())
    }
}
