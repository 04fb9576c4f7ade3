use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("heading level must be between 1 and 6, got {0}")]
    HeadingLevel(u8),

    #[error("signal weights sum to {0:.4}, expected 1.0")]
    WeightSum(f64),

    #[error("ship type list is empty")]
    NoShipTypes,
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("snapshot json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("another run holds the lock at {0}")]
    RunInProgress(PathBuf),

    #[error("failed to persist snapshot: {0}")]
    Persist(#[from] tempfile::PersistError),
}
