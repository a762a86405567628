//! Error types for the rep traffic store.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RepError {
    #[error("Failed to parse store {}: {source}", path.display())]
    StoreCorrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write {}: {source}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to get home directory")]
    HomeDirUnavailable,

    #[error("Frame error: {0}")]
    Frame(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
