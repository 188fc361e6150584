//! Error types for the statistics recorder.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StatsError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed stats file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize stats: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("invalid stats configuration: {0}")]
    InvalidConfig(String),

    #[error("status '{0}' is reserved and cannot be recorded")]
    ReservedStatus(String),

    #[error("stats worker task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

impl StatsError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
