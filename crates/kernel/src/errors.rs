use std::path::PathBuf;

use actharvest_state_center::StateError;
use thiserror::Error;

/// Errors surfaced by the orchestration kernel.
///
/// Per-task and per-item failures never use this type; they are folded into
/// `TaskResult` or `DispatchOutcome` values. What remains is setup, I/O and
/// precondition trouble that ends a run.
#[derive(Debug, Error)]
pub enum KernelError {
    #[error("precondition failed: {0}")]
    Precondition(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("failed to read backlog {path}: {source}")]
    Backlog {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("job endpoint error: {0}")]
    Endpoint(String),
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl KernelError {
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True for errors that must stop a run before any oracle session opens.
    pub fn is_fatal_precondition(&self) -> bool {
        matches!(self, KernelError::Precondition(_) | KernelError::Config(_))
    }
}
