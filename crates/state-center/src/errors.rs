use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to write state file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("state payload is not valid: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("state store unavailable: {0}")]
    Unavailable(String),
}
