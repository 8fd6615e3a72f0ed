//! Cache errors.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to walk {path}: {message}")]
    Walk { path: PathBuf, message: String },

    #[error("no cache directory available on this platform")]
    NoCacheDir,

    #[error("corrupt cache record {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("artifact {0} has no file name")]
    InvalidArtifact(PathBuf),

    #[error("two artifacts share the file name {0}")]
    Collision(String),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type CacheResult<T> = std::result::Result<T, CacheError>;
