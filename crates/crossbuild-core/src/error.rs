//! Error types for crossbuild.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown OS: {0}")]
    UnknownOs(String),

    #[error("unknown arch: {0}")]
    UnknownArch(String),

    #[error("invalid target: {0}")]
    InvalidTarget(String),

    #[error("module {0} is not configured")]
    NotConfigured(String),

    #[error("module {module}: missing required field `{field}`")]
    MissingField { module: String, field: String },

    #[error("module {module}: {message}")]
    InvalidConfig { module: String, message: String },

    #[error("unknown module: {0}")]
    UnknownModule(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
