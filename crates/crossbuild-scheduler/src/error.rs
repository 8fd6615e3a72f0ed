//! Engine errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Config(#[from] crossbuild_core::Error),

    #[error("dependency cycle through module {0}")]
    Cycle(String),

    #[error("tasks encountered errors: {}", failed.join(", "))]
    Execution {
        /// Failed leaf jobs, as `/`-separated paths.
        failed: Vec<String>,
        /// Module log captured during the run.
        log: Vec<String>,
    },
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = EngineError::Execution {
            failed: vec!["crossbuild/build/linux_amd64/gobuild".to_string(), "post-build/cleanup".to_string()],
            log: vec![],
        };
        assert_eq!(
            err.to_string(),
            "tasks encountered errors: crossbuild/build/linux_amd64/gobuild, post-build/cleanup"
        );

        let err: EngineError = crossbuild_core::Error::UnknownModule("zigbuild".to_string()).into();
        assert_eq!(err.to_string(), "configuration error: unknown module: zigbuild");
        assert_eq!(EngineError::Cycle("a".to_string()).to_string(), "dependency cycle through module a");
    }
}
