//! KDL configuration parsing for the crossbuild orchestrator.
//!
//! This crate handles:
//! - Build definitions (crossbuild.kdl)
//! - Variable interpolation in module settings

pub mod build;
pub mod error;
pub mod variables;

pub use build::{DEFAULT_CONFIG_FILE, load_build, parse_build};
pub use error::{ConfigError, ConfigResult};
pub use variables::{VariableContext, VariableContextBuilder};
