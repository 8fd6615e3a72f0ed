//! Core domain types and traits for the crossbuild orchestrator.
//!
//! This crate contains:
//! - Build targets (OS/architecture pairs) and artifact naming
//! - The build configuration model shared by every module
//! - The `Module` trait implemented by build steps
//! - The per-run scratch workspace and scoped module logger

pub mod config;
pub mod error;
pub mod id;
pub mod log;
pub mod module;
pub mod target;
pub mod workspace;

pub use config::{BuildConfig, ModuleConfig, VersionConfig, VersionKind, one_or_many};
pub use error::{Error, Result};
pub use id::RunId;
pub use log::{LogLevel, Logger};
pub use module::{BuildContext, Configured, Module, ModuleRef, ModuleSet};
pub use target::{Arch, Os, Target};
pub use workspace::Workspace;
