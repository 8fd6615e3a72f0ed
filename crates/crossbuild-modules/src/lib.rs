//! Built-in build steps for the crossbuild orchestrator.
//!
//! Provides module implementations for:
//! - Scratch workspace setup and cleanup
//! - Version file bumping
//! - Go cross-compilation and arbitrary toolchain commands
//! - Archiving, static packaging and copying artifacts to the output directory
//! - Restoring artifacts from the build cache

pub mod cleanup;
pub mod command;
pub mod compress;
pub mod fetch;
mod files;
pub mod gobuild;
pub mod output;
pub mod process;
pub mod registry;
pub mod setup;
pub mod structure;
mod vars;
pub mod version;

pub use cleanup::CleanupModule;
pub use command::CommandModule;
pub use compress::{ArchiveFormat, CompressModule};
pub use fetch::FetchCachedModule;
pub use gobuild::GoBuildModule;
pub use output::OutputModule;
pub use registry::ModuleRegistry;
pub use setup::SetupModule;
pub use structure::StaticModule;
pub use version::VersionModule;

#[cfg(test)]
pub(crate) mod testing {
    use crossbuild_core::{BuildConfig, BuildContext, LogLevel, Logger, ModuleConfig, Workspace};
    use std::path::Path;
    use std::sync::Arc;

    pub fn context(root: &Path, modules: Vec<ModuleConfig>) -> BuildContext {
        let config = BuildConfig {
            name: "demo".to_string(),
            targets: vec!["linux_amd64".parse().unwrap(), "windows_amd64".parse().unwrap()],
            modules,
            include_dirs: vec![],
            version: None,
            root: root.to_path_buf(),
        };
        BuildContext::new(
            Arc::new(config),
            Arc::new(Workspace::new(&root.join("scratch"))),
        )
    }

    pub fn logger() -> Logger {
        Logger::new("test", LogLevel::Debug)
    }
}
