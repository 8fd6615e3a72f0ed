//! The module contract.
//!
//! Modules are the build steps of a pipeline (compile, archive, copy to
//! output...). The engine resolves them by name, configures each one once,
//! and then runs it once per target, or once overall when it is target
//! agnostic.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use crate::{BuildConfig, Error, Logger, Result, Target, Workspace};

/// Everything a module may read while configuring itself.
#[derive(Debug, Clone)]
pub struct BuildContext {
    pub config: Arc<BuildConfig>,
    pub workspace: Arc<Workspace>,
}

impl BuildContext {
    pub fn new(config: Arc<BuildConfig>, workspace: Arc<Workspace>) -> Self {
        Self { config, workspace }
    }
}

/// A named build step.
#[async_trait]
pub trait Module: Send + Sync {
    /// Name used in configuration sections and dependency lists.
    fn name(&self) -> &str;

    /// Read this module's settings from the build context.
    ///
    /// Fails when the module's section is absent or incomplete. Calling it
    /// again after a success is a no-op.
    fn configure(&self, ctx: &BuildContext) -> Result<()>;

    /// Execute the step for one target (`None` for target-agnostic steps).
    /// Failures are reported through `logger`.
    async fn run_module(&self, logger: &Logger, target: Option<Target>) -> bool;

    /// Names of modules that must run before this one.
    fn requires(&self) -> Vec<String> {
        Vec::new()
    }

    /// Whether the step runs once per build instead of once per target.
    fn target_agnostic(&self) -> bool {
        false
    }

    /// Whether the step still runs when the build is served from the cache.
    fn run_on_cached(&self) -> bool {
        false
    }

    /// Undo side effects after a failed build. Called once per resolved
    /// module, after all jobs have finished.
    fn on_fail(&self, _logger: &Logger) {}
}

pub type ModuleRef = Arc<dyn Module>;

/// Modules available to a run, keyed by name.
pub type ModuleSet = BTreeMap<String, ModuleRef>;

/// Settings captured by `Module::configure`, set at most once.
#[derive(Debug)]
pub struct Configured<T> {
    module: &'static str,
    slot: OnceLock<T>,
}

impl<T> Configured<T> {
    pub const fn new(module: &'static str) -> Self {
        Self {
            module,
            slot: OnceLock::new(),
        }
    }

    /// Store the value produced by `init` unless a value is already present.
    pub fn init_with(&self, init: impl FnOnce() -> Result<T>) -> Result<()> {
        if self.slot.get().is_some() {
            return Ok(());
        }
        let value = init()?;
        // A concurrent configure may have won the race; either value is valid.
        let _ = self.slot.set(value);
        Ok(())
    }

    pub fn get(&self) -> Result<&T> {
        self.slot
            .get()
            .ok_or_else(|| Error::NotConfigured(self.module.to_string()))
    }

    pub fn is_set(&self) -> bool {
        self.slot.get().is_some()
    }
}
