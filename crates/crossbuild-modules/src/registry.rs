//! Static module registry.
//!
//! Maps module names to their implementations and fixes which modules run
//! in the pre and post phases.

use crossbuild_cache::BuildMeta;
use crossbuild_core::{ModuleRef, ModuleSet};
use std::sync::Arc;

use crate::{
    CleanupModule, CommandModule, CompressModule, FetchCachedModule, GoBuildModule, OutputModule,
    SetupModule, StaticModule, VersionModule,
};

/// Modules available to one run.
///
/// Modules keep the settings captured by `configure`, so a registry is
/// built fresh for every run.
#[derive(Clone, Default)]
pub struct ModuleRegistry {
    modules: ModuleSet,
    pre: Vec<String>,
    post: Vec<String>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every built-in module, with `setup` as the pre phase and `cleanup`
    /// as the post phase.
    pub fn builtin() -> Self {
        Self::new()
            .with_pre(Arc::new(SetupModule::new()))
            .with_post(Arc::new(CleanupModule::new()))
            .with(Arc::new(VersionModule::new()))
            .with(Arc::new(GoBuildModule::new()))
            .with(Arc::new(CommandModule::new()))
            .with(Arc::new(CompressModule::new()))
            .with(Arc::new(StaticModule::new()))
            .with(Arc::new(OutputModule::new()))
    }

    /// Register a main-phase module, replacing any module with the same name.
    pub fn with(mut self, module: ModuleRef) -> Self {
        self.modules.insert(module.name().to_string(), module);
        self
    }

    pub fn with_pre(mut self, module: ModuleRef) -> Self {
        self.pre.push(module.name().to_string());
        self.with(module)
    }

    pub fn with_post(mut self, module: ModuleRef) -> Self {
        self.post.push(module.name().to_string());
        self.with(module)
    }

    /// The registry used when a build is served from the cache: adds
    /// `fetch-cached` and points `output` at the restored artifacts.
    pub fn for_cache_hit(&self, meta: BuildMeta) -> Self {
        self.clone()
            .with(Arc::new(FetchCachedModule::new(meta)))
            .with(Arc::new(OutputModule::from_cache()))
    }

    pub fn get(&self, name: &str) -> Option<&ModuleRef> {
        self.modules.get(name)
    }

    pub fn modules(&self) -> &ModuleSet {
        &self.modules
    }

    pub fn pre_phase(&self) -> &[String] {
        &self.pre
    }

    pub fn post_phase(&self) -> &[String] {
        &self.post
    }

    /// Names of every registered module, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("modules", &self.modules.keys().collect::<Vec<_>>())
            .field("pre", &self.pre)
            .field("post", &self.post)
            .finish()
    }
}
