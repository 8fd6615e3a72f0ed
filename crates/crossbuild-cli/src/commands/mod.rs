//! CLI command implementations.

pub mod build;

use anyhow::{Context, Result};
use crossbuild_cache::CacheStore;
use crossbuild_config::load_build;
use crossbuild_core::{BuildContext, Workspace};
use crossbuild_modules::ModuleRegistry;
use std::path::Path;
use std::sync::Arc;

use crate::output;

/// Parse a build definition and resolve its modules without running them.
pub fn validate(path: &Path) -> Result<()> {
    let config = load_build(path)
        .with_context(|| format!("Failed to load build definition: {}", path.display()))?;

    let registry = ModuleRegistry::builtin();
    let requested: Vec<String> = config.modules.iter().map(|m| m.name.clone()).collect();
    let ctx = BuildContext::new(Arc::new(config), Arc::new(Workspace::temp()));
    let order = crossbuild_scheduler::resolve(&requested, registry.modules(), &ctx)
        .context("Configuration error")?;

    let config = &ctx.config;
    output::print_success(&format!("{} is valid", path.display()));
    output::print_stat("name", &config.name);
    let targets: Vec<String> = config.targets.iter().map(|t| t.to_string()).collect();
    output::print_stat("targets", &targets.join(", "));
    output::print_stat("modules", &order.join(" → "));
    if let Some(version) = config.version_path() {
        output::print_stat("version file", &version.display().to_string());
    }
    Ok(())
}

/// Drop cached build records.
pub fn clean(name: Option<&str>) -> Result<()> {
    let store = CacheStore::open_default().context("Failed to locate the build cache")?;
    let removed = store
        .clear(name)
        .with_context(|| format!("Failed to clear {}", store.root().display()))?;

    match (name, removed) {
        (Some(name), true) => output::print_success(&format!("Removed cached build {name}")),
        (Some(name), false) => output::print_info(&format!("No cached build named {name}")),
        (None, true) => output::print_success(&format!("Cleared {}", store.root().display())),
        (None, false) => output::print_info("Build cache is already empty"),
    }
    Ok(())
}

pub fn modules() {
    for name in ModuleRegistry::builtin().names() {
        println!("{name}");
    }
}
