//! Local build execution command.

use anyhow::{Context, Result};
use clap::ValueEnum;
use crossbuild_cache::CacheStore;
use crossbuild_config::load_build;
use crossbuild_core::{LogLevel, Target};
use crossbuild_modules::ModuleRegistry;
use crossbuild_scheduler::{BuildOrchestrator, EngineError, ProgressStyle, RunOptions};
use std::io::IsTerminal;
use std::path::PathBuf;

use crate::output;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ProgressArg {
    /// Redraw the job tree in the alternate screen
    Interactive,
    /// Print the final job tree once
    Plain,
    /// Print nothing
    Hidden,
}

impl From<ProgressArg> for ProgressStyle {
    fn from(arg: ProgressArg) -> Self {
        match arg {
            ProgressArg::Interactive => ProgressStyle::Interactive,
            ProgressArg::Plain => ProgressStyle::Plain,
            ProgressArg::Hidden => ProgressStyle::Hidden,
        }
    }
}

pub struct BuildArgs {
    pub config: PathBuf,
    pub targets: Option<Vec<Target>>,
    pub force: bool,
    pub keep_workspace: bool,
    pub no_cache: bool,
    pub progress: Option<ProgressArg>,
    pub log_level: LogLevel,
}

pub async fn run(args: BuildArgs) -> Result<()> {
    let config = load_build(&args.config).with_context(|| {
        format!("Failed to load build definition: {}", args.config.display())
    })?;
    let name = config.name.clone();

    let cache = if args.no_cache {
        None
    } else {
        match CacheStore::open_default() {
            Ok(store) => Some(store),
            Err(e) => {
                output::print_warning(&format!("Build cache disabled: {e}"));
                None
            }
        }
    };

    let progress = args.progress.map(ProgressStyle::from).unwrap_or_else(|| {
        if std::io::stdout().is_terminal() {
            ProgressStyle::Interactive
        } else {
            ProgressStyle::Plain
        }
    });

    let options = RunOptions {
        target_filter: args.targets,
        force_refresh: args.force,
        keep_workspace: args.keep_workspace,
        workspace_base: None,
        cache,
        progress,
        log_level: args.log_level,
    };

    let orchestrator = BuildOrchestrator::new(config, ModuleRegistry::builtin(), options);
    match orchestrator.run(std::io::stdout()).await {
        Ok(outcome) => {
            if outcome.cache_hit {
                output::print_info("Sources unchanged, reused cached artifacts");
            }
            for artifact in &outcome.artifacts {
                output::print_stat("artifact", &artifact.display().to_string());
            }
            if args.keep_workspace {
                output::print_stat("workspace", &outcome.workspace.display().to_string());
            }
            output::print_success(&format!("Build {name} succeeded"));
            Ok(())
        }
        Err(EngineError::Execution { failed, log }) => {
            output::print_error(&format!("Build {name} failed"));
            for task in &failed {
                output::print_failed_task(task);
            }
            if !log.is_empty() {
                eprintln!();
                for line in &log {
                    eprintln!("{line}");
                }
            }
            anyhow::bail!("{} task(s) failed", failed.len());
        }
        Err(e) => Err(e).with_context(|| format!("Build {name} could not start")),
    }
}
