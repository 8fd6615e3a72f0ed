//! crossbuild CLI tool.

use clap::{Parser, Subcommand};
use crossbuild_config::DEFAULT_CONFIG_FILE;
use crossbuild_core::{LogLevel, Target};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

#[derive(Parser)]
#[command(name = "crossbuild")]
#[command(about = "Build a project for several OS/architecture targets", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a build
    Build {
        /// Path to the build definition
        #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,
        /// Comma-separated subset of the configured targets
        #[arg(long, value_delimiter = ',')]
        targets: Option<Vec<Target>>,
        /// Rebuild even if the sources are unchanged
        #[arg(short, long)]
        force: bool,
        /// Leave the scratch workspace in place
        #[arg(long)]
        keep_workspace: bool,
        /// Do not read or update the build cache
        #[arg(long)]
        no_cache: bool,
        /// Progress display; interactive when stdout is a terminal
        #[arg(long, value_enum)]
        progress: Option<commands::build::ProgressArg>,
        /// Minimum level of module log lines shown after a failure
        #[arg(long, default_value = "info")]
        log_level: LogLevel,
    },
    /// Validate a build definition
    Validate {
        /// Path to the build definition
        #[arg(default_value = DEFAULT_CONFIG_FILE)]
        path: PathBuf,
    },
    /// Remove cached builds
    Clean {
        /// Only remove the record for this build
        #[arg(long)]
        name: Option<String>,
    },
    /// List the built-in modules
    Modules,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Diagnostics go to stderr so they don't tear the progress display
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            config,
            targets,
            force,
            keep_workspace,
            no_cache,
            progress,
            log_level,
        } => {
            commands::build::run(commands::build::BuildArgs {
                config,
                targets,
                force,
                keep_workspace,
                no_cache,
                progress,
                log_level,
            })
            .await?;
        }
        Commands::Validate { path } => {
            commands::validate(&path)?;
        }
        Commands::Clean { name } => {
            commands::clean(name.as_deref())?;
        }
        Commands::Modules => {
            commands::modules();
        }
    }

    Ok(())
}
