//! Copies a module's artifacts into the project's output directory.
//!
//! The copied files are the build's final products: they are recorded on
//! the workspace and become the objects of the cache record.

use async_trait::async_trait;
use crossbuild_core::{BuildContext, Configured, Logger, Module, Result, Target};
use serde::Deserialize;
use std::path::PathBuf;

use crate::fetch::FetchCachedModule;
use crate::files;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputSettings {
    /// Module whose artifacts are copied.
    pub module: String,
    pub out_dir: PathBuf,
}

struct State {
    ctx: BuildContext,
    settings: OutputSettings,
}

pub struct OutputModule {
    state: Configured<State>,
    // Replaces `settings.module` when serving a cache hit.
    source_override: Option<String>,
}

impl OutputModule {
    pub const NAME: &'static str = "output";

    pub fn new() -> Self {
        Self {
            state: Configured::new(Self::NAME),
            source_override: None,
        }
    }

    /// An output step that copies the artifacts restored by `fetch-cached`.
    pub fn from_cache() -> Self {
        Self {
            state: Configured::new(Self::NAME),
            source_override: Some(FetchCachedModule::NAME.to_string()),
        }
    }

    fn source<'a>(&'a self, settings: &'a OutputSettings) -> &'a str {
        self.source_override.as_deref().unwrap_or(&settings.module)
    }
}

impl Default for OutputModule {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Module for OutputModule {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn configure(&self, ctx: &BuildContext) -> Result<()> {
        self.state.init_with(|| {
            Ok(State {
                ctx: ctx.clone(),
                settings: ctx.config.settings(Self::NAME)?,
            })
        })
    }

    async fn run_module(&self, logger: &Logger, _target: Option<Target>) -> bool {
        let State { ctx, settings } = match self.state.get() {
            Ok(state) => state,
            Err(e) => {
                logger.error(e);
                return false;
            }
        };
        let source = self.source(settings);

        let out_dir = ctx.config.resolve(&settings.out_dir);
        match tokio::fs::metadata(&out_dir).await {
            Ok(meta) if !meta.is_dir() => {
                logger.error(format!(
                    "output directory {} is not a directory",
                    out_dir.display()
                ));
                return false;
            }
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if let Err(e) = tokio::fs::create_dir_all(&out_dir).await {
                    logger.error(format!("failed to create {}: {e}", out_dir.display()));
                    return false;
                }
            }
            Err(e) => {
                logger.error(format!("failed to inspect {}: {e}", out_dir.display()));
                return false;
            }
        }

        // Agnostic producers write to the workspace root, per-target ones to
        // one directory per target.
        let mut sources = vec![ctx.workspace.module_dir(None, source)];
        sources.extend(
            ctx.config
                .targets
                .iter()
                .map(|t| ctx.workspace.module_dir(Some(*t), source)),
        );

        let mut copied = 0;
        for dir in sources {
            let artifacts = match files::files_in(&dir).await {
                Ok(files) => files,
                Err(e) => {
                    logger.error(format!("failed to read {}: {e}", dir.display()));
                    return false;
                }
            };
            for artifact in artifacts {
                logger.info(format!("copying {} to {}", artifact.display(), out_dir.display()));
                match files::copy_into(&artifact, &out_dir).await {
                    Ok(dest) => {
                        ctx.workspace.record_artifact(dest);
                        copied += 1;
                    }
                    Err(e) => {
                        logger.error(format!("failed to copy {}: {e}", artifact.display()));
                        return false;
                    }
                }
            }
        }

        if copied == 0 {
            logger.error(format!("module {source} produced no artifacts"));
            return false;
        }
        true
    }

    fn requires(&self) -> Vec<String> {
        if let Some(source) = &self.source_override {
            return vec![source.clone()];
        }
        self.state
            .get()
            .map(|state| vec![state.settings.module.clone()])
            .unwrap_or_default()
    }

    fn target_agnostic(&self) -> bool {
        true
    }

    fn run_on_cached(&self) -> bool {
        true
    }
}
