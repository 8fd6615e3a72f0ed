//! Generic toolchain step.
//!
//! Runs an arbitrary program once per target (or once overall when
//! `agnostic` is set). Program, arguments, environment and working
//! directory are interpolated, so a C, Java or Zig build can be expressed
//! as:
//!
//! ```kdl
//! module "command" {
//!     program "zig"
//!     args "build-exe" "main.zig" "-target" "${arch}-${os}" "-femit-bin=${out}/app-${target}${ext}"
//!     artifacts "app-${target}${ext}"
//! }
//! ```
//!
//! The program also sees `CROSSBUILD_OS`, `CROSSBUILD_ARCH`,
//! `CROSSBUILD_TARGET` and `CROSSBUILD_OUT`.

use async_trait::async_trait;
use crossbuild_core::{BuildContext, Configured, Logger, Module, Result, Target, one_or_many};
use serde::Deserialize;
use std::collections::BTreeMap;

use crate::process::Invocation;
use crate::vars;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CommandSettings {
    pub program: String,
    #[serde(default, deserialize_with = "one_or_many")]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub dir: Option<String>,
    /// Files the program must leave in `${out}`.
    #[serde(default, deserialize_with = "one_or_many")]
    pub artifacts: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub requires: Vec<String>,
    #[serde(default)]
    pub agnostic: bool,
}

struct State {
    ctx: BuildContext,
    settings: CommandSettings,
}

pub struct CommandModule {
    state: Configured<State>,
}

impl CommandModule {
    pub const NAME: &'static str = "command";

    pub fn new() -> Self {
        Self {
            state: Configured::new(Self::NAME),
        }
    }
}

impl Default for CommandModule {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Module for CommandModule {
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

    async fn run_module(&self, logger: &Logger, target: Option<Target>) -> bool {
        let State { ctx, settings } = match self.state.get() {
            Ok(state) => state,
            Err(e) => {
                logger.error(e);
                return false;
            }
        };

        let out_dir = ctx.workspace.module_dir(target, Self::NAME);
        if let Err(e) = tokio::fs::create_dir_all(&out_dir).await {
            logger.error(format!("failed to create {}: {e}", out_dir.display()));
            return false;
        }
        let vars = vars::for_run(ctx, target, &out_dir).await;

        let program = vars.interpolate(&settings.program);
        let dir = settings
            .dir
            .as_deref()
            .map(|d| ctx.config.resolve(vars.interpolate(d)))
            .unwrap_or_else(|| ctx.config.root.clone());
        let mut invocation = Invocation::new(program)
            .args(vars.interpolate_vec(&settings.args))
            .env("CROSSBUILD_OUT", out_dir.to_string_lossy())
            .dir(dir);
        if let Some(target) = target {
            invocation = invocation
                .env("CROSSBUILD_OS", target.os.to_string())
                .env("CROSSBUILD_ARCH", target.arch.to_string())
                .env("CROSSBUILD_TARGET", target.to_string());
        }
        for (key, value) in vars.interpolate_map(&settings.env) {
            invocation = invocation.env(key, value);
        }

        if !invocation.run(logger).await {
            return false;
        }

        let missing: Vec<String> = vars
            .interpolate_vec(&settings.artifacts)
            .into_iter()
            .filter(|name| !out_dir.join(name).is_file())
            .collect();
        if !missing.is_empty() {
            logger.error(format!("expected artifacts not produced: {}", missing.join(", ")));
            return false;
        }
        true
    }

    fn requires(&self) -> Vec<String> {
        self.state
            .get()
            .map(|state| state.settings.requires.clone())
            .unwrap_or_default()
    }

    fn target_agnostic(&self) -> bool {
        self.state
            .get()
            .map(|state| state.settings.agnostic)
            .unwrap_or(false)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::testing;
    use crossbuild_core::ModuleConfig;

    fn module_with(dir: &std::path::Path, section: ModuleConfig) -> (CommandModule, BuildContext) {
        let ctx = testing::context(dir, vec![section]);
        let module = CommandModule::new();
        module.configure(&ctx).unwrap();
        (module, ctx)
    }

    #[tokio::test]
    async fn test_produces_interpolated_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let section = ModuleConfig::new("command")
            .with("program", "sh")
            .with(
                "args",
                vec!["-c", "printf %s \"$CROSSBUILD_TARGET\" > \"${out}/${name}-${target}${ext}\""],
            )
            .with("artifacts", "${name}-${target}${ext}");
        let (module, ctx) = module_with(dir.path(), section);
        let target: Target = "windows_amd64".parse().unwrap();

        assert!(module.run_module(&testing::logger(), Some(target)).await);
        let produced = ctx
            .workspace
            .module_dir(Some(target), "command")
            .join("demo-windows_amd64.exe");
        assert_eq!(std::fs::read_to_string(produced).unwrap(), "windows_amd64");
    }

    #[tokio::test]
    async fn test_missing_artifact_fails() {
        let dir = tempfile::tempdir().unwrap();
        let section = ModuleConfig::new("command")
            .with("program", "true")
            .with("artifacts", "never-made");
        let (module, _ctx) = module_with(dir.path(), section);
        let logger = testing::logger();

        assert!(!module.run_module(&logger, Some("linux_amd64".parse().unwrap())).await);
        assert!(
            logger
                .lines()
                .iter()
                .any(|l| l.contains("expected artifacts not produced: never-made"))
        );
    }

    #[tokio::test]
    async fn test_requires_and_agnostic_from_settings() {
        let dir = tempfile::tempdir().unwrap();
        let section = ModuleConfig::new("command")
            .with("program", "true")
            .with("requires", "version")
            .with("agnostic", true);
        let (module, _ctx) = module_with(dir.path(), section);

        assert_eq!(module.requires(), vec!["version"]);
        assert!(module.target_agnostic());
        assert!(module.run_module(&testing::logger(), None).await);
    }

    #[tokio::test]
    async fn test_env_values_are_interpolated() {
        let dir = tempfile::tempdir().unwrap();
        let section = ModuleConfig::new("command")
            .with("program", "sh")
            .with("args", vec!["-c", "printf %s \"$GREETING\" > \"$CROSSBUILD_OUT/greeting\""])
            .with("env", serde_json::json!({ "GREETING": "hello-${target}" }))
            .with("artifacts", "greeting");
        let (module, ctx) = module_with(dir.path(), section);
        let target: Target = "linux_arm64".parse().unwrap();

        assert!(module.run_module(&testing::logger(), Some(target)).await);
        let produced = ctx.workspace.module_dir(Some(target), "command").join("greeting");
        assert_eq!(std::fs::read_to_string(produced).unwrap(), "hello-linux_arm64");
    }
}
