//! Go cross-compilation.

use async_trait::async_trait;
use crossbuild_core::{
    Arch, BuildContext, Configured, Logger, Module, Os, Result, Target, one_or_many,
};
use serde::Deserialize;
use std::path::PathBuf;

use crate::process::Invocation;
use crate::vars;

#[derive(Debug, Clone, Deserialize)]
pub struct GoCommand {
    pub name: String,
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GoBuildSettings {
    #[serde(deserialize_with = "one_or_many")]
    pub commands: Vec<GoCommand>,
    /// Joined with spaces; `${version}` and friends are interpolated.
    #[serde(default, deserialize_with = "one_or_many")]
    pub ldflags: Vec<String>,
    #[serde(default)]
    pub cgo_off: bool,
    /// Directory `go build` runs in, relative to the project root.
    #[serde(default)]
    pub root: Option<String>,
    /// Run the `version` module first so `${version}` is fresh.
    #[serde(default)]
    pub uses_version: bool,
}

struct State {
    ctx: BuildContext,
    settings: GoBuildSettings,
}

pub struct GoBuildModule {
    state: Configured<State>,
}

impl GoBuildModule {
    pub const NAME: &'static str = "gobuild";

    pub fn new() -> Self {
        Self {
            state: Configured::new(Self::NAME),
        }
    }
}

impl Default for GoBuildModule {
    fn default() -> Self {
        Self::new()
    }
}

fn goos(os: Os) -> Option<&'static str> {
    match os {
        Os::Windows => Some("windows"),
        Os::Linux => Some("linux"),
        Os::Darwin => Some("darwin"),
        Os::Android => Some("android"),
        Os::Jvm => None,
    }
}

fn goarch(arch: Arch) -> &'static str {
    match arch {
        Arch::Amd64 => "amd64",
        Arch::Arm64 => "arm64",
        Arch::Arm => "arm",
        Arch::I386 => "386",
    }
}

#[async_trait]
impl Module for GoBuildModule {
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
        let Some(target) = target else {
            logger.error("gobuild must run for a specific target");
            return false;
        };
        let Some(os) = goos(target.os) else {
            logger.error(format!("go cannot build for {target}"));
            return false;
        };
        if settings.commands.is_empty() {
            logger.info("no commands to build");
            return true;
        }

        let out_dir = ctx.workspace.module_dir(Some(target), Self::NAME);
        let vars = vars::for_run(ctx, Some(target), &out_dir).await;
        let work_dir: PathBuf = settings
            .root
            .as_deref()
            .map(|root| ctx.config.resolve(root))
            .unwrap_or_else(|| ctx.config.root.clone());

        for command in &settings.commands {
            let exe = target.exe_name(&command.name);
            logger.info(format!("building {exe}"));

            let mut invocation = Invocation::new("go")
                .args(["build", "-o"])
                .arg(out_dir.join(&exe).to_string_lossy())
                .env("GOOS", os)
                .env("GOARCH", goarch(target.arch))
                .dir(&work_dir);
            if !settings.ldflags.is_empty() {
                let flags = vars.interpolate(&settings.ldflags.join(" "));
                invocation = invocation.arg("-ldflags").arg(flags);
            }
            if settings.cgo_off {
                invocation = invocation.env("CGO_ENABLED", "0");
            }
            invocation = invocation.arg(ctx.config.resolve(&command.path).to_string_lossy());

            if !invocation.run(logger).await {
                return false;
            }
            logger.info(format!("built {exe}"));
        }
        true
    }

    fn requires(&self) -> Vec<String> {
        match self.state.get() {
            Ok(state) if state.settings.uses_version => vec!["version".to_string()],
            _ => Vec::new(),
        }
    }
}
