//! Packages each executable inside a fixed directory structure.
//!
//! For every artifact of `module`, the `structure` directory is copied into
//! a staging area, the artifact is placed at `<exe-path>/<name>[.exe]`, and
//! the result is archived as `<artifact stem>.tar.gz`:
//!
//! ```kdl
//! module "static" {
//!     module "gobuild"
//!     structure "package"
//!     exe-path "bin"
//! }
//! ```

use async_trait::async_trait;
use crossbuild_core::{BuildContext, Configured, Logger, Module, Result, Target};
use flate2::Compression;
use flate2::write::GzEncoder;
use serde::Deserialize;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::files;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StaticSettings {
    /// Module whose executables are packaged.
    pub module: String,
    /// Directory copied into every package, relative to the project root.
    pub structure: PathBuf,
    /// Directory inside the package that receives the executable.
    pub exe_path: PathBuf,
}

struct State {
    ctx: BuildContext,
    settings: StaticSettings,
}

pub struct StaticModule {
    state: Configured<State>,
}

impl StaticModule {
    pub const NAME: &'static str = "static";

    pub fn new() -> Self {
        Self {
            state: Configured::new(Self::NAME),
        }
    }
}

impl Default for StaticModule {
    fn default() -> Self {
        Self::new()
    }
}

/// Paths for one package.
struct Package {
    structure: PathBuf,
    executable: PathBuf,
    // Relative to the staging root.
    exe_dest: PathBuf,
    staging: PathBuf,
    archive: PathBuf,
}

fn copy_tree(src: &Path, dest: &Path) -> io::Result<()> {
    for entry in WalkDir::new(src).sort_by_file_name() {
        let entry = entry.map_err(io::Error::other)?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(io::Error::other)?;
        let to = dest.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&to)?;
        } else {
            fs::copy(entry.path(), &to)?;
        }
    }
    Ok(())
}

fn write_tar_gz(src: &Path, dest: &Path) -> io::Result<()> {
    let mut builder = tar::Builder::new(GzEncoder::new(File::create(dest)?, Compression::default()));
    for entry in WalkDir::new(src).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(io::Error::other)?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(io::Error::other)?;
        builder.append_path_with_name(entry.path(), rel)?;
    }
    builder.into_inner()?.finish()?;
    Ok(())
}

fn assemble(package: &Package) -> io::Result<()> {
    if package.staging.exists() {
        fs::remove_dir_all(&package.staging)?;
    }
    copy_tree(&package.structure, &package.staging)?;

    let exe = package.staging.join(&package.exe_dest);
    if let Some(parent) = exe.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(&package.executable, &exe)?;

    write_tar_gz(&package.staging, &package.archive)?;
    fs::remove_dir_all(&package.staging)
}

#[async_trait]
impl Module for StaticModule {
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
            logger.error("static packages are built per target");
            return false;
        };

        let structure = ctx.config.resolve(&settings.structure);
        if !structure.is_dir() {
            logger.error(format!("structure {} is not a directory", structure.display()));
            return false;
        }

        let source = ctx.workspace.module_dir(Some(target), &settings.module);
        let executables = match files::files_in(&source).await {
            Ok(files) => files,
            Err(e) => {
                logger.error(format!("failed to read {}: {e}", source.display()));
                return false;
            }
        };
        if executables.is_empty() {
            logger.error(format!("module {} produced no artifacts", settings.module));
            return false;
        }

        let out_dir = ctx.workspace.module_dir(Some(target), Self::NAME);
        if let Err(e) = tokio::fs::create_dir_all(&out_dir).await {
            logger.error(format!("failed to create {}: {e}", out_dir.display()));
            return false;
        }
        let exe_dest = settings.exe_path.join(target.clean_name(&ctx.config.name));

        for executable in executables {
            let file_name = executable
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let stem = file_name.split('.').next().unwrap_or_default().to_string();
            logger.info(format!("copying structure to {stem}"));

            let package = Package {
                structure: structure.clone(),
                executable,
                exe_dest: exe_dest.clone(),
                staging: ctx.workspace.target_dir(Some(target)).join("static-staging").join(&stem),
                archive: out_dir.join(format!("{stem}.tar.gz")),
            };
            let archive = package.archive.clone();
            match tokio::task::spawn_blocking(move || assemble(&package)).await {
                Ok(Ok(())) => logger.info(format!("created {}", archive.display())),
                Ok(Err(e)) => {
                    logger.error(format!("failed to package {stem}: {e}"));
                    return false;
                }
                Err(e) => {
                    logger.error(format!("packaging task failed: {e}"));
                    return false;
                }
            }
        }
        true
    }

    fn requires(&self) -> Vec<String> {
        self.state
            .get()
            .map(|state| vec![state.settings.module.clone()])
            .unwrap_or_default()
    }
}
