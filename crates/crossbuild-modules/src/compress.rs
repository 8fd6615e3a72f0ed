//! Per-target archiving of another module's artifacts.

use async_trait::async_trait;
use crossbuild_core::{BuildContext, Configured, Logger, Module, Result, Target};
use flate2::Compression;
use flate2::write::GzEncoder;
use serde::Deserialize;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use crate::files;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum ArchiveFormat {
    #[serde(rename = "tar.gz")]
    TarGz,
    #[serde(rename = "zip")]
    Zip,
}

impl ArchiveFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ArchiveFormat::TarGz => "tar.gz",
            ArchiveFormat::Zip => "zip",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompressSettings {
    /// Module whose artifacts are archived.
    pub module: String,
    pub format: ArchiveFormat,
}

struct State {
    ctx: BuildContext,
    settings: CompressSettings,
}

pub struct CompressModule {
    state: Configured<State>,
}

impl CompressModule {
    pub const NAME: &'static str = "compress";

    pub fn new() -> Self {
        Self {
            state: Configured::new(Self::NAME),
        }
    }
}

impl Default for CompressModule {
    fn default() -> Self {
        Self::new()
    }
}

/// `app-linux_amd64.exe` is archived as `app-linux_amd64.<ext>`.
fn archive_name(artifact: &Path, format: ArchiveFormat) -> String {
    let name = artifact
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = name.split('.').next().unwrap_or_default();
    format!("{stem}.{}", format.extension())
}

fn write_archive(format: ArchiveFormat, artifact: &Path, dest: &Path) -> io::Result<()> {
    let entry_name = artifact
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "artifact has no file name"))?;
    let out = File::create(dest)?;

    match format {
        ArchiveFormat::TarGz => {
            let mut builder = tar::Builder::new(GzEncoder::new(out, Compression::default()));
            builder.follow_symlinks(true);
            builder.append_path_with_name(artifact, &entry_name)?;
            builder.into_inner()?.finish()?;
        }
        ArchiveFormat::Zip => {
            let mut writer = zip::ZipWriter::new(out);
            let options = zip::write::SimpleFileOptions::default()
                .compression_method(zip::CompressionMethod::Deflated)
                .unix_permissions(0o755);
            writer.start_file(entry_name, options).map_err(io::Error::other)?;
            io::copy(&mut File::open(artifact)?, &mut writer)?;
            writer.finish().map_err(io::Error::other)?;
        }
    }
    Ok(())
}

#[async_trait]
impl Module for CompressModule {
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

        let source = ctx.workspace.module_dir(target, &settings.module);
        let artifacts = match files::files_in(&source).await {
            Ok(files) => files,
            Err(e) => {
                logger.error(format!("failed to read {}: {e}", source.display()));
                return false;
            }
        };
        if artifacts.is_empty() {
            logger.error(format!("module {} produced no artifacts", settings.module));
            return false;
        }

        let out_dir = ctx.workspace.module_dir(target, Self::NAME);
        if let Err(e) = tokio::fs::create_dir_all(&out_dir).await {
            logger.error(format!("failed to create {}: {e}", out_dir.display()));
            return false;
        }

        for artifact in artifacts {
            let dest: PathBuf = out_dir.join(archive_name(&artifact, settings.format));
            logger.info(format!("compressing {}", artifact.display()));
            let format = settings.format;
            let task_dest = dest.clone();
            let result =
                tokio::task::spawn_blocking(move || write_archive(format, &artifact, &task_dest))
                    .await;
            match result {
                Ok(Ok(())) => logger.info(format!("compressed {}", dest.display())),
                Ok(Err(e)) => {
                    logger.error(format!("failed to write {}: {e}", dest.display()));
                    return false;
                }
                Err(e) => {
                    logger.error(format!("compression task failed: {e}"));
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
