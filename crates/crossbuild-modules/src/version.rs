//! Version file bumping.
//!
//! Runs once per build, before the per-target steps, and never on a cache
//! hit. If the build fails afterwards the previous content is restored.

use async_trait::async_trait;
use crossbuild_core::{
    BuildContext, Configured, Logger, Module, Result, Target, VersionKind,
};
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use uuid::Uuid;

#[derive(Debug)]
struct Settings {
    path: PathBuf,
    kind: VersionKind,
}

pub struct VersionModule {
    // `None` when the build declares no version file.
    settings: Configured<Option<Settings>>,
    previous: Mutex<Option<String>>,
}

impl VersionModule {
    pub const NAME: &'static str = "version";

    pub fn new() -> Self {
        Self {
            settings: Configured::new(Self::NAME),
            previous: Mutex::new(None),
        }
    }
}

impl Default for VersionModule {
    fn default() -> Self {
        Self::new()
    }
}

/// The version that follows `current`.
pub fn next_version(kind: VersionKind, current: &str) -> std::result::Result<String, String> {
    let current = current.trim();
    match kind {
        VersionKind::BuildInt => {
            if current.is_empty() {
                return Ok("1".to_string());
            }
            let n = current
                .parse::<u64>()
                .map_err(|e| format!("invalid build number '{current}': {e}"))?;
            n.checked_add(1)
                .map(|n| n.to_string())
                .ok_or_else(|| format!("build number '{current}' cannot be incremented"))
        }
        VersionKind::Semver => {
            let mut parts = [0u64; 4];
            if !current.is_empty() {
                let raw: Vec<&str> = current.split('.').collect();
                if raw.len() > parts.len() {
                    return Err(format!(
                        "invalid version '{current}': at most {} components",
                        parts.len()
                    ));
                }
                for (slot, raw) in parts.iter_mut().zip(raw) {
                    *slot = raw
                        .parse()
                        .map_err(|e| format!("invalid version '{current}': {e}"))?;
                }
            }
            parts[3] = parts[3]
                .checked_add(1)
                .ok_or_else(|| format!("version '{current}' cannot be incremented"))?;
            Ok(parts.map(|p| p.to_string()).join("."))
        }
        VersionKind::BuildStr => Ok(base36(Uuid::new_v4().as_u128() as u64)),
    }
}

fn base36(mut n: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

#[async_trait]
impl Module for VersionModule {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn configure(&self, ctx: &BuildContext) -> Result<()> {
        self.settings.init_with(|| {
            Ok(ctx.config.version.as_ref().map(|v| Settings {
                path: ctx.config.resolve(&v.path),
                kind: v.kind,
            }))
        })
    }

    async fn run_module(&self, logger: &Logger, _target: Option<Target>) -> bool {
        let settings = match self.settings.get() {
            Ok(Some(settings)) => settings,
            Ok(None) => return true,
            Err(e) => {
                logger.error(e);
                return false;
            }
        };

        let current = match tokio::fs::read_to_string(&settings.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => {
                logger.error(format!("failed to read {}: {e}", settings.path.display()));
                return false;
            }
        };

        let next = match next_version(settings.kind, &current) {
            Ok(next) => next,
            Err(message) => {
                logger.error(message);
                return false;
            }
        };

        if let Err(e) = tokio::fs::write(&settings.path, &next).await {
            logger.error(format!("failed to write {}: {e}", settings.path.display()));
            return false;
        }
        *self.previous.lock().unwrap_or_else(PoisonError::into_inner) = Some(current);
        logger.info(format!("new version: {next}"));
        true
    }

    fn target_agnostic(&self) -> bool {
        true
    }

    fn on_fail(&self, logger: &Logger) {
        let Ok(Some(settings)) = self.settings.get() else {
            return;
        };
        let previous = self
            .previous
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let result = match previous {
            Some(previous) if previous.is_empty() => std::fs::remove_file(&settings.path),
            Some(previous) => std::fs::write(&settings.path, previous),
            None => return,
        };
        match result {
            Ok(()) => logger.info("restored previous version"),
            Err(e) => logger.warn(format!("failed to restore version file: {e}")),
        }
    }
}
