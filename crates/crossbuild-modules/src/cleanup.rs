//! Removes the scratch workspace once the build has finished.

use async_trait::async_trait;
use crossbuild_core::{BuildContext, Configured, Logger, Module, Result, Target, Workspace};
use std::sync::Arc;

pub struct CleanupModule {
    workspace: Configured<Arc<Workspace>>,
}

impl CleanupModule {
    pub const NAME: &'static str = "cleanup";

    pub fn new() -> Self {
        Self {
            workspace: Configured::new(Self::NAME),
        }
    }
}

impl Default for CleanupModule {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Module for CleanupModule {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn configure(&self, ctx: &BuildContext) -> Result<()> {
        self.workspace.init_with(|| Ok(ctx.workspace.clone()))
    }

    async fn run_module(&self, logger: &Logger, _target: Option<Target>) -> bool {
        let workspace = match self.workspace.get() {
            Ok(ws) => ws,
            Err(e) => {
                logger.error(e);
                return false;
            }
        };
        match tokio::fs::remove_dir_all(workspace.root()).await {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
            Err(e) => {
                logger.error(format!(
                    "failed to remove {}: {e}",
                    workspace.root().display()
                ));
                false
            }
        }
    }

    fn target_agnostic(&self) -> bool {
        true
    }

    fn run_on_cached(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[tokio::test]
    async fn test_removes_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = testing::context(dir.path(), vec![]);
        std::fs::create_dir_all(ctx.workspace.target_dir(None).join("linux_amd64")).unwrap();

        let module = CleanupModule::new();
        module.configure(&ctx).unwrap();
        assert!(module.run_module(&testing::logger(), None).await);
        assert!(!ctx.workspace.root().exists());

        // Already gone is fine.
        assert!(module.run_module(&testing::logger(), None).await);
    }
}
