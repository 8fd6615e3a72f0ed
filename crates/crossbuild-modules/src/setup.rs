//! Creates the scratch workspace before any build step runs.

use async_trait::async_trait;
use crossbuild_core::{BuildContext, Configured, Logger, Module, Result, Target, Workspace};
use std::sync::Arc;

pub struct SetupModule {
    workspace: Configured<Arc<Workspace>>,
}

impl SetupModule {
    pub const NAME: &'static str = "setup";

    pub fn new() -> Self {
        Self {
            workspace: Configured::new(Self::NAME),
        }
    }
}

impl Default for SetupModule {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Module for SetupModule {
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
        match tokio::fs::create_dir_all(workspace.root()).await {
            Ok(()) => {
                logger.debug(format!("workspace {}", workspace.root().display()));
                true
            }
            Err(e) => {
                logger.error(format!(
                    "failed to create {}: {e}",
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
    async fn test_creates_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = testing::context(dir.path(), vec![]);
        let module = SetupModule::new();

        assert!(!module.run_module(&testing::logger(), None).await);

        module.configure(&ctx).unwrap();
        assert!(module.run_module(&testing::logger(), None).await);
        assert!(ctx.workspace.root().is_dir());
    }
}
