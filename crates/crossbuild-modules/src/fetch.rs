//! Restores a previous build's artifacts from the cache.

use async_trait::async_trait;
use crossbuild_cache::BuildMeta;
use crossbuild_core::{BuildContext, Configured, Logger, Module, Result, Target, Workspace};
use std::sync::Arc;

use crate::files;

pub struct FetchCachedModule {
    meta: BuildMeta,
    workspace: Configured<Arc<Workspace>>,
}

impl FetchCachedModule {
    pub const NAME: &'static str = "fetch-cached";

    pub fn new(meta: BuildMeta) -> Self {
        Self {
            meta,
            workspace: Configured::new(Self::NAME),
        }
    }
}

#[async_trait]
impl Module for FetchCachedModule {
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
        logger.info("source files unchanged, using cached build artifacts");

        let dest = workspace.module_dir(None, Self::NAME);
        for object in self.meta.object_paths() {
            if let Err(e) = files::copy_into(&object, &dest).await {
                logger.error(format!("failed to restore {}: {e}", object.display()));
                return false;
            }
        }
        true
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
    use crossbuild_cache::CacheStore;

    #[tokio::test]
    async fn test_copies_cached_objects() {
        let dir = tempfile::tempdir().unwrap();
        let built = dir.path().join("app-linux_amd64");
        std::fs::write(&built, "elf").unwrap();
        let store = CacheStore::new(dir.path().join("cache"));
        let mut meta = BuildMeta::new("demo", "h");
        store.store(&mut meta, &[built]).unwrap();

        let ctx = testing::context(dir.path(), vec![]);
        let module = FetchCachedModule::new(store.lookup("demo").unwrap().unwrap());
        module.configure(&ctx).unwrap();
        assert!(module.run_module(&testing::logger(), None).await);

        let restored = ctx
            .workspace
            .module_dir(None, "fetch-cached")
            .join("app-linux_amd64");
        assert_eq!(std::fs::read_to_string(restored).unwrap(), "elf");
    }

    #[tokio::test]
    async fn test_missing_object_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut meta = BuildMeta::new("demo", "h");
        meta.objects = vec!["gone".to_string()];
        meta.location = dir.path().join("cache/demo");

        let ctx = testing::context(dir.path(), vec![]);
        let module = FetchCachedModule::new(meta);
        module.configure(&ctx).unwrap();
        assert!(!module.run_module(&testing::logger(), None).await);
    }
}
