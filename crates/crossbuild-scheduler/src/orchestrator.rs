//! Build orchestrator - runs a build definition end to end.
//!
//! 1. Fingerprint the sources and compare with the cached record.
//! 2. Resolve the pre, main and post phases into module orders.
//! 3. Arrange each phase into jobs: target-agnostic modules run once,
//!    per-target modules fan out into one sequential chain per target.
//! 4. Run the tree while the progress reporter draws it.
//! 5. On success, store the produced artifacts as the new cache record.

use crossbuild_cache::{BuildMeta, CacheStore, fingerprint};
use crossbuild_core::{
    BuildConfig, BuildContext, Error, LogLevel, Logger, ModuleRef, Target, Workspace,
};
use crossbuild_modules::{FetchCachedModule, ModuleRegistry, OutputModule};
use futures::FutureExt;
use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::job::Runner;
use crate::{EngineError, EngineResult, Job, ProgressReporter, ProgressStyle, resolve};

/// Options for a single run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Build only these targets. `None` builds every configured target.
    pub target_filter: Option<Vec<Target>>,
    /// Ignore a matching cache record.
    pub force_refresh: bool,
    /// Skip the post phase so the scratch workspace survives the run.
    pub keep_workspace: bool,
    /// Parent directory of the scratch workspace; the system temp directory
    /// when unset.
    pub workspace_base: Option<PathBuf>,
    /// Cache store; `None` disables caching.
    pub cache: Option<CacheStore>,
    pub progress: ProgressStyle,
    pub log_level: LogLevel,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            target_filter: None,
            force_refresh: false,
            keep_workspace: false,
            workspace_base: None,
            cache: None,
            progress: ProgressStyle::default(),
            log_level: LogLevel::Info,
        }
    }
}

/// Result of a successful run.
#[derive(Debug)]
pub struct BuildOutcome {
    /// Whether the artifacts came from the cache.
    pub cache_hit: bool,
    /// Files the build produced.
    pub artifacts: Vec<PathBuf>,
    /// Scratch workspace used by the run.
    pub workspace: PathBuf,
    /// Module log captured during the run.
    pub log: Vec<String>,
}

/// The outcome of the cache check.
struct CacheCheck {
    hash: Option<String>,
    hit: Option<BuildMeta>,
}

pub struct BuildOrchestrator {
    config: Arc<BuildConfig>,
    registry: ModuleRegistry,
    options: RunOptions,
}

impl BuildOrchestrator {
    pub fn new(config: BuildConfig, registry: ModuleRegistry, options: RunOptions) -> Self {
        Self {
            config: Arc::new(config),
            registry,
            options,
        }
    }

    /// Run the build, drawing progress to `out`.
    pub async fn run<W: Write + Send + 'static>(self, out: W) -> EngineResult<BuildOutcome> {
        let targets = self.selected_targets()?;
        let workspace = Arc::new(match &self.options.workspace_base {
            Some(base) => Workspace::new(base),
            None => Workspace::temp(),
        });
        let ctx = BuildContext::new(self.config.clone(), workspace.clone());
        let name = self.config.name.clone();

        let check = self.check_cache(&ctx);
        let cache_hit = check.hit.is_some();
        let (registry, requested) = match check.hit {
            Some(meta) => {
                info!(build = %name, "Sources unchanged, using cached artifacts");
                (
                    self.registry.for_cache_hit(meta),
                    vec![
                        FetchCachedModule::NAME.to_string(),
                        OutputModule::NAME.to_string(),
                    ],
                )
            }
            None => (
                self.registry.clone(),
                self.config.modules.iter().map(|m| m.name.clone()).collect(),
            ),
        };
        let modules = registry.modules();

        let pre_order = resolve(registry.pre_phase(), modules, &ctx)?;
        let main_order = resolve(&requested, modules, &ctx)?;
        let post_order = if self.options.keep_workspace {
            Vec::new()
        } else {
            resolve(registry.post_phase(), modules, &ctx)?
        };
        debug!(build = %name, pre = ?pre_order, main = ?main_order, post = ?post_order, "Resolved modules");

        let keep = |order: &[String]| -> Vec<ModuleRef> {
            order
                .iter()
                .filter_map(|n| modules.get(n).cloned())
                .filter(|m| !cache_hit || m.run_on_cached())
                .collect()
        };
        let pre = keep(&pre_order);
        let main = keep(&main_order);
        let post = keep(&post_order);

        let root = Arc::new(
            Job::group("crossbuild", false)
                .with_child(phase_job("pre-build", &pre, &targets, &ctx))
                .with_child(phase_job("build", &main, &targets, &ctx)),
        );
        let post_job = Arc::new(phase_job("post-build", &post, &targets, &ctx));

        let (done_tx, done_rx) = watch::channel(false);
        let reporter = ProgressReporter::new(
            format!("build {name}"),
            vec![root.clone(), post_job.clone()],
            self.options.progress,
        );
        let reporter = tokio::spawn(reporter.run(out, done_rx));

        let logger = Logger::new("", self.options.log_level);
        let root_ok = root.run(&logger).await;
        let post_ok = post_job.run(&logger).await;
        let _ = done_tx.send(true);
        match reporter.await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => warn!(error = %e, "Progress output failed"),
            Err(e) => warn!(error = %e, "Progress task failed"),
        }

        if !(root_ok && post_ok) {
            for module in pre.iter().chain(&main).chain(&post) {
                module.on_fail(&logger);
            }
            let mut failed = root.failed_leaves();
            failed.extend(post_job.failed_leaves());
            warn!(build = %name, ?failed, "Build failed");
            return Err(EngineError::Execution {
                failed,
                log: logger.lines(),
            });
        }

        let artifacts = workspace.artifacts();
        if !cache_hit {
            self.store_cache(check.hash, &artifacts, targets.len());
        }
        info!(build = %name, cache_hit, artifacts = artifacts.len(), "Build succeeded");

        Ok(BuildOutcome {
            cache_hit,
            artifacts,
            workspace: workspace.root().to_path_buf(),
            log: logger.lines(),
        })
    }

    fn selected_targets(&self) -> EngineResult<Vec<Target>> {
        let Some(filter) = &self.options.target_filter else {
            return Ok(self.config.targets.clone());
        };
        if let Some(unknown) = filter.iter().find(|t| !self.config.targets.contains(*t)) {
            return Err(Error::InvalidTarget(format!("{unknown} is not a target of this build")).into());
        }
        Ok(self
            .config
            .targets
            .iter()
            .filter(|t| filter.contains(*t))
            .copied()
            .collect())
    }

    fn check_cache(&self, ctx: &BuildContext) -> CacheCheck {
        let miss = |hash| CacheCheck { hash, hit: None };
        let Some(store) = &self.options.cache else {
            return miss(None);
        };
        let name = &self.config.name;

        let exclude = self.config.version_path();
        let hash = match fingerprint(&self.config.root, &self.config.include_dirs, exclude.as_deref()) {
            Ok(hash) => hash,
            Err(e) => {
                warn!(build = %name, error = %e, "Failed to fingerprint sources, caching disabled");
                return miss(None);
            }
        };

        let previous = match store.lookup(name) {
            Ok(previous) => previous,
            Err(e) => {
                warn!(build = %name, error = %e, "Failed to read cache record");
                None
            }
        };
        let Some(previous) = previous else {
            debug!(build = %name, "No cache record");
            return miss(Some(hash));
        };

        if self.options.force_refresh {
            info!(build = %name, "Cache refresh forced");
            return miss(Some(hash));
        }
        if previous.hash != hash {
            debug!(build = %name, "Sources changed since cached build");
            return miss(Some(hash));
        }
        if !previous.is_complete() {
            info!(build = %name, "Cached artifacts are missing, rebuilding");
            return miss(Some(hash));
        }
        match self.registry.get(OutputModule::NAME).map(|m| m.configure(ctx)) {
            Some(Ok(())) => CacheCheck {
                hash: Some(hash),
                hit: Some(previous),
            },
            Some(Err(e)) => {
                debug!(build = %name, error = %e, "Output module not configured, cache unusable");
                miss(Some(hash))
            }
            None => miss(Some(hash)),
        }
    }

    fn store_cache(&self, hash: Option<String>, artifacts: &[PathBuf], built_targets: usize) {
        let (Some(store), Some(hash)) = (&self.options.cache, hash) else {
            return;
        };
        let name = &self.config.name;
        if artifacts.is_empty() {
            debug!(build = %name, "Nothing to cache");
            return;
        }
        if built_targets != self.config.targets.len() {
            debug!(build = %name, "Partial target set, cache record not updated");
            return;
        }
        let mut meta = BuildMeta::new(name.clone(), hash);
        match store.store(&mut meta, artifacts) {
            Ok(()) => info!(build = %name, location = %meta.location.display(), "Stored cache record"),
            Err(e) => warn!(build = %name, error = %e, "Failed to store cache record"),
        }
    }
}

fn leaf(module: &ModuleRef, target: Option<Target>, ctx: &BuildContext) -> Job {
    let run_module = module.clone();
    let runner: Runner = Arc::new(move |logger: Logger, target: Option<Target>| {
        let module = run_module.clone();
        async move { module.run_module(&logger, target).await }.boxed()
    });
    let configure_module = module.clone();
    let ctx = ctx.clone();
    Job::leaf(module.name(), target, runner)
        .with_configure(Box::new(move || configure_module.configure(&ctx)))
}

fn chain(target: Target, modules: &[ModuleRef], ctx: &BuildContext) -> Job {
    let mut job = Job::group(target.to_string(), false);
    for module in modules {
        job.add_child(leaf(module, Some(target), ctx));
    }
    job
}

fn fan_out(name: &str, modules: &[ModuleRef], targets: &[Target], ctx: &BuildContext) -> Job {
    let mut job = Job::group(name, true);
    for target in targets {
        job.add_child(chain(*target, modules, ctx));
    }
    job
}

/// Whether `module` transitively requires a module of the phase accepted by
/// `hit`.
fn depends_on(
    module: &ModuleRef,
    by_name: &HashMap<&str, &ModuleRef>,
    hit: &dyn Fn(&ModuleRef) -> bool,
) -> bool {
    module
        .requires()
        .iter()
        .filter_map(|name| by_name.get(name.as_str()).copied())
        .any(|dep| hit(dep) || depends_on(dep, by_name, hit))
}

/// Arrange one phase.
///
/// Agnostic modules that need nothing per-target run first. Per-target
/// modules that only depend on those run in one sequential chain per target,
/// so a failure on one target never holds back another. Whatever waits on an
/// agnostic step that spans targets follows in resolved order: agnostic
/// leaves, and parallel `targets` groups for runs of per-target modules.
/// A phase of per-target modules only is a single parallel job over targets.
fn phase_job(name: &str, modules: &[ModuleRef], targets: &[Target], ctx: &BuildContext) -> Job {
    let by_name: HashMap<&str, &ModuleRef> = modules.iter().map(|m| (m.name(), m)).collect();

    let leading: HashSet<&str> = modules
        .iter()
        .filter(|m| {
            m.target_agnostic() && !depends_on(m, &by_name, &|dep: &ModuleRef| !dep.target_agnostic())
        })
        .map(|m| m.name())
        .collect();
    let chained: Vec<ModuleRef> = modules
        .iter()
        .filter(|m| {
            !m.target_agnostic()
                && !depends_on(m, &by_name, &|dep: &ModuleRef| {
                    dep.target_agnostic() && !leading.contains(dep.name())
                })
        })
        .cloned()
        .collect();
    let in_chain: HashSet<&str> = chained.iter().map(|m| m.name()).collect();
    let rest: Vec<&ModuleRef> = modules
        .iter()
        .filter(|m| !leading.contains(m.name()) && !in_chain.contains(m.name()))
        .collect();

    if leading.is_empty() && rest.is_empty() {
        return fan_out(name, &chained, targets, ctx);
    }

    let mut job = Job::group(name, false);
    for module in modules.iter().filter(|m| leading.contains(m.name())) {
        job.add_child(leaf(module, None, ctx));
    }
    if !chained.is_empty() {
        job.add_child(fan_out("targets", &chained, targets, ctx));
    }

    let mut run: Vec<ModuleRef> = Vec::new();
    for module in rest {
        if module.target_agnostic() {
            if !run.is_empty() {
                job.add_child(fan_out("targets", &run, targets, ctx));
                run.clear();
            }
            job.add_child(leaf(module, None, ctx));
        } else {
            run.push(module.clone());
        }
    }
    if !run.is_empty() {
        job.add_child(fan_out("targets", &run, targets, ctx));
    }
    job
}
