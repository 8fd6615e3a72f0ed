//! The job tree.
//!
//! A job is either a leaf that runs one module for one target, or a
//! composite whose children run one after another or all at once. Status is
//! kept in an atomic so the progress reporter can read it while execution
//! tasks write it.

use async_recursion::async_recursion;
use crossbuild_core::{Logger, Target};
use futures::FutureExt;
use futures::future::BoxFuture;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use tokio::task::JoinSet;
use tracing::error;

/// Work performed by a leaf job.
pub type Runner = Arc<dyn Fn(Logger, Option<Target>) -> BoxFuture<'static, bool> + Send + Sync>;

/// Hook run by a leaf immediately before its runner; an error fails the leaf.
pub type ConfigureHook = Box<dyn Fn() -> crossbuild_core::Result<()> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum JobStatus {
    Pending = 0,
    Running = 1,
    Completed = 2,
    Failed = 3,
}

impl JobStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => JobStatus::Pending,
            1 => JobStatus::Running,
            2 => JobStatus::Completed,
            _ => JobStatus::Failed,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, JobStatus::Completed)
    }
}

pub struct Job {
    name: String,
    target: Option<Target>,
    parallel: bool,
    children: Vec<Arc<Job>>,
    runner: Option<Runner>,
    configure: Option<ConfigureHook>,
    status: AtomicU8,
}

impl Job {
    /// A composite job; `parallel` runs its children concurrently.
    pub fn group(name: impl Into<String>, parallel: bool) -> Self {
        Self {
            name: name.into(),
            target: None,
            parallel,
            children: Vec::new(),
            runner: None,
            configure: None,
            status: AtomicU8::new(JobStatus::Pending as u8),
        }
    }

    pub fn leaf(name: impl Into<String>, target: Option<Target>, runner: Runner) -> Self {
        Self {
            target,
            runner: Some(runner),
            ..Self::group(name, false)
        }
    }

    pub fn with_configure(mut self, configure: ConfigureHook) -> Self {
        self.configure = Some(configure);
        self
    }

    pub fn with_child(mut self, child: Job) -> Self {
        self.add_child(child);
        self
    }

    pub fn add_child(&mut self, child: Job) {
        self.children.push(Arc::new(child));
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> Option<Target> {
        self.target
    }

    pub fn is_parallel(&self) -> bool {
        self.parallel
    }

    pub fn children(&self) -> &[Arc<Job>] {
        &self.children
    }

    pub fn is_leaf(&self) -> bool {
        self.runner.is_some()
    }

    pub fn status(&self) -> JobStatus {
        JobStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    fn transition(&self, from: JobStatus, to: JobStatus) -> bool {
        self.status
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Run the job and its children. Returns whether it completed.
    ///
    /// A job runs at most once; later calls report the recorded outcome.
    #[async_recursion]
    pub async fn run(&self, logger: &Logger) -> bool {
        if !self.transition(JobStatus::Pending, JobStatus::Running) {
            return self.status().is_success();
        }
        let logger = logger.child(&self.name);

        let ok = if let Some(runner) = &self.runner {
            self.run_leaf(runner, &logger).await
        } else if self.parallel {
            self.run_parallel(&logger).await
        } else {
            self.run_sequential(&logger).await
        };

        let outcome = if ok {
            JobStatus::Completed
        } else {
            JobStatus::Failed
        };
        self.transition(JobStatus::Running, outcome);
        ok
    }

    async fn run_leaf(&self, runner: &Runner, logger: &Logger) -> bool {
        if let Some(configure) = &self.configure {
            if let Err(e) = configure() {
                logger.error(e);
                return false;
            }
        }
        match AssertUnwindSafe(runner(logger.clone(), self.target))
            .catch_unwind()
            .await
        {
            Ok(ok) => ok,
            Err(_) => {
                logger.error("module panicked");
                false
            }
        }
    }

    async fn run_parallel(&self, logger: &Logger) -> bool {
        let mut tasks = JoinSet::new();
        for child in &self.children {
            let child = child.clone();
            let logger = logger.clone();
            tasks.spawn(async move { child.run(&logger).await });
        }

        let mut ok = true;
        while let Some(result) = tasks.join_next().await {
            match result {
                Ok(child_ok) => ok &= child_ok,
                Err(e) => {
                    error!(job = %self.name, error = %e, "Job task failed");
                    ok = false;
                }
            }
        }
        ok
    }

    async fn run_sequential(&self, logger: &Logger) -> bool {
        for child in &self.children {
            if !child.run(logger).await {
                return false;
            }
        }
        true
    }

    /// `/`-separated paths of the leaves that failed.
    pub fn failed_leaves(&self) -> Vec<String> {
        let mut failed = Vec::new();
        self.collect_failed(None, &mut failed);
        failed
    }

    fn collect_failed(&self, prefix: Option<&str>, failed: &mut Vec<String>) {
        let path = match prefix {
            Some(prefix) => format!("{prefix}/{}", self.name),
            None => self.name.clone(),
        };
        if self.children.is_empty() {
            if self.status() == JobStatus::Failed {
                failed.push(path);
            }
            return;
        }
        for child in &self.children {
            child.collect_failed(Some(&path), failed);
        }
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("name", &self.name)
            .field("target", &self.target)
            .field("parallel", &self.parallel)
            .field("status", &self.status())
            .field("children", &self.children)
            .finish()
    }
}
