//! Per-run scratch area.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::{RunId, Target};

/// Scratch directories for one run, plus the artifacts the run produced.
///
/// Layout: `<root>/<target>/<module>/...`. Steps bound to no target use
/// `<root>` directly.
#[derive(Debug)]
pub struct Workspace {
    id: RunId,
    root: PathBuf,
    artifacts: Mutex<Vec<PathBuf>>,
}

impl Workspace {
    /// A workspace under `<base>/crossbuild/<run id>`.
    pub fn new(base: &Path) -> Self {
        let id = RunId::new();
        Self {
            id,
            root: base.join("crossbuild").join(id.to_string()),
            artifacts: Mutex::new(Vec::new()),
        }
    }

    /// A workspace under the system temporary directory.
    pub fn temp() -> Self {
        Self::new(&std::env::temp_dir())
    }

    pub fn id(&self) -> RunId {
        self.id
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn target_dir(&self, target: Option<Target>) -> PathBuf {
        match target {
            Some(target) => self.root.join(target.to_string()),
            None => self.root.clone(),
        }
    }

    pub fn module_dir(&self, target: Option<Target>, module: &str) -> PathBuf {
        self.target_dir(target).join(module)
    }

    /// Remember a file as a final output of the run.
    pub fn record_artifact(&self, path: PathBuf) {
        let mut artifacts = self.artifacts.lock().unwrap_or_else(PoisonError::into_inner);
        if !artifacts.contains(&path) {
            artifacts.push(path);
        }
    }

    pub fn artifacts(&self) -> Vec<PathBuf> {
        self.artifacts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
