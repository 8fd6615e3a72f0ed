//! Single-slot build record store.
//!
//! Layout: `<cache root>/<build name>/meta.json` next to copies of the
//! artifacts the build produced.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::{CacheError, CacheResult};

/// Environment variable overriding the cache root.
pub const CACHE_DIR_ENV: &str = "CROSSBUILD_CACHE_DIR";

const META_FILE: &str = "meta.json";

/// Record of the last successful build of one build name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildMeta {
    pub build_time: DateTime<Utc>,
    pub build_name: String,
    /// Source fingerprint the build was produced from.
    pub hash: String,
    /// File names of the cached artifacts, relative to `location`.
    pub objects: Vec<String>,
    /// Directory holding the record; set on lookup and store.
    #[serde(skip)]
    pub location: PathBuf,
}

impl BuildMeta {
    pub fn new(build_name: impl Into<String>, hash: impl Into<String>) -> Self {
        Self {
            build_time: Utc::now(),
            build_name: build_name.into(),
            hash: hash.into(),
            objects: Vec::new(),
            location: PathBuf::new(),
        }
    }

    pub fn object_paths(&self) -> Vec<PathBuf> {
        self.objects.iter().map(|o| self.location.join(o)).collect()
    }

    /// Whether every cached artifact is still present on disk.
    pub fn is_complete(&self) -> bool {
        self.object_paths().iter().all(|p| p.is_file())
    }
}

#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
}

impl CacheStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `$CROSSBUILD_CACHE_DIR`, else the platform cache directory.
    pub fn open_default() -> CacheResult<Self> {
        if let Some(dir) = std::env::var_os(CACHE_DIR_ENV).filter(|d| !d.is_empty()) {
            return Ok(Self::new(dir));
        }
        dirs::cache_dir()
            .map(|dir| Self::new(dir.join("crossbuild")))
            .ok_or(CacheError::NoCacheDir)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn slot(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// The record stored for `name`, or `None` if there is none.
    pub fn lookup(&self, name: &str) -> CacheResult<Option<BuildMeta>> {
        let location = self.slot(name);
        let path = location.join(META_FILE);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut meta: BuildMeta =
            serde_json::from_str(&text).map_err(|source| CacheError::Corrupt {
                path: path.clone(),
                source,
            })?;
        meta.location = location;
        Ok(Some(meta))
    }

    /// Replace the record for `meta.build_name` with `meta` and copies of
    /// `artifacts`. Fills in `meta.objects` and `meta.location`.
    pub fn store(&self, meta: &mut BuildMeta, artifacts: &[PathBuf]) -> CacheResult<()> {
        let mut objects = Vec::with_capacity(artifacts.len());
        for artifact in artifacts {
            let name = artifact
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| CacheError::InvalidArtifact(artifact.clone()))?;
            if objects.contains(&name) {
                return Err(CacheError::Collision(name));
            }
            objects.push(name);
        }

        let location = self.slot(&meta.build_name);
        if location.exists() {
            fs::remove_dir_all(&location)?;
        }
        fs::create_dir_all(&location)?;

        for (artifact, name) in artifacts.iter().zip(&objects) {
            fs::copy(artifact, location.join(name))?;
        }

        meta.objects = objects;
        meta.location = location.clone();
        fs::write(
            location.join(META_FILE),
            serde_json::to_string_pretty(&*meta)?,
        )?;
        debug!(build = %meta.build_name, objects = meta.objects.len(), "Stored cache record");
        Ok(())
    }

    /// Remove the record for `name`, or every record when `name` is `None`.
    /// Returns whether anything was removed.
    pub fn clear(&self, name: Option<&str>) -> CacheResult<bool> {
        let target = match name {
            Some(name) => self.slot(name),
            None => self.root.clone(),
        };
        if !target.exists() {
            return Ok(false);
        }
        fs::remove_dir_all(&target)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_lookup_without_record() {
        let cache = tempfile::tempdir().unwrap();
        let store = CacheStore::new(cache.path());
        assert!(store.lookup("app").unwrap().is_none());
    }

    #[test]
    fn test_store_then_lookup() {
        let cache = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let store = CacheStore::new(cache.path());
        let files = vec![
            artifact(work.path(), "app-linux_amd64", "elf"),
            artifact(work.path(), "app-windows_amd64.exe", "pe"),
        ];

        let mut meta = BuildMeta::new("app", "abc");
        store.store(&mut meta, &files).unwrap();

        let found = store.lookup("app").unwrap().unwrap();
        assert_eq!(found.hash, "abc");
        assert_eq!(found.objects, vec!["app-linux_amd64", "app-windows_amd64.exe"]);
        assert_eq!(found.location, cache.path().join("app"));
        assert!(found.is_complete());
        assert_eq!(
            fs::read_to_string(&found.object_paths()[1]).unwrap(),
            "pe"
        );
    }

    #[test]
    fn test_store_replaces_previous_record() {
        let cache = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let store = CacheStore::new(cache.path());

        let old = artifact(work.path(), "old-bin", "1");
        store.store(&mut BuildMeta::new("app", "h1"), &[old]).unwrap();
        let new = artifact(work.path(), "new-bin", "2");
        store.store(&mut BuildMeta::new("app", "h2"), &[new]).unwrap();

        let found = store.lookup("app").unwrap().unwrap();
        assert_eq!(found.hash, "h2");
        assert_eq!(found.objects, vec!["new-bin"]);
        assert!(!cache.path().join("app/old-bin").exists());
    }

    #[test]
    fn test_missing_object_is_incomplete() {
        let cache = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let store = CacheStore::new(cache.path());
        let file = artifact(work.path(), "bin", "x");
        store.store(&mut BuildMeta::new("app", "h"), &[file]).unwrap();

        fs::remove_file(cache.path().join("app/bin")).unwrap();
        assert!(!store.lookup("app").unwrap().unwrap().is_complete());
    }

    #[test]
    fn test_colliding_artifact_names() {
        let cache = tempfile::tempdir().unwrap();
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        let store = CacheStore::new(cache.path());
        let files = vec![artifact(a.path(), "bin", "a"), artifact(b.path(), "bin", "b")];

        let err = store.store(&mut BuildMeta::new("app", "h"), &files).unwrap_err();
        assert!(matches!(err, CacheError::Collision(name) if name == "bin"));
    }

    #[test]
    fn test_corrupt_record() {
        let cache = tempfile::tempdir().unwrap();
        fs::create_dir_all(cache.path().join("app")).unwrap();
        fs::write(cache.path().join("app/meta.json"), "{not json").unwrap();

        let err = CacheStore::new(cache.path()).lookup("app").unwrap_err();
        assert!(matches!(err, CacheError::Corrupt { .. }));
    }

    #[test]
    fn test_clear() {
        let cache = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let store = CacheStore::new(cache.path().join("root"));
        let file = artifact(work.path(), "bin", "x");
        store.store(&mut BuildMeta::new("a", "h"), &[file.clone()]).unwrap();
        store.store(&mut BuildMeta::new("b", "h"), &[file]).unwrap();

        assert!(store.clear(Some("a")).unwrap());
        assert!(!store.clear(Some("a")).unwrap());
        assert!(store.lookup("b").unwrap().is_some());

        assert!(store.clear(None).unwrap());
        assert!(store.lookup("b").unwrap().is_none());
    }
}
