//! Source fingerprinting.
//!
//! The fingerprint covers file paths and sizes, not contents: every file
//! contributes `H(relative path) ++ H(size)`, each include directory is
//! hashed over its files in lexical order, and the final value is the hash
//! of the per-directory digests. `H` is hex-encoded SHA-256.

use sha2::{Digest, Sha256};
use std::path::{Component, Path};
use walkdir::WalkDir;

use crate::{CacheError, CacheResult};

fn digest(data: impl AsRef<[u8]>) -> String {
    hex::encode(Sha256::digest(data.as_ref()))
}

/// Fingerprint the files under `root/<dir>` for every entry of `dirs`.
///
/// `exclude` names one file to leave out, typically the version file that
/// the build itself rewrites.
pub fn fingerprint<P: AsRef<Path>>(
    root: &Path,
    dirs: &[P],
    exclude: Option<&Path>,
) -> CacheResult<String> {
    let mut combined = String::new();
    for dir in dirs {
        combined.push_str(&hash_dir(root, &root.join(dir), exclude)?);
    }
    Ok(digest(combined))
}

fn hash_dir(root: &Path, dir: &Path, exclude: Option<&Path>) -> CacheResult<String> {
    let mut concat = String::new();

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| CacheError::Walk {
            path: dir.to_path_buf(),
            message: e.to_string(),
        })?;
        if !entry.file_type().is_file() || exclude.is_some_and(|ex| ex == entry.path()) {
            continue;
        }

        let size = entry
            .metadata()
            .map_err(|e| CacheError::Walk {
                path: entry.path().to_path_buf(),
                message: e.to_string(),
            })?
            .len();
        let rel = relative_key(root, entry.path());
        concat.push_str(&digest(rel));
        concat.push_str(&digest(size.to_string()));
    }

    Ok(digest(concat))
}

/// `/`-separated path of `path` below `root`, stable across platforms.
fn relative_key(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
