//! File helpers shared by the modules.

use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Regular files directly inside `dir`, sorted by name.
/// A missing directory yields no files.
pub(crate) async fn files_in(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// Copy `src` into `dest_dir`, keeping its file name. Returns the new path.
pub(crate) async fn copy_into(src: &Path, dest_dir: &Path) -> io::Result<PathBuf> {
    let name = src.file_name().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} has no file name", src.display()),
        )
    })?;
    fs::create_dir_all(dest_dir).await?;
    let dest = dest_dir.join(name);
    fs::copy(src, &dest).await?;
    Ok(dest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_files_in_sorted_and_skips_dirs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b"), "").unwrap();
        std::fs::write(dir.path().join("a"), "").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        let files = files_in(dir.path()).await.unwrap();
        assert_eq!(files, vec![dir.path().join("a"), dir.path().join("b")]);
        assert!(files_in(&dir.path().join("missing")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_copy_into_creates_destination() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("bin");
        std::fs::write(&src, "data").unwrap();

        let dest = copy_into(&src, &dir.path().join("out/deep")).await.unwrap();
        assert_eq!(dest, dir.path().join("out/deep/bin"));
        assert_eq!(std::fs::read_to_string(dest).unwrap(), "data");
    }
}
