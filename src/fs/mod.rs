// src/fs/mod.rs

//! Filesystem seam used by the pipeline, the tools and the artifact sink.

use std::fmt::Debug;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::GlobSet;

pub mod mock;

/// Abstract filesystem interface.
pub trait FileSystem: Send + Sync + Debug {
    fn read_to_string(&self, path: &Path) -> Result<String>;
    fn write(&self, path: &Path, contents: &[u8]) -> Result<()>;

    /// Replace `path` so that readers observe either the previous contents or
    /// the complete new contents, never a partial file.
    fn write_atomic(&self, path: &Path, contents: &[u8]) -> Result<()>;

    /// Remove a file. Returns `false` if it did not exist.
    fn remove_file(&self, path: &Path) -> Result<bool>;
    fn exists(&self, path: &Path) -> bool;
    fn is_file(&self, path: &Path) -> bool;
    fn is_dir(&self, path: &Path) -> bool;

    /// Return a list of entries in a directory.
    /// Returns full paths.
    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>>;
}

/// Implementation that uses `std::fs`.
#[derive(Debug, Clone, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).with_context(|| format!("reading file {:?}", path))
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        ensure_parent(path)?;
        let mut file = fs::File::create(path).with_context(|| format!("creating file {:?}", path))?;
        file.write_all(contents).with_context(|| format!("writing to file {:?}", path))?;
        Ok(())
    }

    fn write_atomic(&self, path: &Path, contents: &[u8]) -> Result<()> {
        ensure_parent(path)?;

        let temp_path = temp_sibling(path);
        {
            let mut file = fs::File::create(&temp_path)
                .with_context(|| format!("creating temporary file {:?}", temp_path))?;
            if let Err(e) = file.write_all(contents).and_then(|_| file.sync_all()) {
                let _ = fs::remove_file(&temp_path);
                return Err(e).with_context(|| format!("writing temporary file {:?}", temp_path));
            }
        }

        fs::rename(&temp_path, path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            anyhow::Error::new(e).context(format!("replacing {:?}", path))
        })
    }

    fn remove_file(&self, path: &Path) -> Result<bool> {
        match fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).with_context(|| format!("removing {:?}", path)),
        }
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(path).with_context(|| format!("reading dir {:?}", path))? {
            let entry = entry?;
            entries.push(entry.path());
        }
        Ok(entries)
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).with_context(|| format!("creating dir {:?}", parent))?;
        }
    }
    Ok(())
}

/// `lib/bundle.js` -> `lib/.bundle.js.tmp`
fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "artifact".to_string());
    path.with_file_name(format!(".{name}.tmp"))
}

/// Collect project-relative paths (forward slashes, sorted) of every file
/// under `root` matching `include` and not matching `exclude`.
pub fn collect_matching_files(
    fs: &dyn FileSystem,
    root: &Path,
    include: &GlobSet,
    exclude: Option<&GlobSet>,
) -> Result<Vec<String>> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        for path in fs.read_dir(&dir)? {
            if fs.is_dir(&path) {
                stack.push(path);
            } else if fs.is_file(&path) {
                if let Ok(rel) = path.strip_prefix(root) {
                    let rel_str = rel.to_string_lossy().replace('\\', "/");
                    let excluded = exclude.is_some_and(|set| set.is_match(&rel_str));
                    if include.is_match(&rel_str) && !excluded {
                        files.push(rel_str);
                    }
                }
            }
        }
    }

    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_write_replaces_existing_file() {
        let dir = std::env::temp_dir().join(format!("spabuild-fs-{}", std::process::id()));
        let target = dir.join("out").join("bundle.js");
        let fs = RealFileSystem;

        fs.write_atomic(&target, b"first").unwrap();
        fs.write_atomic(&target, b"second").unwrap();

        assert_eq!(fs.read_to_string(&target).unwrap(), "second");
        assert!(!temp_sibling(&target).exists());

        assert!(fs.remove_file(&target).unwrap());
        assert!(!fs.remove_file(&target).unwrap());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
