// src/watch/path_utils.rs

//! Utility functions for path handling in the watcher.

use std::path::Path;

/// Convert a path into a string relative to `root`, with forward slashes.
///
/// Tries a direct `strip_prefix(root)` first. Event paths may use a
/// different absolute prefix for the same directory (symlinks,
/// `/private/var/...` on macOS), so both sides are canonicalized on a second
/// attempt. A removed file cannot be canonicalized; its parent is used
/// instead.
///
/// Returns `None` for paths outside `root` and for `root` itself.
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    if let Ok(rel) = path.strip_prefix(root) {
        return to_project_str(rel);
    }

    let root_canon = root.canonicalize().ok()?;
    let path_canon = match path.canonicalize() {
        Ok(p) => p,
        Err(_) => {
            let parent = path.parent()?.canonicalize().ok()?;
            parent.join(path.file_name()?)
        }
    };

    let rel = path_canon.strip_prefix(&root_canon).ok()?;
    to_project_str(rel)
}

fn to_project_str(rel: &Path) -> Option<String> {
    let s = rel.to_string_lossy().replace('\\', "/");
    if s.is_empty() { None } else { Some(s) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn strips_root_prefix() {
        let root = PathBuf::from("/project");
        assert_eq!(
            relative_str(&root, &root.join("js").join("app.js")).as_deref(),
            Some("js/app.js")
        );
        assert_eq!(relative_str(&root, &root), None);
    }

    #[test]
    fn removed_file_relativizes_through_parent() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("deleted.js");
        let root = dir.path().canonicalize().unwrap();

        assert_eq!(relative_str(&root, &gone).as_deref(), Some("deleted.js"));
    }
}
