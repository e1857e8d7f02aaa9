// src/pipeline/resolve.rs

use std::collections::HashSet;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::errors::BuildError;
use crate::fs::FileSystem;

/// Result of resolving one specifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    /// Project-relative module path.
    Module(String),
    External(String),
}

/// Maps a specifier found in `from_module` to a module path or an external.
pub trait Resolver: Send + Sync + Debug {
    fn resolve(&self, specifier: &str, from_module: &str) -> Result<Resolved, BuildError>;
}

/// Relative-path resolver over a [`FileSystem`].
///
/// - Specifiers in the externals allow-list resolve to [`Resolved::External`].
/// - `./x` and `../x` are joined with the importing module's directory and
///   tried as-is, then with each extension, then as `x/index<ext>`.
/// - Anything else is not resolvable.
#[derive(Debug, Clone)]
pub struct FsResolver {
    fs: Arc<dyn FileSystem>,
    root: PathBuf,
    extensions: Vec<String>,
    externals: HashSet<String>,
}

impl FsResolver {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        root: impl Into<PathBuf>,
        extensions: Vec<String>,
        externals: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            fs,
            root: root.into(),
            extensions,
            externals: externals.into_iter().collect(),
        }
    }

    fn is_file(&self, rel: &str) -> bool {
        self.fs.is_file(&self.root.join(rel))
    }

    fn candidates(&self, base: &str) -> Vec<String> {
        let mut out = Vec::with_capacity(2 * self.extensions.len() + 1);
        out.push(base.to_string());
        for ext in &self.extensions {
            out.push(format!("{base}{ext}"));
        }
        for ext in &self.extensions {
            out.push(format!("{base}/index{ext}"));
        }
        out
    }
}

impl Resolver for FsResolver {
    fn resolve(&self, specifier: &str, from_module: &str) -> Result<Resolved, BuildError> {
        let unresolved = || BuildError::Resolution {
            specifier: specifier.to_string(),
            from_module: from_module.to_string(),
        };

        if self.externals.contains(specifier) {
            return Ok(Resolved::External(specifier.to_string()));
        }

        if !(specifier.starts_with("./") || specifier.starts_with("../")) {
            return Err(unresolved());
        }

        let dir = Path::new(from_module)
            .parent()
            .map(|p| p.to_string_lossy().replace('\\', "/"))
            .unwrap_or_default();
        let joined = if dir.is_empty() {
            specifier.to_string()
        } else {
            format!("{dir}/{specifier}")
        };
        let base = normalize(&joined).ok_or_else(unresolved)?;

        self.candidates(&base)
            .into_iter()
            .find(|c| self.is_file(c))
            .map(Resolved::Module)
            .ok_or_else(unresolved)
    }
}

/// Lexically collapse `.` and `..` segments. `None` if the path climbs above
/// the project root.
pub fn normalize(path: &str) -> Option<String> {
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }
    Some(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    fn resolver(fs: &MockFileSystem) -> FsResolver {
        FsResolver::new(
            Arc::new(fs.clone()),
            "/project",
            vec![".js".into(), ".jsx".into()],
            vec!["react".to_string()],
        )
    }

    #[test]
    fn tries_extensions_then_index() {
        let fs = MockFileSystem::new();
        fs.add_file("/project/js/util.jsx", "");
        fs.add_file("/project/js/components/index.js", "");
        let r = resolver(&fs);

        assert_eq!(
            r.resolve("./util", "js/app.js"),
            Ok(Resolved::Module("js/util.jsx".into()))
        );
        assert_eq!(
            r.resolve("../components", "js/lib/x.js"),
            Ok(Resolved::Module("js/components/index.js".into()))
        );
    }

    #[test]
    fn externals_and_unknown_bare_names() {
        let fs = MockFileSystem::new();
        let r = resolver(&fs);

        assert_eq!(
            r.resolve("react", "js/app.js"),
            Ok(Resolved::External("react".into()))
        );
        assert_eq!(
            r.resolve("lodash", "js/app.js"),
            Err(BuildError::Resolution {
                specifier: "lodash".into(),
                from_module: "js/app.js".into(),
            })
        );
    }

    #[test]
    fn normalize_rejects_escaping_root() {
        assert_eq!(normalize("js/./a/../b.js").as_deref(), Some("js/b.js"));
        assert_eq!(normalize("../outside.js"), None);
    }
}
