// src/bundle/assembler.rs

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::bundle::sourcemap::{SourceMap, SourceMapFragment};
use crate::errors::BuildError;
use crate::fs::FileSystem;
use crate::pipeline::resolve::Resolved;

/// Module loader wrapped around the concatenated modules. Externals fall back
/// to the host `require` when one exists.
const PRELUDE: &str = r#"(function (modules, entry) {
  var cache = {};
  var hostRequire = typeof require === "function" ? require : null;
  function load(id) {
    if (cache[id]) return cache[id].exports;
    var module = (cache[id] = { exports: {} });
    var def = modules[id];
    def[0].call(module.exports, function (specifier) {
      var target = def[1][specifier];
      if (typeof target === "number") return load(target);
      if (hostRequire) return hostRequire(target);
      throw new Error("Cannot find module '" + specifier + "'");
    }, module, module.exports);
    return module.exports;
  }
  load(entry);
})({"#;

/// One module ready for concatenation.
#[derive(Debug, Clone)]
pub struct TransformedModule {
    pub path: String,
    pub code: String,
    /// `(specifier, target)` in specifier order.
    pub deps: Vec<(String, Resolved)>,
    pub map: Option<SourceMapFragment>,
}

/// Where a module's code landed in the bundle. Lines are zero-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSpan {
    pub path: String,
    pub start_line: u32,
    pub line_count: u32,
}

#[derive(Debug, Clone)]
pub struct BundleArtifact {
    pub code: String,
    pub source_map: Option<SourceMap>,
    /// Module paths in bundle order; the entry is last.
    pub modules: Vec<String>,
    pub spans: Vec<ModuleSpan>,
}

/// Where and how the bundle is written.
#[derive(Debug, Clone)]
pub struct SinkConfig {
    /// Output path relative to the project root.
    pub output: String,
    pub source_map: bool,
}

impl SinkConfig {
    pub fn map_output(&self) -> String {
        format!("{}.map", self.output)
    }
}

/// Concatenates transformed modules and writes the result.
///
/// The sink is only ever written here, each file through
/// [`FileSystem::write_atomic`].
#[derive(Debug, Clone)]
pub struct BundleAssembler {
    fs: Arc<dyn FileSystem>,
    root: PathBuf,
    sink: SinkConfig,
}

impl BundleAssembler {
    pub fn new(fs: Arc<dyn FileSystem>, root: impl Into<PathBuf>, sink: SinkConfig) -> Self {
        Self {
            fs,
            root: root.into(),
            sink,
        }
    }

    pub fn sink(&self) -> &SinkConfig {
        &self.sink
    }

    /// Merge `ordered` (dependency-first, entry last) into one artifact.
    ///
    /// The map is produced only when the sink asks for one and at least one
    /// module carries a fragment.
    pub fn assemble(&self, ordered: &[TransformedModule]) -> BundleArtifact {
        let index: HashMap<&str, usize> = ordered
            .iter()
            .enumerate()
            .map(|(i, m)| (m.path.as_str(), i))
            .collect();

        let want_map = self.sink.source_map && ordered.iter().any(|m| m.map.is_some());
        let file_name = Path::new(&self.sink.output)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.sink.output.clone());
        let mut map = want_map.then(|| SourceMap::new(file_name.clone()));

        let mut code = String::from(PRELUDE);
        code.push('\n');
        let mut line = PRELUDE.lines().count() as u32;
        let mut spans = Vec::with_capacity(ordered.len());

        for (id, module) in ordered.iter().enumerate() {
            code.push_str(&format!("{id}: [function (require, module, exports) {{\n"));
            line += 1;

            let body = module.code.trim_end_matches('\n');
            let line_count = if body.is_empty() {
                0
            } else {
                body.lines().count() as u32
            };
            if line_count > 0 {
                code.push_str(body);
                code.push('\n');
            }

            if let (Some(map), Some(fragment)) = (map.as_mut(), module.map.as_ref()) {
                map.push_fragment(fragment, line, line_count);
            }
            spans.push(ModuleSpan {
                path: module.path.clone(),
                start_line: line,
                line_count,
            });
            line += line_count;

            code.push_str(&format!("}}, {}],\n", deps_object(&module.deps, &index)));
            line += 1;
        }

        code.push_str(&format!("}}, {});\n", ordered.len().saturating_sub(1)));
        if map.is_some() {
            code.push_str(&format!("//# sourceMappingURL={file_name}.map\n"));
        }

        debug!(modules = ordered.len(), lines = line + 1, "assembled bundle");

        BundleArtifact {
            code,
            source_map: map,
            modules: ordered.iter().map(|m| m.path.clone()).collect(),
            spans,
        }
    }

    /// Write the script and then its map (if any).
    ///
    /// Each file is replaced atomically. The map is serialized before anything
    /// is written, and a failed script write leaves the previous map alone.
    pub fn write(&self, artifact: &BundleArtifact) -> Result<(), BuildError> {
        let map_rel = self.sink.map_output();
        let map_json = match &artifact.source_map {
            Some(map) => Some(map.to_json().map_err(|e| BuildError::SinkWrite {
                path: map_rel.clone(),
                cause: e.to_string(),
            })?),
            None => None,
        };

        self.write_file(&self.sink.output, artifact.code.as_bytes())?;
        if let Some(json) = map_json {
            self.write_file(&map_rel, json.as_bytes())?;
        }

        info!(output = %self.sink.output, modules = artifact.modules.len(), "bundle written");
        Ok(())
    }

    fn write_file(&self, rel: &str, bytes: &[u8]) -> Result<(), BuildError> {
        self.fs
            .write_atomic(&self.root.join(rel), bytes)
            .map_err(|e| BuildError::SinkWrite {
                path: rel.to_string(),
                cause: format!("{e:#}"),
            })
    }
}

fn deps_object(deps: &[(String, Resolved)], index: &HashMap<&str, usize>) -> Value {
    let mut obj = Map::new();
    for (specifier, target) in deps {
        let value = match target {
            Resolved::Module(path) => match index.get(path.as_str()) {
                Some(i) => Value::from(*i),
                None => Value::from(path.as_str()),
            },
            Resolved::External(name) => Value::from(name.as_str()),
        };
        obj.insert(specifier.clone(), value);
    }
    Value::Object(obj)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::RealFileSystem;
    use crate::fs::mock::MockFileSystem;

    fn module(path: &str, code: &str, deps: Vec<(&str, Resolved)>) -> TransformedModule {
        TransformedModule {
            path: path.to_string(),
            code: code.to_string(),
            deps: deps
                .into_iter()
                .map(|(s, r)| (s.to_string(), r))
                .collect(),
            map: Some(SourceMapFragment::line_identity(path, code, code)),
        }
    }

    fn assembler(fs: &MockFileSystem, source_map: bool) -> BundleAssembler {
        BundleAssembler::new(
            Arc::new(fs.clone()),
            "/project",
            SinkConfig {
                output: "lib/bundle.js".into(),
                source_map,
            },
        )
    }

    #[test]
    fn spans_and_map_line_up_with_code() {
        let fs = MockFileSystem::new();
        let modules = vec![
            module("js/util.js", "exports.x = 1;\nexports.y = 2;", vec![]),
            module(
                "js/app.js",
                "var u = require('./util');\nvar r = require('react');\n",
                vec![
                    ("./util", Resolved::Module("js/util.js".into())),
                    ("react", Resolved::External("react".into())),
                ],
            ),
        ];
        let artifact = assembler(&fs, true).assemble(&modules);
        let lines: Vec<&str> = artifact.code.lines().collect();

        for span in &artifact.spans {
            let first = modules
                .iter()
                .find(|m| m.path == span.path)
                .and_then(|m| m.code.lines().next())
                .unwrap();
            assert_eq!(lines[span.start_line as usize], first);
        }

        let map = artifact.source_map.as_ref().unwrap();
        let app = &artifact.spans[1];
        assert_eq!(map.lookup(app.start_line + 1), Some(("js/app.js", 1)));
        assert!(artifact.code.contains(r#"}, {"./util":0,"react":"react"}],"#));
        assert!(artifact.code.contains("}, 1);"));
        assert!(artifact.code.ends_with("//# sourceMappingURL=bundle.js.map\n"));
    }

    #[test]
    fn write_puts_script_before_map() {
        let fs = MockFileSystem::new();
        let a = assembler(&fs, true);
        let artifact = a.assemble(&[module("js/app.js", "1;", vec![])]);
        a.write(&artifact).unwrap();

        assert_eq!(
            fs.written_paths(),
            vec![
                PathBuf::from("/project/lib/bundle.js"),
                PathBuf::from("/project/lib/bundle.js.map"),
            ]
        );
        assert_eq!(fs.contents("/project/lib/bundle.js"), Some(artifact.code));
    }

    #[test]
    fn failed_script_write_keeps_previous_map() {
        let dir = tempfile::tempdir().unwrap();
        let lib = dir.path().join("lib");
        // A directory where the script should go makes the replace fail.
        std::fs::create_dir_all(lib.join("bundle.js")).unwrap();
        std::fs::write(lib.join("bundle.js.map"), "previous").unwrap();

        let a = BundleAssembler::new(
            Arc::new(RealFileSystem),
            dir.path(),
            SinkConfig {
                output: "lib/bundle.js".into(),
                source_map: true,
            },
        );
        let artifact = a.assemble(&[module("js/app.js", "1;", vec![])]);

        match a.write(&artifact) {
            Err(BuildError::SinkWrite { path, .. }) => assert_eq!(path, "lib/bundle.js"),
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(
            std::fs::read_to_string(lib.join("bundle.js.map")).unwrap(),
            "previous"
        );
    }

    #[test]
    fn trailing_blank_lines_do_not_leak_onto_wrapper_lines() {
        let fs = MockFileSystem::new();
        let modules = vec![
            module("js/a.js", "exports.a = 1;\n\n\n", vec![]),
            module("js/b.js", "exports.b = 2;\n", vec![]),
        ];
        let artifact = assembler(&fs, true).assemble(&modules);
        let map = artifact.source_map.as_ref().unwrap();

        let mapped: Vec<u32> = map.mappings.iter().map(|m| m.gen_line).collect();
        let body_lines: Vec<u32> = artifact
            .spans
            .iter()
            .flat_map(|span| span.start_line..span.start_line + span.line_count)
            .collect();
        assert_eq!(mapped, body_lines);

        let lines: Vec<&str> = artifact.code.lines().collect();
        for m in &map.mappings {
            assert!(lines[m.gen_line as usize].starts_with("exports."));
        }
    }

    #[test]
    fn no_map_without_fragments_or_when_disabled() {
        let fs = MockFileSystem::new();
        let artifact = assembler(&fs, false).assemble(&[module("js/app.js", "1;", vec![])]);
        assert!(artifact.source_map.is_none());
        assert!(!artifact.code.contains("sourceMappingURL"));
    }
}
