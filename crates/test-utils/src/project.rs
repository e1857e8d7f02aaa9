use std::path::{Path, PathBuf};
use std::sync::Arc;

use spabuild::config::ConfigFile;
use spabuild::engine::Generation;
use spabuild::exec::BuildActions;
use spabuild::fs::FileSystem;
use spabuild::fs::mock::MockFileSystem;
use spabuild::pipeline::{ModuleGraphCache, TransformPipeline};
use spabuild::types::BuildVariant;

/// In-memory project rooted at `/project`.
#[derive(Debug, Clone)]
pub struct ProjectFixture {
    pub fs: MockFileSystem,
    pub root: PathBuf,
}

impl ProjectFixture {
    pub fn new() -> Self {
        Self {
            fs: MockFileSystem::new(),
            root: PathBuf::from("/project"),
        }
    }

    /// Add or replace a project-relative file.
    pub fn file(&self, rel: &str, contents: &str) -> &Self {
        self.fs.add_file(self.root.join(rel), contents);
        self
    }

    pub fn read(&self, rel: &str) -> Option<String> {
        self.fs.contents(self.root.join(rel))
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn fs_arc(&self) -> Arc<dyn FileSystem> {
        Arc::new(self.fs.clone())
    }

    pub fn pipeline(&self, cfg: &ConfigFile, cache: Arc<ModuleGraphCache>) -> TransformPipeline {
        TransformPipeline::from_config(cfg, self.fs_arc(), &self.root, cache)
    }

    pub fn actions(&self, cfg: &ConfigFile, variant: BuildVariant) -> BuildActions {
        BuildActions::from_config(
            cfg,
            &self.root,
            variant,
            self.fs_arc(),
            Arc::new(ModuleGraphCache::new()),
            Generation::new(),
        )
        .expect("actions from a valid config")
    }

    /// A small app: entry, a component, a shared util (required twice),
    /// an external, a stylesheet and a template.
    pub fn sample_app() -> Self {
        let project = Self::new();
        project
            .file(
                "js/app.js",
                "const React = require('react');\nconst header = require('./header');\nconst util = require('./util');\nmodule.exports = header(util.name);\n",
            )
            .file(
                "js/header.js",
                "const util = require('./util');\nmodule.exports = (n) => util.shout(n);\n",
            )
            .file(
                "js/util.js",
                "exports.name = process.env.APP_NAME;\nexports.shout = (s) => s + '!';\n",
            )
            .file("sass/main.scss", "$pad: 4px;\n.app { .title { padding: $pad; } }\n")
            .file(
                "index-template.html",
                "<script src=\"{{ script }}\"></script><!-- {{ environment }} -->\n",
            );
        project
    }
}

impl Default for ProjectFixture {
    fn default() -> Self {
        Self::new()
    }
}
