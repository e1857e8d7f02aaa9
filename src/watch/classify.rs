// src/watch/classify.rs

//! Maps a changed path to the tasks it invalidates.

use std::collections::{BTreeSet, HashSet};
use std::fmt::Debug;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use crate::config::model::ConfigFile;
use crate::engine::TaskName;
use crate::pipeline::TransformPipeline;
use crate::types::TaskAction;
use crate::watch::patterns::{TaskWatchProfile, build_profiles_from_config};

/// Decides which tasks a change to `rel_path` invalidates directly.
///
/// The result is the seed set; dependents are added by the task graph.
pub trait ChangeClassifier: Send + Sync + Debug {
    fn classify(&self, rel_path: &str) -> BTreeSet<TaskName>;
}

/// Classifier for a configured project.
///
/// A path is interesting when it is a module of the resolved bundle graph
/// (even outside the configured script globs) or an input of another task.
/// The build's own artifacts and their temporary files are ignored so that
/// writing them does not trigger another rebuild.
#[derive(Debug)]
pub struct ProjectClassifier {
    profiles: Vec<TaskWatchProfile>,
    pipeline: Option<Arc<TransformPipeline>>,
    bundle_tasks: Vec<TaskName>,
    artifacts: HashSet<String>,
}

impl ProjectClassifier {
    pub fn from_config(cfg: &ConfigFile, pipeline: Option<Arc<TransformPipeline>>) -> Result<Self> {
        let bundle_tasks = cfg
            .tasks()
            .iter()
            .filter(|(_, task)| task.action == TaskAction::JsBundle)
            .map(|(name, _)| name.clone())
            .collect();

        Ok(Self {
            profiles: build_profiles_from_config(cfg)?,
            pipeline,
            bundle_tasks,
            artifacts: cfg.artifact_paths().into_iter().collect(),
        })
    }

    fn is_artifact(&self, rel_path: &str) -> bool {
        if self.artifacts.contains(rel_path) {
            return true;
        }
        // `lib/.bundle.js.tmp` while an atomic write is in progress.
        let name = Path::new(rel_path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let Some(inner) = name.strip_prefix('.').and_then(|n| n.strip_suffix(".tmp")) else {
            return false;
        };
        let sibling = match rel_path.rsplit_once('/') {
            Some((dir, _)) => format!("{dir}/{inner}"),
            None => inner.to_string(),
        };
        self.artifacts.contains(&sibling)
    }
}

impl ChangeClassifier for ProjectClassifier {
    fn classify(&self, rel_path: &str) -> BTreeSet<TaskName> {
        if self.is_artifact(rel_path) {
            debug!(path = %rel_path, "ignoring change to a build artifact");
            return BTreeSet::new();
        }

        let mut seeds: BTreeSet<TaskName> = self
            .profiles
            .iter()
            .filter(|p| p.matches(rel_path))
            .map(|p| p.name().to_string())
            .collect();

        if self.pipeline.as_ref().is_some_and(|p| p.is_module(rel_path)) {
            seeds.extend(self.bundle_tasks.iter().cloned());
        }

        debug!(path = %rel_path, ?seeds, "classified change");
        seeds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::RawConfigFile;

    fn classifier() -> ProjectClassifier {
        let cfg = ConfigFile::try_from(RawConfigFile::default()).unwrap();
        ProjectClassifier::from_config(&cfg, None).unwrap()
    }

    fn names(set: BTreeSet<TaskName>) -> Vec<String> {
        set.into_iter().collect()
    }

    #[test]
    fn inputs_map_to_their_tasks() {
        let c = classifier();
        assert_eq!(names(c.classify("js/app.js")), vec!["js-bundle", "lint"]);
        assert_eq!(names(c.classify("sass/main.scss")), vec!["stylesheet"]);
        assert!(c.classify("README.md").is_empty());
    }

    #[test]
    fn artifacts_and_their_temporaries_are_ignored() {
        let c = classifier();
        assert!(c.classify("lib/bundle.js").is_empty());
        assert!(c.classify("lib/.bundle.js.tmp").is_empty());
        assert!(c.classify("css/.main.css.tmp").is_empty());
        assert!(c.classify("index.html").is_empty());
    }
}
