// src/watch/patterns.rs

use std::fmt;

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::config::model::ConfigFile;
use crate::engine::TaskName;
use crate::types::TaskAction;

/// Compiled input patterns for a single task.
///
/// Patterns are relative to the project root; the watcher passes relative
/// paths (e.g. `"sass/main.scss"`) into `matches`.
#[derive(Clone)]
pub struct TaskWatchProfile {
    name: TaskName,
    action: TaskAction,
    watch_set: GlobSet,
    exclude_set: Option<GlobSet>,
}

impl fmt::Debug for TaskWatchProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskWatchProfile")
            .field("name", &self.name)
            .field("action", &self.action)
            .finish_non_exhaustive()
    }
}

impl TaskWatchProfile {
    pub fn new(
        name: impl Into<TaskName>,
        action: TaskAction,
        watch: &[String],
        exclude: &[String],
    ) -> Result<Self> {
        let name = name.into();
        let watch_set = build_globset(watch)
            .with_context(|| format!("building watch globset for task {name}"))?;
        let exclude_set = if exclude.is_empty() {
            None
        } else {
            Some(
                build_globset(exclude)
                    .with_context(|| format!("building exclude globset for task {name}"))?,
            )
        };
        Ok(Self {
            name,
            action,
            watch_set,
            exclude_set,
        })
    }

    /// Name of the task this profile belongs to.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn action(&self) -> TaskAction {
        self.action
    }

    /// Returns true if the task reads the given project-relative path.
    pub fn matches(&self, rel_path: &str) -> bool {
        if !self.watch_set.is_match(rel_path) {
            return false;
        }
        if let Some(exclude) = &self.exclude_set {
            if exclude.is_match(rel_path) {
                return false;
            }
        }
        true
    }
}

/// Build a GlobSet from simple string patterns.
pub fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = Glob::new(pat).with_context(|| format!("invalid glob pattern: {pat}"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

/// One profile per task whose action reads project files. Groups and
/// `clean` read nothing and get no profile.
pub fn build_profiles_from_config(cfg: &ConfigFile) -> Result<Vec<TaskWatchProfile>> {
    let mut profiles = Vec::new();

    for (name, task) in cfg.tasks() {
        let (watch, exclude): (Vec<String>, Vec<String>) = match task.action {
            TaskAction::Lint => (cfg.lint().include.clone(), cfg.lint().exclude.clone()),
            TaskAction::JsBundle => (cfg.script().watch.clone(), Vec::new()),
            TaskAction::Stylesheet => (cfg.stylesheet().watch.clone(), Vec::new()),
            TaskAction::Markup => (vec![cfg.markup().template.clone()], Vec::new()),
            TaskAction::Clean | TaskAction::Group => continue,
        };
        profiles.push(TaskWatchProfile::new(name.clone(), task.action, &watch, &exclude)?);
    }

    Ok(profiles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::RawConfigFile;

    #[test]
    fn default_profiles_cover_inputs() {
        let cfg = ConfigFile::try_from(RawConfigFile::default()).unwrap();
        let profiles = build_profiles_from_config(&cfg).unwrap();

        let interested = |path: &str| -> Vec<&str> {
            profiles
                .iter()
                .filter(|p| p.matches(path))
                .map(|p| p.name())
                .collect()
        };

        assert_eq!(interested("js/app.js"), vec!["js-bundle", "lint"]);
        assert_eq!(interested("sass/nested/_x.scss"), vec!["stylesheet"]);
        assert_eq!(interested("index-template.html"), vec!["markup"]);
        assert!(interested("lib/bundle.js").is_empty());
    }
}
