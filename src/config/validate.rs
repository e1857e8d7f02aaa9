// src/config/validate.rs

use globset::Glob;
use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use regex::Regex;

use crate::config::model::{ConfigFile, RawConfigFile, TaskConfig, default_tasks};
use crate::errors::{Result, SpabuildError};

use std::collections::BTreeMap;

/// Name the CLI reserves for the watch loop.
pub const WATCH_ENTRY: &str = "watch";

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = SpabuildError;

    fn try_from(mut raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let tasks = if raw.task.is_empty() {
            default_tasks()
        } else {
            std::mem::take(&mut raw.task)
        };
        validate_raw_config(&raw, &tasks)?;
        Ok(ConfigFile::new_unchecked(raw, tasks))
    }
}

fn validate_raw_config(cfg: &RawConfigFile, tasks: &BTreeMap<String, TaskConfig>) -> Result<()> {
    validate_task_names(tasks)?;
    validate_task_dependencies(tasks)?;
    validate_dag(tasks)?;
    validate_watch(cfg, tasks)?;
    validate_patterns(cfg)?;
    Ok(())
}

fn validate_task_names(tasks: &BTreeMap<String, TaskConfig>) -> Result<()> {
    if tasks.contains_key(WATCH_ENTRY) {
        return Err(SpabuildError::ConfigError(format!(
            "task name '{WATCH_ENTRY}' is reserved for the watch loop"
        )));
    }
    if let Some(name) = tasks.keys().find(|n| n.trim().is_empty()) {
        return Err(SpabuildError::ConfigError(format!(
            "task name {name:?} must not be blank"
        )));
    }
    Ok(())
}

fn validate_task_dependencies(tasks: &BTreeMap<String, TaskConfig>) -> Result<()> {
    for (name, task) in tasks.iter() {
        for dep in task.after.iter() {
            if dep == name {
                return Err(SpabuildError::ConfigError(format!(
                    "task '{}' cannot depend on itself in `after`",
                    name
                )));
            }
            if !tasks.contains_key(dep) {
                return Err(SpabuildError::ConfigError(format!(
                    "task '{}' has unknown dependency '{}' in `after`",
                    name, dep
                )));
            }
        }
    }
    Ok(())
}

fn validate_dag(tasks: &BTreeMap<String, TaskConfig>) -> Result<()> {
    // Edge direction: dep -> task.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in tasks.keys() {
        graph.add_node(name.as_str());
    }

    for (name, task) in tasks.iter() {
        for dep in task.after.iter() {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(SpabuildError::DagCycle(format!(
            "cycle detected in task DAG involving task '{}'",
            cycle.node_id()
        ))),
    }
}

fn validate_watch(cfg: &RawConfigFile, tasks: &BTreeMap<String, TaskConfig>) -> Result<()> {
    if cfg.watch.debounce_ms == 0 {
        return Err(SpabuildError::ConfigError(
            "[watch].debounce_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    if !tasks.contains_key(&cfg.watch.target) {
        return Err(SpabuildError::ConfigError(format!(
            "[watch].target refers to unknown task '{}'",
            cfg.watch.target
        )));
    }
    Ok(())
}

fn validate_patterns(cfg: &RawConfigFile) -> Result<()> {
    let globs = cfg
        .script
        .watch
        .iter()
        .map(|g| ("[script].watch", g))
        .chain(cfg.stylesheet.watch.iter().map(|g| ("[stylesheet].watch", g)))
        .chain(cfg.lint.include.iter().map(|g| ("[lint].include", g)))
        .chain(cfg.lint.exclude.iter().map(|g| ("[lint].exclude", g)));

    for (section, pattern) in globs {
        Glob::new(pattern).map_err(|e| {
            SpabuildError::ConfigError(format!("{section}: invalid glob '{pattern}': {e}"))
        })?;
    }

    for pattern in &cfg.lint.deny {
        Regex::new(pattern).map_err(|e| {
            SpabuildError::ConfigError(format!("[lint].deny: invalid regex '{pattern}': {e}"))
        })?;
    }

    if cfg.script.entry.trim().is_empty() {
        return Err(SpabuildError::ConfigError(
            "[script].entry must not be empty".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::loader::load_from_str;

    #[test]
    fn empty_config_uses_standard_tasks() {
        let cfg = ConfigFile::try_from(RawConfigFile::default()).unwrap();
        assert!(cfg.tasks().contains_key("production"));
        assert!(cfg.tasks().contains_key("development"));
        assert_eq!(cfg.tasks()["js-bundle"].after, vec!["lint".to_string()]);
    }

    #[test]
    fn cycle_is_rejected() {
        let raw = load_from_str(
            r#"
            [watch]
            target = "a"

            [task.a]
            action = "lint"
            after = ["b"]

            [task.b]
            action = "markup"
            after = ["a"]
            "#,
        )
        .unwrap();

        let err = ConfigFile::try_from(raw).unwrap_err();
        assert!(matches!(err, SpabuildError::DagCycle(_)), "got {err:?}");
    }

    #[test]
    fn reserved_and_unknown_names_are_rejected() {
        let raw = load_from_str(
            r#"
            [task.watch]
            action = "group"
            "#,
        )
        .unwrap();
        assert!(matches!(
            ConfigFile::try_from(raw),
            Err(SpabuildError::ConfigError(_))
        ));

        let raw = load_from_str(
            r#"
            [watch]
            target = "bundle"

            [task.bundle]
            action = "js-bundle"
            after = ["missing"]
            "#,
        )
        .unwrap();
        let err = ConfigFile::try_from(raw).unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn bad_deny_regex_is_rejected() {
        let raw = load_from_str(
            r#"
            [lint]
            deny = ["("]
            "#,
        )
        .unwrap();
        assert!(matches!(
            ConfigFile::try_from(raw),
            Err(SpabuildError::ConfigError(_))
        ));
    }
}
