// src/dag/graph.rs

use std::collections::{BTreeSet, HashMap};

use crate::config::model::ConfigFile;
use crate::types::{BuildVariant, TaskAction};

/// Internal node structure: stores immediate deps and dependents.
#[derive(Debug, Clone)]
struct TaskNode {
    action: TaskAction,
    /// Direct dependencies: tasks that must succeed before this one can run.
    deps: Vec<String>,
    /// Direct dependents: tasks that depend on this one.
    dependents: Vec<String>,
}

/// The declared tasks of one build variant plus their dependency edges.
///
/// Acyclicity is checked in `config::validate`, so here we only keep
/// adjacency information for scheduling and diagnostics.
#[derive(Debug, Clone)]
pub struct TaskGraph {
    variant: BuildVariant,
    nodes: HashMap<String, TaskNode>,
}

impl TaskGraph {
    /// Build the graph from a validated [`ConfigFile`].
    pub fn from_config(cfg: &ConfigFile, variant: BuildVariant) -> Self {
        let tasks = cfg
            .tasks()
            .iter()
            .map(|(name, t)| (name.clone(), t.action, t.after.clone()));
        Self::from_tasks(variant, tasks)
    }

    /// Build from `(name, action, deps)` triples. Unknown deps are dropped.
    pub fn from_tasks(
        variant: BuildVariant,
        tasks: impl IntoIterator<Item = (String, TaskAction, Vec<String>)>,
    ) -> Self {
        let mut nodes: HashMap<String, TaskNode> = tasks
            .into_iter()
            .map(|(name, action, deps)| {
                (
                    name,
                    TaskNode {
                        action,
                        deps,
                        dependents: Vec::new(),
                    },
                )
            })
            .collect();

        let names: Vec<String> = nodes.keys().cloned().collect();
        let known: BTreeSet<String> = names.iter().cloned().collect();
        for node in nodes.values_mut() {
            node.deps.retain(|d| known.contains(d));
        }

        for task_name in names {
            let deps = nodes
                .get(&task_name)
                .map(|n| n.deps.clone())
                .unwrap_or_default();

            for dep in deps {
                if let Some(dep_node) = nodes.get_mut(&dep) {
                    dep_node.dependents.push(task_name.clone());
                }
            }
        }
        for node in nodes.values_mut() {
            node.dependents.sort();
        }

        Self { variant, nodes }
    }

    pub fn variant(&self) -> BuildVariant {
        self.variant
    }

    /// All task names, sorted.
    pub fn tasks(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.nodes.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    pub fn action_of(&self, name: &str) -> Option<TaskAction> {
        self.nodes.get(name).map(|n| n.action)
    }

    /// Immediate dependencies of a task (the tasks listed in its `after`).
    pub fn dependencies_of(&self, name: &str) -> &[String] {
        self.nodes
            .get(name)
            .map(|n| n.deps.as_slice())
            .unwrap_or(&[])
    }

    /// Immediate dependents of a task (tasks that list this one in their `after`).
    pub fn dependents_of(&self, name: &str) -> &[String] {
        self.nodes
            .get(name)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }

    /// `target` and everything it transitively depends on.
    pub fn upstream_closure(&self, target: &str) -> BTreeSet<String> {
        self.walk([target], move |name| self.dependencies_of(name))
    }

    /// `seeds` and everything that transitively depends on them.
    pub fn downstream_closure<'a>(&self, seeds: impl IntoIterator<Item = &'a str>) -> BTreeSet<String> {
        self.walk(seeds, move |name| self.dependents_of(name))
    }

    /// Tasks to re-run when `seeds` are invalidated, limited to `scope`.
    pub fn invalidation_set<'a>(
        &self,
        seeds: impl IntoIterator<Item = &'a str>,
        scope: &BTreeSet<String>,
    ) -> BTreeSet<String> {
        self.downstream_closure(seeds)
            .into_iter()
            .filter(|name| scope.contains(name))
            .collect()
    }

    fn walk<'g, 's, F>(&'g self, seeds: impl IntoIterator<Item = &'s str>, next: F) -> BTreeSet<String>
    where
        F: Fn(&str) -> &'g [String],
    {
        let mut seen = BTreeSet::new();
        let mut stack: Vec<String> = seeds
            .into_iter()
            .filter(|s| self.contains(s))
            .map(str::to_string)
            .collect();

        while let Some(name) = stack.pop() {
            if !seen.insert(name.clone()) {
                continue;
            }
            stack.extend(next(&name).iter().cloned());
        }
        seen
    }
}
