// src/dag/state_manager.rs

//! Per-run state management for tasks in the scheduler.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::dag::task_info::{RunState, ScheduledTask, TaskInfo};
use crate::engine::TaskName;

/// Whether a pending task may start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DepStatus {
    Satisfied,
    Waiting,
    /// Can never start in this run; carries the root cause.
    Blocked(TaskName),
}

/// Manages per-run state transitions for tasks.
pub struct StateManager<'a> {
    tasks: &'a mut HashMap<TaskName, TaskInfo>,
    current_run_id: Option<u64>,
}

impl<'a> StateManager<'a> {
    pub fn new(tasks: &'a mut HashMap<TaskName, TaskInfo>, current_run_id: Option<u64>) -> Self {
        Self {
            tasks,
            current_run_id,
        }
    }

    /// Include the given tasks in this run as `Pending`.
    pub fn mark_pending<'n>(&mut self, names: impl IntoIterator<Item = &'n String>) {
        for name in names {
            match self.tasks.get_mut(name) {
                Some(info) => {
                    info.run_state = Some(RunState::Pending);
                    debug!(task = %info.name, run_id = self.current_run_id, "marked Pending for this run");
                }
                None => warn!(task = %name, "unknown task requested for run; ignoring"),
            }
        }
    }

    /// Skip every pending task that can no longer start, until nothing changes.
    ///
    /// Returns `(skipped, cause)` pairs in the order they were decided.
    pub fn skip_blocked(&mut self) -> Vec<(TaskName, TaskName)> {
        let mut skipped = Vec::new();

        loop {
            let mut blocked: Vec<(TaskName, TaskName)> = {
                let ro = ReadOnlyStateManager::new(self.tasks);
                self.tasks
                    .values()
                    .filter(|info| matches!(info.run_state, Some(RunState::Pending)))
                    .filter_map(|info| match ro.dep_status(info) {
                        DepStatus::Blocked(cause) => Some((info.name.clone(), cause)),
                        _ => None,
                    })
                    .collect()
            };
            if blocked.is_empty() {
                break;
            }
            blocked.sort();

            for (name, cause) in blocked {
                if let Some(info) = self.tasks.get_mut(&name) {
                    warn!(
                        task = %info.name,
                        run_id = self.current_run_id,
                        cause = %cause,
                        "skipping task due to upstream failure"
                    );
                    info.run_state = Some(RunState::Skipped {
                        cause: cause.clone(),
                    });
                    if let Some(run_id) = self.current_run_id {
                        info.last_failed_run = Some(run_id);
                    }
                    skipped.push((name, cause));
                }
            }
        }

        skipped
    }

    /// Collect tasks that are `Pending` and whose dependencies are satisfied,
    /// mark them as `Running`, and return them as `ScheduledTask`s.
    pub fn collect_new_ready_tasks(&mut self) -> Vec<ScheduledTask> {
        let mut candidates: Vec<TaskName> = {
            let ro = ReadOnlyStateManager::new(self.tasks);
            self.tasks
                .values()
                .filter(|info| {
                    matches!(info.run_state, Some(RunState::Pending))
                        && ro.dep_status(info) == DepStatus::Satisfied
                })
                .map(|info| info.name.clone())
                .collect()
        };
        candidates.sort();

        let mut ready = Vec::with_capacity(candidates.len());
        for name in candidates {
            if let Some(info) = self.tasks.get_mut(&name) {
                let is_rerun = info.last_successful_run.is_some() || info.last_failed_run.is_some();
                info!(
                    task = %info.name,
                    action = %info.action,
                    run_id = self.current_run_id,
                    rerun = is_rerun,
                    "scheduling task"
                );

                info.run_state = Some(RunState::Running);
                ready.push(ScheduledTask::from_task_info(
                    info,
                    self.current_run_id.unwrap_or(0),
                ));
            }
        }

        ready
    }

    /// Check if all tasks are in a terminal state.
    pub fn all_tasks_terminal(&self) -> bool {
        self.tasks
            .values()
            .all(|info| info.run_state.as_ref().is_none_or(RunState::is_terminal))
    }
}

/// A read-only view for checking dependency satisfaction.
pub struct ReadOnlyStateManager<'a> {
    tasks: &'a HashMap<TaskName, TaskInfo>,
}

impl<'a> ReadOnlyStateManager<'a> {
    pub fn new(tasks: &'a HashMap<TaskName, TaskInfo>) -> Self {
        Self { tasks }
    }

    /// Dependency status of `info` for the current run.
    ///
    /// Dependencies taking part in the run must have succeeded in it.
    /// Dependencies outside the run count as satisfied when their most recent
    /// outcome was a success.
    pub fn dep_status(&self, info: &TaskInfo) -> DepStatus {
        let mut waiting = false;

        for dep_name in &info.deps {
            let Some(dep) = self.tasks.get(dep_name) else {
                warn!(task = %info.name, dep = %dep_name, "dependency missing from tasks map");
                return DepStatus::Blocked(dep_name.clone());
            };

            match &dep.run_state {
                Some(RunState::Succeeded) => {}
                Some(RunState::Failed(_)) => return DepStatus::Blocked(dep_name.clone()),
                Some(RunState::Skipped { cause }) => return DepStatus::Blocked(cause.clone()),
                Some(RunState::Pending) | Some(RunState::Running) => waiting = true,
                None => {
                    if !dep.last_outcome_succeeded() {
                        return DepStatus::Blocked(dep_name.clone());
                    }
                }
            }
        }

        if waiting {
            DepStatus::Waiting
        } else {
            DepStatus::Satisfied
        }
    }
}
