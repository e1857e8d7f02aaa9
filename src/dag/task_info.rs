// src/dag/task_info.rs

//! Task metadata and per-run state.

use std::fmt;

use crate::engine::TaskName;
use crate::types::TaskAction;

/// Per-run state of a task (internal).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    /// Included in this run, waiting on dependencies.
    Pending,
    /// Dispatched to the executor.
    Running,
    Succeeded,
    Failed(String),
    /// Not run because `cause` failed (or never succeeded).
    Skipped { cause: TaskName },
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunState::Pending | RunState::Running)
    }
}

/// Public, read-only view of a task's per-run state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskRunState {
    /// The task is not participating in this run.
    NotInRun,
    Pending,
    Running,
    Success,
    Failed { error: String },
    Skipped { reason: String },
}

impl TaskRunState {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskRunState::Success)
    }
}

impl fmt::Display for TaskRunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskRunState::NotInRun => f.write_str("not in run"),
            TaskRunState::Pending => f.write_str("pending"),
            TaskRunState::Running => f.write_str("running"),
            TaskRunState::Success => f.write_str("success"),
            TaskRunState::Failed { error } => write!(f, "failed: {error}"),
            TaskRunState::Skipped { reason } => write!(f, "skipped ({reason})"),
        }
    }
}

impl From<Option<&RunState>> for TaskRunState {
    fn from(state: Option<&RunState>) -> Self {
        match state {
            None => TaskRunState::NotInRun,
            Some(RunState::Pending) => TaskRunState::Pending,
            Some(RunState::Running) => TaskRunState::Running,
            Some(RunState::Succeeded) => TaskRunState::Success,
            Some(RunState::Failed(error)) => TaskRunState::Failed {
                error: error.clone(),
            },
            Some(RunState::Skipped { cause }) => TaskRunState::Skipped {
                reason: format!("upstream failure of {cause}"),
            },
        }
    }
}

/// Static task information plus per-run state.
#[derive(Debug, Clone)]
pub struct TaskInfo {
    pub name: TaskName,
    pub action: TaskAction,
    /// Direct dependencies for this task (names in `after = [...]`).
    pub deps: Vec<TaskName>,

    /// Per-run state (None if not participating in the current run).
    pub run_state: Option<RunState>,

    /// Last run ID in which this task succeeded.
    pub last_successful_run: Option<u64>,

    /// Last run ID in which this task failed or was skipped.
    pub last_failed_run: Option<u64>,
}

impl TaskInfo {
    pub fn new(name: TaskName, action: TaskAction, deps: Vec<TaskName>) -> Self {
        Self {
            name,
            action,
            deps,
            run_state: None,
            last_successful_run: None,
            last_failed_run: None,
        }
    }

    /// Whether the most recent outcome outside the current run was a success.
    pub fn last_outcome_succeeded(&self) -> bool {
        match (self.last_successful_run, self.last_failed_run) {
            (Some(ok), Some(failed)) => ok > failed,
            (Some(_), None) => true,
            _ => false,
        }
    }
}

/// A task the scheduler wants the executor to run now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledTask {
    pub name: TaskName,
    pub action: TaskAction,
    /// All tasks of one run share the same `run_id`.
    pub run_id: u64,
}

impl ScheduledTask {
    pub fn from_task_info(info: &TaskInfo, run_id: u64) -> Self {
        Self {
            name: info.name.clone(),
            action: info.action,
            run_id,
        }
    }
}
