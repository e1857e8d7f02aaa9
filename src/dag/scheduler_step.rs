// src/dag/scheduler_step.rs

//! Step-by-step execution result types for the scheduler.

use crate::dag::task_info::ScheduledTask;
use crate::engine::TaskName;

/// Structured result of a single scheduler "step".
#[derive(Debug, Clone, Default)]
pub struct SchedulerStep {
    /// Tasks that became ready to run as a result of this step.
    pub newly_scheduled: Vec<ScheduledTask>,
    /// Tasks newly skipped in this step, with the task that caused it.
    pub newly_skipped: Vec<(TaskName, TaskName)>,
    /// Whether this step caused the current run to finish.
    pub run_just_finished: bool,
}
