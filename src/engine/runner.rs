// src/engine/runner.rs

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::dag::{ScheduledTask, Scheduler, TaskRunState};
use crate::errors::{BuildError, Result, SpabuildError};
use crate::exec::TaskExecutor;
use crate::types::BuildVariant;

use super::{Generation, RunnerEvent, TaskName};

/// Per-task outcome of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub run_id: u64,
    pub variant: BuildVariant,
    pub outcomes: BTreeMap<TaskName, TaskRunState>,
}

impl RunReport {
    /// Every task in the run succeeded.
    pub fn is_success(&self) -> bool {
        self.outcomes.values().all(TaskRunState::is_success)
    }

    /// Tasks that did not succeed.
    pub fn unsuccessful(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|(_, state)| !state.is_success())
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn outcome_of(&self, task: &str) -> Option<&TaskRunState> {
        self.outcomes.get(task)
    }
}

/// Drives the scheduler with completion events and dispatches ready tasks
/// to a [`TaskExecutor`].
///
/// Independent tasks run concurrently; a failure only skips its transitive
/// dependents.
pub struct TaskGraphRunner<E: TaskExecutor> {
    scheduler: Scheduler,
    event_rx: mpsc::Receiver<RunnerEvent>,
    executor: E,
    generation: Generation,
}

impl<E: TaskExecutor> fmt::Debug for TaskGraphRunner<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskGraphRunner")
            .field("scheduler", &self.scheduler)
            .field("generation", &self.generation.current())
            .finish_non_exhaustive()
    }
}

impl<E: TaskExecutor> TaskGraphRunner<E> {
    pub fn new(
        scheduler: Scheduler,
        event_rx: mpsc::Receiver<RunnerEvent>,
        executor: E,
        generation: Generation,
    ) -> Self {
        Self {
            scheduler,
            event_rx,
            executor,
            generation,
        }
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Run `target` and everything it depends on.
    pub async fn run_target(&mut self, target: &str) -> Result<RunReport> {
        if !self.scheduler.graph().contains(target) {
            return Err(SpabuildError::TaskNotFound(target.to_string()));
        }
        let tasks = self.scheduler.graph().upstream_closure(target);
        self.run(&tasks).await
    }

    /// Run exactly `tasks`. Dependencies outside the set count as satisfied
    /// when their latest outcome was a success.
    pub async fn run(&mut self, tasks: &BTreeSet<TaskName>) -> Result<RunReport> {
        let step = self.scheduler.start_run(tasks);
        let run_id = self.scheduler.last_run_id();
        self.generation.advance_to(run_id);
        info!(run_id, variant = %self.scheduler.graph().variant(), "run started");

        self.spawn_ready(step.newly_scheduled).await?;
        let mut finished = step.run_just_finished;

        while !finished {
            let Some(event) = self.event_rx.recv().await else {
                return Err(SpabuildError::Build(BuildError::Runtime(
                    "executor event channel closed mid-run".to_string(),
                )));
            };

            let RunnerEvent::TaskCompleted {
                task,
                run_id: event_run,
                outcome,
            } = event;

            if event_run != run_id {
                debug!(task = %task, event_run, run_id, "ignoring completion from a superseded run");
                continue;
            }

            let step = self.scheduler.step_completion(&task, outcome);
            self.spawn_ready(step.newly_scheduled).await?;
            finished = step.run_just_finished;
        }

        let report = RunReport {
            run_id,
            variant: self.scheduler.graph().variant(),
            outcomes: self.scheduler.outcomes(),
        };

        if report.is_success() {
            info!(run_id, tasks = report.outcomes.len(), "run finished successfully");
        } else {
            warn!(run_id, unsuccessful = ?report.unsuccessful(), "run finished with failures");
        }
        Ok(report)
    }

    async fn spawn_ready(&mut self, tasks: Vec<ScheduledTask>) -> Result<()> {
        if tasks.is_empty() {
            return Ok(());
        }

        let names: Vec<_> = tasks.iter().map(|t| t.name.as_str()).collect();
        debug!(?names, "spawning ready tasks");

        self.executor.spawn_ready_tasks(tasks).await
    }
}
