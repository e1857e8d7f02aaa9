// src/exec/backend.rs

//! Pluggable executor abstraction.
//!
//! The runner talks to a `TaskExecutor` instead of running actions itself.
//!
//! - [`ActionExecutor`] is the implementation used by `spabuild`. Every
//!   ready task becomes its own tokio task running the [`BuildActions`]
//!   entry for the task's action.
//! - Tests can provide their own `TaskExecutor` that records which tasks
//!   were scheduled and directly emits `TaskCompleted` events.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::dag::ScheduledTask;
use crate::engine::{RunnerEvent, TaskOutcome};
use crate::errors::{BuildError, Result};
use crate::report::ErrorReporter;
use crate::types::BoxFuture;

use super::actions::BuildActions;

/// Trait abstracting how scheduled tasks are executed.
///
/// Implementations must eventually send exactly one
/// [`RunnerEvent::TaskCompleted`] per dispatched task, tagged with the task's
/// run id.
pub trait TaskExecutor: Send {
    fn spawn_ready_tasks(&mut self, tasks: Vec<ScheduledTask>) -> BoxFuture<'_, Result<()>>;
}

/// Executor that runs the real build actions.
#[derive(Debug, Clone)]
pub struct ActionExecutor {
    actions: Arc<BuildActions>,
    reporter: Arc<ErrorReporter>,
    events: mpsc::Sender<RunnerEvent>,
}

impl ActionExecutor {
    pub fn new(
        actions: Arc<BuildActions>,
        reporter: Arc<ErrorReporter>,
        events: mpsc::Sender<RunnerEvent>,
    ) -> Self {
        Self {
            actions,
            reporter,
            events,
        }
    }

    pub fn actions(&self) -> &Arc<BuildActions> {
        &self.actions
    }
}

impl TaskExecutor for ActionExecutor {
    fn spawn_ready_tasks(&mut self, tasks: Vec<ScheduledTask>) -> BoxFuture<'_, Result<()>> {
        for task in tasks {
            let actions = Arc::clone(&self.actions);
            let reporter = Arc::clone(&self.reporter);
            let events = self.events.clone();
            tokio::spawn(run_action(task, actions, reporter, events));
        }
        Box::pin(async { Ok(()) })
    }
}

async fn run_action(
    task: ScheduledTask,
    actions: Arc<BuildActions>,
    reporter: Arc<ErrorReporter>,
    events: mpsc::Sender<RunnerEvent>,
) {
    info!(task = %task.name, run_id = task.run_id, action = %task.action, "task started");

    // Run in a nested task so a panicking action still completes the task.
    let inner_task = task.clone();
    let result = tokio::spawn(async move { actions.execute(&inner_task).await }).await;

    let outcome = match result {
        Ok(Ok(())) => {
            info!(task = %task.name, run_id = task.run_id, "task succeeded");
            TaskOutcome::Success
        }
        Ok(Err(failure)) => {
            let message = failure.to_string();
            for err in failure.into_failures() {
                reporter.report(&task.name, err);
            }
            TaskOutcome::Failed(message)
        }
        Err(join_err) => {
            let message = format!("action aborted: {join_err}");
            error!(task = %task.name, run_id = task.run_id, error = %message, "task panicked");
            reporter.report(&task.name, BuildError::Runtime(message.clone()));
            TaskOutcome::Failed(message)
        }
    };

    let event = RunnerEvent::TaskCompleted {
        task: task.name.clone(),
        run_id: task.run_id,
        outcome,
    };
    if events.send(event).await.is_err() {
        debug!(task = %task.name, "runner gone; dropping completion");
    }
}
