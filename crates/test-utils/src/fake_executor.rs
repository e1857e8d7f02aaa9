use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use spabuild::config::ConfigFile;
use spabuild::dag::{ScheduledTask, Scheduler};
use spabuild::engine::{Generation, RunnerEvent, TaskGraphRunner, TaskOutcome};
use spabuild::errors::Result;
use spabuild::exec::TaskExecutor;
use spabuild::types::{BoxFuture, BuildVariant};

/// A fake executor that:
/// - records which tasks were "run", in dispatch order
/// - immediately reports `TaskCompleted` for each scheduled task, failing
///   the ones named in `failing`.
#[derive(Debug, Clone)]
pub struct FakeExecutor {
    events: mpsc::Sender<RunnerEvent>,
    executed: Arc<Mutex<Vec<String>>>,
    failing: Arc<Mutex<HashSet<String>>>,
}

impl FakeExecutor {
    pub fn new(events: mpsc::Sender<RunnerEvent>) -> Self {
        Self {
            events,
            executed: Arc::new(Mutex::new(Vec::new())),
            failing: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Shared log of dispatched task names.
    pub fn executed(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.executed)
    }

    /// Shared set of task names that fail when run.
    pub fn failing(&self) -> Arc<Mutex<HashSet<String>>> {
        Arc::clone(&self.failing)
    }
}

impl TaskExecutor for FakeExecutor {
    fn spawn_ready_tasks(&mut self, tasks: Vec<ScheduledTask>) -> BoxFuture<'_, Result<()>> {
        let tx = self.events.clone();
        let executed = Arc::clone(&self.executed);
        let failing = Arc::clone(&self.failing);

        Box::pin(async move {
            for t in tasks {
                executed.lock().unwrap().push(t.name.clone());
                let outcome = if failing.lock().unwrap().contains(&t.name) {
                    TaskOutcome::Failed(format!("{} failed", t.name))
                } else {
                    TaskOutcome::Success
                };

                tx.send(RunnerEvent::TaskCompleted {
                    task: t.name.clone(),
                    run_id: t.run_id,
                    outcome,
                })
                .await
                .map_err(anyhow::Error::from)?;
            }
            Ok(())
        })
    }
}

/// Runner over `cfg` driven by a [`FakeExecutor`].
pub fn fake_runner(
    cfg: &ConfigFile,
    variant: BuildVariant,
) -> (TaskGraphRunner<FakeExecutor>, FakeExecutor) {
    let (tx, rx) = mpsc::channel(64);
    let executor = FakeExecutor::new(tx);
    let runner = TaskGraphRunner::new(
        Scheduler::from_config(cfg, variant),
        rx,
        executor.clone(),
        Generation::new(),
    );
    (runner, executor)
}
