// src/watch/scheduler.rs

//! Long-running rebuild loop behind `spabuild watch`.

use std::collections::BTreeSet;
use std::fmt;
use std::future::pending;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};

use crate::engine::{RunReport, TaskGraphRunner, TaskName};
use crate::errors::{BuildError, Result};
use crate::exec::TaskExecutor;
use crate::report::ErrorReporter;
use crate::types::BoxFuture;
use crate::watch::classify::ChangeClassifier;
use crate::watch::debounce::DebounceWindow;
use crate::watch::watcher::ChangeEvent;

/// Observable state of the watch loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Idle,
    Watching,
    Rebuilding,
}

/// Runs the tasks invalidated by a batch of seed tasks.
pub trait Rebuilder: Send + Sync {
    fn rebuild(&self, seeds: BTreeSet<TaskName>) -> BoxFuture<'static, Result<RunReport>>;
}

/// [`Rebuilder`] backed by the task graph runner, limited to the watch
/// target's closure.
pub struct RunnerRebuilder<E: TaskExecutor> {
    runner: Arc<Mutex<TaskGraphRunner<E>>>,
    scope: BTreeSet<TaskName>,
}

impl<E: TaskExecutor> fmt::Debug for RunnerRebuilder<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunnerRebuilder")
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

impl<E: TaskExecutor> RunnerRebuilder<E> {
    pub fn new(runner: Arc<Mutex<TaskGraphRunner<E>>>, scope: BTreeSet<TaskName>) -> Self {
        Self { runner, scope }
    }
}

impl<E: TaskExecutor + 'static> Rebuilder for RunnerRebuilder<E> {
    fn rebuild(&self, seeds: BTreeSet<TaskName>) -> BoxFuture<'static, Result<RunReport>> {
        let runner = Arc::clone(&self.runner);
        let scope = self.scope.clone();
        Box::pin(async move {
            let mut runner = runner.lock().await;
            let tasks = runner
                .scheduler()
                .graph()
                .invalidation_set(seeds.iter().map(String::as_str), &scope);
            debug!(?seeds, ?tasks, "invalidation set");
            runner.run(&tasks).await
        })
    }
}

/// Counters returned when the loop ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchSummary {
    pub rebuilds: usize,
    pub failed_rebuilds: usize,
}

enum Step {
    Change(Option<ChangeEvent>),
    DebounceElapsed,
    RebuildFinished(std::result::Result<Result<RunReport>, JoinError>),
}

/// Debounces change notifications and drives rebuilds.
///
/// At most one rebuild is in flight. Changes seen while it runs collect in
/// the debounce window and become exactly one follow-up rebuild. Failures
/// go to the [`ErrorReporter`] and never end the loop; the loop ends only
/// when the change channel closes.
pub struct WatchScheduler {
    classifier: Arc<dyn ChangeClassifier>,
    rebuilder: Arc<dyn Rebuilder>,
    reporter: Arc<ErrorReporter>,
    debounce: Duration,
    state_tx: watch::Sender<WatchState>,
}

impl fmt::Debug for WatchScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchScheduler")
            .field("classifier", &self.classifier)
            .field("debounce", &self.debounce)
            .field("state", &*self.state_tx.borrow())
            .finish_non_exhaustive()
    }
}

impl WatchScheduler {
    pub fn new(
        classifier: Arc<dyn ChangeClassifier>,
        rebuilder: Arc<dyn Rebuilder>,
        reporter: Arc<ErrorReporter>,
        debounce: Duration,
    ) -> Self {
        let (state_tx, _state_rx) = watch::channel(WatchState::Idle);
        Self {
            classifier,
            rebuilder,
            reporter,
            debounce,
            state_tx,
        }
    }

    pub fn state(&self) -> watch::Receiver<WatchState> {
        self.state_tx.subscribe()
    }

    pub async fn run(&self, mut changes: mpsc::UnboundedReceiver<ChangeEvent>) -> WatchSummary {
        let mut window: DebounceWindow<TaskName> = DebounceWindow::new(self.debounce);
        let mut in_flight: Option<JoinHandle<Result<RunReport>>> = None;
        let mut changes_open = true;
        let mut summary = WatchSummary::default();

        self.set_state(WatchState::Watching);
        info!(debounce_ms = self.debounce.as_millis() as u64, "watching for changes");

        loop {
            if !changes_open && in_flight.is_none() && window.is_empty() {
                break;
            }

            let idle = in_flight.is_none();
            let step = tokio::select! {
                change = changes.recv(), if changes_open => Step::Change(change),
                _ = wait_for_deadline(window.deadline()), if idle => Step::DebounceElapsed,
                res = wait_for_rebuild(&mut in_flight) => Step::RebuildFinished(res),
            };

            match step {
                Step::Change(Some(change)) => {
                    let seeds = self.classifier.classify(&change.path);
                    if seeds.is_empty() {
                        continue;
                    }
                    debug!(path = %change.path, ?seeds, rebuilding = !idle, "change observed");
                    window.push(seeds, Instant::now());
                }
                Step::Change(None) => {
                    debug!("change channel closed");
                    changes_open = false;
                }
                Step::DebounceElapsed => {
                    let coalesced = window.notifications();
                    let seeds = window.take();
                    if seeds.is_empty() {
                        continue;
                    }
                    info!(?seeds, coalesced, "rebuilding");
                    self.set_state(WatchState::Rebuilding);
                    in_flight = Some(tokio::spawn(self.rebuilder.rebuild(seeds)));
                }
                Step::RebuildFinished(res) => {
                    in_flight = None;
                    summary.rebuilds += 1;
                    if !self.finish_rebuild(res) {
                        summary.failed_rebuilds += 1;
                    }
                    self.set_state(WatchState::Watching);
                }
            }
        }

        self.set_state(WatchState::Idle);
        info!(rebuilds = summary.rebuilds, failed = summary.failed_rebuilds, "watch loop finished");
        summary
    }

    /// Returns whether the rebuild succeeded. Task failures were already
    /// reported by the executor; only plumbing failures are reported here.
    fn finish_rebuild(&self, res: std::result::Result<Result<RunReport>, JoinError>) -> bool {
        match res {
            Ok(Ok(report)) if report.is_success() => {
                info!(run_id = report.run_id, tasks = report.outcomes.len(), "rebuild succeeded");
                true
            }
            Ok(Ok(report)) => {
                warn!(
                    run_id = report.run_id,
                    unsuccessful = ?report.unsuccessful(),
                    "rebuild failed; keeping previous artifacts"
                );
                false
            }
            Ok(Err(err)) => {
                self.reporter
                    .report("watch", BuildError::Runtime(err.to_string()));
                false
            }
            Err(join_err) => {
                self.reporter
                    .report("watch", BuildError::Runtime(format!("rebuild aborted: {join_err}")));
                false
            }
        }
    }

    fn set_state(&self, state: WatchState) {
        self.state_tx.send_replace(state);
    }
}

async fn wait_for_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending().await,
    }
}

async fn wait_for_rebuild(
    in_flight: &mut Option<JoinHandle<Result<RunReport>>>,
) -> std::result::Result<Result<RunReport>, JoinError> {
    match in_flight {
        Some(handle) => handle.await,
        None => pending().await,
    }
}
