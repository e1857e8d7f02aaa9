// src/engine/mod.rs

//! Orchestration engine.
//!
//! The pure per-run state machine lives in [`crate::dag::scheduler`]; the
//! async shell that feeds it completions and dispatches ready tasks is
//! [`runner::TaskGraphRunner`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Canonical task name type used throughout the engine.
pub type TaskName = String;

/// Outcome of a task action, as reported by the executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Success,
    /// Carries the representative error message.
    Failed(String),
}

/// Events flowing into the runner from the executor.
#[derive(Debug, Clone)]
pub enum RunnerEvent {
    TaskCompleted {
        task: TaskName,
        run_id: u64,
        outcome: TaskOutcome,
    },
}

/// Id of the newest run, shared between the runner and the actions.
///
/// Output produced for an older run id is discarded instead of written.
#[derive(Debug, Clone, Default)]
pub struct Generation(Arc<AtomicU64>);

impl Generation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    pub fn advance_to(&self, run_id: u64) {
        self.0.fetch_max(run_id, Ordering::SeqCst);
    }

    pub fn is_current(&self, run_id: u64) -> bool {
        self.current() == run_id
    }
}

pub mod runner;

pub use runner::{RunReport, TaskGraphRunner};
