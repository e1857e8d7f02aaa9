// src/report.rs

//! Uniform sink for build failures from every component.

use std::sync::Mutex;

use tokio::sync::broadcast;
use tracing::error;

use crate::engine::RunReport;
use crate::errors::{BuildError, Result, SpabuildError};

/// How reported failures affect the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportMode {
    /// The first failure becomes the terminal result.
    OneShot,
    /// Every failure is a non-terminal event.
    Watch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportedError {
    pub task: String,
    pub error: BuildError,
}

/// Collects failures and fans them out to subscribers.
#[derive(Debug)]
pub struct ErrorReporter {
    mode: ReportMode,
    errors: Mutex<Vec<ReportedError>>,
    tx: broadcast::Sender<ReportedError>,
}

impl ErrorReporter {
    pub fn new(mode: ReportMode) -> Self {
        let (tx, _rx) = broadcast::channel(64);
        Self {
            mode,
            errors: Mutex::new(Vec::new()),
            tx,
        }
    }

    pub fn mode(&self) -> ReportMode {
        self.mode
    }

    pub fn report(&self, task: &str, error: BuildError) {
        error!(task = %task, mode = ?self.mode, error = %error, "build error");

        let reported = ReportedError {
            task: task.to_string(),
            error,
        };
        if let Ok(mut errors) = self.errors.lock() {
            errors.push(reported.clone());
        }
        // No subscribers is fine.
        let _ = self.tx.send(reported);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReportedError> {
        self.tx.subscribe()
    }

    /// Every failure reported so far, in order.
    pub fn errors(&self) -> Vec<ReportedError> {
        self.errors
            .lock()
            .map(|errors| errors.clone())
            .unwrap_or_default()
    }

    /// In one-shot mode, the first failure reported.
    pub fn first_fatal(&self) -> Option<ReportedError> {
        match self.mode {
            ReportMode::OneShot => self
                .errors
                .lock()
                .ok()
                .and_then(|errors| errors.first().cloned()),
            ReportMode::Watch => None,
        }
    }

    /// Exit result of a one-shot build: the first reported failure, or a
    /// generic failure when tasks did not succeed without reporting anything.
    pub fn terminal_result(&self, report: &RunReport) -> Result<()> {
        if self.mode == ReportMode::Watch {
            return Ok(());
        }
        if let Some(first) = self.first_fatal() {
            return Err(SpabuildError::Build(first.error));
        }
        if !report.is_success() {
            return Err(SpabuildError::RunFailed {
                failed: report.unsuccessful().len(),
                total: report.outcomes.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::TaskRunState;
    use crate::types::BuildVariant;
    use std::collections::BTreeMap;

    fn report(states: &[(&str, TaskRunState)]) -> RunReport {
        RunReport {
            run_id: 1,
            variant: BuildVariant::Production,
            outcomes: states
                .iter()
                .map(|(n, s)| (n.to_string(), s.clone()))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    #[test]
    fn one_shot_surfaces_the_first_failure() {
        let reporter = ErrorReporter::new(ReportMode::OneShot);
        reporter.report("lint", BuildError::Lint { problems: vec!["a".into()] });
        reporter.report(
            "stylesheet",
            BuildError::Transform {
                module_path: "sass/main.scss".into(),
                cause: "bad".into(),
            },
        );

        let r = report(&[("lint", TaskRunState::Failed { error: "x".into() })]);
        match reporter.terminal_result(&r) {
            Err(SpabuildError::Build(BuildError::Lint { problems })) => {
                assert_eq!(problems, vec!["a".to_string()])
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(reporter.errors().len(), 2);
    }

    #[test]
    fn watch_mode_is_never_terminal() {
        let reporter = ErrorReporter::new(ReportMode::Watch);
        let mut rx = reporter.subscribe();
        reporter.report("js-bundle", BuildError::Runtime("boom".into()));

        assert!(reporter.first_fatal().is_none());
        let r = report(&[("js-bundle", TaskRunState::Failed { error: "boom".into() })]);
        assert!(reporter.terminal_result(&r).is_ok());
        assert_eq!(rx.try_recv().unwrap().task, "js-bundle");
    }
}
