// src/errors.rs

//! Crate-wide error types.
//!
//! - [`SpabuildError`] is what the entry points return.
//! - [`BuildError`] is the per-task failure taxonomy that flows into the
//!   [`ErrorReporter`](crate::report::ErrorReporter).
//! - [`PipelineFailure`] aggregates every module failure of one pipeline pass.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpabuildError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Cycle detected in task graph: {0}")]
    DagCycle(String),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error("{failed} of {total} task(s) did not succeed")]
    RunFailed { failed: usize, total: usize },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Failure of a single build step.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// A required module specifier could not be located.
    #[error("cannot resolve '{specifier}' from {from_module}")]
    Resolution {
        specifier: String,
        from_module: String,
    },

    /// A transform (or compiler / templater) rejected a module's content.
    #[error("transform failed for {module_path}: {cause}")]
    Transform { module_path: String, cause: String },

    /// Style checks reported problems.
    #[error("lint failed with {} problem(s)", problems.len())]
    Lint { problems: Vec<String> },

    /// The final artifact could not be written.
    #[error("cannot write {path}: {cause}")]
    SinkWrite { path: String, cause: String },

    /// Scheduler or executor plumbing failed.
    #[error("runtime failure: {0}")]
    Runtime(String),
}

/// Every module failure observed during one pipeline pass.
///
/// The representative failure is the first one in discovery order.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{representative}")]
pub struct PipelineFailure {
    representative: BuildError,
    failures: Vec<BuildError>,
}

impl PipelineFailure {
    /// Returns `None` when `failures` is empty.
    pub fn new(failures: Vec<BuildError>) -> Option<Self> {
        let representative = failures.first()?.clone();
        Some(Self {
            representative,
            failures,
        })
    }

    pub fn single(failure: BuildError) -> Self {
        Self {
            representative: failure.clone(),
            failures: vec![failure],
        }
    }

    pub fn representative(&self) -> &BuildError {
        &self.representative
    }

    pub fn failures(&self) -> &[BuildError] {
        &self.failures
    }

    pub fn into_failures(self) -> Vec<BuildError> {
        self.failures
    }
}

impl From<BuildError> for PipelineFailure {
    fn from(failure: BuildError) -> Self {
        Self::single(failure)
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, SpabuildError>;
