// src/exec/mod.rs

//! Execution layer.
//!
//! - [`backend`] provides the `TaskExecutor` trait and the `ActionExecutor`
//!   the runner uses in production, which tests can replace with a fake.
//! - [`actions`] implements each task action against the pipeline and tools.
//! - [`command`] runs external filter commands (syntax transformer, minifier,
//!   linter) through the shell.

pub mod actions;
pub mod backend;
pub mod command;

pub use actions::BuildActions;
pub use backend::{ActionExecutor, TaskExecutor};
pub use command::{CommandOutput, run_command, run_filter};
