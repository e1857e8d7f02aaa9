// src/watch/mod.rs

//! File watching and rebuild scheduling.
//!
//! This module is responsible for:
//! - Bridging `notify` events into a channel of project-relative paths.
//! - Classifying a changed path into the tasks it invalidates (bundle graph
//!   membership plus per-task input globs).
//! - Debouncing bursts and driving at most one rebuild at a time through the
//!   [`WatchScheduler`].

pub mod classify;
pub mod debounce;
pub mod path_utils;
pub mod patterns;
pub mod scheduler;
pub mod watcher;

pub use classify::{ChangeClassifier, ProjectClassifier};
pub use debounce::DebounceWindow;
pub use patterns::{TaskWatchProfile, build_globset, build_profiles_from_config};
pub use scheduler::{Rebuilder, RunnerRebuilder, WatchScheduler, WatchState, WatchSummary};
pub use watcher::{ChangeEvent, WatcherHandle, spawn_watcher};
