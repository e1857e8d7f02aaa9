// src/watch/watcher.rs

use std::path::{Path, PathBuf};

use anyhow::Result;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::watch::path_utils::relative_str;

/// A create, modify or remove notification for one project-relative path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub path: String,
}

impl ChangeEvent {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

/// Handle for the filesystem watcher.
///
/// Keeps the underlying `RecommendedWatcher` alive. Dropping this handle
/// stops file watching and eventually closes the change channel.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish()
    }
}

/// Watch `root` recursively and forward every relevant path change as a
/// [`ChangeEvent`].
///
/// Access-only events are dropped; everything else is left to the
/// [`WatchScheduler`](crate::watch::WatchScheduler) to classify.
pub fn spawn_watcher(
    root: impl Into<PathBuf>,
    changes_tx: mpsc::UnboundedSender<ChangeEvent>,
) -> Result<WatcherHandle> {
    let root = root.into();
    // Canonicalize once so we have a stable base path.
    let root = root.canonicalize().unwrap_or_else(|_| root.clone());
    let callback_root = root.clone();

    // Called synchronously on the notify thread.
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => forward_event(&callback_root, event, &changes_tx),
            Err(err) => warn!(error = %err, "file watch error"),
        },
        Config::default(),
    )?;

    watcher.watch(&root, RecursiveMode::Recursive)?;
    info!(root = ?root, "file watcher started");

    Ok(WatcherHandle { _inner: watcher })
}

fn forward_event(root: &Path, event: Event, changes_tx: &mpsc::UnboundedSender<ChangeEvent>) {
    if !is_relevant(&event.kind) {
        return;
    }

    for path in &event.paths {
        let Some(rel) = relative_str(root, path) else {
            debug!(path = ?path, "ignoring event outside the project root");
            continue;
        };
        if changes_tx.send(ChangeEvent::new(rel)).is_err() {
            debug!("change channel closed; dropping notify event");
            return;
        }
    }
}

fn is_relevant(kind: &EventKind) -> bool {
    kind.is_create() || kind.is_modify() || kind.is_remove()
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, ModifyKind};

    #[test]
    fn access_events_are_not_forwarded() {
        let root = PathBuf::from("/project");
        let (tx, mut rx) = mpsc::unbounded_channel();

        let access = Event::new(EventKind::Access(AccessKind::Any)).add_path(root.join("js/app.js"));
        forward_event(&root, access, &tx);
        assert!(rx.try_recv().is_err());

        let modify = Event::new(EventKind::Modify(ModifyKind::Any)).add_path(root.join("js/app.js"));
        let create = Event::new(EventKind::Create(CreateKind::File)).add_path(root.join("sass/a.scss"));
        forward_event(&root, modify, &tx);
        forward_event(&root, create, &tx);

        assert_eq!(rx.try_recv().unwrap(), ChangeEvent::new("js/app.js"));
        assert_eq!(rx.try_recv().unwrap(), ChangeEvent::new("sass/a.scss"));
    }
}
