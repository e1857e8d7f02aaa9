// src/watch/debounce.rs

use std::collections::BTreeSet;
use std::time::Duration;

use tokio::time::Instant;

/// Trailing-edge debounce window.
///
/// Every push extends the deadline to `window` after the push; the batch is
/// due once no push arrived for a full window.
#[derive(Debug)]
pub struct DebounceWindow<T: Ord> {
    window: Duration,
    deadline: Option<Instant>,
    pending: BTreeSet<T>,
    notifications: usize,
}

impl<T: Ord> DebounceWindow<T> {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: None,
            pending: BTreeSet::new(),
            notifications: 0,
        }
    }

    pub fn push(&mut self, items: impl IntoIterator<Item = T>, now: Instant) {
        self.pending.extend(items);
        self.notifications += 1;
        self.deadline = Some(now + self.window);
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|d| d <= now)
    }

    /// Number of notifications coalesced into the current batch.
    pub fn notifications(&self) -> usize {
        self.notifications
    }

    /// Take the coalesced batch and close the window.
    pub fn take(&mut self) -> BTreeSet<T> {
        self.deadline = None;
        self.notifications = 0;
        std::mem::take(&mut self.pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pushes_extend_the_deadline_and_coalesce() {
        let start = Instant::now();
        let mut window = DebounceWindow::new(Duration::from_millis(100));
        assert!(window.deadline().is_none());

        window.push(["js-bundle"], start);
        window.push(["lint", "js-bundle"], start + Duration::from_millis(60));

        assert!(!window.is_due(start + Duration::from_millis(120)));
        assert!(window.is_due(start + Duration::from_millis(160)));
        assert_eq!(window.notifications(), 2);

        let batch: Vec<_> = window.take().into_iter().collect();
        assert_eq!(batch, vec!["js-bundle", "lint"]);
        assert!(window.is_empty());
        assert!(window.deadline().is_none());
    }
}
