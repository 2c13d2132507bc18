//! Per-path debounce timers.
//!
//! Every path owns at most one timer. Scheduling a path that already has a
//! timer pushes its deadline back by a full window, so a burst of saves
//! fires once, one window after the last save.
//!
//! The debouncer holds no clock of its own. Callers pass `now` in, which
//! keeps it usable from both the async driver and plain unit tests.

use std::path::{Path, PathBuf};
use std::time::Duration;

use indexmap::IndexMap;
use tokio::time::Instant;

#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    timers: IndexMap<PathBuf, Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            timers: IndexMap::new(),
        }
    }

    /// Start or reset the timer for `path` and return its new deadline.
    pub fn schedule(&mut self, path: &Path, now: Instant) -> Instant {
        let fires_at = now + self.window;
        self.timers.insert(path.to_path_buf(), fires_at);
        fires_at
    }

    pub fn cancel(&mut self, path: &Path) -> bool {
        self.timers.shift_remove(path).is_some()
    }

    pub fn is_pending(&self, path: &Path) -> bool {
        self.timers.contains_key(path)
    }

    /// Remove and return every path whose timer has expired, earliest
    /// deadline first. Equal deadlines keep scheduling order.
    pub fn due(&mut self, now: Instant) -> Vec<PathBuf> {
        let mut expired: Vec<(PathBuf, Instant)> = Vec::new();
        self.timers.retain(|path, fires_at| {
            if *fires_at <= now {
                expired.push((path.clone(), *fires_at));
                false
            } else {
                true
            }
        });
        expired.sort_by_key(|(_, fires_at)| *fires_at);
        expired.into_iter().map(|(path, _)| path).collect()
    }

    /// Earliest pending deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.values().min().copied()
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(100);

    #[test]
    fn fires_after_window() {
        let t0 = Instant::now();
        let mut debouncer = Debouncer::new(WINDOW);

        assert_eq!(debouncer.schedule(Path::new("a.mtm"), t0), t0 + WINDOW);
        assert!(debouncer.due(t0 + Duration::from_millis(99)).is_empty());
        assert_eq!(
            debouncer.due(t0 + WINDOW),
            vec![PathBuf::from("a.mtm")]
        );
        assert!(debouncer.is_empty());
    }

    #[test]
    fn repeat_resets_timer() {
        let t0 = Instant::now();
        let mut debouncer = Debouncer::new(WINDOW);

        debouncer.schedule(Path::new("a.mtm"), t0);
        let later = t0 + Duration::from_millis(60);
        assert_eq!(debouncer.schedule(Path::new("a.mtm"), later), later + WINDOW);
        assert_eq!(debouncer.len(), 1);

        assert!(debouncer.due(t0 + WINDOW).is_empty());
        assert_eq!(debouncer.next_deadline(), Some(later + WINDOW));
        assert_eq!(debouncer.due(later + WINDOW).len(), 1);
    }

    #[test]
    fn due_orders_by_deadline() {
        let t0 = Instant::now();
        let mut debouncer = Debouncer::new(WINDOW);

        debouncer.schedule(Path::new("a"), t0);
        debouncer.schedule(Path::new("b"), t0 + Duration::from_millis(10));
        debouncer.schedule(Path::new("c"), t0 + Duration::from_millis(5));
        // "a" is rescheduled last, so it now fires last.
        debouncer.schedule(Path::new("a"), t0 + Duration::from_millis(20));

        let due = debouncer.due(t0 + Duration::from_secs(1));
        assert_eq!(due, vec![PathBuf::from("c"), PathBuf::from("b"), PathBuf::from("a")]);
    }

    #[test]
    fn zero_window_is_due_immediately() {
        let t0 = Instant::now();
        let mut debouncer = Debouncer::new(Duration::ZERO);
        debouncer.schedule(Path::new("a"), t0);
        assert_eq!(debouncer.due(t0).len(), 1);
    }

    #[test]
    fn cancel_removes_timer() {
        let t0 = Instant::now();
        let mut debouncer = Debouncer::new(WINDOW);
        debouncer.schedule(Path::new("a"), t0);

        assert!(debouncer.is_pending(Path::new("a")));
        assert!(debouncer.cancel(Path::new("a")));
        assert!(!debouncer.cancel(Path::new("a")));
        assert_eq!(debouncer.next_deadline(), None);
    }
}
