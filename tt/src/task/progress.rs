//! Progress - a done/total unit counter with change-only notification

use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::{debug, trace};

use crate::events::Registry;
use crate::sync::lock;

/// Listener fired with the new status fraction whenever it changes
pub type ProgressListener = dyn Fn(&Progress, f64) + Send + Sync;

struct ProgressInner {
    total: u64,
    done: u64,
    /// Last value handed to listeners (`None` until the first dispatch)
    last_dispatch: Option<f64>,
    listeners: Registry<ProgressListener>,
}

impl ProgressInner {
    fn status(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.done as f64 / self.total as f64
        }
    }
}

/// Counter of finished work units out of a total
///
/// Cheap to clone; clones share the same counter. Every mutator recomputes
/// the status fraction and notifies listeners only if the fraction differs
/// from the one last dispatched, so `finish(0)` or a total change that keeps
/// the same ratio never produces a notification.
#[derive(Clone)]
pub struct Progress {
    inner: Arc<Mutex<ProgressInner>>,
}

impl Progress {
    /// Create a tracker with no work
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(ProgressInner {
                total: 0,
                done: 0,
                last_dispatch: None,
                listeners: Registry::new(),
            })),
        }
    }

    /// Set the total number of units of work
    ///
    /// Finished units are clamped to the new total if it shrinks.
    pub fn set_work(&self, total: u64) {
        debug!(total, "Progress::set_work: called");
        self.update(|inner| {
            inner.total = total;
            inner.done = inner.done.min(total);
        });
    }

    /// Add more units to the total
    pub fn add_work(&self, units: u64) {
        debug!(units, "Progress::add_work: called");
        self.update(|inner| inner.total = inner.total.saturating_add(units));
    }

    /// Mark units as finished, never going past the total
    pub fn finish(&self, units: u64) {
        trace!(units, "Progress::finish: called");
        self.update(|inner| inner.done = inner.done.saturating_add(units).min(inner.total));
    }

    /// Fraction of work finished, in `[0, 1]` (0 when there is no work)
    pub fn status(&self) -> f64 {
        lock(&self.inner).status()
    }

    /// Total units of work
    pub fn total(&self) -> u64 {
        lock(&self.inner).total
    }

    /// Finished units of work
    pub fn done(&self) -> u64 {
        lock(&self.inner).done
    }

    /// Register a listener for status changes
    pub fn add_listener<F>(&self, listener: F)
    where
        F: Fn(&Progress, f64) + Send + Sync + 'static,
    {
        lock(&self.inner).listeners.add(Arc::new(listener));
    }

    fn update(&self, mutate: impl FnOnce(&mut ProgressInner)) {
        let (value, listeners) = {
            let mut inner = lock(&self.inner);
            mutate(&mut inner);
            let value = inner.status();
            if inner.last_dispatch == Some(value) {
                return;
            }
            inner.last_dispatch = Some(value);
            (value, inner.listeners.snapshot())
        };
        trace!(value, listeners = listeners.len(), "Progress::update: dispatching");
        for listener in listeners {
            listener(self, value);
        }
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = lock(&self.inner);
        f.debug_struct("Progress")
            .field("total", &inner.total)
            .field("done", &inner.done)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn recorded(progress: &Progress) -> Arc<Mutex<Vec<f64>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        progress.add_listener(move |_, value| sink.lock().unwrap().push(value));
        seen
    }

    #[test]
    fn test_status_without_work_is_zero() {
        let progress = Progress::new();
        assert_eq!(progress.status(), 0.0);
        progress.finish(3);
        assert_eq!(progress.done(), 0);
        assert_eq!(progress.status(), 0.0);
    }

    #[test]
    fn test_finish_clamps_at_total() {
        let progress = Progress::new();
        progress.set_work(4);
        progress.finish(3);
        progress.finish(3);
        assert_eq!(progress.done(), 4);
        assert_eq!(progress.status(), 1.0);
    }

    #[test]
    fn test_shrinking_total_clamps_done() {
        let progress = Progress::new();
        progress.set_work(10);
        progress.finish(8);
        progress.set_work(5);
        assert_eq!(progress.done(), 5);
        assert_eq!(progress.status(), 1.0);
    }

    #[test]
    fn test_finish_zero_does_not_dispatch() {
        let progress = Progress::new();
        let seen = recorded(&progress);

        progress.set_work(4);
        progress.finish(1);
        progress.finish(0);
        progress.add_work(0);

        assert_eq!(*seen.lock().unwrap(), vec![0.0, 0.25]);
    }

    #[test]
    fn test_total_change_dispatches_only_when_ratio_moves() {
        let progress = Progress::new();
        progress.set_work(2);
        progress.finish(1);
        let seen = recorded(&progress);

        // 1/2 -> 1/4 -> 2/4
        progress.add_work(2);
        progress.finish(1);
        assert!(seen.lock().unwrap().contains(&0.25));

        let before = seen.lock().unwrap().len();
        progress.set_work(4);
        assert_eq!(seen.lock().unwrap().len(), before);
    }

    #[test]
    fn test_first_dispatch_reports_zero() {
        let progress = Progress::new();
        let seen = recorded(&progress);
        progress.set_work(10);
        assert_eq!(*seen.lock().unwrap(), vec![0.0]);
    }

    #[derive(Debug, Clone)]
    enum Op {
        SetWork(u64),
        AddWork(u64),
        Finish(u64),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u64..50).prop_map(Op::SetWork),
            (0u64..50).prop_map(Op::AddWork),
            (0u64..50).prop_map(Op::Finish),
        ]
    }

    proptest! {
        #[test]
        fn prop_done_never_exceeds_total(ops in proptest::collection::vec(op(), 0..40)) {
            let progress = Progress::new();
            let seen = recorded(&progress);
            for op in ops {
                match op {
                    Op::SetWork(n) => progress.set_work(n),
                    Op::AddWork(n) => progress.add_work(n),
                    Op::Finish(n) => progress.finish(n),
                }
                prop_assert!(progress.done() <= progress.total());
                let status = progress.status();
                prop_assert!((0.0..=1.0).contains(&status));
            }
            let seen = seen.lock().unwrap();
            for pair in seen.windows(2) {
                prop_assert!(pair[0] != pair[1]);
            }
        }
    }
}
