//! Manager - per-level admission control with whole-tree completion detection

use std::collections::HashSet;
use std::sync::{Arc, Mutex, Weak};

use tokio::sync::Notify;
use tracing::{debug, info, trace};

use crate::events::Registry;
use crate::sync::lock;
use crate::task::{Task, TaskId, TaskState};

use super::config::LevelCaps;

/// Listener fired once every task in the tree has finished
pub type CompletionListener = dyn Fn() + Send + Sync;

/// Outcome of one admission pass over a level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LevelStatus {
    /// At least one task exists at the level
    not_empty: bool,
    /// Every task at the level is Finished (vacuously true when empty)
    finished: bool,
}

struct ManagerState {
    completed: bool,
    listeners: Registry<CompletionListener>,
}

struct ManagerInner {
    root: Task,
    root_depth: usize,
    caps: LevelCaps,
    /// Serializes recalculation and guards the completion latch
    state: Mutex<ManagerState>,
    /// Tasks carrying this manager's listeners
    watched: Mutex<HashSet<TaskId>>,
    notify: Notify,
}

/// Scheduler that keeps each depth level of a task tree under its cap
///
/// Admission is level-wide: unrelated subtrees compete for the same budget at
/// a given depth, and Queued candidates are started in pre-order. The
/// manager reacts to every child creation and every finish anywhere in the
/// tree, including subtasks created after construction.
///
/// Listeners on the tree only hold weak references to the manager, so
/// scheduling stops once the last `Manager` handle is dropped. Keep one alive
/// until [`Manager::wait`] returns.
#[derive(Clone)]
pub struct Manager {
    inner: Arc<ManagerInner>,
}

impl Manager {
    /// Attach a manager to `root` and admit the first wave of tasks
    ///
    /// Must be called from within a Tokio runtime, since admission starts
    /// task routines.
    pub fn create(root: &Task, caps: LevelCaps) -> Self {
        debug!(?caps, root = %root.id(), "Manager::create: called");
        let inner = Arc::new(ManagerInner {
            root: root.clone(),
            root_depth: root.depth(),
            caps,
            state: Mutex::new(ManagerState {
                completed: false,
                listeners: Registry::new(),
            }),
            watched: Mutex::new(HashSet::new()),
            notify: Notify::new(),
        });

        watch_subtree(&inner, root);

        {
            let _state = lock(&inner.state);
            let mut level = 0;
            while inner.recalculate(level).not_empty {
                level += 1;
            }
            debug!(levels = level, "Manager::create: initial sweep done");
        }

        Self { inner }
    }

    /// Register a listener for whole-tree completion
    ///
    /// Listeners added after completion are never called; use
    /// [`Manager::wait`] or [`Manager::is_complete`] in that case.
    pub fn add_listener<F>(&self, listener: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        lock(&self.inner.state).listeners.add(Arc::new(listener));
    }

    /// Whether completion has been detected
    pub fn is_complete(&self) -> bool {
        lock(&self.inner.state).completed
    }

    /// Wait until every task in the tree has finished
    pub async fn wait(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_complete() {
                return;
            }
            notified.await;
        }
    }

    /// Caps this manager enforces
    pub fn caps(&self) -> &LevelCaps {
        &self.inner.caps
    }
}

/// Register the manager's listeners on `task` and everything already below it
fn watch_subtree(inner: &Arc<ManagerInner>, task: &Task) {
    watch(inner, task);
    for child in task.children() {
        watch_subtree(inner, &child);
    }
}

fn watch(inner: &Arc<ManagerInner>, task: &Task) {
    if !lock(&inner.watched).insert(task.id()) {
        return;
    }
    let weak: Weak<ManagerInner> = Arc::downgrade(inner);
    task.add_children_listener(move |_, child, _| {
        if let Some(inner) = weak.upgrade() {
            inner.on_child_added(&inner, child);
        }
    });

    let weak: Weak<ManagerInner> = Arc::downgrade(inner);
    task.add_finish_listener(move |task| {
        if let Some(inner) = weak.upgrade() {
            inner.on_finished(task);
        }
    });
}

impl ManagerInner {
    fn level(&self, task: &Task) -> usize {
        task.depth().saturating_sub(self.root_depth)
    }

    fn on_child_added(&self, this: &Arc<ManagerInner>, child: &Task) {
        // The child may already have run and grown a subtree before this
        // listener got its turn
        watch_subtree(this, child);
        let level = self.level(child);
        trace!(child = %child.id(), level, "Manager::on_child_added: recalculating");

        let listeners = {
            let mut state = lock(&self.state);
            let mut below = level;
            while self.recalculate(below).not_empty {
                below += 1;
            }
            if child.state() != TaskState::Finished {
                return;
            }
            match self.complete(&mut state, None) {
                Some(listeners) => listeners,
                None => return,
            }
        };
        self.announce(listeners);
    }

    fn on_finished(&self, task: &Task) {
        let level = self.level(task);
        debug!(task = %task.id(), level, "Manager::on_finished: called");

        let listeners = {
            let mut state = lock(&self.state);
            if !self.recalculate(level).finished {
                return;
            }
            match self.complete(&mut state, Some(level)) {
                Some(listeners) => listeners,
                None => return,
            }
        };
        self.announce(listeners);
    }

    /// Latch completion when every level is finished
    ///
    /// `checked` names a level the caller already found finished. Returns the
    /// listeners to fire, or `None` when work remains or completion was
    /// already latched.
    fn complete(&self, state: &mut ManagerState, checked: Option<usize>) -> Option<Vec<Arc<CompletionListener>>> {
        if state.completed {
            return None;
        }
        let mut level = 0;
        loop {
            if checked != Some(level) {
                let status = self.recalculate(level);
                if !status.not_empty {
                    break;
                }
                if !status.finished {
                    trace!(level, "Manager::complete: level still busy, deferring");
                    return None;
                }
            }
            level += 1;
        }
        state.completed = true;
        Some(state.listeners.snapshot())
    }

    fn announce(&self, listeners: Vec<Arc<CompletionListener>>) {
        info!(root = %self.root.id(), "All tasks finished");
        self.notify.notify_waiters();
        for listener in listeners {
            listener();
        }
    }

    /// Start Queued tasks at `level` in pre-order while the level has budget
    ///
    /// Caller must hold `state`.
    fn recalculate(&self, level: usize) -> LevelStatus {
        let tasks = self.root.tasks_at_depth(level);
        let running = tasks.iter().filter(|(_, state)| *state == TaskState::Running).count();
        let mut budget = self.caps.cap(level).saturating_sub(running);

        let mut finished = true;
        let mut started = 0;
        for (task, state) in &tasks {
            if *state != TaskState::Finished {
                finished = false;
            }
            if budget > 0 && *state == TaskState::Queued {
                task.start();
                budget -= 1;
                started += 1;
            }
        }
        trace!(level, tasks = tasks.len(), running, started, finished, "Manager::recalculate: done");

        LevelStatus {
            not_empty: !tasks.is_empty(),
            finished,
        }
    }
}
