//! Task tree - arena of work units addressed by stable ids
//!
//! Every task in a tree lives in one shared arena. A [`Task`] is a cheap
//! handle (arena pointer + [`TaskId`]); parent and child links are ids, so no
//! node ever holds a reference to another node. Appending a child is the only
//! structural mutation, and it is announced through the parent's
//! child-added listeners.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, Weak};

use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::{debug, error, info, warn};

use crate::events::Registry;
use crate::sync::lock;

use super::progress::Progress;

/// Name given to the synthetic root of every tree
pub const ROOT_NAME: &str = "RootTask";

/// Exit status used when a task panics and nobody handles it
pub const UNHANDLED_PANIC_EXIT: i32 = 101;

/// Listener fired with the task's new aggregate progress
pub type TaskProgressListener = dyn Fn(&Task, f64) + Send + Sync;

/// Listener fired with `(parent, new_child, all_children)` when a subtask is created
pub type ChildrenListener = dyn Fn(&Task, &Task, &[Task]) + Send + Sync;

/// Listener fired once a task reaches [`TaskState::Finished`]
pub type FinishListener = dyn Fn(&Task) + Send + Sync;

/// Listener fired with `(panicking_task, message)` when a start routine panics
pub type PanicListener = dyn Fn(&Task, &str) + Send + Sync;

type StartRoutine = Box<dyn FnOnce(Task, Completion) -> BoxFuture<'static, ()> + Send>;

/// Stable identifier of a task within its tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(usize);

impl TaskId {
    /// Position of the task in its arena (creation order)
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle of a task; transitions only move forward
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Created, waiting for admission
    Queued,
    /// Start routine launched, completion not yet signalled
    Running,
    /// Completion signalled (the root is born here)
    Finished,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskState::Queued => "queued",
            TaskState::Running => "running",
            TaskState::Finished => "finished",
        };
        write!(f, "{}", s)
    }
}

struct Node {
    name: String,
    parent: Option<TaskId>,
    children: Vec<TaskId>,
    /// Weighted trackers feeding the aggregate progress
    trackers: Vec<(f64, Progress)>,
    state: TaskState,
    routine: Option<StartRoutine>,
    /// Aggregate also folds in every child's weighted sums
    inheriting: bool,
    last_progress: Option<f64>,
    progress_listeners: Registry<TaskProgressListener>,
    children_listeners: Registry<ChildrenListener>,
    finish_listeners: Registry<FinishListener>,
    panic_listeners: Registry<PanicListener>,
}

impl Node {
    fn new(name: String, parent: Option<TaskId>, state: TaskState, routine: Option<StartRoutine>) -> Self {
        Self {
            name,
            parent,
            children: Vec::new(),
            trackers: Vec::new(),
            state,
            routine,
            inheriting: false,
            last_progress: None,
            progress_listeners: Registry::new(),
            children_listeners: Registry::new(),
            finish_listeners: Registry::new(),
            panic_listeners: Registry::new(),
        }
    }
}

#[derive(Default)]
struct Arena {
    nodes: Vec<Node>,
}

impl Arena {
    fn node(&self, id: TaskId) -> &Node {
        &self.nodes[id.0]
    }

    fn node_mut(&mut self, id: TaskId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    fn depth(&self, id: TaskId) -> usize {
        let mut depth = 0;
        let mut current = self.node(id).parent;
        while let Some(parent) = current {
            depth += 1;
            current = self.node(parent).parent;
        }
        depth
    }

    /// Weighted `(sum, total_weight)` of a task's trackers (and children, if inheriting)
    fn weighted_progress(&self, id: TaskId) -> (f64, f64) {
        let node = self.node(id);
        let mut sum = 0.0;
        let mut total = 0.0;
        for (weight, progress) in &node.trackers {
            sum += weight * progress.status();
            total += weight;
        }
        if node.inheriting {
            for child in &node.children {
                let (child_sum, child_total) = self.weighted_progress(*child);
                sum += child_sum;
                total += child_total;
            }
        }
        (sum, total)
    }

    fn progress(&self, id: TaskId) -> f64 {
        let (sum, total) = self.weighted_progress(id);
        if total == 0.0 { 0.0 } else { sum / total }
    }

    fn collect_at_depth(&self, id: TaskId, remaining: usize, out: &mut Vec<(TaskId, TaskState)>) {
        if remaining == 0 {
            out.push((id, self.node(id).state));
            return;
        }
        for child in &self.node(id).children {
            self.collect_at_depth(*child, remaining - 1, out);
        }
    }

    fn snapshot(&self, id: TaskId) -> TaskSnapshot {
        let node = self.node(id);
        TaskSnapshot {
            id,
            name: node.name.clone(),
            state: node.state,
            progress: self.progress(id),
            children: node.children.iter().map(|child| self.snapshot(*child)).collect(),
        }
    }
}

/// Point-in-time copy of a subtree, taken under a single lock
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSnapshot {
    pub id: TaskId,
    pub name: String,
    pub state: TaskState,
    /// Aggregate progress at the time of the snapshot
    pub progress: f64,
    /// Children in creation order
    pub children: Vec<TaskSnapshot>,
}

/// Handle to a node of a task tree
///
/// Handles are cheap to clone and compare equal when they address the same
/// node of the same tree.
#[derive(Clone)]
pub struct Task {
    arena: Arc<Mutex<Arena>>,
    id: TaskId,
}

/// Non-owning task handle used by listeners that live inside the tree
#[derive(Clone)]
pub struct WeakTask {
    arena: Weak<Mutex<Arena>>,
    id: TaskId,
}

impl WeakTask {
    /// Recover a strong handle if the tree is still alive
    pub fn upgrade(&self) -> Option<Task> {
        self.arena.upgrade().map(|arena| Task { arena, id: self.id })
    }
}

impl Task {
    /// Create the root of a new tree
    ///
    /// The root has no start routine and never changes state; it is born
    /// Finished so completion detection treats level 0 as done.
    pub fn root() -> Self {
        debug!("Task::root: creating tree");
        let mut arena = Arena::default();
        arena
            .nodes
            .push(Node::new(ROOT_NAME.to_string(), None, TaskState::Finished, None));
        Self {
            arena: Arc::new(Mutex::new(arena)),
            id: TaskId(0),
        }
    }

    /// Append a Queued child whose work is `start`
    ///
    /// `start` receives the new task and a [`Completion`] that it must
    /// eventually finish. Child-added listeners on `self` fire synchronously
    /// before this returns.
    pub fn create_subtask<F, Fut>(&self, name: impl Into<String>, start: F) -> Task
    where
        F: FnOnce(Task, Completion) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        let routine: StartRoutine = Box::new(move |task, done| start(task, done).boxed());

        let (child, children, listeners, inheriting) = {
            let mut arena = lock(&self.arena);
            let id = TaskId(arena.nodes.len());
            arena
                .nodes
                .push(Node::new(name.clone(), Some(self.id), TaskState::Queued, Some(routine)));
            let parent = arena.node_mut(self.id);
            parent.children.push(id);
            let children: Vec<Task> = parent.children.iter().map(|c| self.handle(*c)).collect();
            (
                self.handle(id),
                children,
                parent.children_listeners.snapshot(),
                parent.inheriting,
            )
        };
        debug!(parent = %self.id, child = %child.id, %name, "Task::create_subtask: created");

        for listener in listeners {
            listener(self, &child, &children);
        }

        if inheriting {
            self.follow_child_progress(&child);
            self.dispatch_progress();
        }
        child
    }

    /// Attach a progress tracker counted with `weight` in this task's average
    pub fn create_progress(&self, weight: f64) -> Progress {
        debug!(task = %self.id, weight, "Task::create_progress: called");
        let progress = Progress::new();
        let owner = self.downgrade();
        progress.add_listener(move |_, _| {
            if let Some(task) = owner.upgrade() {
                task.dispatch_progress();
            }
        });
        lock(&self.arena).node_mut(self.id).trackers.push((weight, progress.clone()));
        progress
    }

    /// Fold every child's trackers into this task's aggregate progress
    pub fn inherit_progress(&self) {
        let children = {
            let mut arena = lock(&self.arena);
            let node = arena.node_mut(self.id);
            if node.inheriting {
                return;
            }
            node.inheriting = true;
            node.children.clone()
        };
        debug!(task = %self.id, children = children.len(), "Task::inherit_progress: enabled");
        for child in children {
            self.follow_child_progress(&self.handle(child));
        }
        self.dispatch_progress();
    }

    /// Launch the start routine on its own Tokio task
    ///
    /// No-op unless the task is Queued and has a routine. Must be called
    /// from within a Tokio runtime.
    pub fn start(&self) {
        let routine = {
            let mut arena = lock(&self.arena);
            let node = arena.node_mut(self.id);
            if node.state != TaskState::Queued {
                return;
            }
            let Some(routine) = node.routine.take() else {
                return;
            };
            node.state = TaskState::Running;
            routine
        };
        info!(task = %self.id, name = %self.name(), "Task started");

        let task = self.clone();
        let worker = self.clone();
        let completion = Completion {
            task: self.clone(),
            fired: false,
        };
        tokio::spawn(async move {
            let work = AssertUnwindSafe(async move { routine(worker, completion).await });
            if let Err(payload) = work.catch_unwind().await {
                let message = panic_message(payload.as_ref());
                task.dispatch_panic(&message);
            }
        });
    }

    /// Weighted mean of the attached trackers (0 with no trackers or zero weight)
    pub fn progress(&self) -> f64 {
        lock(&self.arena).progress(self.id)
    }

    /// Register a listener for aggregate progress changes
    pub fn add_progress_listener<F>(&self, listener: F)
    where
        F: Fn(&Task, f64) + Send + Sync + 'static,
    {
        lock(&self.arena).node_mut(self.id).progress_listeners.add(Arc::new(listener));
    }

    /// Register a listener for newly created subtasks
    pub fn add_children_listener<F>(&self, listener: F)
    where
        F: Fn(&Task, &Task, &[Task]) + Send + Sync + 'static,
    {
        lock(&self.arena).node_mut(self.id).children_listeners.add(Arc::new(listener));
    }

    /// Register a listener for the transition to Finished
    pub fn add_finish_listener<F>(&self, listener: F)
    where
        F: Fn(&Task) + Send + Sync + 'static,
    {
        lock(&self.arena).node_mut(self.id).finish_listeners.add(Arc::new(listener));
    }

    /// Register a listener for panics raised by this task or any descendant
    pub fn add_panic_listener<F>(&self, listener: F)
    where
        F: Fn(&Task, &str) + Send + Sync + 'static,
    {
        lock(&self.arena).node_mut(self.id).panic_listeners.add(Arc::new(listener));
    }

    /// Stable id within the tree
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// The task's own (unqualified) name
    pub fn name(&self) -> String {
        lock(&self.arena).node(self.id).name.clone()
    }

    /// Current lifecycle state
    pub fn state(&self) -> TaskState {
        lock(&self.arena).node(self.id).state
    }

    /// Whether this is the synthetic root of its tree
    pub fn is_root(&self) -> bool {
        lock(&self.arena).node(self.id).parent.is_none()
    }

    /// Parent task, `None` for the root
    pub fn parent(&self) -> Option<Task> {
        lock(&self.arena).node(self.id).parent.map(|id| self.handle(id))
    }

    /// Children in creation order
    pub fn children(&self) -> Vec<Task> {
        let arena = lock(&self.arena);
        arena.node(self.id).children.iter().map(|id| self.handle(*id)).collect()
    }

    /// Distance from the root (root = 0)
    pub fn depth(&self) -> usize {
        lock(&self.arena).depth(self.id)
    }

    /// Root of the tree this task belongs to
    pub fn tree_root(&self) -> Task {
        self.handle(TaskId(0))
    }

    /// Tasks exactly `depth` levels below this one, in pre-order, with their states
    pub fn tasks_at_depth(&self, depth: usize) -> Vec<(Task, TaskState)> {
        let mut found = Vec::new();
        lock(&self.arena).collect_at_depth(self.id, depth, &mut found);
        found.into_iter().map(|(id, state)| (self.handle(id), state)).collect()
    }

    /// `'A' > 'B' > 'C'` path from just below the root down to this task
    pub fn qualified_name(&self) -> String {
        let arena = lock(&self.arena);
        let mut parts = Vec::new();
        let mut current = Some(self.id);
        while let Some(id) = current {
            let node = arena.node(id);
            if node.parent.is_none() {
                break;
            }
            parts.push(format!("'{}'", node.name));
            current = node.parent;
        }
        parts.reverse();
        parts.join(" > ")
    }

    /// Copy this subtree's structure, states and progress under one lock
    pub fn snapshot(&self) -> TaskSnapshot {
        lock(&self.arena).snapshot(self.id)
    }

    /// Non-owning handle for listeners stored inside the tree
    pub fn downgrade(&self) -> WeakTask {
        WeakTask {
            arena: Arc::downgrade(&self.arena),
            id: self.id,
        }
    }

    fn handle(&self, id: TaskId) -> Task {
        Task {
            arena: self.arena.clone(),
            id,
        }
    }

    fn follow_child_progress(&self, child: &Task) {
        let parent = self.downgrade();
        child.add_progress_listener(move |_, _| {
            if let Some(parent) = parent.upgrade() {
                parent.dispatch_progress();
            }
        });
    }

    fn dispatch_progress(&self) {
        let (value, listeners) = {
            let mut arena = lock(&self.arena);
            let value = arena.progress(self.id);
            let node = arena.node_mut(self.id);
            if node.last_progress == Some(value) {
                return;
            }
            node.last_progress = Some(value);
            (value, node.progress_listeners.snapshot())
        };
        for listener in listeners {
            listener(self, value);
        }
    }

    fn mark_finished(&self) {
        let listeners = {
            let mut arena = lock(&self.arena);
            let node = arena.node_mut(self.id);
            if node.state == TaskState::Finished {
                return;
            }
            node.state = TaskState::Finished;
            node.finish_listeners.snapshot()
        };
        info!(task = %self.id, name = %self.name(), "Task finished");
        for listener in listeners {
            listener(self);
        }
    }

    /// Deliver a panic to this task's listeners and then each ancestor's
    fn dispatch_panic(&self, message: &str) {
        let listeners = {
            let arena = lock(&self.arena);
            let mut listeners = Vec::new();
            let mut current = Some(self.id);
            while let Some(id) = current {
                let node = arena.node(id);
                listeners.extend(node.panic_listeners.snapshot());
                current = node.parent;
            }
            listeners
        };
        error!(task = %self.id, %message, "Task start routine panicked");
        if listeners.is_empty() {
            error!("No panic listener registered, aborting process");
            std::process::exit(UNHANDLED_PANIC_EXIT);
        }
        for listener in listeners {
            listener(self, message);
        }
    }
}

impl PartialEq for Task {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.arena, &other.arena) && self.id == other.id
    }
}

impl Eq for Task {}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Only the id: formatting must never take the arena lock
        f.debug_tuple("Task").field(&self.id).finish()
    }
}

/// Completion callback handed to a start routine
///
/// Consumed by [`Completion::finish`]. Dropping it unfinished leaves the task
/// Running forever, which stalls admission on its level.
pub struct Completion {
    task: Task,
    fired: bool,
}

impl Completion {
    /// Mark the task Finished and fire its finish listeners on this thread
    pub fn finish(mut self) {
        self.fired = true;
        self.task.mark_finished();
    }

    /// The task this completion belongs to
    pub fn task(&self) -> &Task {
        &self.task
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if !self.fired {
            warn!(task = %self.task.id, "Completion dropped without finishing; task stays running");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
