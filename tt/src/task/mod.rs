//! Task tree and progress tracking
//!
//! A [`Task`] is a named unit of work in a tree rooted at [`Task::root`].
//! Tasks own weighted [`Progress`] trackers and report a single aggregate
//! fraction; a parent can also fold its children in via
//! [`Task::inherit_progress`].

mod progress;
mod tree;

pub use progress::{Progress, ProgressListener};
pub use tree::{
    ChildrenListener, Completion, FinishListener, PanicListener, ROOT_NAME, Task, TaskId, TaskProgressListener,
    TaskSnapshot, TaskState, UNHANDLED_PANIC_EXIT, WeakTask,
};
