//! tasktree - hierarchical task scheduling with a live terminal dashboard
//!
//! Work is described as a tree of named [`Task`]s, each reporting weighted
//! progress. A [`Manager`] starts queued tasks level by level without ever
//! exceeding a per-level cap, and tells its listeners when the whole tree is
//! done. A [`Monitor`](monitor::Monitor) renders the tree as it changes.
//!
//! # Modules
//!
//! - [`task`] - Task tree, completion handles and progress trackers
//! - [`scheduler`] - Per-level admission control and completion detection
//! - [`monitor`] - Interactive dashboard and plain line output
//! - [`events`] - Listener registries shared by every entity
//! - [`plan`] - YAML workload plans for the `tt` driver
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod config;
pub mod events;
pub mod monitor;
pub mod plan;
pub mod scheduler;
pub mod task;

mod sync;

// Re-export commonly used types
pub use config::{Config, MonitorConfig};
pub use monitor::{Alignment, InteractiveMonitor, Monitor, MonitorMode, PlainMonitor, Section, create_monitor};
pub use plan::{DemoShape, Plan, PlanError, PlanTask, random_plan, spawn_plan};
pub use scheduler::{LevelCaps, Manager};
pub use task::{Completion, Progress, Task, TaskId, TaskState};
