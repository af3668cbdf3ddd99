//! Workload plans for the `tt` driver
//!
//! A plan describes a tree of synthetic tasks (units of simulated work) so
//! the scheduler and monitors can be exercised end to end.

mod definition;
mod demo;
mod runner;

pub use definition::{Plan, PlanError, PlanTask};
pub use demo::{DemoShape, random_plan};
pub use runner::spawn_plan;
