//! Level-based admission scheduler
//!
//! The [`Manager`] watches a task tree and starts Queued tasks whenever a
//! level has spare budget, then reports once every task in the tree has
//! finished.

mod config;
mod manager;

pub use config::LevelCaps;
pub use manager::{CompletionListener, Manager};
