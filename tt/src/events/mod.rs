//! Event subscription for the task tree
//!
//! All notifications in tasktree are synchronous callbacks: a mutation on a
//! Progress, Task, Section or Manager invokes that entity's listeners on the
//! thread that performed the mutation, after the entity's lock is released.
//!
//! ```text
//!   Progress ──progress──▶ Task ──progress / child-added / finish / panic──▶ Manager
//!                                                                         └─▶ Monitor
//!   Section ──changed──▶ Monitor
//! ```
//!
//! [`Registry`] is the one building block every entity uses to hold its
//! listeners; see its module docs for ordering and re-entrancy rules.

mod bus;

pub use bus::Registry;
