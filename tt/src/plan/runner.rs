//! Plan runner - turns plan tasks into live subtasks
//!
//! A plan task becomes a subtask of its parent. When it starts it creates its
//! own subtasks, waits for all of them, then works through its own units.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tracing::{debug, trace};

use crate::task::{Completion, Task, TaskState};

use super::definition::{Plan, PlanTask};

/// Create the plan's top-level tasks under `root`
///
/// Deeper tasks appear as their parents start. Returns the top-level tasks.
pub fn spawn_plan(root: &Task, plan: &Plan) -> Vec<Task> {
    debug!(title = %plan.title, tasks = plan.tasks.len(), "spawn_plan: called");
    plan.tasks.iter().map(|def| add_task(root, def.clone())).collect()
}

fn add_task(parent: &Task, def: PlanTask) -> Task {
    let name = def.name.clone();
    parent.create_subtask(name, move |task, done| run_task(task, def, done))
}

async fn run_task(task: Task, def: PlanTask, done: Completion) {
    let own = task.create_progress(def.weight);
    own.set_work(def.units);

    if !def.children.is_empty() {
        task.inherit_progress();
        let children: Vec<Task> = def.children.into_iter().map(|child| add_task(&task, child)).collect();
        wait_for_children(&children).await;
    }

    for unit in 0..def.units {
        if def.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(def.delay_ms)).await;
        }
        trace!(task = %task.id(), unit, "run_task: unit done");
        own.finish(1);
    }
    done.finish();
}

async fn wait_for_children(children: &[Task]) {
    let notify = Arc::new(Notify::new());
    for child in children {
        let notify = notify.clone();
        child.add_finish_listener(move |_| notify.notify_one());
    }
    // A finish between the check and the wait leaves a permit behind
    while !children.iter().all(|child| child.state() == TaskState::Finished) {
        notify.notified().await;
    }
}
