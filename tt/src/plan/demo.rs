//! Random demo plans

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use super::definition::{Plan, PlanTask};

/// Shape of a generated plan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DemoShape {
    /// Top-level branches
    pub branches: usize,
    /// Most leaves under one branch
    pub leaves: usize,
    /// Most units in one leaf
    pub max_units: u64,
    /// Most milliseconds per unit
    pub max_delay_ms: u64,
}

impl Default for DemoShape {
    fn default() -> Self {
        Self {
            branches: 4,
            leaves: 6,
            max_units: 20,
            max_delay_ms: 80,
        }
    }
}

/// Generate a two-level plan; the same seed always yields the same plan
pub fn random_plan(shape: DemoShape, seed: Option<u64>) -> Plan {
    debug!(?shape, ?seed, "random_plan: called");
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let max_units = shape.max_units.max(1);
    let max_delay = shape.max_delay_ms.max(1);

    let tasks = (1..=shape.branches.max(1))
        .map(|b| {
            let leaves = rng.random_range(1..=shape.leaves.max(1));
            let children = (1..=leaves)
                .map(|l| {
                    let mut leaf = PlanTask::leaf(
                        format!("Item {}.{}", b, l),
                        rng.random_range(1..=max_units),
                        rng.random_range(1..=max_delay),
                    );
                    leaf.weight = rng.random_range(1..=3) as f64;
                    leaf
                })
                .collect();
            let mut branch = PlanTask::leaf(format!("Batch {}", b), 1, rng.random_range(1..=max_delay));
            branch.children = children;
            branch
        })
        .collect();

    Plan {
        title: "tasktree demo".to_string(),
        subtitle: seed.map(|s| format!("seed {}", s)),
        tasks,
    }
}
