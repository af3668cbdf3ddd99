//! Plan definition - YAML description of a synthetic workload

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Errors from loading or validating a plan
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("failed to read plan {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse plan: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("plan has no tasks")]
    Empty,

    #[error("task {path} has an empty name")]
    EmptyName { path: String },

    #[error("task '{name}' has weight {weight}; weights must be positive")]
    InvalidWeight { name: String, weight: f64 },
}

/// A titled forest of tasks to run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Plan {
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,

    #[serde(default)]
    pub tasks: Vec<PlanTask>,
}

/// One unit of work and its subtasks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PlanTask {
    pub name: String,

    /// Work units, each taking `delay_ms`
    #[serde(default = "default_units")]
    pub units: u64,

    #[serde(default)]
    pub delay_ms: u64,

    /// Weight of this task's own units in its progress average
    #[serde(default = "default_weight")]
    pub weight: f64,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<PlanTask>,
}

fn default_units() -> u64 {
    1
}

fn default_weight() -> f64 {
    1.0
}

impl PlanTask {
    /// Leaf task with the default weight
    pub fn leaf(name: impl Into<String>, units: u64, delay_ms: u64) -> Self {
        Self {
            name: name.into(),
            units,
            delay_ms,
            weight: default_weight(),
            children: Vec::new(),
        }
    }

    fn count(&self) -> usize {
        1 + self.children.iter().map(PlanTask::count).sum::<usize>()
    }

    fn depth(&self) -> usize {
        1 + self.children.iter().map(PlanTask::depth).max().unwrap_or(0)
    }

    fn validate(&self, path: &str) -> Result<(), PlanError> {
        if self.name.trim().is_empty() {
            return Err(PlanError::EmptyName { path: path.to_string() });
        }
        if !self.weight.is_finite() || self.weight <= 0.0 {
            return Err(PlanError::InvalidWeight {
                name: self.name.clone(),
                weight: self.weight,
            });
        }
        for (i, child) in self.children.iter().enumerate() {
            child.validate(&format!("{}.{}", path, i + 1))?;
        }
        Ok(())
    }
}

impl Plan {
    /// Read, parse and validate a plan file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, PlanError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Plan::load: called");
        let content = fs::read_to_string(path).map_err(|source| PlanError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    /// Parse and validate a plan document
    pub fn from_yaml(content: &str) -> Result<Self, PlanError> {
        let plan: Self = serde_yaml::from_str(content)?;
        plan.validate()?;
        Ok(plan)
    }

    /// Check names and weights; a plan needs at least one task
    pub fn validate(&self) -> Result<(), PlanError> {
        if self.tasks.is_empty() {
            return Err(PlanError::Empty);
        }
        for (i, task) in self.tasks.iter().enumerate() {
            task.validate(&(i + 1).to_string())?;
        }
        Ok(())
    }

    /// Number of tasks at every depth
    pub fn task_count(&self) -> usize {
        self.tasks.iter().map(PlanTask::count).sum()
    }

    /// Levels below the root
    pub fn depth(&self) -> usize {
        self.tasks.iter().map(PlanTask::depth).max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = r#"
title: Nightly sync
subtitle: all courses
tasks:
  - name: Courses
    units: 2
    delay-ms: 5
    children:
      - name: Algebra
        units: 3
      - name: Biology
        weight: 2.5
  - name: Reports
"#;

    #[test]
    fn test_parse_applies_defaults() {
        let plan = Plan::from_yaml(SAMPLE).unwrap();
        assert_eq!(plan.title, "Nightly sync");
        assert_eq!(plan.subtitle.as_deref(), Some("all courses"));

        let courses = &plan.tasks[0];
        assert_eq!(courses.units, 2);
        assert_eq!(courses.delay_ms, 5);
        assert_eq!(courses.weight, 1.0);
        assert_eq!(courses.children[1].units, 1);
        assert_eq!(courses.children[1].weight, 2.5);
        assert_eq!(plan.tasks[1], PlanTask::leaf("Reports", 1, 0));
    }

    #[test]
    fn test_count_and_depth() {
        let plan = Plan::from_yaml(SAMPLE).unwrap();
        assert_eq!(plan.task_count(), 4);
        assert_eq!(plan.depth(), 2);
    }

    #[test]
    fn test_empty_plan_is_rejected() {
        let err = Plan::from_yaml("title: nothing\ntasks: []\n").unwrap_err();
        assert!(matches!(err, PlanError::Empty));
    }

    #[test]
    fn test_blank_name_reports_path() {
        let yaml = "title: t\ntasks:\n  - name: a\n    children:\n      - name: ok\n      - name: '  '\n";
        match Plan::from_yaml(yaml).unwrap_err() {
            PlanError::EmptyName { path } => assert_eq!(path, "1.2"),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_non_positive_weight_is_rejected() {
        let yaml = "title: t\ntasks:\n  - name: a\n    weight: 0\n";
        assert!(matches!(
            Plan::from_yaml(yaml).unwrap_err(),
            PlanError::InvalidWeight { .. }
        ));
    }

    #[test]
    fn test_malformed_yaml_is_parse_error() {
        assert!(matches!(Plan::from_yaml("title: [").unwrap_err(), PlanError::Parse(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let plan = Plan::load(file.path()).unwrap();
        assert_eq!(plan.task_count(), 4);
    }

    #[test]
    fn test_load_missing_file() {
        let err = Plan::load("/nonexistent/plan.yml").unwrap_err();
        assert!(matches!(err, PlanError::Read { .. }));
        assert!(err.to_string().contains("/nonexistent/plan.yml"));
    }
}
