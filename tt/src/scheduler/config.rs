//! Per-level admission caps

use serde::{Deserialize, Serialize};

/// Concurrency caps indexed by depth from the root
///
/// `level_caps[0]` is the root's own level (the root never runs, so it is
/// usually 0), `level_caps[1]` caps the root's direct children, and so on.
/// Levels beyond the list use `default_cap`. A cap of 0 never admits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LevelCaps {
    #[serde(default = "default_level_caps")]
    pub level_caps: Vec<usize>,

    #[serde(default = "default_cap")]
    pub default_cap: usize,
}

fn default_level_caps() -> Vec<usize> {
    vec![0, 1, 3]
}

fn default_cap() -> usize {
    3
}

impl Default for LevelCaps {
    fn default() -> Self {
        Self {
            level_caps: default_level_caps(),
            default_cap: default_cap(),
        }
    }
}

impl LevelCaps {
    /// Build caps from an explicit list and fallback
    pub fn new(level_caps: Vec<usize>, default_cap: usize) -> Self {
        Self {
            level_caps,
            default_cap,
        }
    }

    /// Cap for tasks at `level`
    pub fn cap(&self, level: usize) -> usize {
        self.level_caps.get(level).copied().unwrap_or(self.default_cap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_caps() {
        let caps = LevelCaps::default();
        assert_eq!(caps.level_caps, vec![0, 1, 3]);
        assert_eq!(caps.default_cap, 3);
    }

    #[test]
    fn test_cap_falls_back_past_list() {
        let caps = LevelCaps::new(vec![1, 2], 5);
        assert_eq!(caps.cap(0), 1);
        assert_eq!(caps.cap(1), 2);
        assert_eq!(caps.cap(2), 5);
        assert_eq!(caps.cap(40), 5);
    }

    #[test]
    fn test_deserialize_kebab_case() {
        let caps: LevelCaps = serde_yaml::from_str("level-caps: [0, 4]\ndefault-cap: 2\n").unwrap();
        assert_eq!(caps, LevelCaps::new(vec![0, 4], 2));

        let partial: LevelCaps = serde_yaml::from_str("default-cap: 7\n").unwrap();
        assert_eq!(partial.level_caps, vec![0, 1, 3]);
        assert_eq!(partial.default_cap, 7);
    }
}
