//! tasktree configuration types and loading

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::monitor::MonitorMode;
use crate::scheduler::LevelCaps;

/// Main tasktree configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    /// Per-level admission caps
    pub scheduler: LevelCaps,

    /// Dashboard settings
    pub monitor: MonitorConfig,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub log_level: Option<String>,
}

impl Config {
    /// Load configuration with fallback chain
    ///
    /// 1. Explicit path (errors are fatal)
    /// 2. `./.tasktree.yml`
    /// 3. `<config_dir>/tasktree/tasktree.yml`
    /// 4. Defaults
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        for candidate in Self::search_paths() {
            if candidate.exists() {
                match Self::load_from_file(&candidate) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {:#}", candidate.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Log level from whichever config file `load` would pick
    ///
    /// Runs before logging is set up, so failures are silently ignored.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let candidates = match config_path {
            Some(path) => vec![path.clone()],
            None => Self::search_paths(),
        };
        candidates
            .into_iter()
            .find(|path| path.exists())
            .and_then(|path| Self::load_from_file(path).ok())
            .and_then(|config| config.log_level)
    }

    fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(".tasktree.yml")];
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("tasktree").join("tasktree.yml"));
        }
        paths
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Dashboard configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct MonitorConfig {
    /// auto, interactive or plain
    pub mode: MonitorMode,

    /// How often the terminal size is re-measured (0 disables)
    pub probe_interval_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            mode: MonitorMode::Auto,
            probe_interval_ms: 1000,
        }
    }
}

impl MonitorConfig {
    pub fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.probe_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.scheduler, LevelCaps::default());
        assert_eq!(config.monitor.mode, MonitorMode::Auto);
        assert_eq!(config.monitor.probe_interval(), Duration::from_secs(1));
        assert!(config.log_level.is_none());
    }

    #[test]
    fn test_load_explicit_file() {
        let file = write_config(
            "log-level: debug\nscheduler:\n  level-caps: [0, 2]\n  default-cap: 4\nmonitor:\n  mode: plain\n  probe-interval-ms: 250\n",
        );
        let config = Config::load(Some(&file.path().to_path_buf())).unwrap();
        assert_eq!(config.scheduler, LevelCaps::new(vec![0, 2], 4));
        assert_eq!(config.monitor.mode, MonitorMode::Plain);
        assert_eq!(config.monitor.probe_interval(), Duration::from_millis(250));
        assert_eq!(config.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let file = write_config("monitor:\n  mode: interactive\n");
        let config = Config::load(Some(&file.path().to_path_buf())).unwrap();
        assert_eq!(config.monitor.mode, MonitorMode::Interactive);
        assert_eq!(config.monitor.probe_interval_ms, 1000);
        assert_eq!(config.scheduler, LevelCaps::default());
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let path = PathBuf::from("/nonexistent/tasktree.yml");
        let err = Config::load(Some(&path)).unwrap_err();
        assert!(format!("{:#}", err).contains("/nonexistent/tasktree.yml"));
    }

    #[test]
    fn test_invalid_yaml_is_error() {
        let file = write_config("scheduler: [not, a, map]\n");
        assert!(Config::load(Some(&file.path().to_path_buf())).is_err());
    }

    #[test]
    fn test_load_log_level() {
        let file = write_config("log-level: trace\n");
        let level = Config::load_log_level(Some(&file.path().to_path_buf()));
        assert_eq!(level.as_deref(), Some("trace"));

        let missing = PathBuf::from("/nonexistent/tasktree.yml");
        assert_eq!(Config::load_log_level(Some(&missing)), None);
    }
}
