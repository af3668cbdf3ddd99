//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

use crate::monitor::MonitorMode;

/// tasktree - hierarchical task scheduler with a live terminal dashboard
#[derive(Parser)]
#[command(
    name = "tt",
    about = "Run task trees under per-level admission caps with a live dashboard",
    version = env!("CARGO_PKG_VERSION"),
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Force line-oriented output even on a terminal
    #[arg(long, global = true)]
    pub plain: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a plan file to completion
    Run {
        /// Plan file (YAML)
        plan: PathBuf,

        /// Override the per-level caps, e.g. `0,1,3`
        #[arg(long, value_delimiter = ',')]
        caps: Option<Vec<usize>>,
    },

    /// Run a randomly generated plan
    Demo {
        /// Number of top-level branches
        #[arg(short, long, default_value = "4")]
        branches: usize,

        /// Most leaves per branch
        #[arg(short = 'n', long, default_value = "6")]
        leaves: usize,

        /// Most work units per leaf
        #[arg(long, default_value = "20")]
        max_units: u64,

        /// Most milliseconds per work unit
        #[arg(long, default_value = "80")]
        max_delay_ms: u64,

        /// Seed for a reproducible plan
        #[arg(short, long)]
        seed: Option<u64>,

        /// Override the per-level caps, e.g. `0,1,3`
        #[arg(long, value_delimiter = ',')]
        caps: Option<Vec<usize>>,
    },

    /// Validate a plan file without running it
    Check {
        /// Plan file (YAML)
        plan: PathBuf,
    },
}

impl Command {
    /// Caps given on the command line, if any
    pub fn caps(&self) -> Option<&[usize]> {
        match self {
            Self::Run { caps, .. } | Self::Demo { caps, .. } => caps.as_deref(),
            Self::Check { .. } => None,
        }
    }
}

/// Get the log file path
pub fn get_log_path() -> PathBuf {
    debug!("get_log_path: called");
    let path = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tasktree")
        .join("logs")
        .join("tasktree.log");
    debug!(?path, "get_log_path: returning path");
    path
}

/// Generate the after_help text with terminal and config details
pub fn generate_after_help() -> String {
    debug!("generate_after_help: called");
    let log_path = get_log_path();

    let mut help = String::new();

    help.push_str("Terminal:\n");
    let (icon, mode) = if MonitorMode::Auto.is_interactive() {
        debug!("generate_after_help: stdout is a terminal");
        ("\u{2705}", "interactive dashboard")
    } else {
        debug!("generate_after_help: stdout is not a terminal");
        ("\u{274C}", "plain output")
    };
    help.push_str(&format!("  {} {}\n", icon, mode));

    help.push('\n');
    help.push_str("Config files (first found wins):\n");
    help.push_str("  ./.tasktree.yml\n");
    if let Some(config_dir) = dirs::config_dir() {
        help.push_str(&format!("  {}\n", config_dir.join("tasktree").join("tasktree.yml").display()));
    }

    help.push('\n');
    help.push_str(&format!("Logs are written to: {}\n", log_path.display()));

    debug!("generate_after_help: returning help text");
    help
}
