//! Monitors - live views over a task tree
//!
//! A monitor observes a tree through its listeners and exposes two
//! [`Section`]s (header and footer) for free-form status text. The
//! interactive monitor draws a dashboard on the terminal; the plain monitor
//! prints one line per finished task for logs and pipes.

mod interactive;
mod layout;
mod plain;
mod probe;
mod screen;
mod section;

use std::io;
use std::time::Duration;

use crossterm::tty::IsTty;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::task::Task;

pub use interactive::InteractiveMonitor;
pub use layout::{DEFAULT_SCREEN, Guide, Layout, Row, ScreenSize, bar_columns};
pub use plain::PlainMonitor;
pub use probe::{CrosstermProbe, ProbeError, TerminalProbe, probe_screen_size};
pub use screen::{Screen, format_section_line};
pub use section::{Alignment, Section, SectionListener, SectionRow};

/// View over a task tree with a header and a footer
pub trait Monitor: Send {
    /// Text shown above the task rows
    fn header(&self) -> &Section;

    /// Text shown below the task rows
    fn footer(&self) -> &Section;

    /// Stop updating and restore the terminal; safe to call more than once
    fn close(&mut self);
}

/// Which monitor [`create_monitor`] builds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorMode {
    /// Interactive when stdout is a terminal, plain otherwise
    #[default]
    Auto,
    Interactive,
    Plain,
}

impl MonitorMode {
    /// Resolve `Auto` against the current stdout
    pub fn is_interactive(self) -> bool {
        match self {
            MonitorMode::Auto => io::stdout().is_tty(),
            MonitorMode::Interactive => true,
            MonitorMode::Plain => false,
        }
    }
}

/// Build a monitor for `root`
///
/// Falls back to the plain monitor if the dashboard cannot be started.
pub fn create_monitor(root: &Task, mode: MonitorMode, probe_interval: Duration) -> Box<dyn Monitor> {
    let interactive = mode.is_interactive();
    debug!(?mode, interactive, "create_monitor: called");
    if interactive {
        match InteractiveMonitor::new(root, probe_interval) {
            Ok(monitor) => return Box::new(monitor),
            Err(e) => warn!(error = %e, "create_monitor: dashboard unavailable, using plain output"),
        }
    }
    Box::new(PlainMonitor::new(root))
}
