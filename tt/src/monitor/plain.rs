//! Plain monitor - one log line per finished task

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use crate::sync::lock;
use crate::task::Task;

use super::Monitor;
use super::section::Section;

/// Monitor for non-terminal output
///
/// Prints `Task 'A' > 'B' done` whenever a task finishes. The header and
/// footer are accepted but never shown.
pub struct PlainMonitor {
    header: Section,
    footer: Section,
}

impl PlainMonitor {
    /// Log finished tasks to standard output
    pub fn new(root: &Task) -> Self {
        Self::with_writer(root, io::stdout())
    }

    /// Log finished tasks to `out`
    pub fn with_writer<W: Write + Send + 'static>(root: &Task, out: W) -> Self {
        debug!(root = %root.id(), "PlainMonitor::with_writer: called");
        let out: Arc<Mutex<dyn Write + Send>> = Arc::new(Mutex::new(out));
        watch(&out, root);
        Self {
            header: Section::new(),
            footer: Section::new(),
        }
    }
}

fn watch(out: &Arc<Mutex<dyn Write + Send>>, task: &Task) {
    let sink = out.clone();
    task.add_finish_listener(move |task| {
        let name = task.qualified_name();
        if name.is_empty() {
            return;
        }
        let mut out = lock(&sink);
        if let Err(e) = writeln!(out, "Task {} done", name).and_then(|_| out.flush()) {
            warn!(error = %e, "PlainMonitor: failed to write");
        }
    });

    let sink = out.clone();
    task.add_children_listener(move |_, child, _| watch(&sink, child));

    for child in task.children() {
        watch(out, &child);
    }
}

impl Monitor for PlainMonitor {
    fn header(&self) -> &Section {
        &self.header
    }

    fn footer(&self) -> &Section {
        &self.footer
    }

    fn close(&mut self) {}
}
