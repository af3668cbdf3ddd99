//! Interactive monitor - live terminal dashboard
//!
//! Listeners never touch the terminal. They merge their effect into one
//! pending [`RenderJob`] and wake the renderer thread, which owns the output
//! stream and the probe. Bursts of progress updates therefore collapse into
//! a single job.
//!
//! ```text
//!   task / section listeners ──merge──▶ RenderJob ◀──probe── ticker
//!                                          │
//!                                     (wake, 1 slot)
//!                                          ▼
//!                                  renderer thread ──▶ terminal
//! ```

use std::io::{self, BufWriter, Write};
use std::sync::{Arc, Mutex, Weak};
use std::thread;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, trace, warn};

use crate::sync::lock;
use crate::task::Task;

use super::Monitor;
use super::layout::{DEFAULT_SCREEN, Layout, ScreenSize};
use super::probe::{CrosstermProbe, TerminalProbe, probe_screen_size};
use super::screen::Screen;
use super::section::{Section, SectionRow};

const STDOUT_BUFFER: usize = 81920;

/// Coalesced visual updates waiting for the renderer
#[derive(Debug, Default)]
struct RenderJob {
    header: Option<Vec<SectionRow>>,
    footer: Option<Vec<SectionRow>>,
    /// Tasks whose progress changed, in first-update order
    ///
    /// Values are read when the bar is drawn, so deliveries that arrive out
    /// of order cannot leave a stale bar behind.
    progress: Vec<Task>,
    /// Full relayout and repaint
    relayout: bool,
    /// Measure the screen before rendering
    probe: bool,
    /// Restore the terminal and stop after this job
    close: bool,
}

impl RenderJob {
    fn is_empty(&self) -> bool {
        self.header.is_none()
            && self.footer.is_none()
            && self.progress.is_empty()
            && !self.relayout
            && !self.probe
            && !self.close
    }

    fn push_progress(&mut self, task: &Task) {
        // A pending relayout repaints every bar anyway
        if self.relayout || self.progress.iter().any(|t| t.id() == task.id()) {
            return;
        }
        self.progress.push(task.clone());
    }
}

struct Shared {
    job: Mutex<RenderJob>,
    wake: mpsc::Sender<()>,
}

impl Shared {
    fn merge(&self, apply: impl FnOnce(&mut RenderJob)) {
        apply(&mut lock(&self.job));
        match self.wake.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => {}
            Err(TrySendError::Closed(())) => trace!("Shared::merge: renderer already gone"),
        }
    }
}

/// Dashboard drawn in place on the terminal
///
/// Shows the header, then one row per visible task with its tree guide, name
/// and progress bar, then the footer. [`Monitor::close`] must run before the
/// process exits so the cursor is restored; dropping the monitor closes it.
pub struct InteractiveMonitor {
    header: Section,
    footer: Section,
    shared: Arc<Shared>,
    renderer: Option<thread::JoinHandle<()>>,
    ticker: Option<tokio::task::JoinHandle<()>>,
    closed: bool,
}

impl InteractiveMonitor {
    /// Dashboard on the process's own terminal
    pub fn new(root: &Task, probe_interval: Duration) -> io::Result<Self> {
        Self::with_terminal(
            root,
            BufWriter::with_capacity(STDOUT_BUFFER, io::stdout()),
            Box::new(CrosstermProbe),
            probe_interval,
        )
    }

    /// Dashboard writing to `out` and measuring with `probe`
    ///
    /// The screen is re-measured every `probe_interval` when a Tokio runtime
    /// is available; a zero interval disables periodic measuring.
    pub fn with_terminal<W>(
        root: &Task,
        out: W,
        probe: Box<dyn TerminalProbe>,
        probe_interval: Duration,
    ) -> io::Result<Self>
    where
        W: Write + Send + 'static,
    {
        debug!(root = %root.id(), ?probe_interval, "InteractiveMonitor::with_terminal: called");
        let (wake, wakeups) = mpsc::channel(1);
        let shared = Arc::new(Shared {
            job: Mutex::new(RenderJob::default()),
            wake,
        });

        let header = Section::new();
        let footer = Section::new();
        let weak = Arc::downgrade(&shared);
        header.add_listener(move |_, rows| {
            if let Some(shared) = weak.upgrade() {
                shared.merge(|job| job.header = Some(rows.to_vec()));
            }
        });
        let weak = Arc::downgrade(&shared);
        footer.add_listener(move |_, rows| {
            if let Some(shared) = weak.upgrade() {
                shared.merge(|job| job.footer = Some(rows.to_vec()));
            }
        });
        watch(&Arc::downgrade(&shared), root);

        let renderer = Renderer {
            root: root.clone(),
            header: header.clone(),
            footer: footer.clone(),
            shared: shared.clone(),
            screen: Screen::new(out),
            probe,
            size: DEFAULT_SCREEN,
            size_changed: false,
            layout: None,
            bars: Vec::new(),
        };
        let renderer = thread::Builder::new()
            .name("tt-render".to_string())
            .spawn(move || renderer.run(wakeups))?;

        let ticker = spawn_ticker(Arc::downgrade(&shared), probe_interval);

        Ok(Self {
            header,
            footer,
            shared,
            renderer: Some(renderer),
            ticker,
            closed: false,
        })
    }
}

fn spawn_ticker(shared: Weak<Shared>, period: Duration) -> Option<tokio::task::JoinHandle<()>> {
    if period.is_zero() {
        return None;
    }
    let handle = match tokio::runtime::Handle::try_current() {
        Ok(handle) => handle,
        Err(_) => {
            warn!("InteractiveMonitor: no Tokio runtime, screen size will not be re-measured");
            return None;
        }
    };
    Some(handle.spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // First tick is immediate; the renderer measures at startup itself
        interval.tick().await;
        loop {
            interval.tick().await;
            let Some(shared) = shared.upgrade() else {
                break;
            };
            shared.merge(|job| job.probe = true);
        }
    }))
}

/// Register dashboard listeners on `task` and everything below it
fn watch(shared: &Weak<Shared>, task: &Task) {
    let weak = shared.clone();
    task.add_progress_listener(move |task, _| {
        if let Some(shared) = weak.upgrade() {
            shared.merge(|job| job.push_progress(task));
        }
    });

    let weak = shared.clone();
    task.add_children_listener(move |_, child, _| {
        watch(&weak, child);
        if let Some(shared) = weak.upgrade() {
            shared.merge(|job| job.relayout = true);
        }
    });

    let weak = shared.clone();
    task.add_finish_listener(move |_| {
        if let Some(shared) = weak.upgrade() {
            shared.merge(|job| job.relayout = true);
        }
    });

    for child in task.children() {
        watch(shared, &child);
    }
}

impl Monitor for InteractiveMonitor {
    fn header(&self) -> &Section {
        &self.header
    }

    fn footer(&self) -> &Section {
        &self.footer
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        debug!("InteractiveMonitor::close: called");

        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
        self.shared.merge(|job| job.close = true);
        if let Some(renderer) = self.renderer.take() {
            if renderer.join().is_err() {
                warn!("InteractiveMonitor::close: renderer thread panicked");
            }
        }
    }
}

impl Drop for InteractiveMonitor {
    fn drop(&mut self) {
        self.close();
    }
}

/// Sole owner of the terminal stream
struct Renderer<W: Write> {
    root: Task,
    header: Section,
    footer: Section,
    shared: Arc<Shared>,
    screen: Screen<W>,
    probe: Box<dyn TerminalProbe>,
    size: ScreenSize,
    size_changed: bool,
    layout: Option<Layout>,
    /// Bar cells currently drawn, per visible row
    bars: Vec<usize>,
}

impl<W: Write> Renderer<W> {
    fn run(mut self, mut wakeups: mpsc::Receiver<()>) {
        debug!("Renderer::run: starting");
        self.measure();
        let started = self
            .screen
            .enter(self.size)
            .and_then(|_| self.relayout())
            .and_then(|_| self.screen.flush());
        if let Err(e) = started {
            warn!(error = %e, "Renderer::run: initial paint failed");
        }

        while wakeups.blocking_recv().is_some() {
            loop {
                let job = std::mem::take(&mut *lock(&self.shared.job));
                if job.is_empty() {
                    break;
                }
                let closing = job.close;
                if let Err(e) = self.process(job).and_then(|_| self.screen.flush()) {
                    warn!(error = %e, "Renderer::run: render failed");
                }
                if closing {
                    if let Err(e) = self.screen.leave(self.size) {
                        warn!(error = %e, "Renderer::run: failed to restore cursor");
                    }
                    debug!("Renderer::run: closed");
                    return;
                }
            }
        }
    }

    fn process(&mut self, job: RenderJob) -> io::Result<()> {
        trace!(
            progress = job.progress.len(),
            relayout = job.relayout,
            probe = job.probe,
            "Renderer::process: called"
        );
        if job.probe {
            self.measure();
        }
        if job.relayout || self.size_changed {
            return self.relayout();
        }
        for task in &job.progress {
            self.render_progress(task)?;
        }
        if let Some(rows) = job.header {
            if !self.section_fits(rows.len(), true) {
                return self.relayout();
            }
            let width = self.layout.as_ref().map_or(0, Layout::section_width);
            self.screen.section(1, &rows, width)?;
        }
        if let Some(rows) = job.footer {
            if !self.section_fits(rows.len(), false) {
                return self.relayout();
            }
            if let Some(layout) = &self.layout {
                self.screen.section(layout.footer_top(), &rows, layout.section_width())?;
            }
        }
        Ok(())
    }

    fn section_fits(&self, rows: usize, header: bool) -> bool {
        match &self.layout {
            Some(layout) if header => layout.header_height == rows,
            Some(layout) => layout.footer_height == rows,
            None => false,
        }
    }

    /// Re-measure the screen; a change forces the next render to relayout
    fn measure(&mut self) {
        match probe_screen_size(self.probe.as_mut()) {
            Ok(size) if size != self.size => {
                info!(width = size.width, height = size.height, "Screen size changed");
                self.size = size;
                self.size_changed = true;
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, width = self.size.width, height = self.size.height, "Screen probe failed, keeping size"),
        }
    }

    fn relayout(&mut self) -> io::Result<()> {
        let header = self.header.text();
        let footer = self.footer.text();
        let layout = Layout::compute(self.size, header.len(), footer.len(), &self.root.snapshot());
        debug!(rows = layout.rows.len(), "Renderer::relayout: called");
        self.size_changed = false;

        self.screen.clear()?;
        self.screen.section(1, &header, layout.section_width())?;
        self.screen.section(layout.footer_top(), &footer, layout.section_width())?;
        self.bars = vec![0; layout.rows.len()];
        for (i, row) in layout.rows.iter().enumerate() {
            self.screen.task_row(&layout, i)?;
            if let Some(cells) = layout.bar_cells(row.progress) {
                self.screen.bar(&layout, i, 0, cells)?;
                self.bars[i] = cells;
            }
        }
        self.layout = Some(layout);
        Ok(())
    }

    fn render_progress(&mut self, task: &Task) -> io::Result<()> {
        let Some(layout) = &self.layout else {
            return Ok(());
        };
        let (Some(index), Some(cells)) = (layout.row_of(task.id()), layout.bar_cells(task.progress())) else {
            return Ok(());
        };
        let drawn = self.bars[index];
        if drawn != cells {
            self.screen.bar(layout, index, drawn, cells)?;
            self.bars[index] = cells;
        }
        Ok(())
    }
}
