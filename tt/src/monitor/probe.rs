//! Terminal size probe via cursor-position report
//!
//! The cursor is sent far past the bottom-right corner (terminals clamp it to
//! the last cell) and its reported position is read back as the screen size.
//! Input must be in raw, no-echo mode while the report is read.

use std::io::{self, Write};

use crossterm::cursor::MoveTo;
use crossterm::{execute, terminal};
use thiserror::Error;
use tracing::{debug, warn};

use super::layout::ScreenSize;

/// Errors from querying the terminal size
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("terminal I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("terminal reported an empty size ({rows} rows, {cols} columns)")]
    EmptySize { rows: u16, cols: u16 },
}

/// Terminal capabilities needed to measure the screen
pub trait TerminalProbe: Send {
    /// Disable canonical input and echo
    fn enter_raw_mode(&mut self) -> Result<(), ProbeError>;

    /// Restore the input mode saved by `enter_raw_mode`
    fn restore_mode(&mut self) -> Result<(), ProbeError>;

    /// Move the cursor to the far corner and return its 1-based `(row, col)`
    fn query_cursor_position(&mut self) -> Result<(u16, u16), ProbeError>;
}

/// Probe backed by crossterm on the process's own terminal
#[derive(Debug, Default)]
pub struct CrosstermProbe;

impl TerminalProbe for CrosstermProbe {
    fn enter_raw_mode(&mut self) -> Result<(), ProbeError> {
        terminal::enable_raw_mode()?;
        Ok(())
    }

    fn restore_mode(&mut self) -> Result<(), ProbeError> {
        terminal::disable_raw_mode()?;
        Ok(())
    }

    fn query_cursor_position(&mut self) -> Result<(u16, u16), ProbeError> {
        let mut stdout = io::stdout();
        execute!(stdout, MoveTo(9999, 9999))?;
        stdout.flush()?;
        let (col, row) = crossterm::cursor::position()?;
        Ok((row + 1, col + 1))
    }
}

/// Measure the screen, restoring the input mode even when the query fails
pub fn probe_screen_size(probe: &mut dyn TerminalProbe) -> Result<ScreenSize, ProbeError> {
    probe.enter_raw_mode()?;
    let answer = probe.query_cursor_position();
    if let Err(e) = probe.restore_mode() {
        warn!(error = %e, "probe_screen_size: failed to restore terminal mode");
    }
    let (rows, cols) = answer?;
    if rows == 0 || cols == 0 {
        return Err(ProbeError::EmptySize { rows, cols });
    }
    debug!(rows, cols, "probe_screen_size: measured");
    Ok(ScreenSize {
        width: cols as usize,
        height: rows as usize,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Scripted probe that records the calls it receives
    pub(crate) struct FakeProbe {
        pub answers: Vec<Result<(u16, u16), ()>>,
        pub calls: Arc<Mutex<Vec<&'static str>>>,
    }

    impl FakeProbe {
        pub(crate) fn fixed(rows: u16, cols: u16) -> Self {
            Self {
                answers: vec![Ok((rows, cols))],
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    impl TerminalProbe for FakeProbe {
        fn enter_raw_mode(&mut self) -> Result<(), ProbeError> {
            self.calls.lock().unwrap().push("raw");
            Ok(())
        }

        fn restore_mode(&mut self) -> Result<(), ProbeError> {
            self.calls.lock().unwrap().push("restore");
            Ok(())
        }

        fn query_cursor_position(&mut self) -> Result<(u16, u16), ProbeError> {
            self.calls.lock().unwrap().push("query");
            // The last answer repeats forever
            let answer = if self.answers.len() > 1 {
                self.answers.remove(0)
            } else {
                self.answers[0]
            };
            answer.map_err(|_| ProbeError::Io(io::Error::new(io::ErrorKind::TimedOut, "no cursor report")))
        }
    }

    #[test]
    fn test_probe_reads_size() {
        let mut probe = FakeProbe::fixed(40, 120);
        let size = probe_screen_size(&mut probe).unwrap();
        assert_eq!(size, ScreenSize { width: 120, height: 40 });
        assert_eq!(*probe.calls.lock().unwrap(), vec!["raw", "query", "restore"]);
    }

    #[test]
    fn test_failed_query_still_restores_mode() {
        let mut probe = FakeProbe {
            answers: vec![Err(())],
            calls: Arc::new(Mutex::new(Vec::new())),
        };
        assert!(matches!(probe_screen_size(&mut probe), Err(ProbeError::Io(_))));
        assert_eq!(*probe.calls.lock().unwrap(), vec!["raw", "query", "restore"]);
    }

    #[test]
    fn test_zero_size_is_rejected() {
        let mut probe = FakeProbe::fixed(0, 80);
        assert!(matches!(
            probe_screen_size(&mut probe),
            Err(ProbeError::EmptySize { rows: 0, cols: 80 })
        ));
    }
}
