//! Screen - ANSI output for the dashboard
//!
//! Only cursor addressing, screen/line clears and cursor visibility are used,
//! all emitted through crossterm commands:
//!
//! ```text
//!   hide / show cursor   ESC[?25l / ESC[?25h
//!   move cursor          ESC[{row};{col}H
//!   move to column       ESC[{col}G
//!   clear screen / line  ESC[2J / ESC[2K
//! ```

use std::io::{self, Write};

use crossterm::cursor::{Hide, MoveTo, MoveToColumn, Show};
use crossterm::queue;
use crossterm::terminal::{Clear, ClearType};

use super::layout::{Layout, ScreenSize};
use super::section::SectionRow;

const BAR_FILL: &str = "#";
const BAR_EMPTY: &str = " ";

/// Buffered writer of dashboard escape sequences
pub struct Screen<W: Write> {
    out: W,
}

impl<W: Write> Screen<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Hide the cursor and scroll a blank page into view
    ///
    /// Scrolling with newlines instead of clearing straight away keeps the
    /// terminal's previous contents in its scrollback.
    pub fn enter(&mut self, size: ScreenSize) -> io::Result<()> {
        queue!(self.out, Hide, cursor(size.height, 1))?;
        for _ in 1..size.height {
            self.out.write_all(b"\n")?;
        }
        queue!(self.out, Clear(ClearType::All))
    }

    /// Leave the cursor on a fresh line below the dashboard and show it again
    pub fn leave(&mut self, size: ScreenSize) -> io::Result<()> {
        queue!(self.out, cursor(size.height, 1))?;
        self.out.write_all(b"\n")?;
        queue!(self.out, Show)?;
        self.out.flush()
    }

    pub fn clear(&mut self) -> io::Result<()> {
        queue!(self.out, Clear(ClearType::All))
    }

    /// Write section lines starting at screen row `top`
    pub fn section(&mut self, top: usize, rows: &[SectionRow], width: usize) -> io::Result<()> {
        for (i, cells) in rows.iter().enumerate() {
            queue!(self.out, cursor(top + i, 1))?;
            self.out.write_all(format_section_line(cells, width).as_bytes())?;
        }
        Ok(())
    }

    /// Redraw the static part of a task row: guides, name and brackets
    pub fn task_row(&mut self, layout: &Layout, index: usize) -> io::Result<()> {
        let row = &layout.rows[index];
        queue!(self.out, cursor(layout.screen_row(index), 1), Clear(ClearType::CurrentLine))?;
        // Deep guides are cut short so the bar still starts at its column
        let guides: String = row
            .guides
            .iter()
            .flat_map(|guide| guide.glyph().chars())
            .take(layout.name_width)
            .collect();
        self.out.write_all(guides.as_bytes())?;
        let width = layout.name_width - guides.chars().count();
        let name: String = row.name.chars().take(width).collect();
        write!(self.out, "{:<width$} [", name, width = width)?;
        if layout.size.width >= 2 {
            queue!(self.out, MoveToColumn(to_u16(layout.size.width - 2)))?;
            self.out.write_all(b"]")?;
        }
        Ok(())
    }

    /// Rewrite only the bar cells between `from` and `to`
    ///
    /// Growing fills cells with `#`; shrinking blanks them.
    pub fn bar(&mut self, layout: &Layout, index: usize, from: usize, to: usize) -> io::Result<()> {
        if from == to {
            return Ok(());
        }
        let (start, end, glyph) = if from < to { (from, to, BAR_FILL) } else { (to, from, BAR_EMPTY) };
        queue!(self.out, cursor(layout.screen_row(index), layout.bar_start + 1 + start))?;
        self.out.write_all(glyph.repeat(end - start).as_bytes())
    }

    /// Park the cursor in the top-left corner and push everything out
    pub fn flush(&mut self) -> io::Result<()> {
        queue!(self.out, cursor(1, 1))?;
        self.out.flush()
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }
}

/// Lay out one section row in `width` columns
///
/// Left text is flush left, right text flush right, and center text as close
/// to the middle as the other two allow, with at least one space between
/// cells. When the cells do not fit, the longest is shortened first.
pub fn format_section_line(cells: &SectionRow, width: usize) -> String {
    let mut parts: Vec<Vec<char>> = cells.iter().map(|c| c.chars().collect()).collect();
    let budget = width.saturating_sub(2);
    loop {
        let total: usize = parts.iter().map(Vec::len).sum();
        if total <= budget {
            break;
        }
        if let Some(longest) = (0..3).max_by_key(|i| (parts[*i].len(), std::cmp::Reverse(*i))) {
            parts[longest].pop();
        }
    }

    let (left, center, right) = (&parts[0], &parts[1], &parts[2]);
    if width < 2 {
        return " ".repeat(width);
    }
    let center_min = left.len() + 1;
    let center_max = width - right.len() - 1 - center.len();
    let center_start = (width.saturating_sub(center.len()) / 2).clamp(center_min, center_max.max(center_min));
    let right_start = width - right.len();

    let mut line = String::with_capacity(width);
    line.extend(left.iter());
    line.push_str(&" ".repeat(center_start - left.len()));
    line.extend(center.iter());
    line.push_str(&" ".repeat(right_start - center_start - center.len()));
    line.extend(right.iter());
    line
}

fn cursor(row: usize, col: usize) -> MoveTo {
    MoveTo(to_u16(col.saturating_sub(1)), to_u16(row.saturating_sub(1)))
}

fn to_u16(value: usize) -> u16 {
    u16::try_from(value).unwrap_or(u16::MAX)
}
