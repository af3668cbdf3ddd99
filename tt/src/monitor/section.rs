//! Section - header/footer text grid with three aligned cells per row

use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::events::Registry;
use crate::sync::lock;

/// Cell within a section row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    Left = 0,
    Center = 1,
    Right = 2,
}

/// One section row: left, center and right text
pub type SectionRow = [String; 3];

/// Listener fired with the full grid after every mutation
pub type SectionListener = dyn Fn(&Section, &[SectionRow]) + Send + Sync;

struct SectionInner {
    rows: Vec<SectionRow>,
    listeners: Registry<SectionListener>,
}

/// Resizable grid of status text, shown above or below the task rows
///
/// Every mutation notifies listeners, even when the text is unchanged.
#[derive(Clone)]
pub struct Section {
    inner: Arc<Mutex<SectionInner>>,
}

impl Section {
    /// Create an empty section (zero rows)
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(SectionInner {
                rows: Vec::new(),
                listeners: Registry::new(),
            })),
        }
    }

    /// Resize to `rows`, keeping existing rows and padding with empty ones
    pub fn set_size(&self, rows: usize) {
        debug!(rows, "Section::set_size: called");
        self.update(|grid| grid.resize_with(rows, SectionRow::default));
    }

    /// Replace one cell
    ///
    /// # Panics
    ///
    /// Panics if `row` is outside the current size.
    pub fn set_text(&self, row: usize, alignment: Alignment, text: impl Into<String>) {
        let text = text.into();
        self.update(|grid| {
            let len = grid.len();
            let Some(cells) = grid.get_mut(row) else {
                panic!("Section::set_text: row {} out of range for section of {} rows", row, len);
            };
            cells[alignment as usize] = text;
        });
    }

    /// Copy of the current grid
    pub fn text(&self) -> Vec<SectionRow> {
        lock(&self.inner).rows.clone()
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        lock(&self.inner).rows.len()
    }

    /// Whether the section has no rows
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Register a listener for grid changes
    pub fn add_listener<F>(&self, listener: F)
    where
        F: Fn(&Section, &[SectionRow]) + Send + Sync + 'static,
    {
        lock(&self.inner).listeners.add(Arc::new(listener));
    }

    fn update(&self, mutate: impl FnOnce(&mut Vec<SectionRow>)) {
        let (rows, listeners) = {
            let mut inner = lock(&self.inner);
            mutate(&mut inner.rows);
            (inner.rows.clone(), inner.listeners.snapshot())
        };
        for listener in listeners {
            listener(self, &rows);
        }
    }
}

impl Default for Section {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Section").field("rows", &self.text()).finish()
    }
}
