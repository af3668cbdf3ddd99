//! Dashboard layout - which tasks get a row and where everything goes
//!
//! A layout is computed from a [`TaskSnapshot`] and the current screen and
//! section sizes. It is pure data; the renderer turns it into escape
//! sequences. Screen rows and columns here are 1-based, like the terminal's.

use std::collections::HashMap;

use crate::task::{TaskId, TaskSnapshot, TaskState};

/// Screen size assumed until the first successful probe
pub const DEFAULT_SCREEN: ScreenSize = ScreenSize { width: 80, height: 24 };

/// Terminal dimensions in character cells
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenSize {
    pub width: usize,
    pub height: usize,
}

impl Default for ScreenSize {
    fn default() -> Self {
        DEFAULT_SCREEN
    }
}

/// One three-column segment of a row's tree guide
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guide {
    /// This row; more visible siblings follow
    Branch,
    /// This row; last visible sibling
    Last,
    /// An ancestor with more visible siblings below
    Pipe,
    /// An ancestor that was the last of its siblings
    Blank,
}

impl Guide {
    pub fn glyph(self) -> &'static str {
        match self {
            Guide::Branch => " ├─",
            Guide::Last => " └─",
            Guide::Pipe => " │ ",
            Guide::Blank => "   ",
        }
    }
}

/// A visible task row
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub id: TaskId,
    pub name: String,
    pub guides: Vec<Guide>,
    /// Progress at layout time
    pub progress: f64,
}

/// Geometry and row assignment for one screen size
#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    pub size: ScreenSize,
    pub header_height: usize,
    pub footer_height: usize,
    /// Columns available for guides plus the task name
    pub name_width: usize,
    /// Column of the opening `[`
    pub bar_start: usize,
    /// Number of bar cells between the brackets
    pub bar_width: usize,
    pub rows: Vec<Row>,
    index: HashMap<TaskId, usize>,
}

impl Layout {
    /// Lay out `root`'s visible descendants between the header and footer
    pub fn compute(size: ScreenSize, header_height: usize, footer_height: usize, root: &TaskSnapshot) -> Self {
        let name_width = size.width.saturating_sub(1) * 3 / 10;
        let bar_start = name_width + 2;
        let bar_width = size.width.saturating_sub(bar_start + 2);
        let capacity = size.height.saturating_sub(header_height + footer_height);

        let mut visible = Vec::new();
        for child in &root.children {
            collect_visible(child, None, &mut visible);
        }
        visible.truncate(capacity);

        let rows = assign_guides(&visible);
        let index = rows.iter().enumerate().map(|(i, row)| (row.id, i)).collect();

        Self {
            size,
            header_height,
            footer_height,
            name_width,
            bar_start,
            bar_width,
            rows,
            index,
        }
    }

    /// Row index of a task, if it is visible
    pub fn row_of(&self, id: TaskId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    /// Screen row of the `index`-th task row
    pub fn screen_row(&self, index: usize) -> usize {
        self.header_height + 1 + index
    }

    /// Screen row of the first footer line
    pub fn footer_top(&self) -> usize {
        self.size.height.saturating_sub(self.footer_height) + 1
    }

    /// Columns a section line may use
    pub fn section_width(&self) -> usize {
        self.size.width.saturating_sub(1)
    }

    /// Filled bar cells for `fraction`, or `None` when the screen has no room for a bar
    pub fn bar_cells(&self, fraction: f64) -> Option<usize> {
        if self.bar_width == 0 {
            return None;
        }
        Some(bar_columns(fraction, self.bar_width))
    }
}

/// `floor(fraction × width)`, with the fraction clamped to `[0, 1]`
pub fn bar_columns(fraction: f64, width: usize) -> usize {
    (fraction.clamp(0.0, 1.0) * width as f64).floor() as usize
}

struct Visible<'a> {
    node: &'a TaskSnapshot,
    parent: Option<usize>,
}

/// Pre-order walk; a task is visible while unfinished or while it has a visible descendant
fn collect_visible<'a>(node: &'a TaskSnapshot, parent: Option<usize>, out: &mut Vec<Visible<'a>>) -> bool {
    let slot = out.len();
    out.push(Visible { node, parent });
    let mut any_child = false;
    for child in &node.children {
        any_child |= collect_visible(child, Some(slot), out);
    }
    if any_child || node.state != TaskState::Finished {
        true
    } else {
        out.truncate(slot);
        false
    }
}

fn assign_guides(visible: &[Visible<'_>]) -> Vec<Row> {
    // Last visible row under each parent slot (None = root)
    let mut last_child: HashMap<Option<usize>, usize> = HashMap::new();
    for (i, entry) in visible.iter().enumerate() {
        last_child.insert(entry.parent, i);
    }
    let has_later_sibling = |i: usize| last_child.get(&visible[i].parent).is_some_and(|last| *last > i);

    visible
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let mut guides = Vec::new();
            if entry.parent.is_some() {
                guides.push(if has_later_sibling(i) { Guide::Branch } else { Guide::Last });
                let mut ancestor = entry.parent;
                while let Some(a) = ancestor {
                    if visible[a].parent.is_none() {
                        break;
                    }
                    guides.push(if has_later_sibling(a) { Guide::Pipe } else { Guide::Blank });
                    ancestor = visible[a].parent;
                }
                guides.reverse();
            }
            Row {
                id: entry.node.id,
                name: entry.node.name.clone(),
                guides,
                progress: entry.node.progress,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{Completion, Task};

    fn noop(_: Task, done: Completion) -> std::future::Ready<()> {
        done.finish();
        std::future::ready(())
    }

    fn names(layout: &Layout) -> Vec<String> {
        layout.rows.iter().map(|r| r.name.clone()).collect()
    }

    fn guides(layout: &Layout) -> Vec<String> {
        layout
            .rows
            .iter()
            .map(|r| r.guides.iter().map(|g| g.glyph()).collect::<String>())
            .collect()
    }

    #[test]
    fn test_bar_columns_floor() {
        assert_eq!(bar_columns(0.37, 20), 7);
        assert_eq!(bar_columns(0.5, 20), 10);
        assert_eq!(bar_columns(1.0, 20), 20);
        assert_eq!(bar_columns(1.5, 20), 20);
        assert_eq!(bar_columns(-0.1, 20), 0);
    }

    #[test]
    fn test_geometry_for_default_screen() {
        let root = Task::root();
        let layout = Layout::compute(DEFAULT_SCREEN, 2, 1, &root.snapshot());
        assert_eq!(layout.name_width, 23);
        assert_eq!(layout.bar_start, 25);
        assert_eq!(layout.bar_width, 53);
        assert_eq!(layout.screen_row(0), 3);
        assert_eq!(layout.footer_top(), 24);
        assert_eq!(layout.section_width(), 79);
    }

    #[test]
    fn test_narrow_screen_has_no_bar() {
        let root = Task::root();
        let size = ScreenSize { width: 4, height: 5 };
        let layout = Layout::compute(size, 0, 0, &root.snapshot());
        assert_eq!(layout.bar_cells(0.5), None);
    }

    #[test]
    fn test_guides_follow_tree_shape() {
        let root = Task::root();
        let a = root.create_subtask("a", noop);
        a.create_subtask("a1", noop);
        let a2 = a.create_subtask("a2", noop);
        a2.create_subtask("a2x", noop);
        root.create_subtask("b", noop);

        let layout = Layout::compute(DEFAULT_SCREEN, 0, 0, &root.snapshot());
        assert_eq!(names(&layout), vec!["a", "a1", "a2", "a2x", "b"]);
        assert_eq!(guides(&layout), vec!["", " ├─", " └─", "    └─", ""]);
    }

    #[test]
    fn test_pipe_connects_to_later_sibling() {
        let root = Task::root();
        let a = root.create_subtask("a", noop);
        let a1 = a.create_subtask("a1", noop);
        a1.create_subtask("deep", noop);
        a.create_subtask("a2", noop);

        let layout = Layout::compute(DEFAULT_SCREEN, 0, 0, &root.snapshot());
        assert_eq!(names(&layout), vec!["a", "a1", "deep", "a2"]);
        assert_eq!(guides(&layout), vec!["", " ├─", " │  └─", " └─"]);
    }

    #[tokio::test]
    async fn test_finished_leaves_drop_out() {
        let root = Task::root();
        let group = root.create_subtask("group", noop);
        let done_leaf = group.create_subtask("done", noop);
        group.create_subtask("pending", noop);
        let finished_branch = root.create_subtask("finished", noop);

        done_leaf.start();
        finished_branch.start();
        group.start();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        // group is Finished but keeps its row while a child is still pending
        let layout = Layout::compute(DEFAULT_SCREEN, 0, 0, &root.snapshot());
        assert_eq!(names(&layout), vec!["group", "pending"]);
        assert_eq!(guides(&layout), vec!["", " └─"]);
    }

    #[test]
    fn test_rows_truncate_to_capacity() {
        let root = Task::root();
        for i in 0..10 {
            root.create_subtask(format!("t{}", i), noop);
        }
        let size = ScreenSize { width: 80, height: 6 };
        let layout = Layout::compute(size, 1, 2, &root.snapshot());
        assert_eq!(layout.rows.len(), 3);
        assert_eq!(layout.row_of(layout.rows[2].id), Some(2));
    }

    #[test]
    fn test_guides_use_only_visible_siblings() {
        let root = Task::root();
        let a = root.create_subtask("a", noop);
        a.create_subtask("a1", noop);
        a.create_subtask("a2", noop);
        let size = ScreenSize { width: 80, height: 2 };

        // a2 does not fit, so a1 is drawn as the last child
        let layout = Layout::compute(size, 0, 0, &root.snapshot());
        assert_eq!(guides(&layout), vec!["", " └─"]);
    }
}
