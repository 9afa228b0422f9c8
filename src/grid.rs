//! The (page x backend) task grid.
//!
//! Flat row-major storage indexed by integer coordinates, with a
//! terminal-cell counter maintained alongside the cells so the
//! completion predicate is O(1) after every mutation.

use crate::models::{RunStats, TaskKey, TaskState};
use crate::stream::TaskResult;

/// Outcome of applying a result event to a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Cell transitioned to a terminal state.
    Applied,
    /// Cell was already terminal with identical content; ignored.
    Duplicate,
    /// Cell was already terminal with different content; first write wins.
    Conflict,
    /// Indices outside the announced bounds; nothing mutated.
    OutOfBounds,
}

/// The full task matrix for one document run.
#[derive(Debug, Clone)]
pub struct TaskGrid {
    pages: usize,
    backends: usize,
    cells: Vec<TaskState>,
    terminal: usize,
}

impl TaskGrid {
    /// Allocate a grid with every cell pending.
    pub fn new(pages: usize, backends: usize) -> Self {
        Self {
            pages,
            backends,
            cells: vec![TaskState::Pending; pages * backends],
            terminal: 0,
        }
    }

    pub fn pages(&self) -> usize {
        self.pages
    }

    pub fn backends(&self) -> usize {
        self.backends
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    fn index(&self, key: TaskKey) -> Option<usize> {
        if key.page < self.pages && key.backend < self.backends {
            Some(key.page * self.backends + key.backend)
        } else {
            None
        }
    }

    pub fn state(&self, key: TaskKey) -> Option<&TaskState> {
        self.index(key).map(|i| &self.cells[i])
    }

    /// Advisory transition to `Processing`. Ignored for terminal or
    /// out-of-bounds cells.
    pub fn mark_processing(&mut self, key: TaskKey) -> bool {
        match self.index(key) {
            Some(i) if !self.cells[i].is_terminal() => {
                self.cells[i] = TaskState::Processing;
                true
            }
            _ => false,
        }
    }

    /// Apply one result event to its cell.
    ///
    /// Terminal cells are never rewritten: an identical redelivery is a
    /// `Duplicate` no-op and a differing one is a `Conflict` that keeps
    /// the first-seen content.
    pub fn apply_result(&mut self, result: &TaskResult) -> ApplyOutcome {
        let key = TaskKey::new(result.page, result.backend);
        let Some(i) = self.index(key) else {
            return ApplyOutcome::OutOfBounds;
        };

        let incoming = if result.success {
            TaskState::Completed {
                content: result.content.clone(),
            }
        } else {
            TaskState::Error {
                message: result.content.clone(),
            }
        };

        if !self.cells[i].is_terminal() {
            self.cells[i] = incoming;
            self.terminal += 1;
            ApplyOutcome::Applied
        } else if self.cells[i] == incoming {
            ApplyOutcome::Duplicate
        } else {
            ApplyOutcome::Conflict
        }
    }

    pub fn terminal_count(&self) -> usize {
        self.terminal
    }

    /// True iff every allocated cell is terminal.
    pub fn is_complete(&self) -> bool {
        self.terminal == self.cells.len()
    }

    /// Per-state counts for progress display.
    pub fn stats(&self) -> RunStats {
        let mut stats = RunStats::default();
        for cell in &self.cells {
            match cell {
                TaskState::Pending => stats.pending += 1,
                TaskState::Processing => stats.processing += 1,
                TaskState::Completed { .. } => stats.completed += 1,
                TaskState::Error { .. } => stats.errored += 1,
            }
        }
        stats
    }

    /// Keys of every cell not yet in a terminal state, page-major order.
    pub fn non_terminal_keys(&self) -> Vec<TaskKey> {
        let mut keys = Vec::new();
        for page in 0..self.pages {
            for backend in 0..self.backends {
                let key = TaskKey::new(page, backend);
                if let Some(state) = self.state(key) {
                    if !state.is_terminal() {
                        keys.push(key);
                    }
                }
            }
        }
        keys
    }
}
