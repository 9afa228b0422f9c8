//! Task state and result models.
//!
//! One task is one (page, backend) unit of OCR work. States move
//! `Pending -> Processing -> {Completed | Error}`; the terminal states
//! are final and keep the content (or error message) that produced them
//! so duplicate deliveries can be compared byte-for-byte.

use serde::{Deserialize, Serialize};

/// Identity of one task within a run: 0-based page and backend indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskKey {
    pub page: usize,
    pub backend: usize,
}

impl TaskKey {
    pub fn new(page: usize, backend: usize) -> Self {
        Self { page, backend }
    }
}

/// Processing state of one task.
///
/// `Processing` is advisory; the stream may jump a cell straight from
/// `Pending` to a terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Pending,
    Processing,
    Completed { content: String },
    Error { message: String },
}

impl TaskState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed { .. } => "completed",
            Self::Error { .. } => "error",
        }
    }

    /// Whether this state is terminal (no further legitimate transition).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Error { .. })
    }
}

/// A successful OCR result for one task.
///
/// Created only from a `result` event that decoded successfully and
/// carried `success: true`. Append-only; at most one per (page, backend).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageResult {
    /// 0-based page index.
    pub page: usize,
    /// 0-based backend index (submission-list position).
    pub backend: usize,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<u64>,
}

/// Per-state task counts for one run, for progress display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub errored: usize,
}

impl RunStats {
    pub fn total(&self) -> usize {
        self.pending + self.processing + self.completed + self.errored
    }

    pub fn terminal(&self) -> usize {
        self.completed + self.errored
    }
}
