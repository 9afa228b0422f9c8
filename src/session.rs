//! Run session: applies decoded records to the task grid and derives
//! run-level state.
//!
//! One session aggregates one document run. It owns the grid (allocated
//! lazily on `info`), the append-only result collection, and the
//! diagnostic log. All mutation goes through [`RunSession::apply`], so
//! the completion predicate is consistent after every record.

use crate::grid::{ApplyOutcome, TaskGrid};
use crate::models::{PageResult, RunStats, TaskKey};
use crate::stream::{DecodedRecord, StreamEvent};

/// A non-fatal problem observed while consuming the stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamDiagnostic {
    /// A recognized record whose body failed to parse.
    MalformedRecord { kind: String, detail: String },
    /// An event dropped for violating the protocol contract.
    ProtocolViolation { detail: String },
    /// A stream-level `error` event from the producer.
    StreamError { message: String },
    /// A redelivered result that disagreed with the first-seen content.
    ConflictingResult { page: usize, backend: usize },
    /// A second `info` announcement; the first one wins.
    DuplicateInfo,
}

impl StreamDiagnostic {
    /// Human-readable one-liner for notification surfaces.
    pub fn describe(&self) -> String {
        match self {
            Self::MalformedRecord { kind, detail } => {
                format!("malformed '{}' record: {}", kind, detail)
            }
            Self::ProtocolViolation { detail } => format!("protocol violation: {}", detail),
            Self::StreamError { message } => format!("stream error: {}", message),
            Self::ConflictingResult { page, backend } => format!(
                "conflicting redelivery for page {} backend {} (kept first result)",
                page + 1,
                backend
            ),
            Self::DuplicateInfo => "duplicate info announcement ignored".to_string(),
        }
    }
}

/// What applying one record changed, for progress reporting.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    /// Grid bounds announced; all cells allocated pending.
    GridAllocated { pages: usize, backends: usize },
    /// A cell reached a terminal state.
    TaskFinished {
        page: usize,
        backend: usize,
        success: bool,
    },
    /// Identical redelivery ignored.
    DuplicateIgnored { page: usize, backend: usize },
    /// A diagnostic was recorded; no grid mutation beyond bookkeeping.
    DiagnosticNoted(StreamDiagnostic),
    /// Producer signaled end-of-work.
    CompleteSignaled,
    /// Keep-alive; nothing changed.
    Heartbeat,
}

/// Point-in-time view of a run for display.
#[derive(Debug, Clone, Default)]
pub struct RunSnapshot {
    /// Announced page count, once known.
    pub pages: Option<usize>,
    /// Announced backend count, once known.
    pub backends: Option<usize>,
    pub stats: RunStats,
    pub results: usize,
    pub overall_complete: bool,
    pub diagnostics: usize,
    pub violations: usize,
}

/// Largest grid one `info` announcement may allocate. The stream is
/// untrusted input; an absurd page or backend count must not translate
/// into an unbounded allocation.
const MAX_GRID_CELLS: usize = 1 << 20;

/// Aggregation state for one document run.
#[derive(Debug, Default)]
pub struct RunSession {
    grid: Option<TaskGrid>,
    results: Vec<PageResult>,
    diagnostics: Vec<StreamDiagnostic>,
    violations: usize,
    complete_signal: bool,
    closed: bool,
}

impl RunSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one decoded record, returning what changed.
    pub fn apply(&mut self, record: DecodedRecord) -> SessionUpdate {
        match record {
            DecodedRecord::Malformed(malformed) => self.note(StreamDiagnostic::MalformedRecord {
                kind: malformed.kind,
                detail: malformed.detail,
            }),
            DecodedRecord::Event(StreamEvent::Info {
                total_pages,
                total_backends,
            }) => {
                if self.grid.is_some() {
                    return self.note(StreamDiagnostic::DuplicateInfo);
                }
                let cells = total_pages.checked_mul(total_backends);
                if !cells.is_some_and(|c| c <= MAX_GRID_CELLS) {
                    self.violations += 1;
                    return self.note(StreamDiagnostic::ProtocolViolation {
                        detail: format!(
                            "info announced an implausible grid ({} pages x {} backends)",
                            total_pages, total_backends
                        ),
                    });
                }
                self.grid = Some(TaskGrid::new(total_pages, total_backends));
                SessionUpdate::GridAllocated {
                    pages: total_pages,
                    backends: total_backends,
                }
            }
            DecodedRecord::Event(StreamEvent::Result(result)) => {
                let Some(grid) = self.grid.as_mut() else {
                    self.violations += 1;
                    return self.note(StreamDiagnostic::ProtocolViolation {
                        detail: format!(
                            "result for page {} backend {} arrived before info",
                            result.page + 1,
                            result.backend
                        ),
                    });
                };
                match grid.apply_result(&result) {
                    ApplyOutcome::Applied => {
                        if result.success {
                            self.results.push(PageResult {
                                page: result.page,
                                backend: result.backend,
                                content: result.content,
                                confidence: result.confidence,
                                processing_time_ms: result.processing_time_ms,
                            });
                        }
                        SessionUpdate::TaskFinished {
                            page: result.page,
                            backend: result.backend,
                            success: result.success,
                        }
                    }
                    ApplyOutcome::Duplicate => SessionUpdate::DuplicateIgnored {
                        page: result.page,
                        backend: result.backend,
                    },
                    ApplyOutcome::Conflict => self.note(StreamDiagnostic::ConflictingResult {
                        page: result.page,
                        backend: result.backend,
                    }),
                    ApplyOutcome::OutOfBounds => {
                        self.violations += 1;
                        self.note(StreamDiagnostic::ProtocolViolation {
                            detail: format!(
                                "result indices (page {}, backend {}) outside announced bounds",
                                result.page + 1,
                                result.backend
                            ),
                        })
                    }
                }
            }
            DecodedRecord::Event(StreamEvent::Error { message }) => {
                self.note(StreamDiagnostic::StreamError { message })
            }
            DecodedRecord::Event(StreamEvent::Complete) => {
                self.complete_signal = true;
                SessionUpdate::CompleteSignaled
            }
            DecodedRecord::Event(StreamEvent::Heartbeat) => SessionUpdate::Heartbeat,
        }
    }

    fn note(&mut self, diagnostic: StreamDiagnostic) -> SessionUpdate {
        tracing::warn!("{}", diagnostic.describe());
        self.diagnostics.push(diagnostic.clone());
        SessionUpdate::DiagnosticNoted(diagnostic)
    }

    /// Run-level completion: every allocated cell terminal, or the
    /// producer's authoritative `complete` signal. False before `info`.
    pub fn overall_complete(&self) -> bool {
        self.complete_signal || self.grid.as_ref().is_some_and(|g| g.is_complete())
    }

    /// Whether the producer sent an explicit `complete`.
    pub fn complete_signaled(&self) -> bool {
        self.complete_signal
    }

    /// Mark the transport as ended. Cell states are preserved as-is;
    /// non-terminal cells become reportable via [`effectively_failed`].
    ///
    /// [`effectively_failed`]: RunSession::effectively_failed
    pub fn finish(&mut self) {
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Cells with no terminal outcome after the transport ended.
    ///
    /// The raw per-cell state is untouched; this is the derived
    /// "effectively failed" view for reporting.
    pub fn effectively_failed(&self) -> Vec<TaskKey> {
        if !self.closed {
            return Vec::new();
        }
        self.grid
            .as_ref()
            .map(|g| g.non_terminal_keys())
            .unwrap_or_default()
    }

    pub fn grid(&self) -> Option<&TaskGrid> {
        self.grid.as_ref()
    }

    pub fn results(&self) -> &[PageResult] {
        &self.results
    }

    pub fn diagnostics(&self) -> &[StreamDiagnostic] {
        &self.diagnostics
    }

    pub fn violation_count(&self) -> usize {
        self.violations
    }

    pub fn snapshot(&self) -> RunSnapshot {
        RunSnapshot {
            pages: self.grid.as_ref().map(|g| g.pages()),
            backends: self.grid.as_ref().map(|g| g.backends()),
            stats: self.grid.as_ref().map(|g| g.stats()).unwrap_or_default(),
            results: self.results.len(),
            overall_complete: self.overall_complete(),
            diagnostics: self.diagnostics.len(),
            violations: self.violations,
        }
    }
}
