//! Document processing service.
//!
//! Ties the transport, decoder, and session together for one run and
//! emits progress events for the UI. Separated from UI concerns: the
//! CLI renders the events, the service never prints.
//!
//! Events for one document are processed strictly in arrival order on
//! one execution context: each chunk is decoded and applied before the
//! next chunk is read, so completion is detected within one event of the
//! true completion point.

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::client::{ClientError, Submitter};
use crate::models::{BackendSet, Document};
use crate::session::{RunSession, SessionUpdate};
use crate::stream::EventDecoder;

/// Events emitted during one document run.
#[derive(Debug, Clone)]
pub enum ProcessEvent {
    /// Submission accepted; the stream is open.
    Submitted { document: String, backends: usize },
    /// Grid bounds announced by the service.
    GridReady {
        total_pages: usize,
        total_backends: usize,
    },
    /// One task reached a terminal state.
    TaskFinished {
        page: usize,
        backend: usize,
        success: bool,
    },
    /// A non-fatal problem was recorded (malformed record, protocol
    /// violation, stream-level error, conflicting redelivery).
    Warning { message: String },
    /// Overall completion reached. `forced` when it came from the
    /// producer's `complete` signal rather than the grid predicate.
    Completed { forced: bool },
    /// The transport ended; `unfinished` cells never reached a terminal
    /// state and are reportable as effectively failed.
    TransportClosed { unfinished: usize },
    /// The caller cancelled the run; partial state is preserved.
    Cancelled,
}

/// Service for running one document through the OCR pipeline.
pub struct ProcessService<S> {
    submitter: S,
}

impl<S: Submitter> ProcessService<S> {
    pub fn new(submitter: S) -> Self {
        Self { submitter }
    }

    /// Process a document against the configured backends.
    ///
    /// Returns the final session (including partial state on cancel or
    /// early transport end). Only a transport failure before any data
    /// flows is escalated as an error; everything after that point is
    /// recovered locally and reflected in the session.
    pub async fn process(
        &self,
        document: &Document,
        backends: &BackendSet,
        event_tx: mpsc::Sender<ProcessEvent>,
        cancel: CancellationToken,
    ) -> Result<RunSession, ClientError> {
        let mut stream = self.submitter.submit(document, backends).await?;
        let _ = event_tx
            .send(ProcessEvent::Submitted {
                document: document.name.clone(),
                backends: backends.len(),
            })
            .await;

        let mut session = RunSession::new();
        let mut decoder = EventDecoder::new();
        let mut completion_reported = false;

        enum Step {
            Chunk(Option<Result<Vec<u8>, ClientError>>),
            Cancelled,
        }

        loop {
            let step = tokio::select! {
                _ = cancel.cancelled() => Step::Cancelled,
                chunk = stream.next() => Step::Chunk(chunk),
            };

            match step {
                Step::Cancelled => {
                    // Returning drops the stream, releasing the transport.
                    tracing::info!("run cancelled, releasing transport");
                    session.finish();
                    let _ = event_tx.send(ProcessEvent::Cancelled).await;
                    return Ok(session);
                }
                Step::Chunk(None) => break,
                Step::Chunk(Some(Ok(bytes))) => {
                    for record in decoder.feed(&bytes) {
                        let update = session.apply(record);
                        Self::emit(&event_tx, update).await;
                        Self::report_completion(&event_tx, &session, &mut completion_reported)
                            .await;
                    }
                }
                Step::Chunk(Some(Err(e))) => {
                    // Data already flowed; a mid-stream drop is treated as
                    // end-of-data with the partial state preserved.
                    tracing::warn!("transport interrupted mid-stream: {}", e);
                    let _ = event_tx
                        .send(ProcessEvent::Warning {
                            message: format!("transport interrupted: {}", e),
                        })
                        .await;
                    break;
                }
            }
        }

        for record in decoder.finish() {
            let update = session.apply(record);
            Self::emit(&event_tx, update).await;
            Self::report_completion(&event_tx, &session, &mut completion_reported).await;
        }

        session.finish();
        let _ = event_tx
            .send(ProcessEvent::TransportClosed {
                unfinished: session.effectively_failed().len(),
            })
            .await;

        Ok(session)
    }

    async fn emit(event_tx: &mpsc::Sender<ProcessEvent>, update: SessionUpdate) {
        let event = match update {
            SessionUpdate::GridAllocated { pages, backends } => Some(ProcessEvent::GridReady {
                total_pages: pages,
                total_backends: backends,
            }),
            SessionUpdate::TaskFinished {
                page,
                backend,
                success,
            } => Some(ProcessEvent::TaskFinished {
                page,
                backend,
                success,
            }),
            SessionUpdate::DiagnosticNoted(diagnostic) => Some(ProcessEvent::Warning {
                message: diagnostic.describe(),
            }),
            SessionUpdate::DuplicateIgnored { .. }
            | SessionUpdate::CompleteSignaled
            | SessionUpdate::Heartbeat => None,
        };
        if let Some(event) = event {
            let _ = event_tx.send(event).await;
        }
    }

    async fn report_completion(
        event_tx: &mpsc::Sender<ProcessEvent>,
        session: &RunSession,
        reported: &mut bool,
    ) {
        if !*reported && session.overall_complete() {
            *reported = true;
            let _ = event_tx
                .send(ProcessEvent::Completed {
                    forced: session.complete_signaled(),
                })
                .await;
        }
    }
}
