//! End-to-end pipeline tests over a scripted transport.
//!
//! These drive the processing service and batch coordinator exactly the
//! way the CLI does, but with a `Submitter` that replays canned byte
//! streams instead of talking to a real relay.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use futures::{stream, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use ocrpick::batch::{BatchCoordinator, BatchEvent, FileStatus};
use ocrpick::client::{ByteStream, ClientError, Submitter};
use ocrpick::combine::{combine, CombineOutcome, Selection};
use ocrpick::models::{BackendConfig, BackendSet, Document};
use ocrpick::service::{ProcessEvent, ProcessService};
use ocrpick::session::RunSession;

enum Scripted {
    /// Connection refused before any byte flows.
    Refused,
    /// Stream these chunks, then end the transport.
    Chunks(Vec<Vec<u8>>),
}

/// Replays one scripted response per submission, in order.
struct ScriptedSubmitter {
    responses: Mutex<VecDeque<Scripted>>,
}

impl ScriptedSubmitter {
    fn new(responses: Vec<Scripted>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
        }
    }

    fn single(chunks: &[&str]) -> Self {
        Self::new(vec![Scripted::Chunks(
            chunks.iter().map(|c| c.as_bytes().to_vec()).collect(),
        )])
    }
}

#[async_trait]
impl Submitter for ScriptedSubmitter {
    async fn submit(
        &self,
        _document: &Document,
        _backends: &BackendSet,
    ) -> Result<ByteStream, ClientError> {
        match self.responses.lock().unwrap().pop_front() {
            Some(Scripted::Refused) => {
                Err(ClientError::Connection("connection refused".to_string()))
            }
            Some(Scripted::Chunks(chunks)) => Ok(stream::iter(
                chunks.into_iter().map(Ok::<Vec<u8>, ClientError>),
            )
            .boxed()),
            None => Err(ClientError::Connection("no scripted response".to_string())),
        }
    }
}

fn backends(count: usize) -> BackendSet {
    let configs = (0..count)
        .map(|i| {
            BackendConfig::new(
                format!("backend-{}", i),
                "https://api.example.com/v1",
                "sk-test",
                "gpt-4o",
                "openai",
            )
        })
        .collect();
    BackendSet::new(configs).unwrap()
}

fn document() -> Document {
    Document::new("scan.pdf", b"%PDF-1.4 fake".to_vec())
}

/// Run one document through the service, collecting emitted events.
async fn run_one(
    submitter: ScriptedSubmitter,
    backend_count: usize,
) -> Result<(RunSession, Vec<ProcessEvent>), ClientError> {
    let service = ProcessService::new(submitter);
    let (event_tx, mut event_rx) = mpsc::channel::<ProcessEvent>(100);
    let collector = tokio::spawn(async move {
        let mut events = Vec::new();
        while let Some(event) = event_rx.recv().await {
            events.push(event);
        }
        events
    });

    let session = service
        .process(
            &document(),
            &backends(backend_count),
            event_tx,
            CancellationToken::new(),
        )
        .await?;
    let events = collector.await.unwrap();
    Ok((session, events))
}

#[tokio::test]
async fn test_full_run_then_combine() {
    // Two pages, one backend, both succeed: the canonical happy path.
    let submitter = ScriptedSubmitter::single(&[
        "info: {\"total_pages\": 2, \"total_apis\": 1}\n",
        "result: {\"result\": {\"page\": 1, \"content\": \"# Page One\", \"success\": true}, \"api_index\": 0}\n",
        "result: {\"result\": {\"page\": 2, \"content\": \"# Page Two\", \"success\": true}, \"api_index\": 0}\n",
        "complete: {}\n",
    ]);

    let (session, events) = run_one(submitter, 1).await.unwrap();

    assert!(session.overall_complete());
    assert_eq!(session.results().len(), 2);
    assert!(session.effectively_failed().is_empty());

    assert!(events
        .iter()
        .any(|e| matches!(e, ProcessEvent::GridReady { total_pages: 2, total_backends: 1 })));
    assert!(events
        .iter()
        .any(|e| matches!(e, ProcessEvent::Completed { .. })));

    let mut selection = Selection::new();
    selection.select(0, 0);
    selection.select(1, 0);
    assert_eq!(
        combine(&selection, session.results()),
        CombineOutcome::Document("# Page One\n\n---\n\n# Page Two".to_string())
    );
}

#[tokio::test]
async fn test_arbitrary_chunk_boundaries() {
    // The same records, sliced mid-line and mid-JSON.
    let submitter = ScriptedSubmitter::single(&[
        "info: {\"total_",
        "pages\": 1, \"total_apis\": 1}\nresult: {\"result\": {\"pa",
        "ge\": 1, \"content\": \"hello\", \"success\": true}, \"api_",
        "index\": 0}\ncomplete: {}\n",
    ]);

    let (session, _) = run_one(submitter, 1).await.unwrap();
    assert!(session.overall_complete());
    assert_eq!(session.results().len(), 1);
    assert_eq!(session.results()[0].content, "hello");
}

#[tokio::test]
async fn test_transport_end_without_complete_reports_unfinished() {
    // 2x2 grid, only 3 cells reach terminal state, no complete event.
    let submitter = ScriptedSubmitter::single(&[
        "info: {\"total_pages\": 2, \"total_apis\": 2}\n",
        "result: {\"result\": {\"page\": 1, \"content\": \"a\", \"success\": true}, \"api_index\": 0}\n",
        "result: {\"result\": {\"page\": 1, \"content\": \"b\", \"success\": true}, \"api_index\": 1}\n",
        "result: {\"result\": {\"page\": 2, \"content\": \"c\", \"success\": false}, \"api_index\": 0}\n",
    ]);

    let (session, events) = run_one(submitter, 2).await.unwrap();

    assert!(!session.overall_complete());
    assert_eq!(session.effectively_failed().len(), 1);
    assert!(events
        .iter()
        .any(|e| matches!(e, ProcessEvent::TransportClosed { unfinished: 1 })));
    assert!(!events
        .iter()
        .any(|e| matches!(e, ProcessEvent::Completed { .. })));
    // The failed cell is a normal terminal state, not a run error.
    assert_eq!(session.results().len(), 2);
}

#[tokio::test]
async fn test_malformed_and_unknown_records_are_survivable() {
    let submitter = ScriptedSubmitter::single(&[
        "info: {\"total_pages\": 1, \"total_apis\": 1}\n",
        "metrics: {\"queue_depth\": 3}\n",
        "result: {definitely not json\n",
        "heartbeat: {}\n",
        "result: {\"result\": {\"page\": 1, \"content\": \"ok\", \"success\": true}, \"api_index\": 0}\n",
    ]);

    let (session, events) = run_one(submitter, 1).await.unwrap();
    assert!(session.overall_complete());
    assert_eq!(session.results().len(), 1);
    // The malformed record surfaced as a warning; the unknown prefix and
    // heartbeat were silent.
    assert_eq!(session.diagnostics().len(), 1);
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, ProcessEvent::Warning { .. }))
            .count(),
        1
    );
}

#[tokio::test]
async fn test_result_before_info_is_dropped() {
    let submitter = ScriptedSubmitter::single(&[
        "result: {\"result\": {\"page\": 5, \"content\": \"early\", \"success\": true}, \"api_index\": 0}\n",
    ]);

    let (session, _) = run_one(submitter, 1).await.unwrap();
    assert!(session.grid().is_none());
    assert!(!session.overall_complete());
    assert_eq!(session.violation_count(), 1);
    assert!(session.results().is_empty());
}

#[tokio::test]
async fn test_unterminated_final_record_still_applies() {
    // Transport ends without a trailing newline; the flush parses it.
    let submitter = ScriptedSubmitter::single(&[
        "info: {\"total_pages\": 1, \"total_apis\": 1}\n",
        "result: {\"result\": {\"page\": 1, \"content\": \"tail\", \"success\": true}, \"api_index\": 0}",
    ]);

    let (session, _) = run_one(submitter, 1).await.unwrap();
    assert!(session.overall_complete());
    assert_eq!(session.results()[0].content, "tail");
}

#[tokio::test]
async fn test_connection_refused_escalates() {
    let submitter = ScriptedSubmitter::new(vec![Scripted::Refused]);
    let result = run_one(submitter, 1).await;
    assert!(matches!(result, Err(ClientError::Connection(_))));
}

#[tokio::test]
async fn test_cancellation_preserves_partial_state() {
    // A transport that never produces data; cancelling must return the
    // session instead of hanging.
    struct StalledSubmitter;

    #[async_trait]
    impl Submitter for StalledSubmitter {
        async fn submit(
            &self,
            _document: &Document,
            _backends: &BackendSet,
        ) -> Result<ByteStream, ClientError> {
            Ok(stream::pending::<Result<Vec<u8>, ClientError>>().boxed())
        }
    }

    let service = ProcessService::new(StalledSubmitter);
    let (event_tx, mut event_rx) = mpsc::channel::<ProcessEvent>(100);
    let collector = tokio::spawn(async move {
        let mut events = Vec::new();
        while let Some(event) = event_rx.recv().await {
            events.push(event);
        }
        events
    });

    let cancel = CancellationToken::new();
    cancel.cancel();

    let session = service
        .process(&document(), &backends(1), event_tx, cancel)
        .await
        .unwrap();
    let events = collector.await.unwrap();

    assert!(session.is_closed());
    assert!(!session.overall_complete());
    assert!(events.iter().any(|e| matches!(e, ProcessEvent::Cancelled)));
}

#[tokio::test]
async fn test_batch_partial_failure() {
    // First file's transport errors immediately, second succeeds fully:
    // the batch must end [error, completed], not abort.
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("first.pdf");
    let second = dir.path().join("second.pdf");
    std::fs::write(&first, b"%PDF-1.4 one").unwrap();
    std::fs::write(&second, b"%PDF-1.4 two").unwrap();

    let submitter = ScriptedSubmitter::new(vec![
        Scripted::Refused,
        Scripted::Chunks(vec![
            b"info: {\"total_pages\": 1, \"total_apis\": 1}\n".to_vec(),
            b"result: {\"result\": {\"page\": 1, \"content\": \"fine\", \"success\": true}, \"api_index\": 0}\n"
                .to_vec(),
            b"complete: {}\n".to_vec(),
        ]),
    ]);

    let coordinator = BatchCoordinator::new(ProcessService::new(submitter), 10);
    let mut files = coordinator.queue(&[first, second]);

    let (event_tx, mut event_rx) = mpsc::channel::<BatchEvent>(100);
    let collector = tokio::spawn(async move {
        let mut events = Vec::new();
        while let Some(event) = event_rx.recv().await {
            events.push(event);
        }
        events
    });

    coordinator
        .process(&mut files, &backends(1), event_tx, CancellationToken::new())
        .await;
    let events = collector.await.unwrap();

    assert_eq!(files[0].status, FileStatus::Error);
    assert!(files[0].error.as_deref().unwrap().contains("connection refused"));
    assert_eq!(files[1].status, FileStatus::Completed);
    let session = files[1].session.as_ref().unwrap();
    assert!(session.overall_complete());
    assert_eq!(session.results().len(), 1);

    assert!(events
        .iter()
        .any(|e| matches!(e, BatchEvent::FileFailed { index: 0, .. })));
    assert!(events
        .iter()
        .any(|e| matches!(e, BatchEvent::FileCompleted { index: 1, .. })));
}
