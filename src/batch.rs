//! Batch coordinator for multi-file processing.
//!
//! Runs the single-document pipeline once per file, strictly
//! sequentially, one upstream connection at a time so configured
//! backends are never hammered by parallel submissions. A failing file
//! is marked and retained; later files still run.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::client::Submitter;
use crate::models::{BackendSet, Document};
use crate::service::{ProcessEvent, ProcessService};
use crate::session::RunSession;

/// Default cap on files accepted into one batch.
pub const DEFAULT_MAX_FILES: usize = 10;

/// Processing status of one batch file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

/// One file in a batch and its run state.
#[derive(Debug)]
pub struct BatchFile {
    pub id: String,
    pub path: PathBuf,
    pub status: FileStatus,
    /// Retained error message when `status == Error`.
    pub error: Option<String>,
    /// The file's own run session, kept for selection/combination and
    /// last-known-state display.
    pub session: Option<RunSession>,
}

impl BatchFile {
    fn new(path: PathBuf) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            path,
            status: FileStatus::Pending,
            error: None,
            session: None,
        }
    }

    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// Events emitted while a batch runs.
#[derive(Debug, Clone)]
pub enum BatchEvent {
    FileStarted { index: usize, name: String },
    /// Forwarded per-document progress for the file currently running.
    FileProgress { index: usize, event: ProcessEvent },
    FileCompleted { index: usize, name: String },
    FileFailed {
        index: usize,
        name: String,
        error: String,
    },
}

/// Coordinates sequential processing of multiple files.
pub struct BatchCoordinator<S> {
    service: ProcessService<S>,
    max_files: usize,
}

impl<S: Submitter> BatchCoordinator<S> {
    pub fn new(service: ProcessService<S>, max_files: usize) -> Self {
        Self { service, max_files }
    }

    /// Build the batch queue: duplicates are skipped, and the queue is
    /// capped at `max_files` with a warning for the overflow.
    pub fn queue(&self, paths: &[PathBuf]) -> Vec<BatchFile> {
        let mut seen = HashSet::new();
        let mut files = Vec::new();
        for path in paths {
            if !seen.insert(path.clone()) {
                tracing::warn!("skipping duplicate batch entry: {}", path.display());
                continue;
            }
            if files.len() >= self.max_files {
                tracing::warn!(
                    "batch limited to {} files; skipping {}",
                    self.max_files,
                    path.display()
                );
                continue;
            }
            files.push(BatchFile::new(path.clone()));
        }
        files
    }

    /// Process every pending file in order, updating statuses in place.
    ///
    /// A failure on one file marks it `Error` and moves on; partial batch
    /// success is the normal outcome. Cancellation stops before the next
    /// file starts (and propagates into the file currently running).
    pub async fn process(
        &self,
        files: &mut [BatchFile],
        backends: &BackendSet,
        event_tx: mpsc::Sender<BatchEvent>,
        cancel: CancellationToken,
    ) {
        for index in 0..files.len() {
            if cancel.is_cancelled() {
                tracing::info!("batch cancelled with {} file(s) left", files.len() - index);
                break;
            }
            if files[index].status != FileStatus::Pending {
                continue;
            }

            let name = files[index].name();
            files[index].status = FileStatus::Processing;
            let _ = event_tx
                .send(BatchEvent::FileStarted {
                    index,
                    name: name.clone(),
                })
                .await;

            match self
                .process_one(&files[index].path, index, backends, &event_tx, &cancel)
                .await
            {
                Ok(session) => {
                    files[index].session = Some(session);
                    files[index].status = FileStatus::Completed;
                    let _ = event_tx
                        .send(BatchEvent::FileCompleted { index, name })
                        .await;
                }
                Err(e) => {
                    let error = e.to_string();
                    tracing::warn!("batch file {} failed: {}", name, error);
                    files[index].status = FileStatus::Error;
                    files[index].error = Some(error.clone());
                    let _ = event_tx
                        .send(BatchEvent::FileFailed { index, name, error })
                        .await;
                }
            }
        }
    }

    async fn process_one(
        &self,
        path: &Path,
        index: usize,
        backends: &BackendSet,
        event_tx: &mpsc::Sender<BatchEvent>,
        cancel: &CancellationToken,
    ) -> anyhow::Result<RunSession> {
        let document = Document::from_path(path)?;

        // Forward the file's own progress events, tagged with its index.
        let (inner_tx, mut inner_rx) = mpsc::channel::<ProcessEvent>(100);
        let forward_tx = event_tx.clone();
        let forwarder = tokio::spawn(async move {
            while let Some(event) = inner_rx.recv().await {
                let _ = forward_tx
                    .send(BatchEvent::FileProgress { index, event })
                    .await;
            }
        });

        let outcome = self
            .service
            .process(&document, backends, inner_tx, cancel.child_token())
            .await;
        let _ = forwarder.await;

        Ok(outcome?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::HttpSubmitter;
    use crate::config::Settings;

    fn coordinator() -> BatchCoordinator<HttpSubmitter> {
        let submitter = HttpSubmitter::new(&Settings::default()).unwrap();
        BatchCoordinator::new(ProcessService::new(submitter), 3)
    }

    #[test]
    fn test_queue_skips_duplicates() {
        let paths = vec![
            PathBuf::from("a.pdf"),
            PathBuf::from("b.pdf"),
            PathBuf::from("a.pdf"),
        ];
        let files = coordinator().queue(&paths);
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|f| f.status == FileStatus::Pending));
        // Every file gets a distinct id.
        assert_ne!(files[0].id, files[1].id);
    }

    #[test]
    fn test_queue_caps_at_max_files() {
        let paths: Vec<PathBuf> = (0..5).map(|i| PathBuf::from(format!("{}.pdf", i))).collect();
        let files = coordinator().queue(&paths);
        assert_eq!(files.len(), 3);
    }

    #[test]
    fn test_file_status_round_trip() {
        for status in [
            FileStatus::Pending,
            FileStatus::Processing,
            FileStatus::Completed,
            FileStatus::Error,
        ] {
            assert_eq!(FileStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(FileStatus::from_str("bogus"), None);
    }
}
