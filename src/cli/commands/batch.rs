//! Batch processing command.

use std::path::Path;

use console::style;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::batch::{BatchCoordinator, BatchEvent, BatchFile, FileStatus};
use crate::client::HttpSubmitter;
use crate::combine::{combine, CombineOutcome, Selection};
use crate::config::{Config, Settings};
use crate::models::BackendSet;
use crate::service::{ProcessEvent, ProcessService};

/// Process multiple documents sequentially, reporting per-file outcomes.
pub async fn cmd_batch(
    settings: &Settings,
    config: &Config,
    files: &[std::path::PathBuf],
    pick_all: Option<&str>,
    output_dir: Option<&Path>,
) -> anyhow::Result<()> {
    if files.is_empty() {
        anyhow::bail!("no files given");
    }

    let backends = BackendSet::new(config.effective_backends())?;
    let pick_backend = match pick_all {
        Some(reference) => Some(
            backends
                .position_of(reference)
                .ok_or_else(|| anyhow::anyhow!("no backend matching '{}'", reference))?,
        ),
        None => None,
    };

    let submitter = HttpSubmitter::new(settings)?;
    let coordinator =
        BatchCoordinator::new(ProcessService::new(submitter), settings.max_batch_files);
    let mut queue = coordinator.queue(files);

    println!(
        "{} Processing {} file(s) with {} backend(s), one at a time",
        style("→").cyan(),
        queue.len(),
        backends.len()
    );

    let cancel = CancellationToken::new();
    let cancel_on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_on_signal.cancel();
        }
    });

    let (event_tx, mut event_rx) = mpsc::channel::<BatchEvent>(100);
    let event_handler = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match event {
                BatchEvent::FileStarted { index, name } => {
                    println!("{} [{}] {}", style("→").cyan(), index + 1, name);
                }
                BatchEvent::FileProgress { event, .. } => match event {
                    ProcessEvent::GridReady {
                        total_pages,
                        total_backends,
                    } => {
                        println!(
                            "    {} page(s) × {} backend(s)",
                            total_pages, total_backends
                        );
                    }
                    ProcessEvent::TaskFinished {
                        page,
                        backend,
                        success: false,
                    } => {
                        eprintln!(
                            "    {} page {} backend {} failed",
                            style("✗").red(),
                            page + 1,
                            backend
                        );
                    }
                    ProcessEvent::Warning { message } => {
                        eprintln!("    {} {}", style("!").yellow(), message);
                    }
                    _ => {}
                },
                BatchEvent::FileCompleted { index, name } => {
                    println!("{} [{}] {} done", style("✓").green(), index + 1, name);
                }
                BatchEvent::FileFailed { index, name, error } => {
                    eprintln!(
                        "{} [{}] {} failed: {}",
                        style("✗").red(),
                        index + 1,
                        name,
                        error
                    );
                }
            }
        }
    });

    coordinator
        .process(&mut queue, &backends, event_tx, cancel)
        .await;

    if let Err(e) = event_handler.await {
        tracing::warn!("Event handler task failed: {}", e);
    }

    print_batch_summary(&queue);

    if let Some(backend) = pick_backend {
        export_batch(&queue, backend, output_dir)?;
    }

    Ok(())
}

fn print_batch_summary(files: &[BatchFile]) {
    println!("\n{}", style("Batch Summary").bold());
    println!("{}", "-".repeat(60));
    for file in files {
        let status = match file.status {
            FileStatus::Completed => style("completed").green().to_string(),
            FileStatus::Error => style("error").red().to_string(),
            FileStatus::Processing => style("processing").yellow().to_string(),
            FileStatus::Pending => style("pending").dim().to_string(),
        };
        let results = file
            .session
            .as_ref()
            .map(|s| s.results().len())
            .unwrap_or(0);
        print!("  {:<32} {:<12} {} result(s)", file.name(), status, results);
        if let Some(ref error) = file.error {
            print!("  ({})", error);
        }
        println!();
    }
    let completed = files
        .iter()
        .filter(|f| f.status == FileStatus::Completed)
        .count();
    let errored = files
        .iter()
        .filter(|f| f.status == FileStatus::Error)
        .count();
    println!("\n{} completed, {} failed\n", completed, errored);
}

/// Export each completed file's combined document using one backend's
/// results for every page.
fn export_batch(
    files: &[BatchFile],
    backend: usize,
    output_dir: Option<&Path>,
) -> anyhow::Result<()> {
    for file in files {
        let Some(session) = file.session.as_ref() else {
            continue;
        };

        let mut selection = Selection::new();
        for result in session.results() {
            if result.backend == backend {
                selection.select(result.page, backend);
            }
        }

        match combine(&selection, session.results()) {
            CombineOutcome::NoSelection => {
                println!(
                    "{} {}: no results from the picked backend, skipping export",
                    style("!").yellow(),
                    file.name()
                );
            }
            CombineOutcome::Document(content) => {
                let stem = file
                    .path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "document".to_string());
                let out_name = format!("{}.ocr.md", stem);
                let out_path = match output_dir {
                    Some(dir) => dir.join(out_name),
                    None => file
                        .path
                        .parent()
                        .unwrap_or_else(|| Path::new("."))
                        .join(out_name),
                };
                std::fs::write(&out_path, content)?;
                println!("{} Wrote {}", style("✓").green(), out_path.display());
            }
        }
    }
    Ok(())
}
