//! Single-document processing command.

use std::path::Path;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::cli::helpers::{parse_pick, truncate};
use crate::client::HttpSubmitter;
use crate::combine::{combine, write_export, CombineOutcome, Selection};
use crate::config::{Config, Settings};
use crate::models::{BackendSet, Document, TaskKey, TaskState};
use crate::service::{ProcessEvent, ProcessService};
use crate::session::RunSession;

/// Process one document, show streaming progress, then combine and
/// export whatever the user picked.
pub async fn cmd_process(
    settings: &Settings,
    config: &Config,
    file: &Path,
    picks: &[String],
    pick_all: Option<&str>,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    if !file.exists() {
        anyhow::bail!("File not found: {}", file.display());
    }

    let backends = BackendSet::new(config.effective_backends())?;
    let document = Document::from_path(file)?;

    println!(
        "{} Processing {} ({:.2} MB) with {} backend(s)",
        style("→").cyan(),
        document.name,
        document.size() as f64 / 1024.0 / 1024.0,
        backends.len()
    );

    let submitter = HttpSubmitter::new(settings)?;
    let service = ProcessService::new(submitter);

    let cancel = CancellationToken::new();
    let cancel_on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_on_signal.cancel();
        }
    });

    let (event_tx, event_rx) = mpsc::channel::<ProcessEvent>(100);
    let backend_names: Vec<String> = backends.iter().map(|b| b.name.clone()).collect();
    let handler_names = backend_names.clone();
    let event_handler = tokio::spawn(async move { render_events(event_rx, &handler_names).await });

    // One human-readable notification for the only escalated error class:
    // transport failure before any event flowed.
    let session = service
        .process(&document, &backends, event_tx, cancel)
        .await
        .map_err(|e| anyhow::anyhow!("OCR run failed: {}", e))?;

    if let Err(e) = event_handler.await {
        tracing::warn!("Event handler task failed: {}", e);
    }

    print_run_summary(&session, &backend_names);

    let selection = build_selection(&session, &backends, picks, pick_all)?;
    match combine(&selection, session.results()) {
        CombineOutcome::NoSelection => {
            println!(
                "{} Nothing selected; re-run with --pick PAGE=BACKEND or --pick-all BACKEND to export",
                style("!").yellow()
            );
        }
        CombineOutcome::Document(content) => {
            let path = write_export(&content, output)?;
            println!(
                "{} Wrote {} page(s) to {}",
                style("✓").green(),
                selection.len(),
                path.display()
            );
        }
    }

    Ok(())
}

/// Build the per-page selection from CLI flags.
pub fn build_selection(
    session: &RunSession,
    backends: &BackendSet,
    picks: &[String],
    pick_all: Option<&str>,
) -> anyhow::Result<Selection> {
    let mut selection = Selection::new();

    if let Some(reference) = pick_all {
        let backend = backends
            .position_of(reference)
            .ok_or_else(|| anyhow::anyhow!("no backend matching '{}'", reference))?;
        for result in session.results() {
            if result.backend == backend {
                selection.select(result.page, backend);
            }
        }
        return Ok(selection);
    }

    for pick in picks {
        let (page, reference) = parse_pick(pick).map_err(|e| anyhow::anyhow!(e))?;
        let backend = backends
            .position_of(&reference)
            .ok_or_else(|| anyhow::anyhow!("no backend matching '{}'", reference))?;
        selection.select(page, backend);
    }
    Ok(selection)
}

/// Render service events as progress output.
async fn render_events(mut event_rx: mpsc::Receiver<ProcessEvent>, backend_names: &[String]) {
    let mut progress: Option<ProgressBar> = None;
    let backend_label = |index: usize| {
        backend_names
            .get(index)
            .map(|n| n.to_string())
            .unwrap_or_else(|| format!("backend {}", index))
    };

    while let Some(event) = event_rx.recv().await {
        match event {
            ProcessEvent::Submitted { backends, .. } => {
                println!(
                    "{} Stream open, waiting for page count ({} backends)",
                    style("→").cyan(),
                    backends
                );
            }
            ProcessEvent::GridReady {
                total_pages,
                total_backends,
            } => {
                println!(
                    "{} {} page(s) × {} backend(s) = {} task(s)",
                    style("→").cyan(),
                    total_pages,
                    total_backends,
                    total_pages * total_backends
                );
                let bar = ProgressBar::new((total_pages * total_backends) as u64);
                bar.set_style(
                    ProgressStyle::default_bar()
                        .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {wide_msg}")
                        .unwrap()
                        .progress_chars("█▓░"),
                );
                bar.set_message("Running OCR...");
                progress = Some(bar);
            }
            ProcessEvent::TaskFinished {
                page,
                backend,
                success,
            } => {
                if let Some(ref bar) = progress {
                    bar.inc(1);
                    if !success {
                        bar.suspend(|| {
                            eprintln!(
                                "  {} Page {} via {} failed",
                                style("✗").red(),
                                page + 1,
                                backend_label(backend)
                            );
                        });
                    }
                } else if !success {
                    eprintln!(
                        "  {} Page {} via {} failed",
                        style("✗").red(),
                        page + 1,
                        backend_label(backend)
                    );
                }
            }
            ProcessEvent::Warning { message } => {
                let line = format!("  {} {}", style("!").yellow(), message);
                match progress {
                    Some(ref bar) => bar.suspend(|| eprintln!("{}", line)),
                    None => eprintln!("{}", line),
                }
            }
            ProcessEvent::Completed { forced } => {
                if let Some(ref bar) = progress {
                    bar.finish_and_clear();
                }
                progress = None;
                if forced {
                    println!(
                        "{} Producer signaled completion",
                        style("✓").green()
                    );
                } else {
                    println!("{} All tasks reached a terminal state", style("✓").green());
                }
            }
            ProcessEvent::TransportClosed { unfinished } => {
                if let Some(ref bar) = progress {
                    bar.finish_and_clear();
                }
                progress = None;
                if unfinished > 0 {
                    println!(
                        "{} Stream ended with {} task(s) unfinished (treated as failed)",
                        style("!").yellow(),
                        unfinished
                    );
                }
            }
            ProcessEvent::Cancelled => {
                if let Some(ref bar) = progress {
                    bar.finish_and_clear();
                }
                progress = None;
                println!("{} Cancelled; partial results kept", style("!").yellow());
            }
        }
    }
}

/// Print the per-page outcome table and run diagnostics.
fn print_run_summary(session: &RunSession, backend_names: &[String]) {
    let Some(grid) = session.grid() else {
        println!(
            "{} No page information received from the service",
            style("!").yellow()
        );
        return;
    };

    println!("\n{}", style("Results").bold());
    println!("{}", "-".repeat(60));
    print!("{:<8}", "Page");
    for backend in 0..grid.backends() {
        let name = backend_names
            .get(backend)
            .map(|n| truncate(n, 14))
            .unwrap_or_else(|| format!("backend {}", backend));
        print!("{:<16}", name);
    }
    println!();

    let failed = session.effectively_failed();
    for page in 0..grid.pages() {
        print!("{:<8}", page + 1);
        for backend in 0..grid.backends() {
            let key = TaskKey::new(page, backend);
            let cell = match grid.state(key) {
                Some(TaskState::Completed { .. }) => style("✓ ok").green().to_string(),
                Some(TaskState::Error { .. }) => style("✗ failed").red().to_string(),
                _ if failed.contains(&key) => style("○ no result").yellow().to_string(),
                _ => style("… pending").dim().to_string(),
            };
            print!("{:<16}", cell);
        }
        println!();
    }

    let stats = grid.stats();
    println!(
        "\n{} completed, {} failed, {} results collected",
        stats.completed,
        stats.errored,
        session.results().len()
    );
    if session.violation_count() > 0 {
        println!(
            "{} {} protocol violation(s) dropped",
            style("!").yellow(),
            session.violation_count()
        );
    }
    let diagnostics = session.diagnostics();
    if !diagnostics.is_empty() {
        println!("{} {} diagnostic(s):", style("!").yellow(), diagnostics.len());
        for diagnostic in diagnostics.iter().take(10) {
            println!("  - {}", diagnostic.describe());
        }
        if diagnostics.len() > 10 {
            println!("  … and {} more", diagnostics.len() - 10);
        }
    }
    println!();
}
