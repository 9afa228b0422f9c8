//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific
//! modules.

mod backend;
mod batch;
mod process;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{load_settings_with_options, LoadOptions};

#[derive(Parser)]
#[command(name = "ocrpick")]
#[command(about = "Multi-backend OCR comparison client with per-page result picking")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides the default location)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Manage OCR backends
    Backend {
        #[command(subcommand)]
        command: BackendCommands,
    },

    /// Process a document against all configured backends
    Process {
        /// Document to process (PDF)
        file: PathBuf,
        /// Pick a backend's result for a page (PAGE=BACKEND, repeatable).
        /// BACKEND is an index, id, or name
        #[arg(long = "pick", value_name = "PAGE=BACKEND")]
        picks: Vec<String>,
        /// Pick one backend's result for every page that has one
        #[arg(long, value_name = "BACKEND", conflicts_with = "picks")]
        pick_all: Option<String>,
        /// Output path for the combined document
        /// (default: ocr-result-<date>.md)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Process multiple documents sequentially
    Batch {
        /// Documents to process (PDFs)
        files: Vec<PathBuf>,
        /// Pick one backend's result for every page of every file and
        /// export each combined document
        #[arg(long, value_name = "BACKEND")]
        pick_all: Option<String>,
        /// Directory for exported documents (default: next to each input)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum BackendCommands {
    /// Add a backend configuration
    Add {
        /// Display name
        #[arg(long)]
        name: String,
        /// API endpoint URL
        #[arg(long)]
        endpoint: String,
        /// API key (or set via env)
        #[arg(long, env = "OCRPICK_API_KEY", default_value = "")]
        api_key: String,
        /// Model identifier
        #[arg(long, default_value = "gpt-4o")]
        model: String,
        /// Provider tag (openai, ollama, anthropic, ...)
        #[arg(long, default_value = "openai")]
        provider: String,
    },
    /// List configured backends
    List,
    /// Remove a backend by id or name
    Remove {
        /// Backend id or name
        backend: String,
    },
}

/// Parse arguments and run the selected command.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (settings, config) = load_settings_with_options(LoadOptions {
        config_path: cli.config.clone(),
    })
    .await;

    match cli.command {
        Commands::Backend { command } => match command {
            BackendCommands::Add {
                name,
                endpoint,
                api_key,
                model,
                provider,
            } => backend::cmd_backend_add(config, &name, &endpoint, &api_key, &model, &provider),
            BackendCommands::List => backend::cmd_backend_list(&config),
            BackendCommands::Remove { backend } => backend::cmd_backend_remove(config, &backend),
        },
        Commands::Process {
            file,
            picks,
            pick_all,
            output,
        } => {
            process::cmd_process(
                &settings,
                &config,
                &file,
                &picks,
                pick_all.as_deref(),
                output.as_deref(),
            )
            .await
        }
        Commands::Batch {
            files,
            pick_all,
            output_dir,
        } => {
            batch::cmd_batch(
                &settings,
                &config,
                &files,
                pick_all.as_deref(),
                output_dir.as_deref(),
            )
            .await
        }
    }
}
