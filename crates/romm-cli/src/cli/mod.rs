//! CLI for the romm Switch client download engine.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use romm_core::config;
use romm_core::model::Config;
use romm_core::queue::snapshot;
use romm_core::status::Status;
use std::sync::Arc;

use commands::{run_enqueue, run_platforms, run_queue, run_remove, run_reorder, run_run, run_search, run_update_apply, run_update_check, run_update_download};

/// Top-level CLI for the romm Switch client download engine.
#[derive(Debug, Parser)]
#[command(name = "romm-switch-client")]
#[command(about = "romm Switch client: download and resume engine", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// List platforms available on the configured catalog server.
    Platforms,

    /// Search a platform's catalog by title.
    Search { platform: String, query: String },

    /// Enqueue a rom for download, planned per the platform's preferences.
    Enqueue { platform: String, rom_id: String },

    /// Show the current queue and its history.
    Queue,

    /// Swap two pending queue entries by index.
    Reorder { a: usize, b: usize },

    /// Remove a pending queue entry by index.
    Remove { index: usize },

    /// Drive the worker loop until the queue is empty, printing progress.
    Run,

    /// Check whether a pending self-update is staged.
    UpdateCheck,

    /// Apply a staged self-update, swapping it in for the running binary.
    UpdateApply {
        /// Path to the current binary (the one to be replaced).
        current_binary: std::path::PathBuf,
    },

    /// Download a release asset (following redirects) and stage it as the
    /// pending update, without applying it yet.
    UpdateDownload {
        /// URL of the release asset to download.
        url: String,
    },
}

fn queue_state_path(cfg: &Config) -> std::path::PathBuf {
    cfg.download_dir.join("queue_state.json")
}

impl CliCommand {
    pub fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!(category = "APP", "loaded config for {}", cfg.server_url);

        let status = Arc::new(Status::new());
        let snapshot_path = queue_state_path(&cfg);
        let restored = snapshot::load(&status, &snapshot_path, &cfg.download_dir)?;
        if restored > 0 {
            tracing::info!(category = "APP", restored, "restored queue items from snapshot");
        }

        match cli.command {
            CliCommand::Platforms => run_platforms(&cfg)?,
            CliCommand::Search { platform, query } => run_search(&cfg, &platform, &query)?,
            CliCommand::Enqueue { platform, rom_id } => run_enqueue(&cfg, &status, &platform, &rom_id)?,
            CliCommand::Queue => run_queue(&status),
            CliCommand::Reorder { a, b } => run_reorder(&status, a, b),
            CliCommand::Remove { index } => run_remove(&status, index),
            CliCommand::Run => run_run(&cfg, &status)?,
            CliCommand::UpdateCheck => run_update_check(&cfg)?,
            CliCommand::UpdateApply { current_binary } => run_update_apply(&cfg, &current_binary)?,
            CliCommand::UpdateDownload { url } => run_update_download(&cfg, &url)?,
        }

        snapshot::save(&status, &snapshot_path)?;
        Ok(())
    }
}
