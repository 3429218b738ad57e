//! `romm-switch-client update-check` / `update-apply` – inspect and apply a
//! staged self-update.

use anyhow::{anyhow, Result};
use romm_core::model::Config;
use romm_core::selfupdate::{apply_pending_update, download_and_stage_update, UpdatePaths};
use std::path::Path;
use std::time::Duration;

const BINARY_NAME: &str = "romm-switch-client.nro";

pub fn run_update_check(cfg: &Config) -> Result<()> {
    let paths = UpdatePaths::under(&cfg.download_dir, BINARY_NAME);
    if paths.pending_pointer.exists() {
        let staged = std::fs::read_to_string(&paths.pending_pointer)?;
        println!("Update staged: {}", staged.trim());
    } else {
        println!("No update staged.");
    }
    Ok(())
}

pub fn run_update_apply(cfg: &Config, current_binary: &Path) -> Result<()> {
    let paths = UpdatePaths::under(&cfg.download_dir, BINARY_NAME);
    let applied = apply_pending_update(&paths, current_binary).map_err(|e| anyhow!("{e}"))?;
    if applied {
        println!("Update applied. Previous binary backed up at {}", paths.backup_path.display());
    } else {
        println!("No update was pending.");
    }
    Ok(())
}

pub fn run_update_download(cfg: &Config, url: &str) -> Result<()> {
    let paths = UpdatePaths::under(&cfg.download_dir, BINARY_NAME);
    let parsed = romm_core::http::parse_url(url).map_err(|e| anyhow!("{e}"))?;
    let auth = match (&cfg.username, &cfg.password) {
        (Some(u), Some(p)) => Some((u.as_str(), p.as_str())),
        _ => None,
    };
    download_and_stage_update(&romm_core::http::default_connect, &parsed, Duration::from_secs(cfg.http_timeout_seconds), auth, &paths)
        .map_err(|e| anyhow!("{e}"))?;
    println!("Release staged at {}", paths.update_dir.join("release.nro").display());
    Ok(())
}
