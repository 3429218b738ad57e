//! `romm-switch-client platforms` – list catalog platforms.

use super::api_client;
use anyhow::{anyhow, Result};
use romm_core::model::Config;

pub fn run_platforms(cfg: &Config) -> Result<()> {
    let platforms = api_client(cfg).fetch_platforms().map_err(|e| anyhow!("{e}"))?;
    if platforms.is_empty() {
        println!("No platforms available.");
        return Ok(());
    }
    for slug in platforms {
        println!("{slug}");
    }
    Ok(())
}
