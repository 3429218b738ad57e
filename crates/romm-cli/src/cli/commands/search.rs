//! `romm-switch-client search <platform> <query>` – title search within a
//! platform's catalog, falling back to the remote search endpoint once the
//! local listing grows past the threshold the API facade enforces.

use super::api_client;
use anyhow::{anyhow, Result};
use romm_core::model::Config;

pub fn run_search(cfg: &Config, platform_id: &str, query: &str) -> Result<()> {
    let client = api_client(cfg);
    let page = client.fetch_roms_page(platform_id, 0).map_err(|e| anyhow!("{e}"))?;

    let matches = match client.remote_search(platform_id, query, page.len()).map_err(|e| anyhow!("{e}"))? {
        Some(remote) => remote,
        None => {
            let needle = query.to_ascii_lowercase();
            page.into_iter().filter(|g| g.title.to_ascii_lowercase().contains(&needle)).collect()
        }
    };

    if matches.is_empty() {
        println!("No matches for \"{query}\" on {platform_id}.");
        return Ok(());
    }
    println!("{:<10} {:<40} {:>12}", "ID", "TITLE", "BYTES");
    for game in matches {
        println!("{:<10} {:<40} {:>12}", game.id, game.title, game.total_bytes);
    }
    Ok(())
}
