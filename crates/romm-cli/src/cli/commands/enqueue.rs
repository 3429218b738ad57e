//! `romm-switch-client enqueue <platform> <rom-id>` – plan and queue one
//! catalog entry. Platform preferences are the real client's external
//! collaborator (see `romm_core::planner`); this harness uses the default
//! preference set so enqueue can be exercised without shipping a real
//! preferences file.

use super::api_client;
use anyhow::{anyhow, Result};
use romm_core::model::Config;
use romm_core::planner::{self, PlatformPrefs};
use romm_core::queue;
use romm_core::status::Status;
use std::collections::HashMap;

fn default_prefs() -> PlatformPrefs {
    PlatformPrefs {
        version: 1,
        default_mode: romm_core::model::PlannerMode::SingleBest,
        default_ignore_ext: Vec::new(),
        by_slug: HashMap::new(),
    }
}

pub fn run_enqueue(cfg: &Config, status: &Status, platform_id: &str, rom_id: &str) -> Result<()> {
    let client = api_client(cfg);
    let page = client.fetch_roms_page(platform_id, 0).map_err(|e| anyhow!("{e}"))?;
    let mut game = page
        .into_iter()
        .find(|g| g.id == rom_id)
        .ok_or_else(|| anyhow!("rom {rom_id} not found on platform {platform_id}"))?;
    game.files = client.enrich_with_files(rom_id).map_err(|e| anyhow!("{e}"))?;

    let bundle = planner::plan(&game, &default_prefs());
    if bundle.files.is_empty() {
        return Err(anyhow!("no downloadable files for rom {rom_id}"));
    }

    if queue::enqueue(status, game, bundle) {
        println!("Enqueued {rom_id}");
    } else {
        println!("{rom_id} is already active or already completed; not enqueued");
    }
    Ok(())
}
