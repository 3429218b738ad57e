//! Queue snapshot persistence and restore.

use crate::model::{DownloadBundle, Game, PlannerMode};
use crate::queue::{HistoryEntry, QueueItem, QueueState};
use crate::status::Status;
use serde::{Deserialize, Serialize};
use std::path::Path;

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SnapshotItem {
    game: Game,
    bundle: DownloadBundle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SnapshotFile {
    version: u32,
    items: Vec<SnapshotItem>,
}

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse: {0}")]
    Json(#[from] serde_json::Error),
}

/// Persists only items in {Pending, Downloading, Finalizing, Resumable}.
/// Deletes the file entirely when nothing qualifies.
pub fn save(status: &Status, path: &Path) -> Result<(), SnapshotError> {
    let items: Vec<SnapshotItem> = status
        .queue_snapshot()
        .into_iter()
        .filter(|q| matches!(q.state, QueueState::Pending | QueueState::Downloading | QueueState::Finalizing | QueueState::Resumable))
        .map(|q| SnapshotItem { game: q.game, bundle: q.bundle })
        .collect();

    if items.is_empty() {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        return Ok(());
    }

    let snapshot = SnapshotFile { version: SNAPSHOT_VERSION, items };
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, serde_json::to_vec_pretty(&snapshot)?)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

fn identity(game: &Game, bundle: &DownloadBundle) -> String {
    if !game.id.is_empty() {
        return game.id.clone();
    }
    if let Some(file_id) = bundle.files.first().map(|f| f.id.clone()) {
        return file_id;
    }
    bundle.title.clone()
}

fn final_output_exists(download_root: &Path, bundle: &DownloadBundle, title: &str) -> bool {
    use crate::downloader::sanitize;
    let final_name = sanitize::final_filename(title, bundle.files.first().map(|f| f.name.as_str()).unwrap_or(""));
    download_root.join(&final_name).exists()
        || download_root.join(final_name.rsplit_once('.').map(|(n, _)| n).unwrap_or(&final_name)).exists()
}

/// Reconstructs a `Pending` `QueueItem` per surviving entry.
/// Skips entries whose output already exists, or whose identity matches an
/// active item or a terminal (`Completed`/`Cancelled`) history entry.
/// Legacy entries without a bundle are not modeled here — the snapshot
/// format always carries a bundle in this engine.
pub fn load(status: &Status, path: &Path, download_root: &Path) -> Result<usize, SnapshotError> {
    if !path.exists() {
        return Ok(0);
    }
    let body = std::fs::read(path)?;
    let snapshot: SnapshotFile = serde_json::from_slice(&body)?;

    let active_ids: Vec<String> = status.queue_snapshot().iter().map(|q| identity(&q.game, &q.bundle)).collect();
    let terminal_blockers: Vec<String> = status
        .history_snapshot()
        .iter()
        .filter(|h| matches!(h.item.state, QueueState::Completed | QueueState::Cancelled))
        .map(|h| identity(&h.item.game, &h.item.bundle))
        .collect();

    let mut restored = 0usize;
    for entry in snapshot.items {
        if final_output_exists(download_root, &entry.bundle, &entry.game.title) {
            continue;
        }
        let id = identity(&entry.game, &entry.bundle);
        if active_ids.contains(&id) || terminal_blockers.contains(&id) {
            continue;
        }
        status.with_queue_mut(|q| q.push(QueueItem::new(entry.game, entry.bundle)));
        restored += 1;
    }
    Ok(restored)
}

/// Synthesize a single-file bundle from a bare `Game`, for callers that
/// only have catalog data (legacy snapshot entries in the original design).
pub fn synthesize_bundle(game: &Game) -> DownloadBundle {
    DownloadBundle {
        rom_id: game.id.clone(),
        title: game.title.clone(),
        platform_slug: game.platform_slug.clone(),
        mode: PlannerMode::SingleBest,
        files: game
            .files
            .first()
            .map(|f| vec![crate::model::DownloadFileSpec::from(f)])
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DownloadFileSpec;

    fn game(id: &str) -> Game {
        Game {
            id: id.to_string(),
            title: format!("Game {id}"),
            platform_id: "p".into(),
            platform_slug: "switch".into(),
            preferred_filename: "g.nsp".into(),
            preferred_file_id: None,
            cover_url: None,
            total_bytes: 10,
            files: vec![],
        }
    }

    fn bundle(id: &str) -> DownloadBundle {
        DownloadBundle {
            rom_id: id.to_string(),
            title: format!("Game {id}"),
            platform_slug: "switch".into(),
            mode: PlannerMode::SingleBest,
            files: vec![DownloadFileSpec { id: "f".into(), name: "g.nsp".into(), relative_path: None, url: "http://h/f".into(), size: 10, category: "game".into() }],
        }
    }

    #[test]
    fn scenario_5_round_trip_filters_completed_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let download_root = dir.path();
        let snapshot_path = dir.path().join("queue_state.json");

        std::fs::write(download_root.join("Game b.nsp"), b"done").unwrap();

        let saved = Status::new();
        saved.with_queue_mut(|q| {
            q.push(QueueItem::new(game("a"), bundle("a")));
            q.push(QueueItem::new(game("b"), bundle("b")));
        });
        save(&saved, &snapshot_path).unwrap();

        let restored = Status::new();
        let n = load(&restored, &snapshot_path, download_root).unwrap();
        assert_eq!(n, 1);
        let items = restored.queue_snapshot();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].game.id, "a");
    }

    #[test]
    fn empty_active_queue_deletes_snapshot_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue_state.json");
        std::fs::write(&path, b"{}").unwrap();
        let status = Status::new();
        save(&status, &path).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn terminal_completed_history_blocks_restore() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot_path = dir.path().join("queue_state.json");
        let saved = Status::new();
        saved.with_queue_mut(|q| q.push(QueueItem::new(game("a"), bundle("a"))));
        save(&saved, &snapshot_path).unwrap();

        let restored = Status::new();
        restored.with_history_mut(|h| {
            let mut item = QueueItem::new(game("a"), bundle("a"));
            item.state = QueueState::Completed;
            h.push(HistoryEntry { item });
        });
        let n = load(&restored, &snapshot_path, dir.path()).unwrap();
        assert_eq!(n, 0);
    }
}
