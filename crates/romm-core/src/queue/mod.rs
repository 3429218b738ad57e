//! FIFO download queue and worker loop.
//!
//! A single dedicated OS thread processes one queue item at a time, with a
//! cooperative-cancellation flag checked between transfer attempts.

pub mod snapshot;

use crate::downloader::{self, DownloadContext, DownloadOutcome};
use crate::model::{Config, DownloadBundle, Game};
use crate::status::Status;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueueState {
    Pending,
    Downloading,
    Finalizing,
    Completed,
    Failed,
    Cancelled,
    Resumable,
}

impl QueueState {
    pub fn is_terminal(self) -> bool {
        matches!(self, QueueState::Completed | QueueState::Failed | QueueState::Cancelled)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueItem {
    pub game: Game,
    pub bundle: DownloadBundle,
    pub state: QueueState,
    pub error_message: Option<String>,
}

impl QueueItem {
    pub fn new(game: Game, bundle: DownloadBundle) -> Self {
        QueueItem { game, bundle, state: QueueState::Pending, error_message: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub item: QueueItem,
}

/// Events emitted to a bounded channel for the UI.
#[derive(Debug, Clone)]
pub enum QueueEvent {
    BeginItem(String),
    Progress(u64),
    CompletedItem(String),
    FailedItem(String, String),
    QueueEmpty,
}

/// Rejects when the game is already active, or when its most recent
/// history entry is `Completed`.
pub fn can_enqueue(status: &Status, game_id: &str) -> bool {
    let active_dup = status.queue_snapshot().iter().any(|q| q.game.id == game_id);
    if active_dup {
        return false;
    }
    let completed_in_history = status
        .history_snapshot()
        .iter()
        .rev()
        .find(|h| h.item.game.id == game_id)
        .map(|h| h.item.state == QueueState::Completed)
        .unwrap_or(false);
    !completed_in_history
}

pub fn enqueue(status: &Status, game: Game, bundle: DownloadBundle) -> bool {
    if !can_enqueue(status, &game.id) {
        return false;
    }
    status.with_queue_mut(|q| q.push(QueueItem::new(game, bundle)));
    true
}

/// Reorder/remove a `Pending` item at `index` in the active queue. The
/// "barrier" is the length of the first non-Pending prefix: callers must
/// not touch indices below it (the in-flight head is immutable while the
/// worker runs).
pub fn barrier_len(status: &Status) -> usize {
    status
        .queue_snapshot()
        .iter()
        .position(|q| q.state == QueueState::Pending)
        .unwrap_or_else(|| status.queue_snapshot().len())
}

pub fn swap(status: &Status, a: usize, b: usize) -> bool {
    let barrier = barrier_len(status);
    if a < barrier || b < barrier {
        return false;
    }
    status.with_queue_mut(|q| {
        if a >= q.len() || b >= q.len() {
            return false;
        }
        q.swap(a, b);
        true
    })
}

pub fn remove(status: &Status, index: usize) -> bool {
    let barrier = barrier_len(status);
    if index < barrier {
        return false;
    }
    status.with_queue_mut(|q| {
        if index >= q.len() {
            return false;
        }
        q.remove(index);
        true
    })
}

pub struct Worker {
    handle: Option<JoinHandle<()>>,
    stop: Arc<AtomicBool>,
}

impl Worker {
    /// Spawns the worker thread if one is not already running, resets
    /// per-session totals, and computes the session total from the sum of
    /// bundle sizes.
    pub fn start(
        status: Arc<Status>,
        cfg: Arc<Config>,
        connect: Arc<crate::http::ConnectFn>,
        events: std::sync::mpsc::Sender<QueueEvent>,
    ) -> Worker {
        let stop = Arc::new(AtomicBool::new(false));
        let worker_stop = Arc::clone(&stop);

        let total: u64 = status.queue_snapshot().iter().map(|q| q.bundle.total_size()).sum();
        status.total_download_bytes.store(total, Ordering::SeqCst);
        status.total_downloaded_bytes.store(0, Ordering::SeqCst);
        status.download_completed.store(false, Ordering::SeqCst);
        status.download_worker_running.store(true, Ordering::SeqCst);

        let handle = std::thread::spawn(move || run_loop(status, cfg, connect, worker_stop, events));
        Worker { handle: Some(handle), stop }
    }

    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    pub fn reap_if_done(&mut self) {
        if self.handle.as_ref().map(|h| h.is_finished()).unwrap_or(false) {
            if let Some(handle) = self.handle.take() {
                let _ = handle.join();
            }
        }
    }
}

fn run_loop(
    status: Arc<Status>,
    cfg: Arc<Config>,
    connect: Arc<crate::http::ConnectFn>,
    stop: Arc<AtomicBool>,
    events: std::sync::mpsc::Sender<QueueEvent>,
) {
    loop {
        if stop.load(Ordering::SeqCst) {
            break;
        }
        let head = status.with_queue_mut(|q| q.first().cloned());
        let Some(mut item) = head else {
            let _ = events.send(QueueEvent::QueueEmpty);
            break;
        };

        item.state = QueueState::Downloading;
        status.with_queue_mut(|q| {
            if let Some(first) = q.first_mut() {
                first.state = QueueState::Downloading;
            }
        });
        let _ = events.send(QueueEvent::BeginItem(item.game.title.clone()));

        let item_total: u64 = item.bundle.total_size();
        status.current_download_size.store(item_total, Ordering::SeqCst);
        status.current_downloaded_bytes.store(0, Ordering::SeqCst);

        let auth = match (&cfg.username, &cfg.password) {
            (Some(u), Some(p)) => Some((u.clone(), p.clone())),
            _ => None,
        };
        let ctx = DownloadContext {
            connect: connect.as_ref(),
            timeout: std::time::Duration::from_secs(cfg.http_timeout_seconds),
            auth: auth.as_ref().map(|(u, p)| (u.as_str(), p.as_str())),
            stop: stop.as_ref(),
        };

        let mut item_failed = None;
        for spec in &item.bundle.files {
            let events = events.clone();
            let status_ref = &status;
            let outcome = downloader::download_file(&ctx, spec, &item.bundle.title, &item.bundle.rom_id, &cfg.download_dir, |delta| {
                bump_progress(status_ref, delta);
                if delta > 0 {
                    let _ = events.send(QueueEvent::Progress(delta as u64));
                }
            });
            match outcome {
                DownloadOutcome::Completed { .. } => continue,
                DownloadOutcome::Cancelled => {
                    item_failed = Some((QueueState::Cancelled, "cancelled".to_string()));
                    break;
                }
                DownloadOutcome::Failed(e) => {
                    let manifest_exists = downloader_has_resumable_state(&cfg, &item);
                    let state = if manifest_exists { QueueState::Resumable } else { QueueState::Failed };
                    item_failed = Some((state, e.user_message));
                    break;
                }
            }
        }

        if item_failed.is_none() {
            item.state = QueueState::Finalizing;
            status.with_queue_mut(|q| {
                if let Some(first) = q.first_mut() {
                    first.state = QueueState::Finalizing;
                }
            });
        }

        item.state = match item_failed {
            None => QueueState::Completed,
            Some((state, _)) => state,
        };
        item.error_message = item_failed.as_ref().map(|(_, m)| m.clone());

        match item.state {
            QueueState::Completed => {
                let _ = events.send(QueueEvent::CompletedItem(item.game.title.clone()));
            }
            _ => {
                let _ = events.send(QueueEvent::FailedItem(item.game.title.clone(), item.error_message.clone().unwrap_or_default()));
            }
        }

        status.with_queue_mut(|q| {
            if !q.is_empty() {
                q.remove(0);
            }
        });
        status.with_history_mut(|h| h.push(HistoryEntry { item }));
    }

    status.download_worker_running.store(false, Ordering::SeqCst);
    if status.queue_snapshot().is_empty() {
        let no_failures = status
            .history_snapshot()
            .iter()
            .all(|h| h.item.state != QueueState::Failed && h.item.state != QueueState::Cancelled);
        status.download_completed.store(no_failures, Ordering::SeqCst);
    }
}

fn bump_progress(status: &Status, delta: i64) {
    if delta >= 0 {
        status.current_downloaded_bytes.fetch_add(delta as u64, Ordering::SeqCst);
        status.total_downloaded_bytes.fetch_add(delta as u64, Ordering::SeqCst);
    } else {
        let amount = (-delta) as u64;
        sub_clamped(&status.current_downloaded_bytes, amount);
        sub_clamped(&status.total_downloaded_bytes, amount);
    }
}

fn sub_clamped(counter: &std::sync::atomic::AtomicU64, amount: u64) {
    let _ = counter.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |cur| Some(cur.saturating_sub(amount)));
}

fn downloader_has_resumable_state(cfg: &Config, item: &QueueItem) -> bool {
    use crate::downloader::sanitize;
    let temp_name = sanitize::temp_dir_name(&item.bundle.title, &item.bundle.rom_id);
    let temp_dir = cfg.download_dir.join("temp").join(temp_name);
    let manifest_path = temp_dir.join("manifest.json");
    manifest_path.exists()
        && crate::downloader::storage::observe_parts(&temp_dir)
            .map(|parts| parts.iter().any(|(_, size)| *size > 0))
            .unwrap_or(false)
}

pub type QueueHandle = Arc<Mutex<Option<Worker>>>;
