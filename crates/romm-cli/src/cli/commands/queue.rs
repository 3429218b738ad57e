//! `romm-switch-client queue` / `reorder` / `remove` – inspect and edit the
//! pending queue.

use romm_core::queue::{self};
use romm_core::status::Status;

pub fn run_queue(status: &Status) {
    let items = status.queue_snapshot();
    if items.is_empty() {
        println!("Queue is empty.");
    } else {
        println!("{:<4} {:<12} {:<30} {:>12}", "IDX", "STATE", "TITLE", "BYTES");
        for (idx, item) in items.iter().enumerate() {
            println!(
                "{:<4} {:<12} {:<30} {:>12}",
                idx,
                format!("{:?}", item.state).to_lowercase(),
                item.game.title,
                item.bundle.total_size()
            );
        }
    }

    let history = status.history_snapshot();
    if !history.is_empty() {
        println!();
        println!("History:");
        for entry in history {
            println!("  {} — {:?}", entry.item.game.title, entry.item.state);
        }
    }
}

pub fn run_reorder(status: &Status, a: usize, b: usize) {
    if queue::swap(status, a, b) {
        println!("Swapped {a} and {b}");
    } else {
        println!("Reorder rejected: index out of range or inside the active head");
    }
}

pub fn run_remove(status: &Status, index: usize) {
    if queue::remove(status, index) {
        println!("Removed index {index}");
    } else {
        println!("Remove rejected: index out of range or inside the active head");
    }
}
