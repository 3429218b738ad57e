//! `romm-switch-client run` – drive the worker loop to completion.

use anyhow::Result;
use romm_core::model::Config;
use romm_core::queue::{QueueEvent, Worker};
use romm_core::status::Status;
use std::sync::Arc;

pub fn run_run(cfg: &Config, status: &Arc<Status>) -> Result<()> {
    if status.queue_snapshot().is_empty() {
        println!("Nothing queued.");
        return Ok(());
    }

    let (tx, rx) = std::sync::mpsc::channel();
    let connect: Arc<romm_core::http::ConnectFn> = Arc::new(romm_core::http::default_connect);
    let mut worker = Worker::start(Arc::clone(status), Arc::new(cfg.clone()), connect, tx);

    for event in rx {
        match event {
            QueueEvent::BeginItem(title) => println!("Downloading {title}..."),
            QueueEvent::Progress(_) => print!("\r  {} bytes written", status.current_downloaded_bytes.load(std::sync::atomic::Ordering::SeqCst)),
            QueueEvent::CompletedItem(title) => println!("\nCompleted {title}"),
            QueueEvent::FailedItem(title, message) => println!("\nFailed {title}: {message}"),
            QueueEvent::QueueEmpty => break,
        }
        use std::io::Write;
        let _ = std::io::stdout().flush();
    }

    worker.stop();
    Ok(())
}
