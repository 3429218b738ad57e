//! Logging init: file under the XDG state dir, or graceful fallback to
//! stderr when that directory is unwritable.

use std::io;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

enum FileOrStderr {
    File(std::fs::File),
    Stderr,
}

impl io::Write for FileOrStderr {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            FileOrStderr::File(f) => f.write(buf),
            FileOrStderr::Stderr => io::stderr().lock().write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            FileOrStderr::File(f) => f.flush(),
            FileOrStderr::Stderr => io::stderr().lock().flush(),
        }
    }
}

struct FileMakeWriter(std::fs::File);

impl<'a> MakeWriter<'a> for FileMakeWriter {
    type Writer = FileOrStderr;

    fn make_writer(&'a self) -> Self::Writer {
        self.0.try_clone().map(FileOrStderr::File).unwrap_or(FileOrStderr::Stderr)
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,romm_core=debug"))
}

fn try_init_to_file() -> Option<std::path::PathBuf> {
    let dirs = xdg::BaseDirectories::with_prefix("romm-switch-client").ok()?;
    let log_dir = dirs.get_state_home().join("romm-switch-client");
    std::fs::create_dir_all(&log_dir).ok()?;
    let log_file_path = log_dir.join("romm-switch-client.log");
    let file = std::fs::OpenOptions::new().create(true).append(true).open(&log_file_path).ok()?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(BoxMakeWriter::new(FileMakeWriter(file)))
        .with_ansi(false)
        .init();
    Some(log_file_path)
}

/// Install a file-backed subscriber under the XDG state dir; fall back to
/// stderr-only logging if the state directory cannot be created or opened.
pub fn init_logging() {
    match try_init_to_file() {
        Some(path) => tracing::info!(category = "APP", "logging to {}", path.display()),
        None => {
            tracing_subscriber::fmt().with_env_filter(env_filter()).with_writer(std::io::stderr).with_ansi(false).init();
            tracing::warn!(category = "APP", "state directory unavailable, logging to stderr only");
        }
    }
}
