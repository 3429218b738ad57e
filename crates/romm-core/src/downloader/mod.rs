//! Per-item resumable download.
//!
//! Orchestrates preflight (`preflight`), the manifest/resume-plan pair
//! (`crate::manifest`), the part writer (`storage`), and atomic
//! finalization (`finalize`). One active transfer runs at a time —
//! concurrent per-item transfers are out of scope.

pub mod finalize;
pub mod preflight;
pub mod sanitize;
pub mod storage;

use crate::error::{classify, ErrorCategory, ErrorInfo};
use crate::http::{self, ConnectFn, Method, Request};
use crate::manifest::{self, Manifest};
use crate::model::DownloadFileSpec;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// ~4 GiB minus 64 KiB: keeps each on-disk fragment under FAT32's
/// per-file cap.
pub const PART_SIZE: u64 = 4 * 1024 * 1024 * 1024 - 64 * 1024;
const FREE_SPACE_MARGIN: u64 = 200 * 1024 * 1024;
const READ_BUF_SIZE: usize = 256 * 1024;
const HEARTBEAT_BYTES: u64 = 100 * 1024 * 1024;
const HEARTBEAT_SECS: u64 = 10;
const MAX_ATTEMPTS: u32 = 3;

pub struct DownloadContext<'a> {
    pub connect: &'a ConnectFn,
    pub timeout: Duration,
    pub auth: Option<(&'a str, &'a str)>,
    pub stop: &'a AtomicBool,
}

pub enum DownloadOutcome {
    Completed { final_path: PathBuf },
    Cancelled,
    Failed(ErrorInfo),
}

/// Progress callback: a signed byte delta relative to the current item.
/// Positive for bytes written; negative when an attempt is rolled back
/// because ranges are unsupported. The caller is responsible for folding
/// this into session totals.
pub fn download_file(
    ctx: &DownloadContext,
    spec: &DownloadFileSpec,
    title: &str,
    rom_id: &str,
    download_root: &Path,
    mut on_progress: impl FnMut(i64),
) -> DownloadOutcome {
    let url = match http::parse_url(&spec.url) {
        Ok(u) => u,
        Err(e) => return DownloadOutcome::Failed(classify(&format!("parse: invalid url: {e}"), Some(ErrorCategory::Parse), None)),
    };

    let preflight = match preflight::preflight(ctx.connect, &url, ctx.timeout, ctx.auth) {
        Ok(p) => p,
        Err(_) => preflight::PreflightResult { supports_ranges: false, content_length: None },
    };
    let total_size = preflight.content_length.unwrap_or(spec.size);

    if let Err(e) = check_free_space(download_root, total_size) {
        return DownloadOutcome::Failed(e);
    }

    let temp_name = sanitize::temp_dir_name(title, rom_id);
    let final_name = sanitize::final_filename(title, &spec.name);
    let temp_dir = download_root.join("temp").join(&temp_name);
    let manifest_path = temp_dir.join("manifest.json");

    if let Err(e) = std::fs::create_dir_all(&temp_dir) {
        return DownloadOutcome::Failed(classify(&format!("open part failed: {e}"), Some(ErrorCategory::Filesystem), None));
    }

    let part_size = PART_SIZE;
    let part_count = Manifest::part_count(total_size, part_size);

    let manifest = match Manifest::load(&manifest_path) {
        Ok(m) if m.compatible_with(rom_id, &spec.id, &spec.url, total_size, part_size) => m,
        _ => Manifest::new(rom_id.to_string(), spec.id.clone(), final_name.clone(), spec.url.clone(), total_size, part_size),
    };

    let mut start_offset = match storage::observe_parts(&temp_dir) {
        Ok(observed) => {
            let plan = manifest::plan_resume(&manifest, &observed);
            plan.bytes_have
        }
        Err(_) => 0,
    };

    if !preflight.supports_ranges && start_offset > 0 {
        let _ = std::fs::remove_dir_all(&temp_dir);
        let _ = std::fs::create_dir_all(&temp_dir);
        on_progress(-(start_offset as i64));
        start_offset = 0;
    }

    let mut total_credited = 0u64;
    let mut last_err = None;

    for attempt in 0..MAX_ATTEMPTS {
        if ctx.stop.load(Ordering::SeqCst) {
            return DownloadOutcome::Cancelled;
        }
        if attempt > 0 {
            std::thread::sleep(Duration::from_millis(250) * attempt);
        }

        match transfer_once(ctx, &url, total_size, preflight.supports_ranges, start_offset, &temp_dir, part_size, &mut on_progress) {
            Ok(bytes_written) => {
                total_credited += bytes_written;
                let _ = save_manifest(&manifest, &manifest_path, &temp_dir, part_size);
                break;
            }
            Err(TransferError::Cancelled) => return DownloadOutcome::Cancelled,
            Err(TransferError::Retryable(e, bytes_written)) => {
                total_credited += bytes_written;
                last_err = Some(e);
                if preflight.supports_ranges {
                    start_offset = storage::observe_parts(&temp_dir).map(|o| o.iter().map(|(_, s)| *s).sum()).unwrap_or(start_offset);
                } else {
                    let _ = std::fs::remove_dir_all(&temp_dir);
                    let _ = std::fs::create_dir_all(&temp_dir);
                    on_progress(-(total_credited as i64));
                    total_credited = 0;
                    start_offset = 0;
                }
            }
            Err(TransferError::Fatal(e)) => {
                let mut failed = manifest.clone();
                failed.failure_reason = Some(e.detail.clone());
                let _ = failed.save(&manifest_path);
                return DownloadOutcome::Failed(e);
            }
        }
    }

    if total_credited == 0 && start_offset < total_size {
        if let Some(e) = last_err {
            let mut failed = manifest.clone();
            failed.failure_reason = Some(e.detail.clone());
            let _ = failed.save(&manifest_path);
            return DownloadOutcome::Failed(e);
        }
    }

    let final_path = download_root.join(&final_name);
    let finalize_result = if part_count == 1 {
        finalize::finalize_single(&temp_dir.join("00.part"), &final_path).map_err(|e| {
            classify(&format!("write failed: {e}"), Some(ErrorCategory::Filesystem), None)
        })
    } else {
        finalize::finalize_multi(&temp_dir, &download_root.join(sanitize_final_dir_name(&final_name)), part_count).map_err(|e| {
            classify(&format!("write failed: {e}"), Some(ErrorCategory::Filesystem), None)
        })
    };

    match finalize_result {
        Ok(()) => {
            let _ = std::fs::remove_file(&manifest_path);
            let _ = std::fs::remove_dir(&temp_dir);
            DownloadOutcome::Completed { final_path }
        }
        Err(e) => DownloadOutcome::Failed(e),
    }
}

fn sanitize_final_dir_name(final_name: &str) -> String {
    final_name.rsplit_once('.').map(|(n, _)| n.to_string()).unwrap_or_else(|| final_name.to_string())
}

fn save_manifest(manifest: &Manifest, path: &Path, temp_dir: &Path, part_size: u64) -> Result<(), manifest::ManifestError> {
    let observed = storage::observe_parts(temp_dir).unwrap_or_default();
    let mut m = manifest.clone();
    for part in &mut m.parts {
        if let Some((_, size)) = observed.iter().find(|(idx, _)| *idx == part.index) {
            part.done = *size == part_size.min(m.total_size.saturating_sub(part.index * part_size));
        }
    }
    m.save(path)
}

enum TransferError {
    Cancelled,
    /// Transport failure or short read: rollback amount credited this
    /// attempt before the caller retries.
    Retryable(ErrorInfo, u64),
    Fatal(ErrorInfo),
}

#[allow(clippy::too_many_arguments)]
fn transfer_once(
    ctx: &DownloadContext,
    url: &http::Url,
    total_size: u64,
    supports_ranges: bool,
    start_offset: u64,
    temp_dir: &Path,
    part_size: u64,
    on_progress: &mut impl FnMut(i64),
) -> Result<u64, TransferError> {
    let mut req = Request::new(Method::Get, url.clone(), ctx.timeout);
    if let Some((u, p)) = ctx.auth {
        req = req.with_basic_auth(u, p);
    }
    let expect_206 = supports_ranges && start_offset > 0;
    if expect_206 {
        req = req.with_range(start_offset, None);
    }

    let mut writer = storage::PartWriter::new(temp_dir.to_path_buf(), part_size);
    let mut global_offset = start_offset;
    let mut credited_this_attempt = 0u64;
    let mut last_heartbeat = Instant::now();
    let mut heartbeat_bytes = 0u64;
    let mut cancelled = false;

    let result = http::perform_streamed(ctx.connect, &req, false, |chunk| {
        if ctx.stop.load(Ordering::SeqCst) {
            cancelled = true;
            return false;
        }
        if writer.write_at(global_offset, chunk).is_err() {
            return false;
        }
        global_offset += chunk.len() as u64;
        credited_this_attempt += chunk.len() as u64;
        heartbeat_bytes += chunk.len() as u64;
        on_progress(chunk.len() as i64);

        if heartbeat_bytes >= HEARTBEAT_BYTES || last_heartbeat.elapsed() >= Duration::from_secs(HEARTBEAT_SECS) {
            tracing::info!(category = "DL", bytes = global_offset, total = total_size, "download heartbeat");
            heartbeat_bytes = 0;
            last_heartbeat = Instant::now();
        }
        true
    });

    let _ = writer.sync();

    if cancelled {
        return Err(TransferError::Cancelled);
    }

    match result {
        Ok(headers) => {
            let status_ok = if expect_206 { headers.status_code == 206 } else { headers.status_code == 200 };
            if headers.chunked {
                return Err(TransferError::Fatal(classify("chunked transfer not supported", Some(ErrorCategory::Unsupported), None)));
            }
            if !status_ok {
                return Err(TransferError::Retryable(
                    classify("unexpected status during transfer", None, Some(headers.status_code)),
                    credited_this_attempt,
                ));
            }
            if global_offset < total_size {
                return Err(TransferError::Retryable(
                    classify("short read: transfer ended before total_size", Some(ErrorCategory::Network), None),
                    credited_this_attempt,
                ));
            }
            Ok(credited_this_attempt)
        }
        Err(e) if e.retryable => Err(TransferError::Retryable(e, credited_this_attempt)),
        Err(e) => Err(TransferError::Fatal(e)),
    }
}

fn check_free_space(download_root: &Path, needed: u64) -> Result<(), ErrorInfo> {
    match free_space_bytes(download_root) {
        Ok(available) if available < needed.saturating_add(FREE_SPACE_MARGIN) => {
            Err(classify("write failed: insufficient free space at download root", Some(ErrorCategory::Filesystem), None))
        }
        _ => Ok(()),
    }
}

#[cfg(unix)]
fn free_space_bytes(path: &Path) -> std::io::Result<u64> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(path.as_os_str().as_bytes()).map_err(|_| std::io::Error::from(std::io::ErrorKind::InvalidInput))?;
    let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) };
    if rc != 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(stat.f_bavail as u64 * stat.f_frsize as u64)
}

#[cfg(not(unix))]
fn free_space_bytes(_path: &Path) -> std::io::Result<u64> {
    Ok(u64::MAX)
}
