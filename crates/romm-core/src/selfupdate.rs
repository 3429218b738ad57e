//! Self-update installer. Never overwrites the running binary directly:
//! stage, validate, swap, with a single-slot backup.

use crate::error::ErrorInfo;
use crate::http::{ConnectFn, Method, Request, Url};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

const NRO_MAGIC: &[u8; 4] = b"NRO0";
const MAGIC_OFFSET: usize = 0;

#[derive(Debug, thiserror::Error)]
pub enum SelfUpdateError {
    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("data: staged file failed the NRO magic check")]
    BadMagic,
    #[error("download failed: {0}")]
    Download(ErrorInfo),
}

pub struct UpdatePaths {
    pub update_dir: PathBuf,
    pub pending_pointer: PathBuf,
    pub backup_path: PathBuf,
}

impl UpdatePaths {
    pub fn under(download_root: &Path, binary_name: &str) -> Self {
        let update_dir = download_root.join("app_update");
        UpdatePaths {
            pending_pointer: update_dir.join("pending.txt"),
            backup_path: update_dir.join(format!("{binary_name}.bak")),
            update_dir,
        }
    }
}

fn has_nro_magic(path: &Path) -> std::io::Result<bool> {
    let mut file = std::fs::File::open(path)?;
    let mut buf = [0u8; 4];
    use std::io::Read;
    if file.read_exact(&mut buf).is_err() {
        return Ok(false);
    }
    Ok(&buf[MAGIC_OFFSET..] == NRO_MAGIC)
}

/// Startup check: if a pending pointer exists and the staged file it names
/// passes the magic check, swap it in; clear the pointer regardless of
/// outcome.
pub fn apply_pending_update(paths: &UpdatePaths, current_binary: &Path) -> Result<bool, SelfUpdateError> {
    if !paths.pending_pointer.exists() {
        return Ok(false);
    }
    let staged = std::fs::read_to_string(&paths.pending_pointer)?;
    let staged_path = PathBuf::from(staged.trim());

    let result = (|| -> Result<(), SelfUpdateError> {
        if !staged_path.exists() || !has_nro_magic(&staged_path)? {
            return Err(SelfUpdateError::BadMagic);
        }
        std::fs::create_dir_all(&paths.update_dir)?;
        if paths.backup_path.exists() {
            std::fs::remove_file(&paths.backup_path)?;
        }
        std::fs::rename(current_binary, &paths.backup_path)?;
        match std::fs::rename(&staged_path, current_binary) {
            Ok(()) => Ok(()),
            Err(e) => {
                let _ = std::fs::rename(&paths.backup_path, current_binary);
                Err(e.into())
            }
        }
    })();

    let _ = std::fs::remove_file(&paths.pending_pointer);
    result.map(|()| true)
}

/// Write the pending pointer once a downloaded staged file passes the
/// magic check. Called after a streamed download into `staged_path`
/// completes.
pub fn stage_update(paths: &UpdatePaths, staged_path: &Path) -> Result<(), SelfUpdateError> {
    if !has_nro_magic(staged_path)? {
        return Err(SelfUpdateError::BadMagic);
    }
    std::fs::create_dir_all(&paths.update_dir)?;
    std::fs::write(&paths.pending_pointer, staged_path.to_string_lossy().as_bytes())?;
    Ok(())
}

/// Download a release asset with redirect-following enabled, then stage it.
/// Writes to a `.downloading` temp file first so a failed or cancelled
/// transfer never leaves a half-written file at the name `stage_update`
/// would otherwise validate; the pending pointer is only written once the
/// fully downloaded file passes the NRO magic check.
pub fn download_and_stage_update(
    connect: &ConnectFn,
    url: &Url,
    timeout: Duration,
    auth: Option<(&str, &str)>,
    paths: &UpdatePaths,
) -> Result<(), SelfUpdateError> {
    std::fs::create_dir_all(&paths.update_dir)?;
    let staged_path = paths.update_dir.join("release.nro");
    let tmp_path = paths.update_dir.join("release.nro.downloading");

    let mut req = Request::new(Method::Get, url.clone(), timeout);
    if let Some((user, pass)) = auth {
        req = req.with_basic_auth(user, pass);
    }

    let mut file = std::fs::File::create(&tmp_path)?;
    let mut write_err = None;
    let result = crate::http::perform_streamed(connect, &req, true, |chunk| match file.write_all(chunk) {
        Ok(()) => true,
        Err(e) => {
            write_err = Some(e);
            false
        }
    });
    drop(file);

    if let Some(e) = write_err {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(e.into());
    }
    if let Err(e) = result {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(SelfUpdateError::Download(e));
    }

    std::fs::rename(&tmp_path, &staged_path)?;
    stage_update(paths, &staged_path)
}

/// Canonicalize the running binary's self-path: argv0 if it is under the
/// removable-storage prefix and ends in `.nro`, otherwise `default_path`.
pub fn canonical_self_path(argv0: &Path, removable_storage_prefix: &Path, default_path: &Path) -> PathBuf {
    if argv0.starts_with(removable_storage_prefix) && argv0.extension().map(|e| e.eq_ignore_ascii_case("nro")).unwrap_or(false) {
        argv0.to_path_buf()
    } else {
        default_path.to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_nro(path: &Path, body: &[u8]) {
        let mut data = NRO_MAGIC.to_vec();
        data.extend_from_slice(body);
        std::fs::write(path, data).unwrap();
    }

    #[test]
    fn no_pointer_means_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let paths = UpdatePaths::under(dir.path(), "app.nro");
        let binary = dir.path().join("app.nro");
        std::fs::write(&binary, b"old").unwrap();
        assert!(!apply_pending_update(&paths, &binary).unwrap());
    }

    #[test]
    fn valid_staged_binary_swaps_and_backs_up() {
        let dir = tempfile::tempdir().unwrap();
        let paths = UpdatePaths::under(dir.path(), "app.nro");
        std::fs::create_dir_all(&paths.update_dir).unwrap();
        let binary = dir.path().join("app.nro");
        std::fs::write(&binary, b"old").unwrap();
        let staged = paths.update_dir.join("app.nro.new");
        write_nro(&staged, b"new-binary");
        std::fs::write(&paths.pending_pointer, staged.to_string_lossy().as_bytes()).unwrap();

        let applied = apply_pending_update(&paths, &binary).unwrap();
        assert!(applied);
        let mut expected = NRO_MAGIC.to_vec();
        expected.extend_from_slice(b"new-binary");
        assert_eq!(std::fs::read(&binary).unwrap(), expected);
        assert_eq!(std::fs::read(&paths.backup_path).unwrap(), b"old");
        assert!(!paths.pending_pointer.exists());
    }

    #[test]
    fn bad_magic_clears_pointer_without_swapping() {
        let dir = tempfile::tempdir().unwrap();
        let paths = UpdatePaths::under(dir.path(), "app.nro");
        std::fs::create_dir_all(&paths.update_dir).unwrap();
        let binary = dir.path().join("app.nro");
        std::fs::write(&binary, b"old").unwrap();
        let staged = paths.update_dir.join("app.nro.new");
        std::fs::write(&staged, b"not-an-nro").unwrap();
        std::fs::write(&paths.pending_pointer, staged.to_string_lossy().as_bytes()).unwrap();

        let result = apply_pending_update(&paths, &binary);
        assert!(result.is_err());
        assert!(!paths.pending_pointer.exists());
        assert_eq!(std::fs::read(&binary).unwrap(), b"old");
    }
}
