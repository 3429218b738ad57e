//! Atomic finalization of a completed download.

use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum FinalizeError {
    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Rename `from` to `to`, falling back to copy-then-delete when the
/// rename fails because it crosses filesystems.
fn rename_or_copy(from: &Path, to: &Path) -> Result<(), FinalizeError> {
    match std::fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if crosses_devices(&e) => {
            if from.is_dir() {
                copy_dir_recursive(from, to)?;
                std::fs::remove_dir_all(from)?;
            } else {
                std::fs::copy(from, to)?;
                std::fs::remove_file(from)?;
            }
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn copy_dir_recursive(from: &Path, to: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(to)?;
    for entry in std::fs::read_dir(from)? {
        let entry = entry?;
        let dest = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_recursive(&entry.path(), &dest)?;
        } else {
            std::fs::copy(entry.path(), &dest)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn crosses_devices(e: &std::io::Error) -> bool {
    e.raw_os_error() == Some(libc::EXDEV)
}

#[cfg(not(unix))]
fn crosses_devices(_e: &std::io::Error) -> bool {
    false
}

/// Single-part finalize: remove any pre-existing final file, then move
/// the sole `00.part` into place.
pub fn finalize_single(part_path: &Path, final_path: &Path) -> Result<(), FinalizeError> {
    if final_path.exists() {
        std::fs::remove_file(final_path)?;
    }
    rename_or_copy(part_path, final_path)
}

/// Multi-part finalize: rename every `NN.part` to `NN` inside the temp
/// directory, then rename the temp directory itself into place.
pub fn finalize_multi(temp_dir: &Path, final_dir: &Path, part_count: u64) -> Result<(), FinalizeError> {
    for index in 0..part_count {
        let part = temp_dir.join(format!("{index:02}.part"));
        let done = temp_dir.join(format!("{index:02}"));
        std::fs::rename(&part, &done)?;
    }
    if final_dir.exists() {
        std::fs::remove_dir_all(final_dir)?;
    }
    rename_or_copy(temp_dir, final_dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_part_finalize_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let part = dir.path().join("00.part");
        let final_path = dir.path().join("out.nsp");
        std::fs::write(&part, b"new").unwrap();
        std::fs::write(&final_path, b"stale").unwrap();
        finalize_single(&part, &final_path).unwrap();
        assert_eq!(std::fs::read(&final_path).unwrap(), b"new");
        assert!(!part.exists());
    }

    #[test]
    fn multi_part_finalize_renames_all_parts_and_directory() {
        let root = tempfile::tempdir().unwrap();
        let temp_dir = root.path().join("game.tmp");
        std::fs::create_dir(&temp_dir).unwrap();
        std::fs::write(temp_dir.join("00.part"), b"aaa").unwrap();
        std::fs::write(temp_dir.join("01.part"), b"bb").unwrap();
        let final_dir = root.path().join("game");
        finalize_multi(&temp_dir, &final_dir, 2).unwrap();
        assert_eq!(std::fs::read(final_dir.join("00")).unwrap(), b"aaa");
        assert_eq!(std::fs::read(final_dir.join("01")).unwrap(), b"bb");
        assert!(!temp_dir.exists());
    }
}
