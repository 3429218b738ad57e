//! Part-file writer: maps a global byte offset to (part index, file
//! offset) and keeps exactly one part file open at a time.
//!
//! Writes fixed-size `NN.part` fragments rather than one preallocated file,
//! so no single fragment crosses the FAT32 per-file size cap.

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

pub struct PartWriter {
    dir: PathBuf,
    part_size: u64,
    open_index: Option<u64>,
    open_file: Option<File>,
}

fn part_path(dir: &Path, index: u64) -> PathBuf {
    dir.join(format!("{index:02}.part"))
}

impl PartWriter {
    pub fn new(dir: PathBuf, part_size: u64) -> Self {
        PartWriter { dir, part_size, open_index: None, open_file: None }
    }

    fn ensure_open(&mut self, index: u64, offset_in_part: u64) -> std::io::Result<()> {
        if self.open_index != Some(index) {
            let path = part_path(&self.dir, index);
            let file = OpenOptions::new().create(true).write(true).read(true).open(&path)?;
            self.open_index = Some(index);
            self.open_file = Some(file);
        }
        if let Some(file) = self.open_file.as_mut() {
            file.seek(SeekFrom::Start(offset_in_part))?;
        }
        Ok(())
    }

    /// Write `data` starting at `global_offset`, splitting across part
    /// boundaries as needed. Returns bytes written (always `data.len()`
    /// on success).
    pub fn write_at(&mut self, global_offset: u64, mut data: &[u8]) -> std::io::Result<u64> {
        let mut offset = global_offset;
        let mut written = 0u64;
        while !data.is_empty() {
            let index = offset / self.part_size;
            let offset_in_part = offset % self.part_size;
            let space_left = self.part_size - offset_in_part;
            let take = (data.len() as u64).min(space_left) as usize;

            self.ensure_open(index, offset_in_part)?;
            let file = self.open_file.as_mut().expect("just opened");
            file.write_all(&data[..take])?;

            written += take as u64;
            offset += take as u64;
            data = &data[take..];
        }
        Ok(written)
    }

    pub fn sync(&mut self) -> std::io::Result<()> {
        if let Some(file) = self.open_file.as_mut() {
            file.sync_all()?;
        }
        Ok(())
    }

    pub fn part_path_for(&self, index: u64) -> PathBuf {
        part_path(&self.dir, index)
    }
}

/// Enumerate `*.part` files in `dir`, returning (index, bytes-on-disk)
/// pairs sorted by index.
pub fn observe_parts(dir: &Path) -> std::io::Result<Vec<(u64, u64)>> {
    let mut out = Vec::new();
    if !dir.exists() {
        return Ok(out);
    }
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if let Some(stem) = name.strip_suffix(".part") {
            if let Ok(index) = stem.parse::<u64>() {
                let size = entry.metadata()?.len();
                out.push((index, size));
            }
        }
    }
    out.sort_by_key(|(idx, _)| *idx);
    Ok(out)
}
