//! Per-download journal and resume planning.
//!
//! The manifest owns the persisted shape; resume planning is a pure
//! function over that shape plus an observation of what is actually on
//! disk.

use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestPart {
    pub index: u64,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub done: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub romm_id: String,
    pub file_id: String,
    pub fs_name: String,
    pub url: String,
    pub total_size: u64,
    pub part_size: u64,
    pub parts: Vec<ManifestPart>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("parse: manifest json is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),
}

impl Manifest {
    pub fn part_count(total_size: u64, part_size: u64) -> u64 {
        if total_size == 0 {
            return 1;
        }
        total_size.div_ceil(part_size)
    }

    pub fn new(romm_id: String, file_id: String, fs_name: String, url: String, total_size: u64, part_size: u64) -> Self {
        let count = Self::part_count(total_size, part_size);
        let parts = (0..count)
            .map(|i| {
                let remaining = total_size.saturating_sub(i * part_size);
                let size = remaining.min(part_size);
                ManifestPart { index: i, size, sha256: None, done: false }
            })
            .collect();
        Manifest { romm_id, file_id, fs_name, url, total_size, part_size, parts, failure_reason: None }
    }

    pub fn save(&self, path: &Path) -> Result<(), ManifestError> {
        let tmp = path.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(self)?;
        std::fs::write(&tmp, body)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let body = std::fs::read(path)?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Compatible when total/part size match; rom id matches when both
    /// present; file id matches when both present; URL only compared when
    /// rom id and file id were not both available.
    pub fn compatible_with(&self, romm_id: &str, file_id: &str, url: &str, total_size: u64, part_size: u64) -> bool {
        if self.total_size != total_size || self.part_size != part_size {
            return false;
        }
        let have_ids = !self.romm_id.is_empty() && !romm_id.is_empty() && !self.file_id.is_empty() && !file_id.is_empty();
        if !self.romm_id.is_empty() && !romm_id.is_empty() && self.romm_id != romm_id {
            return false;
        }
        if !self.file_id.is_empty() && !file_id.is_empty() && self.file_id != file_id {
            return false;
        }
        if !have_ids && self.url != url {
            return false;
        }
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartStatus {
    Valid,
    Partial,
    Invalid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumePlan {
    pub valid_indices: Vec<u64>,
    pub partial_index: Option<u64>,
    pub partial_bytes: u64,
    pub bytes_have: u64,
    pub bytes_need: u64,
}

/// One observed on-disk part: its index and size in bytes.
pub type Observation = (u64, u64);

/// Resume planning: walk expected part indices from 0, classifying each
/// against what was actually observed on disk.
pub fn plan_resume(manifest: &Manifest, observed: &[Observation]) -> ResumePlan {
    let mut valid_indices = Vec::new();
    let mut partial_index = None;
    let mut partial_bytes = 0u64;

    for part in &manifest.parts {
        let on_disk = observed.iter().find(|(idx, _)| *idx == part.index).map(|(_, sz)| *sz);
        match on_disk {
            Some(sz) if sz == part.size => {
                valid_indices.push(part.index);
            }
            Some(sz) if sz < part.size && sz > 0 => {
                partial_index = Some(part.index);
                partial_bytes = sz;
                break;
            }
            _ => {
                break;
            }
        }
    }

    let bytes_have: u64 = valid_indices
        .iter()
        .map(|idx| manifest.parts.iter().find(|p| p.index == *idx).map(|p| p.size).unwrap_or(0))
        .sum::<u64>()
        + partial_bytes;
    let bytes_need = manifest.total_size.saturating_sub(bytes_have);

    ResumePlan {
        valid_indices,
        partial_index,
        partial_bytes,
        bytes_have,
        bytes_need,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_manifest() -> Manifest {
        Manifest {
            romm_id: "r1".into(),
            file_id: "f1".into(),
            fs_name: "out.nsp".into(),
            url: "http://h/f".into(),
            total_size: 9000,
            part_size: 4000,
            parts: vec![
                ManifestPart { index: 0, size: 4000, sha256: None, done: true },
                ManifestPart { index: 1, size: 4000, sha256: None, done: false },
                ManifestPart { index: 2, size: 1000, sha256: None, done: false },
            ],
            failure_reason: None,
        }
    }

    #[test]
    fn scenario_3_resume_after_crash() {
        let manifest = sample_manifest();
        let observed = vec![(0, 4000), (1, 1200)];
        let plan = plan_resume(&manifest, &observed);
        assert_eq!(plan.valid_indices, vec![0]);
        assert_eq!(plan.partial_index, Some(1));
        assert_eq!(plan.partial_bytes, 1200);
        assert_eq!(plan.bytes_have, 5200);
        assert_eq!(plan.bytes_need, 3800);
    }

    #[test]
    fn resume_plan_is_idempotent() {
        let manifest = sample_manifest();
        let observed = vec![(0, 4000), (1, 1200)];
        let p1 = plan_resume(&manifest, &observed);
        let p2 = plan_resume(&manifest, &observed);
        assert_eq!(p1, p2);
    }

    #[test]
    fn zero_size_part_is_invalid_and_stops_walk() {
        let manifest = sample_manifest();
        let observed = vec![(0, 4000), (1, 0), (2, 1000)];
        let plan = plan_resume(&manifest, &observed);
        assert_eq!(plan.valid_indices, vec![0]);
        assert_eq!(plan.partial_index, None);
        assert_eq!(plan.bytes_have, 4000);
    }

    #[test]
    fn part_count_edge_cases() {
        assert_eq!(Manifest::part_count(0, 100), 1);
        assert_eq!(Manifest::part_count(1, 100), 1);
        assert_eq!(Manifest::part_count(100, 100), 1);
        assert_eq!(Manifest::part_count(101, 100), 2);
        assert_eq!(Manifest::part_count(200, 100), 2);
        assert_eq!(Manifest::part_count(205, 100), 3);
    }

    #[test]
    fn sum_of_parts_equals_total_for_all_edges() {
        for total in [0u64, 1, 100, 101, 200, 205] {
            let m = Manifest::new("r".into(), "f".into(), "n".into(), "u".into(), total, 100);
            let sum: u64 = m.parts.iter().map(|p| p.size).sum();
            assert_eq!(sum, total);
            for p in &m.parts[..m.parts.len().saturating_sub(1)] {
                assert_eq!(p.size, 100);
            }
        }
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        let m = sample_manifest();
        m.save(&path).unwrap();
        let loaded = Manifest::load(&path).unwrap();
        assert_eq!(m, loaded);
    }

    #[test]
    fn compatibility_falls_back_to_url_when_ids_absent() {
        let mut m = sample_manifest();
        m.romm_id = String::new();
        m.file_id = String::new();
        assert!(m.compatible_with("", "", "http://h/f", 9000, 4000));
        assert!(!m.compatible_with("", "", "http://h/other", 9000, 4000));
    }
}
