//! Catalog and planner data types.

use serde::{Deserialize, Serialize};

/// A child artifact of a [`Game`] as reported by the catalog server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RomFile {
    pub id: String,
    pub name: String,
    /// Relative path within a multi-file bundle, if any.
    pub relative_path: Option<String>,
    pub url: String,
    pub size: u64,
    /// "game" | "dlc" | "update" | ""
    pub category: String,
}

impl RomFile {
    /// All four required fields are non-empty / positive.
    pub fn is_consumable(&self) -> bool {
        !self.id.is_empty() && !self.name.is_empty() && self.size > 0 && !self.url.is_empty()
    }
}

/// A catalog entry. Immutable once enriched with its file list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    pub id: String,
    pub title: String,
    pub platform_id: String,
    pub platform_slug: String,
    pub preferred_filename: String,
    pub preferred_file_id: Option<String>,
    pub cover_url: Option<String>,
    pub total_bytes: u64,
    pub files: Vec<RomFile>,
}

/// One file the planner selected for download.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadFileSpec {
    pub id: String,
    pub name: String,
    pub relative_path: Option<String>,
    pub url: String,
    pub size: u64,
    pub category: String,
}

impl From<&RomFile> for DownloadFileSpec {
    fn from(f: &RomFile) -> Self {
        DownloadFileSpec {
            id: f.id.clone(),
            name: f.name.clone(),
            relative_path: f.relative_path.clone(),
            url: f.url.clone(),
            size: f.size,
            category: f.category.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlannerMode {
    SingleBest,
    BundleBest,
    AllFiles,
}

/// Planner output: an ordered, non-empty set of files making up one logical
/// enqueue action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadBundle {
    pub rom_id: String,
    pub title: String,
    pub platform_slug: String,
    pub mode: PlannerMode,
    pub files: Vec<DownloadFileSpec>,
}

impl DownloadBundle {
    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }
}

/// Platform-preference source as consumed by the ambient config loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlatformPrefsMode {
    Auto,
    SdCard,
    ReadOnlyFs,
}

/// The configuration record the core consumes. The loader that produces
/// this from a TOML file on disk is ambient scaffolding, not part of the
/// core's subject matter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub server_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub download_dir: std::path::PathBuf,
    pub http_timeout_seconds: u64,
    pub fat32_safe: bool,
    pub speed_test_url: Option<String>,
    pub platform_prefs_mode: PlatformPrefsMode,
    pub platform_prefs_path: Option<std::path::PathBuf>,
    pub platform_prefs_fallback_path: Option<std::path::PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server_url: String::new(),
            username: None,
            password: None,
            download_dir: std::path::PathBuf::from("."),
            http_timeout_seconds: 30,
            fat32_safe: true,
            speed_test_url: None,
            platform_prefs_mode: PlatformPrefsMode::Auto,
            platform_prefs_path: None,
            platform_prefs_fallback_path: None,
        }
    }
}
