//! Ambient configuration loader.
//!
//! The record the core consumes is treated as fixed; this is a stand-in
//! loader, built on `xdg` + `toml`, so the CLI and tests can produce a
//! [`Config`] from a TOML file.

use crate::model::{Config, PlatformPrefsMode};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigFile {
    server_url: String,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(default = "default_download_dir")]
    download_dir: PathBuf,
    #[serde(default = "default_timeout")]
    http_timeout_seconds: u64,
    #[serde(default = "default_fat32_safe")]
    fat32_safe: bool,
    #[serde(default)]
    speed_test_url: Option<String>,
    #[serde(default = "default_prefs_mode")]
    platform_prefs_mode: String,
    #[serde(default)]
    platform_prefs_path: Option<PathBuf>,
    #[serde(default)]
    platform_prefs_fallback_path: Option<PathBuf>,
}

fn default_download_dir() -> PathBuf {
    PathBuf::from(".")
}
fn default_timeout() -> u64 {
    30
}
fn default_fat32_safe() -> bool {
    true
}
fn default_prefs_mode() -> String {
    "auto".to_string()
}

impl From<ConfigFile> for Config {
    fn from(f: ConfigFile) -> Self {
        let mode = match f.platform_prefs_mode.as_str() {
            "sd" => PlatformPrefsMode::SdCard,
            "romfs" => PlatformPrefsMode::ReadOnlyFs,
            _ => PlatformPrefsMode::Auto,
        };
        Config {
            server_url: f.server_url,
            username: f.username,
            password: f.password,
            download_dir: f.download_dir,
            http_timeout_seconds: f.http_timeout_seconds,
            fat32_safe: f.fat32_safe,
            speed_test_url: f.speed_test_url,
            platform_prefs_mode: mode,
            platform_prefs_path: f.platform_prefs_path,
            platform_prefs_fallback_path: f.platform_prefs_fallback_path,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing config: {0}")]
    Missing(String),
    #[error("invalid config json: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("missing server_url")]
    MissingServerUrl,
}

pub fn config_path() -> Result<PathBuf, ConfigError> {
    let dirs = xdg::BaseDirectories::with_prefix("romm-switch-client").map_err(|e| ConfigError::Missing(e.to_string()))?;
    dirs.place_config_file("config.toml").map_err(ConfigError::Io)
}

pub fn load_from_path(path: &Path) -> Result<Config, ConfigError> {
    let body = std::fs::read_to_string(path)?;
    let file: ConfigFile = toml::from_str(&body)?;
    if file.server_url.is_empty() {
        return Err(ConfigError::MissingServerUrl);
    }
    Ok(file.into())
}

/// Load the config at the default XDG path, or fail with
/// `ConfigError::Missing` if it does not exist yet.
pub fn load_or_init() -> Result<Config, ConfigError> {
    let path = config_path()?;
    if !path.exists() {
        return Err(ConfigError::Missing(path.display().to_string()));
    }
    load_from_path(&path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_minimal_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "server_url = \"http://catalog.local\"\n").unwrap();
        let cfg = load_from_path(&path).unwrap();
        assert_eq!(cfg.server_url, "http://catalog.local");
        assert_eq!(cfg.http_timeout_seconds, 30);
        assert!(cfg.fat32_safe);
    }

    #[test]
    fn rejects_missing_server_url() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "server_url = \"\"\n").unwrap();
        assert!(matches!(load_from_path(&path), Err(ConfigError::MissingServerUrl)));
    }

    #[test]
    fn parses_platform_prefs_mode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "server_url = \"http://h\"\nplatform_prefs_mode = \"sd\"\n").unwrap();
        let cfg = load_from_path(&path).unwrap();
        assert_eq!(cfg.platform_prefs_mode, PlatformPrefsMode::SdCard);
    }
}
