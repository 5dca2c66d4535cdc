//! Application configuration management
//!
//! Preferences persist as a flat JSON document at a per-user path. Malformed
//! or missing data always falls back to defaults; configuration problems are
//! recovered here and never surfaced to the download layer.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

fn default_simultaneous() -> usize {
    1
}

fn default_audio_only() -> bool {
    true
}

/// Main application configuration structure.
///
/// Every field carries a serde default so that a preferences file written by
/// an older version (or with keys removed by hand) loads cleanly with the
/// missing keys at their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Last source URL the user entered (video or playlist link).
    #[serde(default)]
    pub source_url: String,

    /// Folder that final and temporary files are written to.
    #[serde(default)]
    pub output_folder: String,

    /// Path to the external remux tool executable.
    #[serde(default)]
    pub ffmpeg_path: String,

    /// Worker-pool size for concurrent downloads.
    #[serde(default = "default_simultaneous")]
    pub simultaneous_downloads: usize,

    /// Worker-pool size for concurrent remux processes.
    #[serde(default = "default_simultaneous")]
    pub simultaneous_processes: usize,

    /// Download audio-only streams (the only fully supported mode).
    #[serde(default = "default_audio_only")]
    pub audio_only: bool,

    /// Maximum playlist entries to list; 0 means unlimited.
    #[serde(default)]
    pub stream_limit: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            source_url: String::new(),
            output_folder: String::new(),
            ffmpeg_path: String::new(),
            simultaneous_downloads: 1,
            simultaneous_processes: 1,
            audio_only: true,
            stream_limit: 0,
        }
    }
}

impl AppConfig {
    /// Load configuration from the per-user path, falling back to defaults
    /// when the file is missing or unreadable.
    pub fn load() -> Self {
        match Self::config_path() {
            Ok(path) => Self::load_from(&path),
            Err(e) => {
                tracing::warn!("Could not resolve config path: {}", e);
                Self::default()
            }
        }
    }

    /// Load configuration from an explicit path. Missing file or malformed
    /// JSON both produce defaults rather than an error.
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            tracing::info!("No config file exists at {:?}, using defaults", path);
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str::<AppConfig>(&content) {
                Ok(config) => {
                    tracing::info!("Loaded configuration from {:?}", path);
                    config
                }
                Err(e) => {
                    tracing::warn!("Unable to parse config file {:?}: {}", path, e);
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("Unable to read config file {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    /// Save configuration to the per-user path.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        self.save_to(&path)
    }

    /// Save configuration to an explicit path, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content =
            serde_json::to_string_pretty(self).with_context(|| "Failed to serialize config")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        tracing::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Path to the preferences file.
    pub fn config_path() -> Result<PathBuf> {
        let project_dirs = ProjectDirs::from("com", "jocwae", "musicmaker")
            .with_context(|| "Failed to get project directories")?;

        Ok(project_dirs.config_dir().join("preferences.json"))
    }

    /// Path to the scratch cache file.
    pub fn cache_path() -> Result<PathBuf> {
        let project_dirs = ProjectDirs::from("com", "jocwae", "musicmaker")
            .with_context(|| "Failed to get project directories")?;

        Ok(project_dirs.cache_dir().join("cache.json"))
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.simultaneous_downloads == 0 {
            anyhow::bail!("Simultaneous downloads must be greater than 0");
        }

        if self.simultaneous_downloads > 20 {
            anyhow::bail!("Simultaneous downloads should not exceed 20");
        }

        if self.simultaneous_processes == 0 {
            anyhow::bail!("Simultaneous processes must be greater than 0");
        }

        Ok(())
    }
}

/// Load the flat key/value cache document. Missing or malformed cache data
/// is treated as empty, never an error.
pub fn load_cache(path: &Path) -> HashMap<String, serde_json::Value> {
    if !path.exists() {
        tracing::debug!("No cache file exists at {:?}", path);
        return HashMap::new();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!("Unable to parse cache file {:?}: {}", path, e);
            HashMap::new()
        }),
        Err(e) => {
            tracing::warn!("Unable to read cache file {:?}: {}", path, e);
            HashMap::new()
        }
    }
}

/// Add or update one value in the cache document.
pub fn store_cache(path: &Path, key: &str, value: serde_json::Value) -> Result<()> {
    let mut cache = load_cache(path);
    cache.insert(key.to_string(), value);

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create cache directory: {:?}", parent))?;
    }

    let content = serde_json::to_string(&cache).with_context(|| "Failed to serialize cache")?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write cache file: {:?}", path))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_validation() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.simultaneous_downloads, 1);
        assert!(config.audio_only);
        assert_eq!(config.stream_limit, 0);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let config = AppConfig::load_from(&dir.path().join("nope.json"));
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_malformed_file_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("preferences.json");
        std::fs::write(&path, "{not json at all").unwrap();

        let config = AppConfig::load_from(&path);
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_missing_keys_take_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("preferences.json");
        std::fs::write(&path, r#"{"output_folder": "/music", "simultaneous_downloads": 4}"#)
            .unwrap();

        let config = AppConfig::load_from(&path);
        assert_eq!(config.output_folder, "/music");
        assert_eq!(config.simultaneous_downloads, 4);
        assert_eq!(config.simultaneous_processes, 1);
        assert!(config.audio_only);
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("preferences.json");

        let mut config = AppConfig::default();
        config.output_folder = "/music".to_string();
        config.ffmpeg_path = "/usr/bin/ffmpeg".to_string();
        config.simultaneous_downloads = 3;
        config.audio_only = false;

        config.save_to(&path).unwrap();
        let loaded = AppConfig::load_from(&path);
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_invalid_config_validation() {
        let mut config = AppConfig::default();
        config.simultaneous_downloads = 0;
        assert!(config.validate().is_err());

        config.simultaneous_downloads = 25;
        assert!(config.validate().is_err());

        config = AppConfig::default();
        config.simultaneous_processes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cache_roundtrip_and_recovery() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");

        assert!(load_cache(&path).is_empty());

        store_cache(&path, "last_url", serde_json::json!("https://example.com")).unwrap();
        store_cache(&path, "count", serde_json::json!(3)).unwrap();

        let cache = load_cache(&path);
        assert_eq!(cache["last_url"], "https://example.com");
        assert_eq!(cache["count"], 3);

        std::fs::write(&path, "garbage").unwrap();
        assert!(load_cache(&path).is_empty());
    }
}
