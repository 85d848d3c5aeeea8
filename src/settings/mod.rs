//! Settings persistence
//!
//! Stored as JSON in ~/.config/tunedeck/settings.json. Command-line flags
//! override individual fields for a single run.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::screen::ScreenTiming;

fn default_extensions() -> Vec<String> {
    ["mp3", "flac", "ogg", "wav", "m4a"]
        .iter()
        .map(|e| e.to_string())
        .collect()
}

/// Persistent settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Base URL of the document store
    pub store_url: Option<String>,
    /// Bearer token sent to the store
    pub api_token: Option<String>,
    /// User whose legacy liked-ids document is consulted
    pub user_id: Option<String>,
    /// Directory holding the local audio files
    pub assets_dir: Option<PathBuf>,
    pub extensions: Vec<String>,
    pub settle_delay_ms: u64,
    pub progress_interval_ms: u64,
    pub notice_timeout_ms: u64,
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            store_url: None,
            api_token: None,
            user_id: None,
            assets_dir: None,
            extensions: default_extensions(),
            settle_delay_ms: 300,
            progress_interval_ms: 1000,
            notice_timeout_ms: 3000,
            request_timeout_secs: 10,
        }
    }
}

/// One-run overrides from the command line
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub store_url: Option<String>,
    pub assets_dir: Option<PathBuf>,
    pub user_id: Option<String>,
}

impl Settings {
    /// Load settings from the default location
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::settings_path()?)
    }

    /// Save settings to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::settings_path()?)
    }

    /// Load settings from `path`; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No settings found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {:?}", path))?;

        let settings: Self = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse settings in {:?}", path))?;

        debug!("Loaded settings from {:?}", path);
        Ok(settings)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {:?}", parent))?;
        }

        let contents = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;

        fs::write(path, contents)
            .with_context(|| format!("Failed to write settings to {:?}", path))?;

        debug!("Saved settings to {:?}", path);
        Ok(())
    }

    /// Get the settings file path
    pub fn settings_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        Ok(config_dir.join("tunedeck").join("settings.json"))
    }

    /// Apply command-line overrides on top of the stored values
    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        if let Some(url) = overrides.store_url {
            self.store_url = Some(url);
        }
        if let Some(dir) = overrides.assets_dir {
            self.assets_dir = Some(dir);
        }
        if let Some(user) = overrides.user_id {
            self.user_id = Some(user);
        }
        self
    }

    /// Store URL, or an error telling the user how to set one
    pub fn require_store_url(&self) -> Result<&str> {
        self.store_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "No store URL configured. Run 'tunedeck config --store-url <URL>' or pass --store-url"
                )
            })
    }

    /// Assets directory; defaults to the current directory
    pub fn assets_dir(&self) -> PathBuf {
        self.assets_dir.clone().unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn timing(&self) -> ScreenTiming {
        ScreenTiming {
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            progress_interval: Duration::from_millis(self.progress_interval_ms.max(50)),
            notice_timeout: Duration::from_millis(self.notice_timeout_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_from(&dir.path().join("settings.json")).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.extensions.len(), 5);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let settings = Settings {
            store_url: Some("https://store.example.com/v1".to_string()),
            user_id: Some("u1".to_string()),
            settle_delay_ms: 500,
            ..Default::default()
        };
        settings.save_to(&path).unwrap();

        assert_eq!(Settings::load_from(&path).unwrap(), settings);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"store_url": "http://localhost:8080"}"#).unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.store_url.as_deref(), Some("http://localhost:8080"));
        assert_eq!(settings.progress_interval_ms, 1000);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{not json").unwrap();
        assert!(Settings::load_from(&path).is_err());
    }

    #[test]
    fn test_overrides_win() {
        let settings = Settings {
            store_url: Some("http://stored".to_string()),
            user_id: Some("stored".to_string()),
            ..Default::default()
        }
        .with_overrides(Overrides {
            store_url: Some("http://flag".to_string()),
            ..Default::default()
        });

        assert_eq!(settings.store_url.as_deref(), Some("http://flag"));
        assert_eq!(settings.user_id.as_deref(), Some("stored"));
    }

    #[test]
    fn test_require_store_url() {
        assert!(Settings::default().require_store_url().is_err());
        let settings = Settings {
            store_url: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(settings.require_store_url().is_err());
    }
}
