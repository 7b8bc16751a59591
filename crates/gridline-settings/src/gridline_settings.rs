//! Gridline Settings
//!
//! Persistent client settings, stored as pretty JSON:
//! - API settings (base URL, request timeout)
//! - Grid settings (page size, debounce, revision column)
//!
//! `GRIDLINE_API_BASE_URL` overrides the stored base URL at load time.
//! Settings live under the platform config directory, logs under the
//! platform data directory, both in a `gridline` subdirectory.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable that overrides [`ApiSettings::base_url`]
pub const BASE_URL_ENV: &str = "GRIDLINE_API_BASE_URL";

const APP_DIR: &str = "gridline";
const SETTINGS_FILE_NAME: &str = "settings.json";

/// Directory for rolling log files; created by the logger on first use
pub fn logs_dir() -> Result<PathBuf> {
    dirs::data_dir()
        .context("Could not determine data directory")
        .map(|p| p.join(APP_DIR).join("logs"))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GridlineSettings {
    pub api: ApiSettings,
    pub grid: GridSettings,
}

impl GridlineSettings {
    /// Load from the default location, then apply environment overrides
    pub fn load() -> Result<Self> {
        let mut settings = Self::load_from(&Self::settings_path()?)?;
        settings.apply_env_override(std::env::var(BASE_URL_ENV).ok());
        Ok(settings)
    }

    /// Load from `path`; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = ?path, "No settings file; using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {:?}", path))?;
        serde_json::from_str(&content).with_context(|| "Failed to parse settings JSON")
    }

    /// Write to the default location and return the path written
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::settings_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    /// Write pretty JSON to `path`, creating missing parent directories
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {:?}", parent))?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write settings to {:?}", path))?;
        Ok(())
    }

    pub fn settings_path() -> Result<PathBuf> {
        dirs::config_dir()
            .context("Could not determine config directory")
            .map(|p| p.join(APP_DIR).join(SETTINGS_FILE_NAME))
    }

    /// Replace the base URL with a non-blank override value
    pub fn apply_env_override(&mut self, base_url: Option<String>) {
        if let Some(url) = base_url.filter(|url| !url.trim().is_empty()) {
            tracing::debug!(base_url = %url, "Base URL overridden from environment");
            self.api.base_url = url;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl ApiSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSettings {
    pub page_size: u64,
    pub debounce_ms: u64,
    /// Column whose value is sent as the optimistic-concurrency token
    pub revision_column: String,
}

impl GridSettings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for GridSettings {
    fn default() -> Self {
        Self {
            page_size: 100,
            debounce_ms: 500,
            revision_column: "更新日".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = GridlineSettings::load_from(&dir.path().join("settings.json")).unwrap();
        assert_eq!(settings, GridlineSettings::default());
        assert_eq!(settings.grid.debounce(), Duration::from_millis(500));
        assert_eq!(settings.api.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn save_then_load_preserves_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let mut settings = GridlineSettings::default();
        settings.api.base_url = "https://grid.example.com".into();
        settings.grid.page_size = 25;
        settings.save_to(&path).unwrap();

        assert_eq!(GridlineSettings::load_from(&path).unwrap(), settings);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"grid": {"page_size": 50}}"#).unwrap();

        let settings = GridlineSettings::load_from(&path).unwrap();
        assert_eq!(settings.grid.page_size, 50);
        assert_eq!(settings.grid.revision_column, "更新日");
        assert_eq!(settings.api.base_url, "http://localhost:8000");
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(GridlineSettings::load_from(&path).is_err());
    }

    #[test]
    fn default_paths_are_namespaced() {
        if let Ok(path) = GridlineSettings::settings_path() {
            assert!(path.ends_with("gridline/settings.json"));
        }
        if let Ok(dir) = logs_dir() {
            assert!(dir.ends_with("gridline/logs"));
        }
    }

    #[test]
    fn env_override_ignores_blank_values() {
        let mut settings = GridlineSettings::default();
        settings.apply_env_override(Some("  ".into()));
        assert_eq!(settings.api.base_url, "http://localhost:8000");
        settings.apply_env_override(Some("http://10.0.0.5:8000/".into()));
        assert_eq!(settings.api.base_url, "http://10.0.0.5:8000/");
    }
}
