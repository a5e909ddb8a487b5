//! Configuration management for Syllabus

pub mod session;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

/// Environment variable overriding the configured service URL
pub const API_URL_ENV: &str = "SYLLABUS_API_URL";

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the curriculum service
    pub api_base_url: String,

    /// How long a loaded course counts as fresh, in seconds
    pub cache_freshness_secs: u64,

    /// Per-request timeout, in seconds
    pub request_timeout_secs: u64,

    /// Task detail fetches allowed in flight at once
    pub max_concurrent_requests: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000/api".to_string(),
            cache_freshness_secs: 300,
            request_timeout_secs: 30,
            max_concurrent_requests: 6,
        }
    }
}

impl Config {
    /// Load configuration from disk, or create default if not exists
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        if let Ok(url) = std::env::var(API_URL_ENV) {
            config.apply_api_url_override(url);
        }
        Ok(config)
    }

    /// Load configuration from a specific file, writing defaults if it is missing
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {:?}", path))?;
            serde_json::from_str(&contents).with_context(|| "Failed to parse config.json")
        } else {
            let config = Self::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to a specific file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {:?}", parent))?;
        }

        let contents =
            serde_json::to_string_pretty(self).with_context(|| "Failed to serialize config")?;

        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config to {:?}", path))?;

        Ok(())
    }

    fn apply_api_url_override(&mut self, url: String) {
        let url = url.trim();
        if !url.is_empty() {
            tracing::debug!(url, "Using service URL from environment");
            self.api_base_url = url.to_string();
        }
    }

    /// Freshness window of the course cache
    pub fn freshness(&self) -> Duration {
        Duration::from_secs(self.cache_freshness_secs)
    }

    /// Timeout applied to each service call
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Get the path to the config file
    pub fn config_path() -> Result<PathBuf> {
        let proj_dirs =
            ProjectDirs::from("", "", "syllabus").context("Failed to determine config directory")?;
        Ok(proj_dirs.config_dir().join("config.json"))
    }

    /// Get the data directory path
    pub fn data_dir() -> Result<PathBuf> {
        let proj_dirs =
            ProjectDirs::from("", "", "syllabus").context("Failed to determine data directory")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_config_values() {
        let config = Config::default();
        assert_eq!(config.api_base_url, "http://localhost:8000/api");
        assert_eq!(config.freshness(), Duration::from_secs(300));
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.max_concurrent_requests, 6);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let json = r#"{"api_base_url":"https://learn.example.com/api","cache_freshness_secs":60}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.api_base_url, "https://learn.example.com/api");
        assert_eq!(config.cache_freshness_secs, 60);
        assert_eq!(config.request_timeout_secs, 30);
    }

    #[test]
    fn load_from_creates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config, Config::default());
        assert!(path.exists());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let config = Config { max_concurrent_requests: 2, ..Config::default() };
        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn blank_override_is_ignored() {
        let mut config = Config::default();
        config.apply_api_url_override("  ".into());
        assert_eq!(config.api_base_url, "http://localhost:8000/api");

        config.apply_api_url_override("https://staging.example.com/api".into());
        assert_eq!(config.api_base_url, "https://staging.example.com/api");
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}
