//! Configuration management for mangamatch
//!
//! Uses XDG-compliant paths:
//! - Config: ~/.config/mangamatch/config.toml
//! - Data: ~/.local/share/mangamatch/ (document stores)
//! - Cache: ~/.cache/mangamatch/ (remote detail cache)

mod paths;

pub use paths::Paths;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Remote reading-list id to reconcile against
    pub list_id: Option<i64>,

    /// API token for the reading-list service
    pub api_token: Option<String>,

    /// Service base URL override (tests point this at a local server)
    pub api_base_url: Option<String>,

    /// Root folder of the local manga library
    pub library_root: Option<String>,

    /// Reader profile directory holding bookmarks/chaptermarks documents
    pub reader_dir: Option<String>,

    /// Sort the directory index by modification time, newest first
    pub sort_dirs_by_mtime: bool,

    /// Never submit chapter updates upstream (explicit replacement for an
    /// in-code debug switch)
    pub skip_progress_push: bool,

    /// Paths configuration
    #[serde(skip)]
    pub paths: Paths,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            list_id: None,
            api_token: None,
            api_base_url: None,
            library_root: None,
            reader_dir: None,
            sort_dirs_by_mtime: false,
            skip_progress_push: false,
            paths: Paths::new(),
        }
    }
}

impl Config {
    /// Resolve the configured library root, which every reconciliation
    /// command requires.
    pub fn library_root(&self) -> Result<PathBuf> {
        match self.library_root.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
            Some(root) => Ok(PathBuf::from(root)),
            None => bail!("No library root configured. Run 'mangamatch config set-library <path>' first."),
        }
    }

    /// Resolve the configured reading-list id.
    pub fn list_id(&self) -> Result<i64> {
        self.list_id
            .ok_or_else(|| anyhow::anyhow!("No list id configured. Run 'mangamatch config set-list <id>' first."))
    }

    /// Reader profile directory, if configured.
    pub fn reader_dir(&self) -> Option<PathBuf> {
        self.reader_dir
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
    }

    /// Service base URL (override or the production default).
    pub fn base_url(&self) -> &str {
        self.api_base_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .unwrap_or(crate::remote::DEFAULT_BASE_URL)
    }

    /// Ensure required directories exist.
    pub fn ensure_dirs(&self) -> Result<()> {
        self.paths
            .ensure_dirs()
            .context("Failed to create application directories")?;
        Ok(())
    }

    /// Load configuration from disk or create default
    pub async fn load() -> Result<Self> {
        let paths = Paths::new();
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            let content = fs::read_to_string(&config_path)
                .await
                .context("Failed to read config file")?;
            toml::from_str(&content).context("Failed to parse config file")?
        } else {
            let config = Config::default();
            config.save().await?;
            config
        };

        config.paths = paths;
        Ok(config)
    }

    /// Save configuration to disk
    pub async fn save(&self) -> Result<()> {
        let config_path = self.paths.config_file();

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&config_path, content)
            .await
            .context("Failed to write config file")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_library_root_is_an_error() {
        let config = Config::default();
        assert!(config.library_root().is_err());

        let config = Config {
            library_root: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(config.library_root().is_err());
    }

    #[test]
    fn test_base_url_falls_back_to_default() {
        let config = Config::default();
        assert_eq!(config.base_url(), crate::remote::DEFAULT_BASE_URL);

        let config = Config {
            api_base_url: Some("http://localhost:9090/v1/".to_string()),
            ..Default::default()
        };
        assert_eq!(config.base_url(), "http://localhost:9090/v1/");
    }
}
