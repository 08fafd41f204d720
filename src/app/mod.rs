//! Application state and orchestration

mod actions;

use crate::config::Config;
use crate::library::SeriesDirectory;
use crate::remote::ListClient;
use crate::review::ReviewQueue;
use crate::series::SeriesStore;
use crate::store;

use anyhow::{Context, Result};

/// Main application struct that orchestrates all components
pub struct App {
    /// Application configuration
    pub config: Config,

    /// Reading-list service client
    pub client: ListClient,
}

impl App {
    /// Create a new App instance
    pub fn new(config: Config) -> Result<Self> {
        // Ensure directories exist
        config.ensure_dirs().context("Failed to create directories")?;

        let client = ListClient::new(
            config.base_url(),
            config.api_token.as_deref(),
            config.paths.cache_dir(),
        )
        .context("Failed to initialize reading-list client")?;

        Ok(Self { config, client })
    }

    pub(crate) async fn load_series(&self) -> Result<SeriesStore> {
        store::load_or_default(&self.config.paths.series_file()).await
    }

    pub(crate) async fn load_review(&self) -> Result<ReviewQueue> {
        store::load_or_default(&self.config.paths.review_file()).await
    }

    pub(crate) async fn load_directories(&self) -> Result<Vec<SeriesDirectory>> {
        store::load_or_default(&self.config.paths.directories_file()).await
    }

    pub(crate) async fn save_series(&self, series: &SeriesStore) -> Result<()> {
        store::save(&self.config.paths.series_file(), series).await
    }

    pub(crate) async fn save_review(&self, review: &ReviewQueue) -> Result<()> {
        store::save(&self.config.paths.review_file(), review).await
    }

    pub(crate) async fn save_directories(&self, directories: &[SeriesDirectory]) -> Result<()> {
        store::save(&self.config.paths.directories_file(), &directories).await
    }
}
