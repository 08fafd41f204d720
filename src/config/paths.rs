//! XDG-compliant path management

use directories::ProjectDirs;
use std::path::PathBuf;

/// Manages all application paths using XDG base directory specification
#[derive(Debug, Clone)]
pub struct Paths {
    dirs: ProjectDirs,
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}

impl Paths {
    pub fn new() -> Self {
        let dirs = ProjectDirs::from("", "", "mangamatch")
            .expect("Failed to determine project directories");
        Self { dirs }
    }

    // ========== Config Paths ==========

    /// Config directory: ~/.config/mangamatch/
    pub fn config_dir(&self) -> PathBuf {
        self.dirs.config_dir().to_path_buf()
    }

    /// Main config file: ~/.config/mangamatch/config.toml
    pub fn config_file(&self) -> PathBuf {
        self.config_dir().join("config.toml")
    }

    // ========== Data Paths (document stores) ==========

    /// Data directory: ~/.local/share/mangamatch/
    pub fn data_dir(&self) -> PathBuf {
        self.dirs.data_dir().to_path_buf()
    }

    /// Reconciled series store
    pub fn series_file(&self) -> PathBuf {
        self.data_dir().join("series.json")
    }

    /// Review queue store
    pub fn review_file(&self) -> PathBuf {
        self.data_dir().join("review.json")
    }

    /// Directory index cache
    pub fn directories_file(&self) -> PathBuf {
        self.data_dir().join("directories.json")
    }

    /// Merged series entries, rebuilt wholesale on every progress merge
    pub fn merged_file(&self) -> PathBuf {
        self.data_dir().join("merged.json")
    }

    // ========== Cache Paths ==========

    /// Cache directory: ~/.cache/mangamatch/ (remote detail lookups)
    pub fn cache_dir(&self) -> PathBuf {
        self.dirs.cache_dir().to_path_buf()
    }

    // ========== Utility Methods ==========

    /// Ensure all required directories exist
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.config_dir())?;
        std::fs::create_dir_all(self.data_dir())?;
        std::fs::create_dir_all(self.cache_dir())?;
        Ok(())
    }
}
