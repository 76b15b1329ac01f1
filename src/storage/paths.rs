//! Platform paths for the config file.

use directories::{BaseDirs, ProjectDirs};
use std::path::PathBuf;

/// Application paths.
pub struct AppPaths {
    /// Configuration directory.
    pub config: PathBuf,
}

impl AppPaths {
    #[must_use]
    pub fn new() -> Self {
        if let Some(proj_dirs) = ProjectDirs::from("ai", "cmdrdata", "cmdrdata") {
            Self {
                config: proj_dirs.config_dir().to_path_buf(),
            }
        } else {
            // No home directory (some containers); fall back to the cwd.
            let home = BaseDirs::new()
                .map_or_else(|| PathBuf::from("."), |d| d.home_dir().to_path_buf());
            Self {
                config: home.join(".config/cmdrdata"),
            }
        }
    }

    /// Path to `config.toml`.
    #[must_use]
    pub fn config_file(&self) -> PathBuf {
        self.config.join("config.toml")
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}
