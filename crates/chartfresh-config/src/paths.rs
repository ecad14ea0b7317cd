use std::path::{Path, PathBuf};

use crate::errors::ConfigError;

/// Path construction for the `~/.chartfresh/` directory layout.
///
/// Use `resolve()` in production code and `from_dir()` in tests.
#[derive(Debug, Clone)]
pub struct FreshPaths {
    base_dir: PathBuf,
}

impl FreshPaths {
    /// Resolve paths from the user's home directory (`~/.chartfresh`).
    pub fn resolve() -> Result<Self, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
        Ok(Self {
            base_dir: home.join(".chartfresh"),
        })
    }

    /// Create paths from an explicit base directory. Use in tests.
    pub fn from_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// `~/.chartfresh/config.toml`
    pub fn user_config(&self) -> PathBuf {
        self.base_dir.join("config.toml")
    }

    /// `<project>/.chartfresh/config.toml`
    pub fn project_config(project_root: &Path) -> PathBuf {
        project_root.join(".chartfresh").join("config.toml")
    }
}
