//! Cross-platform application paths

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::ConfigError;

#[derive(Debug, Clone)]
pub struct AppPaths {
    data_dir: PathBuf,
}

impl AppPaths {
    pub fn new() -> Result<Self, ConfigError> {
        Self::at(Self::default_data_dir()?)
    }

    /// Use `data_dir` instead of the OS location (tests, `--data-dir`).
    pub fn at(data_dir: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let data_dir = data_dir.into();

        // Ensure directory exists
        fs::create_dir_all(&data_dir).map_err(|source| ConfigError::Io {
            path: data_dir.clone(),
            source,
        })?;

        Ok(Self { data_dir })
    }

    fn default_data_dir() -> Result<PathBuf, ConfigError> {
        let base = dirs::data_dir().ok_or(ConfigError::NoDataDir)?;
        Ok(base.join("atelier"))
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn config_file(&self) -> PathBuf {
        self.data_dir.join("config.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_the_directory() {
        let dir = std::env::temp_dir().join(format!("atelier-paths-{}", std::process::id()));
        let paths = AppPaths::at(&dir).expect("create");
        assert!(paths.data_dir().is_dir());
        assert_eq!(paths.config_file(), dir.join("config.json"));
        let _ = fs::remove_dir_all(&dir);
    }
}
