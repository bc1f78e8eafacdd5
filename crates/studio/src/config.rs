//! Studio configuration: JSON file, then `ATELIER_*` environment overrides,
//! then command-line flags (applied by `main`).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use atelier::controls::ControlParameters;
use atelier_client::client::DEFAULT_BASE_URL;

pub const MIN_TICK_MS: u64 = 10;
pub const MAX_TICK_MS: u64 = 60_000;
pub const MAX_TIMEOUT_SECS: u64 = 600;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine the data directory")]
    NoDataDir,

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudioConfig {
    pub backend_url: String,
    pub tick_ms: u64,
    pub generate_timeout_secs: u64,
    pub inspect_timeout_secs: u64,
    pub controls: ControlParameters,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BASE_URL.to_string(),
            tick_ms: 700,
            generate_timeout_secs: 120,
            inspect_timeout_secs: 150,
            controls: ControlParameters::default(),
        }
    }
}

impl StudioConfig {
    /// Read `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let cfg: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(cfg.normalized())
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let text = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, text).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Overrides from `lookup` (the process environment in production).
    /// Unparsable values are ignored with a warning.
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        // ATELIER_BACKEND_URL=http://host:8000
        if let Some(v) = lookup("ATELIER_BACKEND_URL") {
            let v = v.trim();
            if !v.is_empty() {
                self.backend_url = v.to_string();
            }
        }

        // ATELIER_TICK_MS=700
        if let Some(v) = lookup("ATELIER_TICK_MS") {
            match v.trim().parse::<u64>() {
                Ok(ms) => self.tick_ms = ms,
                Err(_) => warn!(value = %v, "ignoring ATELIER_TICK_MS"),
            }
        }

        // ATELIER_TIMEOUT_SECS=120 (applies to every endpoint)
        if let Some(v) = lookup("ATELIER_TIMEOUT_SECS") {
            match v.trim().parse::<u64>() {
                Ok(secs) => {
                    self.generate_timeout_secs = secs;
                    self.inspect_timeout_secs = secs;
                }
                Err(_) => warn!(value = %v, "ignoring ATELIER_TIMEOUT_SECS"),
            }
        }

        // ATELIER_MODEL=meta-llama/Llama-3.2-3B
        if let Some(v) = lookup("ATELIER_MODEL") {
            self.controls.set_model_name(v);
        }

        *self = std::mem::take(self).normalized();
    }

    pub fn normalized(mut self) -> Self {
        self.backend_url = self.backend_url.trim().trim_end_matches('/').to_string();
        if self.backend_url.is_empty() {
            self.backend_url = DEFAULT_BASE_URL.to_string();
        }
        self.tick_ms = self.tick_ms.clamp(MIN_TICK_MS, MAX_TICK_MS);
        self.generate_timeout_secs = self.generate_timeout_secs.clamp(1, MAX_TIMEOUT_SECS);
        self.inspect_timeout_secs = self.inspect_timeout_secs.clamp(1, MAX_TIMEOUT_SECS);
        self.controls = self.controls.normalized();
        self
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    /// Step interval after the animation-speed control is applied.
    pub fn step_interval(&self) -> Duration {
        self.controls.step_interval(self.tick())
    }

    pub fn generate_timeout(&self) -> Duration {
        Duration::from_secs(self.generate_timeout_secs)
    }

    pub fn inspect_timeout(&self) -> Duration {
        Duration::from_secs(self.inspect_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn env_overrides_are_clamped() {
        let mut cfg = StudioConfig::default();
        cfg.apply_env_from(env(&[
            ("ATELIER_BACKEND_URL", "http://gpu-box:9000/"),
            ("ATELIER_TICK_MS", "1"),
            ("ATELIER_TIMEOUT_SECS", "30"),
            ("ATELIER_MODEL", "tiny-model"),
        ]));
        assert_eq!(cfg.backend_url, "http://gpu-box:9000");
        assert_eq!(cfg.tick_ms, MIN_TICK_MS);
        assert_eq!(cfg.generate_timeout(), Duration::from_secs(30));
        assert_eq!(cfg.inspect_timeout(), Duration::from_secs(30));
        assert_eq!(cfg.controls.model_name(), "tiny-model");
    }

    #[test]
    fn garbage_env_values_are_ignored() {
        let mut cfg = StudioConfig::default();
        cfg.apply_env_from(env(&[("ATELIER_TICK_MS", "fast"), ("ATELIER_BACKEND_URL", "  ")]));
        assert_eq!(cfg, StudioConfig::default());
    }

    #[test]
    fn missing_file_gives_defaults_and_partial_files_merge() {
        let dir = std::env::temp_dir().join(format!("atelier-config-{}", std::process::id()));
        fs::create_dir_all(&dir).expect("dir");
        let path = dir.join("config.json");
        let _ = fs::remove_file(&path);
        assert_eq!(StudioConfig::load(&path).expect("defaults"), StudioConfig::default());

        fs::write(&path, r#"{"tick_ms": 250, "controls": {"top_k": 50}}"#).expect("write");
        let cfg = StudioConfig::load(&path).expect("parse");
        assert_eq!(cfg.tick_ms, 250);
        assert_eq!(cfg.controls.top_k(), 20);
        assert_eq!(cfg.backend_url, DEFAULT_BASE_URL);

        cfg.save(&path).expect("save");
        assert_eq!(StudioConfig::load(&path).expect("reload"), cfg);

        fs::write(&path, "not json").expect("write");
        assert!(matches!(
            StudioConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
        let _ = fs::remove_dir_all(&dir);
    }
}
