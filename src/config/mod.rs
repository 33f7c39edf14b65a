//! Configuration management for apt-fetch

pub mod schema;

pub use schema::Config;

use crate::error::{AptFetchError, AptFetchResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Per-invocation settings that take precedence over the config file
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub cache_dir: Option<PathBuf>,
    pub lock_file: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
    pub rate_limit: Option<String>,
    pub stale_after_secs: Option<u64>,
}

impl ConfigOverrides {
    /// Apply every override that was given on top of `config`
    pub fn apply(self, config: &mut Config) {
        if let Some(dir) = self.cache_dir {
            config.paths.cache_dir = dir;
        }
        if let Some(path) = self.lock_file {
            config.paths.lock_file = path;
        }
        if let Some(dir) = self.log_dir {
            config.paths.log_dir = dir;
        }
        if let Some(limit) = self.rate_limit {
            config.fetch.rate_limit = limit;
        }
        if let Some(secs) = self.stale_after_secs {
            config.fetch.stale_after_secs = secs;
        }
    }
}

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
    explicit: bool,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
            explicit: false,
        }
    }

    /// Create a config manager with a custom path
    ///
    /// Unlike the default location, a custom path must exist.
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            config_path: path,
            explicit: true,
        }
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        PathBuf::from("/etc/apt-fetch/config.toml")
    }

    /// Load configuration, falling back to defaults if the default file is absent
    pub async fn load(&self) -> AptFetchResult<Config> {
        if !self.config_path.exists() {
            if self.explicit {
                return Err(AptFetchError::ConfigNotFound(self.config_path.clone()));
            }
            debug!("Config file not found, using defaults");
            return Ok(Config::default());
        }

        self.load_from_file(&self.config_path).await
    }

    /// Load configuration and apply command-line overrides, then validate
    pub async fn load_with(&self, overrides: ConfigOverrides) -> AptFetchResult<Config> {
        let mut config = self.load().await?;
        overrides.apply(&mut config);

        config
            .validate()
            .map_err(|reason| AptFetchError::ConfigInvalid {
                path: self.config_path.clone(),
                reason,
            })?;

        debug!("Effective configuration: {:?}", config);
        Ok(config)
    }

    /// Load configuration from a specific file
    pub async fn load_from_file(&self, path: &Path) -> AptFetchResult<Config> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| AptFetchError::io(format!("reading config from {}", path.display()), e))?;

        toml::from_str(&content).map_err(|e| AptFetchError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}
