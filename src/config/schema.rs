//! Configuration schema for apt-fetch
//!
//! Configuration is stored at `/etc/apt-fetch/config.toml`

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Filesystem locations
    pub paths: PathsConfig,

    /// Fetch run settings
    pub fetch: FetchConfig,
}

impl Config {
    /// How old a lock file may get before it is treated as abandoned
    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.fetch.stale_after_secs)
    }

    /// Check values that serde cannot validate on its own
    pub fn validate(&self) -> Result<(), String> {
        if !matches!(self.general.log_format.as_str(), "text" | "json") {
            return Err(format!(
                "general.log_format must be \"text\" or \"json\", got \"{}\"",
                self.general.log_format
            ));
        }

        if !is_valid_rate_limit(&self.fetch.rate_limit) {
            return Err(format!(
                "fetch.rate_limit must be a positive number optionally followed by K, got \"{}\"",
                self.fetch.rate_limit
            ));
        }

        if self.fetch.stale_after_secs == 0 {
            return Err("fetch.stale_after_secs must be greater than zero".to_string());
        }

        Ok(())
    }
}

/// Accepts `56`, `56K` and `56k`
fn is_valid_rate_limit(limit: &str) -> bool {
    let digits = limit.strip_suffix(['K', 'k']).unwrap_or(limit);
    !digits.is_empty()
        && digits.chars().all(|c| c.is_ascii_digit())
        && digits.chars().any(|c| c != '0')
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Diagnostic log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Filesystem locations used by every command
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory apt stores downloaded archives in
    pub cache_dir: PathBuf,

    /// Single-instance lock file
    pub lock_file: PathBuf,

    /// Directory holding the day-of-week history logs
    pub log_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("/var/cache/apt/archives"),
            lock_file: PathBuf::from("/var/lock/apt-fetch"),
            log_dir: PathBuf::from("/var/log"),
        }
    }
}

/// Fetch run settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Transfer limit handed to apt as `Acquire::http::Dl-Limit`
    pub rate_limit: String,

    /// Lock files older than this many seconds are considered stale
    pub stale_after_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            rate_limit: "56K".to_string(),
            stale_after_secs: 86400,
        }
    }
}
