//! CLI argument definitions using clap derive

use crate::config::ConfigOverrides;
use clap::{ArgAction, Parser};
use std::path::PathBuf;

/// apt-fetch - download pending package updates without installing them
///
/// Without a mode flag, refreshes the package index and downloads all
/// pending upgrades into the apt cache. Intended to run from cron.
#[derive(Parser, Debug)]
#[command(name = "apt-fetch")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Show fetch status
    #[arg(short, long)]
    pub status: bool,

    /// Print status (or prune results) as JSON
    #[arg(short, long)]
    pub json: bool,

    /// Remove cached archives whose exact version is already installed
    #[arg(short, long)]
    pub prune: bool,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, env = "APT_FETCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// apt archive cache directory
    #[arg(long, env = "APT_FETCH_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Single-instance lock file
    #[arg(long, env = "APT_FETCH_LOCK_FILE")]
    pub lock_file: Option<PathBuf>,

    /// Directory for the day-of-week history logs
    #[arg(long, env = "APT_FETCH_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// Download rate limit passed to apt (e.g. 56K)
    #[arg(long, env = "APT_FETCH_RATE_LIMIT")]
    pub rate_limit: Option<String>,

    /// Seconds after which a lock file is considered stale
    #[arg(long, env = "APT_FETCH_STALE_AFTER")]
    pub stale_after: Option<u64>,
}

/// Output format for reports
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Human,
    /// JSON output
    Json,
}

/// What this invocation does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Fetch,
    Status(OutputFormat),
    Prune(OutputFormat),
}

impl Cli {
    /// Resolve the mode flags; the first matching flag wins
    pub fn mode(&self) -> Mode {
        let format = if self.json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        };

        if self.prune {
            Mode::Prune(format)
        } else if self.json || self.status {
            Mode::Status(format)
        } else {
            Mode::Fetch
        }
    }

    /// Settings given on the command line or through the environment
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            cache_dir: self.cache_dir.clone(),
            lock_file: self.lock_file.clone(),
            log_dir: self.log_dir.clone(),
            rate_limit: self.rate_limit.clone(),
            stale_after_secs: self.stale_after,
        }
    }
}
