//! Status command - report fetch history and cache contents

use crate::apt::{AptTool, PackageTool};
use crate::cache::{count_partial, CacheInspector};
use crate::cli::args::OutputFormat;
use crate::config::Config;
use crate::error::AptFetchResult;
use crate::history::{compute_stats, LogStore, RunStats};
use crate::lock::LockManager;
use crate::ui::{self, Tone, UiContext};
use chrono::{Local, NaiveDate};
use serde::Serialize;
use std::path::PathBuf;

/// Everything the status command reports
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    #[serde(flatten)]
    pub stats: RunStats,
    /// Same as `archived_count`, under the name older consumers read
    pub num_archived: usize,
    /// Same as `runs_complete_today`, under the name older consumers read
    pub runs_complete: u32,
    /// Files in the cache's partial download area
    pub partial_count: usize,
    /// A lock file exists, so a fetch is (or was, if it crashed) running
    pub fetch_in_progress: bool,
    pub log_file: PathBuf,
    pub logfile_exists: bool,
    pub logfile_writeable: bool,
    pub cache_dir: PathBuf,
}

impl StatusReport {
    /// Collect a fresh report; never fails, missing inputs read as zero
    pub async fn gather(config: &Config, tool: &dyn PackageTool, today: NaiveDate) -> Self {
        let log = LogStore::for_date(&config.paths.log_dir, today);
        let locks = LockManager::new(&config.paths.lock_file, config.stale_after());
        let inspector = CacheInspector::new(tool);
        let cache_dir = &config.paths.cache_dir;

        let stats = compute_stats(&log, &inspector, cache_dir, today).await;

        Self {
            num_archived: stats.archived_count,
            runs_complete: stats.runs_complete_today,
            stats,
            partial_count: count_partial(cache_dir).await,
            fetch_in_progress: locks.is_locked(),
            logfile_exists: log.exists(),
            logfile_writeable: log.is_writable(),
            log_file: log.path().to_path_buf(),
            cache_dir: cache_dir.clone(),
        }
    }
}

/// Execute the status command
pub async fn execute(format: OutputFormat, config: &Config) -> AptFetchResult<()> {
    let tool = AptTool::new();
    let report = StatusReport::gather(config, &tool, Local::now().date_naive()).await;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Human => print_human(&UiContext::detect(), &report),
    }

    Ok(())
}

fn print_human(ctx: &UiContext, report: &StatusReport) {
    let stats = &report.stats;

    ui::intro(ctx, "apt-fetch status");

    ui::section(ctx, "History");
    ui::key_value(ctx, "Log file", &report.log_file.display().to_string());
    ui::key_value(ctx, "Runs today", &stats.runs_today.to_string());
    ui::key_value(ctx, "Complete runs today", &stats.runs_complete_today.to_string());
    ui::key_value_tone(
        ctx,
        "Errors encountered",
        &stats.fetch_errors.to_string(),
        Tone::of_count(stats.fetch_errors),
    );
    let last_run = stats
        .last_run
        .map(|ts| ts.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "none today".to_string());
    ui::key_value(ctx, "Last run", &last_run);

    if !report.logfile_exists {
        ui::remark(ctx, "No history log for today yet");
    } else if !report.logfile_writeable {
        ui::remark(ctx, "History log is not writable by this user");
    }

    ui::section(ctx, "Cache");
    ui::key_value(ctx, "Directory", &report.cache_dir.display().to_string());
    ui::key_value(ctx, "Archived packages", &stats.archived_count.to_string());
    ui::key_value(ctx, "Already installed", &stats.installed_count.to_string());
    ui::key_value(ctx, "Partially downloaded", &report.partial_count.to_string());
    ui::key_value(
        ctx,
        "Fetch in progress",
        if report.fetch_in_progress { "yes" } else { "no" },
    );
}
