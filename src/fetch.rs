//! Fetch run orchestration
//!
//! Sequences lock acquisition, index refresh, download-only upgrade and lock
//! release, recording each step in the history log.
//!
//! ```text
//! Idle -> LockAcquiring -> Updating -> DownloadingUpgrades -> LockReleasing -> Idle
//!              |               |               |                                ^
//!              v               +---------------+---> (failure logged) ----------+--> Failed
//!         (abort run)
//! ```
//!
//! A failing tool step never aborts the run: it is logged as a failure, the
//! lock is still released and the completion marker is still written. Only
//! lock acquisition errors propagate.

use crate::apt::{PackageTool, ToolExit};
use crate::config::Config;
use crate::error::{AptFetchError, AptFetchResult};
use crate::history::event::{CHECK_COMPLETE, CHECK_FAILED, CHECK_STARTED};
use crate::history::LogStore;
use crate::lock::LockManager;
use chrono::Local;
use std::error::Error as _;
use tracing::{debug, info, warn};

/// Where a fetch run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPhase {
    Idle,
    LockAcquiring,
    Updating,
    DownloadingUpgrades,
    LockReleasing,
    Failed,
}

impl FetchPhase {
    /// Short progress text for display
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::LockAcquiring => "Acquiring lock...",
            Self::Updating => "Refreshing package index...",
            Self::DownloadingUpgrades => "Downloading upgrades...",
            Self::LockReleasing => "Releasing lock...",
            Self::Failed => "Fetch finished with errors",
        }
    }
}

/// What a completed fetch run achieved
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchReport {
    pub index_refreshed: bool,
    pub upgrades_downloaded: bool,
    /// One message per failed step, as written to the log
    pub failures: Vec<String>,
}

impl FetchReport {
    pub fn succeeded(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Runs one fetch under the single-instance lock
pub struct FetchOrchestrator<'a> {
    tool: &'a dyn PackageTool,
    locks: &'a LockManager,
    log: &'a LogStore,
    rate_limit: String,
}

impl<'a> FetchOrchestrator<'a> {
    pub fn new(
        config: &Config,
        tool: &'a dyn PackageTool,
        locks: &'a LockManager,
        log: &'a LogStore,
    ) -> Self {
        Self {
            tool,
            locks,
            log,
            rate_limit: config.fetch.rate_limit.clone(),
        }
    }

    /// Run a fetch without progress reporting
    pub async fn run(&self) -> AptFetchResult<FetchReport> {
        self.run_with(|_| {}).await
    }

    /// Run a fetch, calling `on_phase` on every state transition
    ///
    /// Returns `Err` only when the lock cannot be taken; in that case no
    /// external tool has been started.
    pub async fn run_with(
        &self,
        mut on_phase: impl FnMut(FetchPhase),
    ) -> AptFetchResult<FetchReport> {
        on_phase(FetchPhase::LockAcquiring);
        let guard = match self.locks.acquire(self.log).await {
            Ok(guard) => guard,
            Err(e) => {
                on_phase(FetchPhase::Failed);
                return Err(e);
            }
        };

        if let Err(e) = self.log.rotate_for_today(Local::now().date_naive()).await {
            warn!("{}", e);
        }
        self.log.record(CHECK_STARTED).await;
        info!("Fetching updates via {} (limit {})", self.tool.tool_name(), self.rate_limit);

        let mut report = FetchReport::default();

        on_phase(FetchPhase::Updating);
        let refreshed = self
            .tool
            .refresh_index(&self.rate_limit, self.log.tool_output())
            .await;
        report.index_refreshed = self.settle("apt-get update", refreshed, &mut report).await;

        // Downloading against a stale index would fetch the wrong versions
        if report.index_refreshed {
            on_phase(FetchPhase::DownloadingUpgrades);
            let downloaded = self
                .tool
                .download_upgrades(&self.rate_limit, self.log.tool_output())
                .await;
            report.upgrades_downloaded = self
                .settle("apt-get dist-upgrade", downloaded, &mut report)
                .await;
        }

        on_phase(FetchPhase::LockReleasing);
        if let Err(e) = guard.release() {
            warn!("{}", e);
        }

        self.log.record(CHECK_COMPLETE).await;
        on_phase(if report.succeeded() {
            FetchPhase::Idle
        } else {
            FetchPhase::Failed
        });

        debug!("Fetch finished: {:?}", report);
        Ok(report)
    }

    /// Turn a step result into success, logging failures
    async fn settle(
        &self,
        command: &str,
        result: AptFetchResult<ToolExit>,
        report: &mut FetchReport,
    ) -> bool {
        let error = match result {
            Ok(exit) if exit.success() => return true,
            Ok(exit) => AptFetchError::ToolFailure {
                command: command.to_string(),
                code: exit.code,
            },
            Err(e) => e,
        };

        let message = format!("{}: {}", CHECK_FAILED, error_chain(&error));
        warn!("{}", message);
        self.log.record(&message).await;
        report.failures.push(message);
        false
    }
}

/// Error message followed by its sources
fn error_chain(error: &AptFetchError) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
