//! Fetch command - download pending upgrades under the instance lock

use crate::apt::AptTool;
use crate::config::Config;
use crate::error::AptFetchResult;
use crate::fetch::{FetchOrchestrator, FetchPhase};
use crate::history::LogStore;
use crate::lock::LockManager;
use crate::ui::{TaskSpinner, UiContext};

/// Execute the fetch command
///
/// Tool failures are recorded in the history log and still exit cleanly;
/// only a held or unwritable lock is returned as an error.
pub async fn execute(config: &Config) -> AptFetchResult<()> {
    let ctx = UiContext::detect();
    let tool = AptTool::new();
    let log = LogStore::new(&config.paths.log_dir);
    let locks = LockManager::new(&config.paths.lock_file, config.stale_after());

    let mut spinner = TaskSpinner::new(&ctx);
    let result = FetchOrchestrator::new(config, &tool, &locks, &log)
        .run_with(|phase| match phase {
            FetchPhase::Idle | FetchPhase::Failed => {}
            _ => spinner.message(phase.describe()),
        })
        .await;

    match result {
        Ok(report) if report.succeeded() => {
            spinner.stop("Updates downloaded");
            Ok(())
        }
        Ok(report) => {
            spinner.stop_warn(&format!(
                "Fetch finished with {} failed step(s), see {}",
                report.failures.len(),
                log.path().display()
            ));
            Ok(())
        }
        Err(e) => {
            spinner.clear();
            Err(e)
        }
    }
}
