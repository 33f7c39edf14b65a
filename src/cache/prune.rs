//! Removal of cached archives that are already installed

use crate::cache::PackageRecord;
use serde::Serialize;
use std::io::ErrorKind;
use tokio::fs;
use tracing::{debug, warn};

/// What happened to one archive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PruneOutcome {
    Cleaned,
    NotFound,
    OtherError,
}

/// Result for one installed archive
#[derive(Debug, Clone, Serialize)]
pub struct PruneEntry {
    pub filename: String,
    pub name: String,
    pub version: String,
    pub outcome: PruneOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Results of a prune pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct PruneReport {
    pub cleaned: usize,
    pub not_found: usize,
    pub errors: usize,
    pub entries: Vec<PruneEntry>,
}

impl PruneReport {
    fn push(&mut self, entry: PruneEntry) {
        match entry.outcome {
            PruneOutcome::Cleaned => self.cleaned += 1,
            PruneOutcome::NotFound => self.not_found += 1,
            PruneOutcome::OtherError => self.errors += 1,
        }
        self.entries.push(entry);
    }
}

/// Delete every archive whose exact version is installed
///
/// Each deletion is independent: a failure is recorded and the pass moves on.
pub async fn prune_installed(records: &[PackageRecord]) -> PruneReport {
    let mut report = PruneReport::default();

    for record in records.iter().filter(|r| r.installed) {
        let (outcome, error) = match fs::remove_file(&record.path).await {
            Ok(()) => {
                debug!("Removed {}", record.path.display());
                (PruneOutcome::Cleaned, None)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => (PruneOutcome::NotFound, None),
            Err(e) => {
                warn!("Cannot remove {}: {}", record.path.display(), e);
                (PruneOutcome::OtherError, Some(e.to_string()))
            }
        };

        report.push(PruneEntry {
            filename: record.filename.clone(),
            name: record.name.clone(),
            version: record.version.clone(),
            outcome,
            error,
        });
    }

    report
}
