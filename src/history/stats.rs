//! Run statistics rebuilt from the history log and a cache scan
//!
//! Nothing here is persisted; every status query recomputes from scratch.

use crate::cache::{CacheInspector, PackageRecord};
use crate::history::event::{EventKind, LogEvent, CHECK_FAILED, TIMESTAMP_FORMAT};
use crate::history::store::LogStore;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Serialize, Serializer};
use std::path::Path;

/// Counters describing recent fetch activity and the cache contents
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    /// Fetch runs started today
    pub runs_today: u32,
    /// Fetch runs finished today
    pub runs_complete_today: u32,
    /// Most recent start or finish today
    #[serde(serialize_with = "serialize_last_run")]
    pub last_run: Option<NaiveDateTime>,
    /// Failure lines anywhere in the retained log, regardless of date
    pub fetch_errors: u32,
    /// Archives waiting in the cache
    pub archived_count: usize,
    /// Cached archives whose exact version is already installed
    pub installed_count: usize,
}

impl RunStats {
    /// Tally run counters from history lines
    pub fn from_log<I, S>(lines: I, today: NaiveDate) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut stats = Self::default();

        for line in lines {
            let line = line.as_ref();

            if line.contains(CHECK_FAILED) {
                stats.fetch_errors += 1;
            }

            let Some(event) = LogEvent::parse(line) else {
                continue;
            };
            if !event.is_on(today) {
                continue;
            }

            match event.kind {
                EventKind::CheckStarted => {
                    stats.runs_today += 1;
                    stats.last_run = Some(event.timestamp);
                }
                EventKind::CheckComplete => {
                    stats.runs_complete_today += 1;
                    stats.last_run = Some(event.timestamp);
                }
                EventKind::CheckFailed | EventKind::Other => {}
            }
        }

        stats
    }

    /// Fill in the cache counters from a scan
    pub fn with_cache(mut self, records: &[PackageRecord]) -> Self {
        self.archived_count = records.len();
        self.installed_count = records.iter().filter(|r| r.installed).count();
        self
    }
}

fn serialize_last_run<S: Serializer>(
    last_run: &Option<NaiveDateTime>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match last_run {
        Some(ts) => serializer.serialize_str(&ts.format(TIMESTAMP_FORMAT).to_string()),
        None => serializer.serialize_none(),
    }
}

/// Rebuild the full statistics for `today`
pub async fn compute_stats(
    log: &LogStore,
    inspector: &CacheInspector<'_>,
    cache_dir: &Path,
    today: NaiveDate,
) -> RunStats {
    let lines = log.read_all().await;
    let records = inspector.scan(cache_dir).await;
    RunStats::from_log(&lines, today).with_cache(&records)
}
