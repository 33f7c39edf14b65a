//! History log line format
//!
//! Event lines look like `[2026-10-17 06:15:02] Checking latest apt..`.
//! Tool output captured into the same file carries no timestamp.

use chrono::{NaiveDate, NaiveDateTime};

/// Message written when a fetch run starts
pub const CHECK_STARTED: &str = "Checking latest apt..";
/// Message written when a fetch run finishes, successful or not
pub const CHECK_COMPLETE: &str = "apt-fetch complete.";
/// Any line containing this counts as a fetch error, including apt's own
/// "Failed to fetch" output
pub const CHECK_FAILED: &str = "Failed";

/// Timestamp format inside the leading brackets
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// What a log line records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    CheckStarted,
    CheckComplete,
    CheckFailed,
    Other,
}

impl EventKind {
    /// Classify a raw log line by its marker text
    pub fn classify(line: &str) -> Self {
        if line.contains(CHECK_STARTED) {
            Self::CheckStarted
        } else if line.contains(CHECK_COMPLETE) {
            Self::CheckComplete
        } else if line.contains(CHECK_FAILED) {
            Self::CheckFailed
        } else {
            Self::Other
        }
    }
}

/// A timestamped history line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    pub timestamp: NaiveDateTime,
    pub kind: EventKind,
    pub raw: String,
}

impl LogEvent {
    /// Parse a line carrying a bracketed timestamp; anything else is `None`
    pub fn parse(line: &str) -> Option<Self> {
        let rest = line.strip_prefix('[')?;
        let (stamp, _) = rest.split_once(']')?;
        let timestamp = NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).ok()?;
        Some(Self {
            timestamp,
            kind: EventKind::classify(line),
            raw: line.to_string(),
        })
    }

    /// Render `message` as a history line stamped with `timestamp`
    pub fn format(timestamp: NaiveDateTime, message: &str) -> String {
        format!("[{}] {}", timestamp.format(TIMESTAMP_FORMAT), message)
    }

    pub fn is_on(&self, date: NaiveDate) -> bool {
        self.timestamp.date() == date
    }
}

/// Whether `line` carries a timestamp falling on `date`
pub fn stamped_on(line: &str, date: NaiveDate) -> bool {
    LogEvent::parse(line).is_some_and(|event| event.is_on(date))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).unwrap()
    }

    #[test]
    fn parse_started_line() {
        let event = LogEvent::parse("[2026-10-17 06:15:02] Checking latest apt..").unwrap();
        assert_eq!(event.timestamp, ts("2026-10-17 06:15:02"));
        assert_eq!(event.kind, EventKind::CheckStarted);
    }

    #[test]
    fn parse_rejects_unstamped_and_truncated() {
        assert!(LogEvent::parse("Hit:1 http://deb.debian.org/debian bookworm InRelease").is_none());
        assert!(LogEvent::parse("[2026-10-17 06:1").is_none());
        assert!(LogEvent::parse("[not a date] apt-fetch complete.").is_none());
        assert!(LogEvent::parse("").is_none());
    }

    #[test]
    fn classify_markers() {
        assert_eq!(EventKind::classify("x apt-fetch complete."), EventKind::CheckComplete);
        assert_eq!(
            EventKind::classify("W: Failed to fetch http://example/Packages"),
            EventKind::CheckFailed
        );
        assert_eq!(EventKind::classify("Reading package lists..."), EventKind::Other);
    }

    #[test]
    fn format_then_parse() {
        let line = LogEvent::format(ts("2026-01-02 03:04:05"), CHECK_COMPLETE);
        assert_eq!(line, "[2026-01-02 03:04:05] apt-fetch complete.");
        let event = LogEvent::parse(&line).unwrap();
        assert_eq!(event.kind, EventKind::CheckComplete);
        assert!(event.is_on(NaiveDate::from_ymd_opt(2026, 1, 2).unwrap()));
    }
}
