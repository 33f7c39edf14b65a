//! Day-of-week history log
//!
//! Each weekday has its own slot file (`apt-fetch-saturday.log`), so the
//! log set rotates itself weekly. Writes are best-effort from the caller's
//! point of view: a fetch must never fail because the history could not be
//! written.

use crate::apt::ToolOutput;
use crate::error::{AptFetchError, AptFetchResult};
use crate::history::event::{stamped_on, LogEvent};
use chrono::{Local, NaiveDate, NaiveDateTime};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Append-only history log for one weekday slot
#[derive(Debug, Clone)]
pub struct LogStore {
    path: PathBuf,
}

impl LogStore {
    /// Log store for today's slot in `log_dir`
    pub fn new(log_dir: &Path) -> Self {
        Self::for_date(log_dir, Local::now().date_naive())
    }

    /// Log store for the slot `date` falls in
    pub fn for_date(log_dir: &Path, date: NaiveDate) -> Self {
        Self {
            path: log_dir.join(Self::slot_file_name(date)),
        }
    }

    /// `apt-fetch-<weekday>.log`, weekday spelled out in lowercase
    pub fn slot_file_name(date: NaiveDate) -> String {
        format!("apt-fetch-{}.log", date.format("%A").to_string().to_lowercase())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `message` stamped with the current local time
    pub async fn append(&self, message: &str) -> AptFetchResult<()> {
        self.append_at(Local::now().naive_local(), message).await
    }

    /// Append `message` stamped with `timestamp`
    pub async fn append_at(&self, timestamp: NaiveDateTime, message: &str) -> AptFetchResult<()> {
        let mut line = LogEvent::format(timestamp, message);
        line.push('\n');

        self.write_line(&line)
            .await
            .map_err(|e| AptFetchError::io(format!("appending to {}", self.path.display()), e))
    }

    /// Append `message`, downgrading any failure to a warning
    pub async fn record(&self, message: &str) {
        if let Err(e) = self.append(message).await {
            warn!("History log not updated: {}", e);
        }
    }

    async fn write_line(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;

        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    /// Every complete line in the slot file
    ///
    /// A writer may be mid-append, so an unterminated trailing fragment is
    /// dropped. A missing or unreadable file reads as empty.
    pub async fn read_all(&self) -> Vec<String> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No history at {}", self.path.display());
                return Vec::new();
            }
            Err(e) => {
                warn!("Cannot read history {}: {}", self.path.display(), e);
                return Vec::new();
            }
        };

        complete_lines(&String::from_utf8_lossy(&bytes))
    }

    /// Drop last week's content from this slot
    ///
    /// Everything before the first line stamped `today` is discarded; a slot
    /// without any such line is truncated. Returns whether the file changed.
    pub async fn rotate_for_today(&self, today: NaiveDate) -> AptFetchResult<bool> {
        let context = || format!("rotating {}", self.path.display());

        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(AptFetchError::io(context(), e)),
        };
        if bytes.is_empty() {
            return Ok(false);
        }

        let content = String::from_utf8_lossy(&bytes);
        let lines: Vec<&str> = content.split_inclusive('\n').collect();
        let keep_from = lines.iter().position(|line| stamped_on(line.trim_end(), today));

        let kept = match keep_from {
            Some(0) => return Ok(false),
            Some(index) => lines[index..].concat(),
            None => String::new(),
        };

        fs::write(&self.path, kept)
            .await
            .map_err(|e| AptFetchError::io(context(), e))?;

        debug!(
            "Rotated {} ({} stale lines dropped)",
            self.path.display(),
            keep_from.unwrap_or(lines.len())
        );
        Ok(true)
    }

    /// Output sink that streams external tool output into the slot file
    pub fn tool_output(&self) -> ToolOutput {
        let opened = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(ToolOutput::to_file);

        match opened {
            Ok(output) => output,
            Err(e) => {
                warn!(
                    "Tool output will not be kept, cannot open {}: {}",
                    self.path.display(),
                    e
                );
                ToolOutput::null()
            }
        }
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Whether the slot file exists and can be opened for appending
    pub fn is_writable(&self) -> bool {
        std::fs::OpenOptions::new()
            .append(true)
            .open(&self.path)
            .is_ok()
    }
}

fn complete_lines(content: &str) -> Vec<String> {
    let mut pieces: Vec<&str> = content.split('\n').collect();
    // Either the empty piece after a final newline, or a partial write
    pieces.pop();
    pieces
        .into_iter()
        .map(|line| line.trim_end_matches('\r').to_string())
        .collect()
}
