//! Error types for apt-fetch
//!
//! All modules use `AptFetchResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for apt-fetch operations
pub type AptFetchResult<T> = Result<T, AptFetchError>;

/// All errors that can occur in apt-fetch
#[derive(Error, Debug)]
pub enum AptFetchError {
    // Lock errors
    #[error("Another apt-fetch instance is already running ({holder})")]
    AlreadyRunning { holder: String },

    #[error("Cannot use lock file {path}: {source}")]
    LockIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Configuration file not found: {0}")]
    ConfigNotFound(PathBuf),

    // External tool errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} exited with {}", exit_code_label(.code))]
    ToolFailure { command: String, code: Option<i32> },

    #[error("Cannot read package metadata from {archive}: {reason}")]
    MetadataExtraction { archive: PathBuf, reason: String },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn exit_code_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "a signal".to_string(),
    }
}

impl AptFetchError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Create a lock file error
    pub fn lock_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::LockIo {
            path: path.into(),
            source,
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::AlreadyRunning { .. } => {
                Some("Wait for the running fetch to finish; a stale lock is cleared on the next run")
            }
            Self::LockIo { .. } => Some("Fetching needs write access to the lock file (run as root)"),
            Self::CommandFailed { .. } => Some("Is this a Debian-based system with apt-get and dpkg installed?"),
            _ => None,
        }
    }
}
