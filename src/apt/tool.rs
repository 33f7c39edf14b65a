//! Package tool abstraction
//!
//! Every interaction with the system package manager goes through this
//! trait so the orchestrator and cache inspector can be exercised without
//! a Debian host.

use crate::error::AptFetchResult;
use async_trait::async_trait;
use std::fs::File;
use std::path::Path;
use std::process::Stdio;

/// Where an external tool's stdout and stderr are sent
pub struct ToolOutput {
    pub stdout: Stdio,
    pub stderr: Stdio,
}

impl ToolOutput {
    /// Discard all tool output
    pub fn null() -> Self {
        Self {
            stdout: Stdio::null(),
            stderr: Stdio::null(),
        }
    }

    /// Send stdout and stderr to the same (append-mode) file
    pub fn to_file(file: File) -> std::io::Result<Self> {
        let stderr = file.try_clone()?;
        Ok(Self {
            stdout: Stdio::from(file),
            stderr: Stdio::from(stderr),
        })
    }
}

/// How an external tool run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolExit {
    /// Exit code, `None` if terminated by a signal
    pub code: Option<i32>,
}

impl ToolExit {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Name and version declared inside a package archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveMetadata {
    pub name: String,
    pub version: String,
}

/// Abstract package manager interface
#[async_trait]
pub trait PackageTool: Send + Sync {
    /// Refresh the package index, rate-limited to `rate_limit`
    async fn refresh_index(&self, rate_limit: &str, output: ToolOutput) -> AptFetchResult<ToolExit>;

    /// Download all pending upgrades into the cache without installing them
    async fn download_upgrades(
        &self,
        rate_limit: &str,
        output: ToolOutput,
    ) -> AptFetchResult<ToolExit>;

    /// Read the package name and version from an archive's control data
    async fn archive_metadata(&self, archive: &Path) -> AptFetchResult<ArchiveMetadata>;

    /// Installed version of `package`, or `None` if it is not installed
    async fn installed_version(&self, package: &str) -> AptFetchResult<Option<String>>;

    /// Human-readable tool name for display
    fn tool_name(&self) -> &'static str;
}
