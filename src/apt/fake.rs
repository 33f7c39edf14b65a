//! Scriptable PackageTool for unit tests

use crate::apt::tool::{ArchiveMetadata, PackageTool, ToolExit, ToolOutput};
use crate::error::{AptFetchError, AptFetchResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

#[derive(Default)]
pub struct FakeTool {
    /// Archive file name -> declared metadata
    archives: HashMap<String, ArchiveMetadata>,
    /// Package name -> installed version
    installed: HashMap<String, String>,
    refresh_code: Option<i32>,
    download_code: Option<i32>,
    calls: Mutex<Vec<String>>,
}

impl FakeTool {
    pub fn new() -> Self {
        Self {
            refresh_code: Some(0),
            download_code: Some(0),
            ..Default::default()
        }
    }

    pub fn with_archive(mut self, file_name: &str, name: &str, version: &str) -> Self {
        self.archives.insert(
            file_name.to_string(),
            ArchiveMetadata {
                name: name.to_string(),
                version: version.to_string(),
            },
        );
        self
    }

    pub fn with_installed(mut self, name: &str, version: &str) -> Self {
        self.installed.insert(name.to_string(), version.to_string());
        self
    }

    pub fn with_refresh_code(mut self, code: Option<i32>) -> Self {
        self.refresh_code = code;
        self
    }

    pub fn with_download_code(mut self, code: Option<i32>) -> Self {
        self.download_code = code;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl PackageTool for FakeTool {
    async fn refresh_index(&self, rate_limit: &str, _output: ToolOutput) -> AptFetchResult<ToolExit> {
        self.record(format!("refresh {}", rate_limit));
        Ok(ToolExit {
            code: self.refresh_code,
        })
    }

    async fn download_upgrades(
        &self,
        rate_limit: &str,
        _output: ToolOutput,
    ) -> AptFetchResult<ToolExit> {
        self.record(format!("download {}", rate_limit));
        Ok(ToolExit {
            code: self.download_code,
        })
    }

    async fn archive_metadata(&self, archive: &Path) -> AptFetchResult<ArchiveMetadata> {
        let file_name = archive
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.record(format!("metadata {}", file_name));
        self.archives
            .get(&file_name)
            .cloned()
            .ok_or_else(|| AptFetchError::MetadataExtraction {
                archive: archive.to_path_buf(),
                reason: "not a debian archive".to_string(),
            })
    }

    async fn installed_version(&self, package: &str) -> AptFetchResult<Option<String>> {
        self.record(format!("query {}", package));
        Ok(self.installed.get(package).cloned())
    }

    fn tool_name(&self) -> &'static str {
        "fake"
    }
}
