//! apt/dpkg backed package tool
//!
//! Implements the PackageTool trait by shelling out to `apt-get`,
//! `dpkg-deb` and `dpkg-query`.

use crate::apt::tool::{ArchiveMetadata, PackageTool, ToolExit, ToolOutput};
use crate::error::{AptFetchError, AptFetchResult};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Package tool using the host's apt-get and dpkg binaries
pub struct AptTool;

impl AptTool {
    /// Create a new apt tool
    pub fn new() -> Self {
        Self
    }

    fn dl_limit(rate_limit: &str) -> String {
        format!("-oAcquire::http::Dl-Limit={}", rate_limit)
    }

    /// Run apt-get with output streamed to `output`
    async fn apt_get(&self, args: &[&str], output: ToolOutput) -> AptFetchResult<ToolExit> {
        debug!("Executing: apt-get {:?}", args);

        let status = Command::new("apt-get")
            .args(args)
            .env("DEBIAN_FRONTEND", "noninteractive")
            .stdin(Stdio::null())
            .stdout(output.stdout)
            .stderr(output.stderr)
            .status()
            .await
            .map_err(|e| AptFetchError::command_failed(format!("apt-get {}", args.join(" ")), e))?;

        Ok(ToolExit {
            code: status.code(),
        })
    }

    /// Execute a dpkg helper and capture its output
    async fn exec(&self, program: &str, args: &[&str]) -> AptFetchResult<std::process::Output> {
        debug!("Executing: {} {:?}", program, args);

        Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| AptFetchError::command_failed(format!("{} {:?}", program, args), e))
    }
}

impl Default for AptTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PackageTool for AptTool {
    async fn refresh_index(&self, rate_limit: &str, output: ToolOutput) -> AptFetchResult<ToolExit> {
        let limit = Self::dl_limit(rate_limit);
        self.apt_get(&["update", &limit], output).await
    }

    async fn download_upgrades(
        &self,
        rate_limit: &str,
        output: ToolOutput,
    ) -> AptFetchResult<ToolExit> {
        let limit = Self::dl_limit(rate_limit);
        self.apt_get(
            &["dist-upgrade", "-y", "--quiet", "--download-only", &limit],
            output,
        )
        .await
    }

    async fn archive_metadata(&self, archive: &Path) -> AptFetchResult<ArchiveMetadata> {
        let path = archive.to_string_lossy();
        let output = self
            .exec(
                "dpkg-deb",
                &["--show", "--showformat=${Package}\t${Version}\n", &path],
            )
            .await
            .map_err(|e| AptFetchError::MetadataExtraction {
                archive: archive.to_path_buf(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AptFetchError::MetadataExtraction {
                archive: archive.to_path_buf(),
                reason: stderr.trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_show_output(&stdout).ok_or_else(|| AptFetchError::MetadataExtraction {
            archive: archive.to_path_buf(),
            reason: format!("unexpected dpkg-deb output: {}", stdout.trim()),
        })
    }

    async fn installed_version(&self, package: &str) -> AptFetchResult<Option<String>> {
        let output = self
            .exec("dpkg-query", &["-W", "-f=${Status}\t${Version}", package])
            .await?;

        // dpkg-query exits non-zero for packages it has never heard of
        if !output.status.success() {
            return Ok(None);
        }

        Ok(parse_query_output(&String::from_utf8_lossy(&output.stdout)))
    }

    fn tool_name(&self) -> &'static str {
        "apt"
    }
}

/// Parse `name\tversion` from `dpkg-deb --show`
fn parse_show_output(stdout: &str) -> Option<ArchiveMetadata> {
    let line = stdout.lines().next()?;
    let (name, version) = line.split_once('\t')?;
    let (name, version) = (name.trim(), version.trim());
    if name.is_empty() || version.is_empty() {
        return None;
    }
    Some(ArchiveMetadata {
        name: name.to_string(),
        version: version.to_string(),
    })
}

/// Parse `status\tversion` from `dpkg-query -W`
///
/// Packages that are only remembered (removed, config-files) still report a
/// version, so the status must end in `installed`.
fn parse_query_output(stdout: &str) -> Option<String> {
    let (status, version) = stdout.trim_end_matches('\n').split_once('\t')?;
    let version = version.trim();
    if status.split_whitespace().last() != Some("installed") || version.is_empty() {
        return None;
    }
    Some(version.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_show_output_valid() {
        let meta = parse_show_output("curl\t7.88.1-10+deb12u5\n").unwrap();
        assert_eq!(meta.name, "curl");
        assert_eq!(meta.version, "7.88.1-10+deb12u5");
    }

    #[test]
    fn parse_show_output_garbage() {
        assert!(parse_show_output("").is_none());
        assert!(parse_show_output("no tab here").is_none());
        assert!(parse_show_output("\t1.0").is_none());
    }

    #[test]
    fn parse_query_output_installed() {
        assert_eq!(
            parse_query_output("install ok installed\t1:2.38-4"),
            Some("1:2.38-4".to_string())
        );
    }

    #[test]
    fn parse_query_output_not_installed() {
        assert_eq!(parse_query_output("deinstall ok config-files\t1.0-1"), None);
        assert_eq!(parse_query_output("unknown ok not-installed\t"), None);
        assert_eq!(parse_query_output(""), None);
    }

    #[test]
    fn dl_limit_option() {
        assert_eq!(AptTool::dl_limit("56K"), "-oAcquire::http::Dl-Limit=56K");
    }
}
