//! Cached archive enumeration
//!
//! Walks the apt archive cache, reads each archive's declared name and
//! version, and checks whether exactly that version is installed. One bad
//! archive never stops the scan: it is reported with a sentinel record.

use crate::apt::PackageTool;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// File extension of package archives
pub const ARCHIVE_EXTENSION: &str = "deb";

/// Subdirectory apt downloads into before moving a finished archive
pub const PARTIAL_DIR: &str = "partial";

/// Name/version placeholder for archives whose metadata cannot be read
pub const NOT_AVAILABLE: &str = "Not available";

/// A cached archive and whether its exact version is installed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageRecord {
    /// Full path of the archive
    pub path: PathBuf,
    /// Archive file name
    pub filename: String,
    /// Declared package name
    pub name: String,
    /// Declared package version
    pub version: String,
    /// Installed version equals `version` (plain string comparison)
    pub installed: bool,
}

impl PackageRecord {
    fn unavailable(path: PathBuf) -> Self {
        Self {
            filename: file_name(&path),
            path,
            name: NOT_AVAILABLE.to_string(),
            version: NOT_AVAILABLE.to_string(),
            installed: false,
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Scans a cache directory through a package tool
pub struct CacheInspector<'a> {
    tool: &'a dyn PackageTool,
}

impl<'a> CacheInspector<'a> {
    pub fn new(tool: &'a dyn PackageTool) -> Self {
        Self { tool }
    }

    /// One record per archive under `dir`, ordered by path
    pub async fn scan(&self, dir: &Path) -> Vec<PackageRecord> {
        let archives = find_archives(dir).await;
        debug!("Inspecting {} archives in {}", archives.len(), dir.display());

        let mut records = Vec::with_capacity(archives.len());
        for archive in archives {
            records.push(self.inspect(archive).await);
        }
        records
    }

    async fn inspect(&self, path: PathBuf) -> PackageRecord {
        let metadata = match self.tool.archive_metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!("{}", e);
                return PackageRecord::unavailable(path);
            }
        };

        let installed = match self.tool.installed_version(&metadata.name).await {
            Ok(Some(version)) => version == metadata.version,
            Ok(None) => false,
            Err(e) => {
                warn!("Cannot query installed version of {}: {}", metadata.name, e);
                false
            }
        };

        PackageRecord {
            filename: file_name(&path),
            path,
            name: metadata.name,
            version: metadata.version,
            installed,
        }
    }
}

/// Every archive below `dir`, including apt's `partial/` download area
///
/// In-flight downloads count as archives but rarely have readable
/// metadata, so they end up as sentinel records and are never pruned.
/// Directories that vanish or cannot be read mid-walk are skipped.
pub async fn find_archives(dir: &Path) -> Vec<PathBuf> {
    let mut pending = vec![dir.to_path_buf()];
    let mut archives = Vec::new();

    while let Some(current) = pending.pop() {
        let mut entries = match fs::read_dir(&current).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Cache directory {} does not exist", current.display());
                continue;
            }
            Err(e) => {
                warn!("Cannot read {}: {}", current.display(), e);
                continue;
            }
        };

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!("Error listing {}: {}", current.display(), e);
                    break;
                }
            };

            let path = entry.path();
            let Ok(file_type) = entry.file_type().await else {
                continue;
            };

            if file_type.is_dir() {
                pending.push(path);
            } else if path.extension().is_some_and(|ext| ext == ARCHIVE_EXTENSION) {
                archives.push(path);
            }
        }
    }

    archives.sort();
    archives
}

/// Number of files in apt's `partial/` download area
pub async fn count_partial(dir: &Path) -> usize {
    let Ok(mut entries) = fs::read_dir(dir.join(PARTIAL_DIR)).await else {
        return 0;
    };

    let mut count = 0;
    while let Ok(Some(entry)) = entries.next_entry().await {
        if entry.file_type().await.is_ok_and(|t| t.is_file()) {
            count += 1;
        }
    }
    count
}
