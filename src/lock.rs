//! Single-instance lock for fetch runs
//!
//! The lock file holds the owning process id. A lock left behind by a
//! crashed run is reconciled by the next run: it is removed when its owner
//! is gone, its content is unreadable, or it is older than the staleness
//! threshold.
//!
//! # Reconciliation
//!
//! | Owner PID | Age | Verdict |
//! |-----------|-----|---------|
//! | alive | any | held, run aborts |
//! | dead or unparseable | > threshold | expired, removed |
//! | dead | <= threshold | stale, removed |
//! | unparseable | <= threshold | stale, removed |
//!
//! The lock file never exists without its PID: it is written to a private
//! staging file first and hard-linked into place. A stale lock is renamed
//! aside before deletion, so two runs reconciling the same stale lock cannot
//! delete each other's fresh one.

use crate::error::{AptFetchError, AptFetchResult};
use crate::history::LogStore;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

/// Answers whether a process id currently exists
pub trait ProcessProbe: Send + Sync {
    fn is_alive(&self, pid: u32) -> bool;
}

impl<F> ProcessProbe for F
where
    F: Fn(u32) -> bool + Send + Sync,
{
    fn is_alive(&self, pid: u32) -> bool {
        self(pid)
    }
}

/// Probe backed by the OS process table
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProbe;

impl ProcessProbe for SystemProbe {
    fn is_alive(&self, pid: u32) -> bool {
        is_pid_alive(pid)
    }
}

/// `kill(pid, 0)` existence check; `EPERM` still means the process exists
fn is_pid_alive(pid: u32) -> bool {
    if pid == 0 {
        return false;
    }
    let Ok(pid) = i32::try_from(pid) else {
        return false;
    };
    #[cfg(unix)]
    {
        // SAFETY: signal 0 performs the permission and existence checks
        // without delivering anything.
        let result = unsafe { libc::kill(pid, 0) };
        if result == 0 {
            return true;
        }
        std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
    }
    #[cfg(not(unix))]
    {
        let _ = pid;
        true
    }
}

/// What an existing lock file says about its owner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockRecord {
    /// Owner process id, `None` if the content is not a number
    pub pid: Option<u32>,
    /// Last modification time of the lock file
    pub modified: SystemTime,
}

impl LockRecord {
    /// Read the lock file at `path`
    pub fn read(path: &Path) -> std::io::Result<Self> {
        let modified = fs::metadata(path)?.modified()?;
        let pid = match fs::read_to_string(path) {
            Ok(content) => content.trim().parse().ok(),
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(e),
            Err(_) => None,
        };
        Ok(Self { pid, modified })
    }

    /// Age relative to `now`; a timestamp in the future counts as brand new
    pub fn age(&self, now: SystemTime) -> Duration {
        now.duration_since(self.modified).unwrap_or_default()
    }

    fn owner(&self) -> String {
        match self.pid {
            Some(pid) => format!("PID {}", pid),
            None => "unknown PID".to_string(),
        }
    }
}

/// Classification of an existing lock file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockVerdict {
    /// A live process owns the lock, however old it is
    Held(u32),
    /// No live owner and older than the staleness threshold
    Expired,
    /// The owning process no longer exists
    DeadOwner(u32),
    /// No owner could be read from the file
    UnknownOwner,
}

/// Decide whether `record` still guards a running fetch
pub fn judge(
    record: &LockRecord,
    now: SystemTime,
    stale_after: Duration,
    probe: &dyn ProcessProbe,
) -> LockVerdict {
    match record.pid {
        Some(pid) if probe.is_alive(pid) => LockVerdict::Held(pid),
        _ if record.age(now) > stale_after => LockVerdict::Expired,
        Some(pid) => LockVerdict::DeadOwner(pid),
        None => LockVerdict::UnknownOwner,
    }
}

/// Owns the lock file's lifecycle
pub struct LockManager {
    path: PathBuf,
    stale_after: Duration,
    probe: Box<dyn ProcessProbe>,
}

impl LockManager {
    /// Lock manager probing liveness through the OS
    pub fn new(path: impl Into<PathBuf>, stale_after: Duration) -> Self {
        Self {
            path: path.into(),
            stale_after,
            probe: Box::new(SystemProbe),
        }
    }

    /// Replace the liveness probe
    pub fn with_probe(mut self, probe: impl ProcessProbe + 'static) -> Self {
        self.probe = Box::new(probe);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a lock file currently exists, stale or not
    pub fn is_locked(&self) -> bool {
        self.path.exists()
    }

    /// Take the lock for this process
    ///
    /// An existing lock is reconciled first; stale locks are removed and
    /// noted in `log`. Fails with `AlreadyRunning` if a live process holds
    /// the lock, or `LockIo` if the lock file cannot be written.
    pub async fn acquire(&self, log: &LogStore) -> AptFetchResult<LockGuard> {
        let pid = std::process::id();

        match self.create_exclusive(pid) {
            Ok(()) => return Ok(self.guard(pid)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => self.reconcile(log).await?,
            Err(e) => return Err(AptFetchError::lock_io(&self.path, e)),
        }

        // The stale lock is gone. Losing the race for it to another process
        // means that process is now the running fetch.
        match self.create_exclusive(pid) {
            Ok(()) => Ok(self.guard(pid)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let holder = LockRecord::read(&self.path)
                    .map(|record| record.owner())
                    .unwrap_or_else(|_| "unknown PID".to_string());
                Err(AptFetchError::AlreadyRunning { holder })
            }
            Err(e) => Err(AptFetchError::lock_io(&self.path, e)),
        }
    }

    fn guard(&self, pid: u32) -> LockGuard {
        debug!("Acquired {} for PID {}", self.path.display(), pid);
        LockGuard {
            path: self.path.clone(),
            pid,
            released: false,
        }
    }

    /// Deal with an existing lock file: abort if held, remove if stale
    async fn reconcile(&self, log: &LogStore) -> AptFetchResult<()> {
        let record = match LockRecord::read(&self.path) {
            Ok(record) => record,
            // Released between our create attempt and now
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(AptFetchError::lock_io(&self.path, e)),
        };

        let now = SystemTime::now();
        let age = record.age(now);
        log.record(&format!("Found a lock file {} seconds old", age.as_secs()))
            .await;

        let verdict = judge(&record, now, self.stale_after, self.probe.as_ref());
        if let LockVerdict::Held(pid) = verdict {
            log.record(&format!(
                "Another instance of apt-fetch is already running with PID {}. Exiting.",
                pid
            ))
            .await;
            return Err(AptFetchError::AlreadyRunning {
                holder: record.owner(),
            });
        }

        warn!(
            "Removing stale lock {} ({:?}, {}s old)",
            self.path.display(),
            verdict,
            age.as_secs()
        );
        log.record(&format!(
            "Stale lock file found for {}. Removing.",
            record.owner()
        ))
        .await;

        self.take_over(&record)
    }

    /// Remove the lock judged stale as `judged`, and nothing newer
    ///
    /// The lock is renamed aside first. If what was moved is no longer the
    /// judged lock, another run replaced it in the meantime and it is linked
    /// back into place.
    fn take_over(&self, judged: &LockRecord) -> AptFetchResult<()> {
        let tombstone = self.sibling("stale");
        match fs::rename(&self.path, &tombstone) {
            Ok(()) => {}
            // Someone else already cleared it
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(AptFetchError::lock_io(&self.path, e)),
        }

        let moved = LockRecord::read(&tombstone).ok();
        if moved.as_ref() != Some(judged) {
            debug!(
                "Lock {} changed after it was judged stale, restoring it",
                self.path.display()
            );
            match fs::hard_link(&tombstone, &self.path) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
                Err(e) => warn!("Could not restore lock {}: {}", self.path.display(), e),
            }
        }

        if let Err(e) = fs::remove_file(&tombstone) {
            warn!("Could not remove {}: {}", tombstone.display(), e);
        }
        Ok(())
    }

    /// Atomically create the lock file containing `pid`
    ///
    /// Fails with `AlreadyExists` if any lock is present.
    fn create_exclusive(&self, pid: u32) -> std::io::Result<()> {
        let staging = self.sibling("new");
        let linked = write_synced(&staging, pid).and_then(|()| fs::hard_link(&staging, &self.path));
        if let Err(e) = fs::remove_file(&staging) {
            if e.kind() != ErrorKind::NotFound {
                warn!("Could not remove {}: {}", staging.display(), e);
            }
        }
        linked
    }

    /// A private file next to the lock, unique to this process and call
    fn sibling(&self, tag: &str) -> PathBuf {
        static SEQUENCE: AtomicU32 = AtomicU32::new(0);

        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "apt-fetch".to_string());
        self.path.with_file_name(format!(
            ".{}.{}.{}.{}",
            name,
            tag,
            std::process::id(),
            SEQUENCE.fetch_add(1, Ordering::Relaxed)
        ))
    }

    /// Remove the lock file unconditionally; a missing file is not an error
    pub fn release(&self) -> AptFetchResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!("Removed lock file {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AptFetchError::lock_io(&self.path, e)),
        }
    }
}

/// Proof of lock ownership; releases the lock when dropped
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
    pid: u32,
    released: bool,
}

impl LockGuard {
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Release the lock now, reporting any error
    pub fn release(mut self) -> AptFetchResult<()> {
        self.released = true;
        remove_if_owned(&self.path, self.pid).map_err(|e| AptFetchError::lock_io(&self.path, e))
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = remove_if_owned(&self.path, self.pid) {
            warn!("Could not release lock {}: {}", self.path.display(), e);
        }
    }
}

fn write_synced(path: &Path, pid: u32) -> std::io::Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)?;
    file.write_all(pid.to_string().as_bytes())?;
    file.sync_all()
}

/// Delete the lock only while it still names `pid`
///
/// After a long run the lock may have been judged stale and re-taken by
/// another process; that lock is not ours to delete.
fn remove_if_owned(path: &Path, pid: u32) -> std::io::Result<()> {
    let owner = match fs::read_to_string(path) {
        Ok(content) => content.trim().parse::<u32>().ok(),
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };

    if owner != Some(pid) {
        debug!("Lock {} now belongs to {:?}, leaving it", path.display(), owner);
        return Ok(());
    }

    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    const DAY: Duration = Duration::from_secs(86400);

    struct Fixture {
        _dir: TempDir,
        lock: PathBuf,
        log: LogStore,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let lock = dir.path().join("apt-fetch.lock");
        let log = LogStore::for_date(dir.path(), NaiveDate::from_ymd_opt(2026, 10, 17).unwrap());
        Fixture {
            _dir: dir,
            lock,
            log,
        }
    }

    fn write_lock(path: &Path, content: &str, age: Duration) {
        fs::write(path, content).unwrap();
        let file = OpenOptions::new().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - age).unwrap();
    }

    fn alive(_: u32) -> bool {
        true
    }

    fn dead(_: u32) -> bool {
        false
    }

    #[tokio::test]
    async fn acquire_without_existing_lock() {
        let f = fixture();
        let manager = LockManager::new(&f.lock, DAY).with_probe(dead);

        let guard = manager.acquire(&f.log).await.unwrap();

        let content = fs::read_to_string(&f.lock).unwrap();
        assert_eq!(content, std::process::id().to_string());
        assert_eq!(guard.pid(), std::process::id());
        guard.release().unwrap();
        assert!(!f.lock.exists());
        // Nothing to reconcile, nothing logged
        assert!(f.log.read_all().await.is_empty());
    }

    #[tokio::test]
    async fn young_lock_with_live_owner_is_already_running() {
        let f = fixture();
        write_lock(&f.lock, "4242", Duration::from_secs(60));
        let manager = LockManager::new(&f.lock, DAY).with_probe(alive);

        let err = manager.acquire(&f.log).await.unwrap_err();

        assert!(matches!(err, AptFetchError::AlreadyRunning { ref holder } if holder == "PID 4242"));
        assert_eq!(fs::read_to_string(&f.lock).unwrap(), "4242");
        let log = f.log.read_all().await.join("\n");
        assert!(log.contains("already running with PID 4242"));
    }

    #[tokio::test]
    async fn old_lock_with_live_owner_is_still_held() {
        let f = fixture();
        write_lock(&f.lock, "4242", DAY + Duration::from_secs(3600));
        let manager = LockManager::new(&f.lock, DAY).with_probe(alive);

        let err = manager.acquire(&f.log).await.unwrap_err();

        assert!(matches!(err, AptFetchError::AlreadyRunning { ref holder } if holder == "PID 4242"));
        assert_eq!(fs::read_to_string(&f.lock).unwrap(), "4242");
        let log = f.log.read_all().await.join("\n");
        assert!(log.contains("already running with PID 4242"));
        assert!(!log.contains("Stale lock file"));
    }

    #[tokio::test]
    async fn expired_lock_with_dead_owner_is_removed() {
        let f = fixture();
        write_lock(&f.lock, "4242", DAY + Duration::from_secs(3600));
        let manager = LockManager::new(&f.lock, DAY).with_probe(dead);

        let guard = manager.acquire(&f.log).await.unwrap();

        assert_eq!(fs::read_to_string(&f.lock).unwrap(), std::process::id().to_string());
        let log = f.log.read_all().await.join("\n");
        assert!(log.contains("Stale lock file found for PID 4242. Removing."));
        drop(guard);
        assert!(!f.lock.exists());
    }

    #[test]
    fn second_reconciler_keeps_the_first_ones_fresh_lock() {
        let f = fixture();
        write_lock(&f.lock, "4242", DAY + Duration::from_secs(3600));
        let first = LockManager::new(&f.lock, DAY).with_probe(dead);
        let second = LockManager::new(&f.lock, DAY).with_probe(dead);

        // Both runs read and judge the same stale lock
        let judged = LockRecord::read(&f.lock).unwrap();

        first.take_over(&judged).unwrap();
        first.create_exclusive(5151).unwrap();

        second.take_over(&judged).unwrap();

        assert_eq!(fs::read_to_string(&f.lock).unwrap(), "5151");
        let err = second.create_exclusive(6161).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
        assert_eq!(fs::read_to_string(&f.lock).unwrap(), "5151");
        assert_eq!(fs::read_dir(f.lock.parent().unwrap()).unwrap().count(), 1);
    }

    #[test]
    fn take_over_of_vanished_lock_is_a_no_op() {
        let f = fixture();
        write_lock(&f.lock, "4242", DAY);
        let judged = LockRecord::read(&f.lock).unwrap();
        fs::remove_file(&f.lock).unwrap();

        LockManager::new(&f.lock, DAY).take_over(&judged).unwrap();
        assert!(!f.lock.exists());
    }

    #[test]
    fn create_exclusive_never_clobbers_and_leaves_no_staging_files() {
        let f = fixture();
        let manager = LockManager::new(&f.lock, DAY);

        manager.create_exclusive(7).unwrap();
        assert_eq!(fs::read_to_string(&f.lock).unwrap(), "7");

        let err = manager.create_exclusive(8).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
        assert_eq!(fs::read_to_string(&f.lock).unwrap(), "7");

        let names: Vec<_> = fs::read_dir(f.lock.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("apt-fetch.lock")]);
    }

    #[tokio::test]
    async fn dead_owner_lock_is_removed() {
        let f = fixture();
        write_lock(&f.lock, "4242", Duration::from_secs(60));
        let manager = LockManager::new(&f.lock, DAY).with_probe(dead);

        let guard = manager.acquire(&f.log).await.unwrap();
        assert_eq!(fs::read_to_string(&f.lock).unwrap(), guard.pid().to_string());
    }

    #[tokio::test]
    async fn unparseable_lock_never_crashes() {
        let f = fixture();
        write_lock(&f.lock, "not a pid\n", Duration::from_secs(5));
        let manager = LockManager::new(&f.lock, DAY).with_probe(alive);

        let guard = manager.acquire(&f.log).await.unwrap();

        let log = f.log.read_all().await.join("\n");
        assert!(log.contains("Stale lock file found for unknown PID"));
        guard.release().unwrap();
    }

    #[tokio::test]
    async fn system_liveness_check_sees_this_process() {
        let f = fixture();
        write_lock(&f.lock, &std::process::id().to_string(), Duration::ZERO);
        let manager = LockManager::new(&f.lock, DAY);

        let err = manager.acquire(&f.log).await.unwrap_err();
        assert!(matches!(err, AptFetchError::AlreadyRunning { .. }));
        assert!(f.lock.exists());
    }

    #[tokio::test]
    async fn unwritable_lock_location_is_lock_io() {
        let f = fixture();
        let manager = LockManager::new(f.lock.join("missing-dir/lock"), DAY);

        let err = manager.acquire(&f.log).await.unwrap_err();
        assert!(matches!(err, AptFetchError::LockIo { .. }));
    }

    #[test]
    fn release_is_idempotent() {
        let f = fixture();
        let manager = LockManager::new(&f.lock, DAY);

        manager.release().unwrap();
        fs::write(&f.lock, "1").unwrap();
        manager.release().unwrap();
        assert!(!f.lock.exists());
        manager.release().unwrap();
    }

    #[tokio::test]
    async fn guard_leaves_foreign_lock_alone() {
        let f = fixture();
        let manager = LockManager::new(&f.lock, DAY).with_probe(dead);
        let guard = manager.acquire(&f.log).await.unwrap();

        // Another run judged us stale and took over
        fs::write(&f.lock, "999999").unwrap();
        guard.release().unwrap();

        assert_eq!(fs::read_to_string(&f.lock).unwrap(), "999999");
    }

    #[test]
    fn judge_table() {
        let now = SystemTime::now();
        let young = LockRecord {
            pid: Some(7),
            modified: now - Duration::from_secs(10),
        };
        let old = LockRecord {
            pid: Some(7),
            modified: now - Duration::from_secs(100),
        };
        let unknown = LockRecord {
            pid: None,
            modified: now,
        };
        let old_unknown = LockRecord {
            pid: None,
            modified: now - Duration::from_secs(100),
        };
        let limit = Duration::from_secs(50);

        assert_eq!(judge(&young, now, limit, &alive), LockVerdict::Held(7));
        assert_eq!(judge(&young, now, limit, &dead), LockVerdict::DeadOwner(7));
        assert_eq!(judge(&old, now, limit, &alive), LockVerdict::Held(7));
        assert_eq!(judge(&old, now, limit, &dead), LockVerdict::Expired);
        assert_eq!(judge(&unknown, now, limit, &alive), LockVerdict::UnknownOwner);
        assert_eq!(judge(&old_unknown, now, limit, &alive), LockVerdict::Expired);
    }

    #[test]
    fn future_mtime_counts_as_new() {
        let now = SystemTime::now();
        let record = LockRecord {
            pid: None,
            modified: now + Duration::from_secs(60),
        };
        assert_eq!(record.age(now), Duration::ZERO);
    }

    #[test]
    fn pid_zero_is_never_alive() {
        assert!(!is_pid_alive(0));
        assert!(is_pid_alive(std::process::id()));
    }
}
