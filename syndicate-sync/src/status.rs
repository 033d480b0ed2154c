//! Per-site status gate.
//!
//! A site is `idle` (or has never been touched) unless an operation holds it.
//! The gate moves a site out of `idle` with a single compare-and-set so two
//! concurrent pulls for the same site cannot both start, and hands back a
//! [`StatusLease`] that returns the site to `idle` on release or drop.
//!
//! File layout for [`FileStatusStore`]:
//!
//! ```text
//! ~/.syndicate/status/
//!   <site_id>.json   {"status": "pulling", "updated_at": "..."}
//!   <site_id>.lock   (present only while a transition is being written)
//! ```

use std::collections::HashMap;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use syndicate_core::{SiteId, SiteStatus};

use crate::error::{status_io, GateError, StatusError};
use crate::lock::LockFile;

// ---------------------------------------------------------------------------
// Store seam
// ---------------------------------------------------------------------------

/// Durable storage for per-site status values.
pub trait StatusStore: Send + Sync {
    /// `Ok(None)` when no status was ever written for the site.
    fn read(&self, site: SiteId) -> Result<Option<SiteStatus>, StatusError>;

    fn write(&self, site: SiteId, status: SiteStatus) -> Result<(), StatusError>;

    /// Atomically replace the status with `new` if it currently equals
    /// `expected`. An unset status matches `expected == Idle`.
    fn compare_and_set(
        &self,
        site: SiteId,
        expected: SiteStatus,
        new: SiteStatus,
    ) -> Result<bool, StatusError>;
}

fn matches_expected(current: Option<SiteStatus>, expected: SiteStatus) -> bool {
    current.unwrap_or(SiteStatus::Idle) == expected
}

/// In-process status store.
#[derive(Debug, Default)]
pub struct MemoryStatusStore {
    statuses: Mutex<HashMap<SiteId, SiteStatus>>,
}

impl MemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn statuses(&self) -> std::sync::MutexGuard<'_, HashMap<SiteId, SiteStatus>> {
        self.statuses.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl StatusStore for MemoryStatusStore {
    fn read(&self, site: SiteId) -> Result<Option<SiteStatus>, StatusError> {
        if !site.is_valid() {
            return Err(StatusError::InvalidSite);
        }
        Ok(self.statuses().get(&site).copied())
    }

    fn write(&self, site: SiteId, status: SiteStatus) -> Result<(), StatusError> {
        if !site.is_valid() {
            return Err(StatusError::InvalidSite);
        }
        self.statuses().insert(site, status);
        Ok(())
    }

    fn compare_and_set(
        &self,
        site: SiteId,
        expected: SiteStatus,
        new: SiteStatus,
    ) -> Result<bool, StatusError> {
        if !site.is_valid() {
            return Err(StatusError::InvalidSite);
        }
        let mut statuses = self.statuses();
        if !matches_expected(statuses.get(&site).copied(), expected) {
            return Ok(false);
        }
        statuses.insert(site, new);
        Ok(true)
    }
}

/// On-disk status record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusRecord {
    pub status: SiteStatus,
    pub updated_at: DateTime<Utc>,
}

/// Status store persisted as one JSON file per site under
/// `<home>/.syndicate/status/`. Transitions are serialized across processes
/// with an exclusive `<site>.lock` file.
#[derive(Debug, Clone)]
pub struct FileStatusStore {
    dir: PathBuf,
}

impl FileStatusStore {
    pub fn at(home: &Path) -> Self {
        Self {
            dir: home.join(".syndicate").join("status"),
        }
    }

    pub fn record_path(&self, site: SiteId) -> PathBuf {
        self.dir.join(format!("{site}.json"))
    }

    fn lock_path(&self, site: SiteId) -> PathBuf {
        self.dir.join(format!("{site}.lock"))
    }

    /// Full record including the time of the last transition.
    pub fn read_record(&self, site: SiteId) -> Result<Option<StatusRecord>, StatusError> {
        if !site.is_valid() {
            return Err(StatusError::InvalidSite);
        }
        let path = self.record_path(site);
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(status_io(&path, e)),
        };
        // An empty file is treated the same as no status at all.
        if contents.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&contents)?))
    }

    fn write_record(&self, site: SiteId, status: SiteStatus) -> Result<(), StatusError> {
        let record = StatusRecord {
            status,
            updated_at: Utc::now(),
        };
        let path = self.record_path(site);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(&record)?;
        std::fs::write(&tmp, json).map_err(|e| status_io(&tmp, e))?;
        if let Err(e) = std::fs::rename(&tmp, &path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(status_io(&path, e));
        }
        Ok(())
    }

    fn lock(&self, site: SiteId) -> Result<LockFile, StatusError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| status_io(&self.dir, e))?;
        let path = self.lock_path(site);
        LockFile::acquire(&path)
            .map_err(|e| status_io(&path, e))?
            .ok_or(StatusError::LockHeld { site })
    }
}

impl StatusStore for FileStatusStore {
    fn read(&self, site: SiteId) -> Result<Option<SiteStatus>, StatusError> {
        Ok(self.read_record(site)?.map(|r| r.status))
    }

    fn write(&self, site: SiteId, status: SiteStatus) -> Result<(), StatusError> {
        if !site.is_valid() {
            return Err(StatusError::InvalidSite);
        }
        let _lock = self.lock(site)?;
        self.write_record(site, status)
    }

    fn compare_and_set(
        &self,
        site: SiteId,
        expected: SiteStatus,
        new: SiteStatus,
    ) -> Result<bool, StatusError> {
        if !site.is_valid() {
            return Err(StatusError::InvalidSite);
        }
        let _lock = self.lock(site)?;
        if !matches_expected(self.read(site)?, expected) {
            return Ok(false);
        }
        self.write_record(site, new)?;
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// Gate
// ---------------------------------------------------------------------------

/// What the gate observed for a site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusReading {
    /// Site id zero, or the store could not be read.
    Unknown,
    /// Nothing stored yet.
    Unset,
    Status(SiteStatus),
}

impl StatusReading {
    /// A pull may start from an unset or idle site.
    pub fn allows_pull(self) -> bool {
        matches!(self, StatusReading::Unset | StatusReading::Status(SiteStatus::Idle))
    }
}

impl fmt::Display for StatusReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusReading::Unknown => f.write_str("unknown"),
            StatusReading::Unset => f.write_str("unset"),
            StatusReading::Status(status) => status.fmt(f),
        }
    }
}

/// Reads, writes and atomically claims per-site status.
#[derive(Clone)]
pub struct StatusGate {
    store: Arc<dyn StatusStore>,
}

impl fmt::Debug for StatusGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusGate").finish_non_exhaustive()
    }
}

impl StatusGate {
    pub fn new(store: Arc<dyn StatusStore>) -> Self {
        Self { store }
    }

    /// Current status. Never fails: an invalid site or an unreadable store
    /// reads as [`StatusReading::Unknown`], which blocks pulls.
    pub fn get_status(&self, site: SiteId) -> StatusReading {
        if !site.is_valid() {
            return StatusReading::Unknown;
        }
        match self.store.read(site) {
            Ok(Some(status)) => StatusReading::Status(status),
            Ok(None) => StatusReading::Unset,
            Err(e) => {
                tracing::warn!("could not read status for site {site}: {e}");
                StatusReading::Unknown
            }
        }
    }

    /// Persist a status given in any case or separator style.
    ///
    /// Returns `false` without writing when the site is zero, the status is
    /// empty or not one of the known slugs, or the store fails.
    pub fn set_status(&self, site: SiteId, status: &str) -> bool {
        if !site.is_valid() {
            return false;
        }
        let status: SiteStatus = match status.parse() {
            Ok(status) => status,
            Err(e) => {
                tracing::debug!("rejected status for site {site}: {e}");
                return false;
            }
        };
        match self.store.write(site, status) {
            Ok(()) => {
                tracing::info!("site {site}: status set to {status}");
                true
            }
            Err(e) => {
                tracing::warn!("could not write status for site {site}: {e}");
                false
            }
        }
    }

    /// Move the site from idle (or unset) to `status` in one atomic step.
    pub fn acquire(&self, site: SiteId, status: SiteStatus) -> Result<StatusLease, GateError> {
        if !site.is_valid() {
            return Err(GateError::Busy {
                site,
                reading: StatusReading::Unknown,
            });
        }
        if !self.store.compare_and_set(site, SiteStatus::Idle, status)? {
            return Err(GateError::Busy {
                site,
                reading: self.get_status(site),
            });
        }
        tracing::info!("site {site}: idle -> {status}");
        Ok(StatusLease {
            store: Arc::clone(&self.store),
            site,
            status,
            released: false,
        })
    }
}

/// A claimed site. Returns the site to `idle` on [`release`](Self::release)
/// or, failing that, on drop.
pub struct StatusLease {
    store: Arc<dyn StatusStore>,
    site: SiteId,
    status: SiteStatus,
    released: bool,
}

impl fmt::Debug for StatusLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusLease")
            .field("site", &self.site)
            .field("status", &self.status)
            .field("released", &self.released)
            .finish()
    }
}

impl StatusLease {
    pub fn site(&self) -> SiteId {
        self.site
    }

    pub fn status(&self) -> SiteStatus {
        self.status
    }

    /// Return the site to idle, reporting a store failure to the caller.
    /// On failure the lease is dropped unreleased, so drop retries once.
    pub fn release(mut self) -> Result<(), StatusError> {
        self.store.write(self.site, SiteStatus::Idle)?;
        self.released = true;
        tracing::info!("site {}: {} -> idle", self.site, self.status);
        Ok(())
    }
}

impl Drop for StatusLease {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        match self.store.write(self.site, SiteStatus::Idle) {
            Ok(()) => tracing::info!("site {}: {} -> idle (dropped)", self.site, self.status),
            Err(e) => tracing::warn!("site {}: failed to release {}: {e}", self.site, self.status),
        }
    }
}

/// Status store whose next `failures` writes fail with an I/O error.
#[cfg(test)]
pub(crate) struct FlakyStatusStore {
    inner: MemoryStatusStore,
    failures: Mutex<u32>,
}

#[cfg(test)]
impl FlakyStatusStore {
    pub(crate) fn new() -> Self {
        Self {
            inner: MemoryStatusStore::new(),
            failures: Mutex::new(0),
        }
    }

    pub(crate) fn fail_next_writes(&self, n: u32) {
        *self.failures.lock().unwrap() = n;
    }
}

#[cfg(test)]
impl StatusStore for FlakyStatusStore {
    fn read(&self, site: SiteId) -> Result<Option<SiteStatus>, StatusError> {
        self.inner.read(site)
    }

    fn write(&self, site: SiteId, status: SiteStatus) -> Result<(), StatusError> {
        {
            let mut left = self.failures.lock().unwrap();
            if *left > 0 {
                *left -= 1;
                return Err(status_io(
                    "status",
                    std::io::Error::new(ErrorKind::Other, "disk full"),
                ));
            }
        }
        self.inner.write(site, status)
    }

    fn compare_and_set(
        &self,
        site: SiteId,
        expected: SiteStatus,
        new: SiteStatus,
    ) -> Result<bool, StatusError> {
        self.inner.compare_and_set(site, expected, new)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    fn memory_gate() -> (Arc<MemoryStatusStore>, StatusGate) {
        let store = Arc::new(MemoryStatusStore::new());
        (store.clone(), StatusGate::new(store))
    }

    #[test]
    fn zero_site_reads_unknown() {
        let (_, gate) = memory_gate();
        assert_eq!(gate.get_status(SiteId(0)), StatusReading::Unknown);
        assert!(!gate.get_status(SiteId(0)).allows_pull());
    }

    #[test]
    fn unset_site_allows_pull() {
        let (_, gate) = memory_gate();
        let reading = gate.get_status(SiteId(3));
        assert_eq!(reading, StatusReading::Unset);
        assert!(reading.allows_pull());
    }

    #[rstest]
    #[case(" Processing ", SiteStatus::Processing)]
    #[case("PUSHING", SiteStatus::Pushing)]
    #[case("pulling", SiteStatus::Pulling)]
    #[case("Idle\n", SiteStatus::Idle)]
    fn set_status_normalizes_slug(#[case] raw: &str, #[case] expected: SiteStatus) {
        let (store, gate) = memory_gate();
        assert!(gate.set_status(SiteId(3), raw));
        assert_eq!(store.read(SiteId(3)).unwrap(), Some(expected));
    }

    #[test]
    fn set_status_rejects_empty_unknown_and_zero() {
        let (store, gate) = memory_gate();
        assert!(!gate.set_status(SiteId(3), ""));
        assert!(!gate.set_status(SiteId(3), "sleeping"));
        assert!(!gate.set_status(SiteId(0), "idle"));
        assert_eq!(store.read(SiteId(3)).unwrap(), None);
    }

    #[test]
    fn acquire_fails_when_busy_without_writing() {
        let (store, gate) = memory_gate();
        store.write(SiteId(3), SiteStatus::Pushing).unwrap();
        let err = gate.acquire(SiteId(3), SiteStatus::Pulling).unwrap_err();
        assert!(matches!(
            err,
            GateError::Busy { reading: StatusReading::Status(SiteStatus::Pushing), .. }
        ));
        assert_eq!(store.read(SiteId(3)).unwrap(), Some(SiteStatus::Pushing));
    }

    #[test]
    fn second_acquire_is_rejected_until_release() {
        let (_, gate) = memory_gate();
        let lease = gate.acquire(SiteId(3), SiteStatus::Pulling).expect("first");
        assert!(gate.acquire(SiteId(3), SiteStatus::Pulling).is_err());
        lease.release().expect("release");
        assert_eq!(gate.get_status(SiteId(3)), StatusReading::Status(SiteStatus::Idle));
        assert!(gate.acquire(SiteId(3), SiteStatus::Pulling).is_ok());
    }

    #[test]
    fn dropped_lease_returns_site_to_idle() {
        let (store, gate) = memory_gate();
        {
            let _lease = gate.acquire(SiteId(3), SiteStatus::Processing).unwrap();
            assert_eq!(store.read(SiteId(3)).unwrap(), Some(SiteStatus::Processing));
        }
        assert_eq!(store.read(SiteId(3)).unwrap(), Some(SiteStatus::Idle));
    }

    #[test]
    fn failed_release_is_retried_on_drop() {
        let store = Arc::new(FlakyStatusStore::new());
        let gate = StatusGate::new(store.clone());
        let lease = gate.acquire(SiteId(3), SiteStatus::Pulling).unwrap();

        store.fail_next_writes(1);
        assert!(matches!(lease.release(), Err(StatusError::Io { .. })));
        assert_eq!(store.read(SiteId(3)).unwrap(), Some(SiteStatus::Idle));
    }

    #[test]
    fn file_store_roundtrip_and_empty_file() {
        let home = TempDir::new().unwrap();
        let store = FileStatusStore::at(home.path());
        assert_eq!(store.read(SiteId(5)).unwrap(), None);

        store.write(SiteId(5), SiteStatus::Pulling).unwrap();
        assert_eq!(store.read(SiteId(5)).unwrap(), Some(SiteStatus::Pulling));

        std::fs::write(store.record_path(SiteId(5)), "").unwrap();
        assert_eq!(store.read(SiteId(5)).unwrap(), None);
    }

    #[test]
    fn file_store_cas_leaves_no_lock_behind() {
        let home = TempDir::new().unwrap();
        let store = FileStatusStore::at(home.path());
        assert!(store
            .compare_and_set(SiteId(5), SiteStatus::Idle, SiteStatus::Pulling)
            .unwrap());
        assert!(!store
            .compare_and_set(SiteId(5), SiteStatus::Idle, SiteStatus::Pulling)
            .unwrap());
        assert!(!store.lock_path(SiteId(5)).exists());
    }

    #[test]
    fn fresh_lock_held_elsewhere_blocks_transition() {
        let home = TempDir::new().unwrap();
        let store = FileStatusStore::at(home.path());
        std::fs::create_dir_all(&store.dir).unwrap();
        std::fs::write(store.lock_path(SiteId(5)), "").unwrap();

        let err = store
            .compare_and_set(SiteId(5), SiteStatus::Idle, SiteStatus::Pulling)
            .unwrap_err();
        assert!(matches!(err, StatusError::LockHeld { site } if site == SiteId(5)));
    }

    #[test]
    fn concurrent_acquire_admits_exactly_one() {
        let home = TempDir::new().unwrap();
        let gate = StatusGate::new(Arc::new(FileStatusStore::at(home.path())));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let gate = gate.clone();
                std::thread::spawn(move || {
                    // Leak successful leases so the winner keeps the site claimed.
                    gate.acquire(SiteId(9), SiteStatus::Pulling)
                        .map(std::mem::forget)
                        .is_ok()
                })
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }
}
