//! Cross-process lock files.
//!
//! A holder creates `<name>.lock` with `create_new` and writes a token unique
//! to itself into it. A lock older than [`STALE_LOCK_AGE`] is taken to belong
//! to a crashed process. It is moved aside and deleted only if the moved file
//! still carries the token read when it was judged stale.

use std::fs::{self, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::sleep;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub(crate) const STALE_LOCK_AGE: Duration = Duration::from_secs(30);

const LOCK_RETRIES: u32 = 50;
const LOCK_RETRY_DELAY: Duration = Duration::from_millis(10);

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(0);

fn unique_token() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!(
        "{}-{nanos}-{}",
        std::process::id(),
        NEXT_TOKEN.fetch_add(1, Ordering::Relaxed)
    )
}

/// An exclusive lock file, removed on drop.
#[derive(Debug)]
pub(crate) struct LockFile {
    path: PathBuf,
    token: String,
}

impl LockFile {
    /// Take the lock at `path`. `Ok(None)` when another holder keeps it for
    /// the whole retry window.
    pub(crate) fn acquire(path: &Path) -> io::Result<Option<Self>> {
        for _ in 0..LOCK_RETRIES {
            match OpenOptions::new().write(true).create_new(true).open(path) {
                Ok(mut file) => {
                    let lock = Self {
                        path: path.to_path_buf(),
                        token: unique_token(),
                    };
                    file.write_all(lock.token.as_bytes())?;
                    return Ok(Some(lock));
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if !break_if_stale(path) {
                        sleep(LOCK_RETRY_DELAY);
                    }
                }
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        // A lock broken as stale may already belong to someone else.
        if fs::read_to_string(&self.path).is_ok_and(|held| held == self.token) {
            let _ = fs::remove_file(&self.path);
        }
    }
}

/// The token is read before the age check, so a lock replaced in between
/// shows up as fresh or as a token mismatch.
fn break_if_stale(path: &Path) -> bool {
    let Ok(token) = fs::read_to_string(path) else {
        return false;
    };
    if !is_stale(path) {
        return false;
    }
    tracing::warn!("breaking stale lock {}", path.display());
    remove_if_unchanged(path, &token)
}

fn is_stale(path: &Path) -> bool {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .is_some_and(|age| age > STALE_LOCK_AGE)
}

/// Delete the lock at `path` if it still holds `token`. A lock that was
/// replaced meanwhile is put back.
fn remove_if_unchanged(path: &Path, token: &str) -> bool {
    let aside = path.with_extension(format!("stale-{}", unique_token()));
    if fs::rename(path, &aside).is_err() {
        return false;
    }
    let moved = fs::read_to_string(&aside).unwrap_or_default();
    if moved == token {
        let _ = fs::remove_file(&aside);
        return true;
    }
    if let Err(e) = fs::hard_link(&aside, path) {
        tracing::warn!("could not restore live lock {}: {e}", path.display());
    }
    let _ = fs::remove_file(&aside);
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::{set_file_mtime, FileTime};
    use tempfile::TempDir;

    fn age(path: &Path, by: Duration) {
        let then = SystemTime::now() - by;
        set_file_mtime(path, FileTime::from_system_time(then)).unwrap();
    }

    #[test]
    fn dropping_lock_removes_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.lock");
        let lock = LockFile::acquire(&path).unwrap().expect("free lock");
        assert!(path.exists());
        drop(lock);
        assert!(!path.exists());
    }

    #[test]
    fn held_lock_times_out() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.lock");
        let _held = LockFile::acquire(&path).unwrap().expect("free lock");
        assert!(LockFile::acquire(&path).unwrap().is_none());
    }

    #[test]
    fn stale_lock_is_broken() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.lock");
        fs::write(&path, "crashed-holder").unwrap();
        age(&path, STALE_LOCK_AGE * 2);

        let lock = LockFile::acquire(&path).unwrap().expect("stale lock broken");
        assert_eq!(fs::read_to_string(&path).unwrap(), lock.token);
    }

    #[test]
    fn replaced_lock_is_restored_not_deleted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.lock");
        fs::write(&path, "new-holder").unwrap();

        assert!(!remove_if_unchanged(&path, "crashed-holder"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "new-holder");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn drop_leaves_a_lock_taken_over_by_another_holder() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.lock");
        let lock = LockFile::acquire(&path).unwrap().expect("free lock");
        fs::write(&path, "other-holder").unwrap();
        drop(lock);
        assert_eq!(fs::read_to_string(&path).unwrap(), "other-holder");
    }
}
