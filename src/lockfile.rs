//! Single-instance guard: a lock file so a periodic (cron or systemd-timer
//! driven) invocation never overlaps a still-running one.
//!
//! Uses an advisory OS lock (`fs2`) rather than a bare file-existence
//! check, so a crashed run doesn't leave a permanent false lock behind.

use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

#[derive(thiserror::Error, Debug)]
pub enum LockError {
    #[error("another run is already active (lock held at {0})")]
    AlreadyLocked(PathBuf),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Held for the lifetime of one supervisor run; releases the OS lock (and,
/// best-effort, removes the file) on drop so a panic still unlocks.
pub struct LockGuard {
    file: File,
    path: PathBuf,
}

impl LockGuard {
    pub fn acquire(path: impl AsRef<Path>) -> Result<Self, LockError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).write(true).open(&path)?;
        file.try_lock_exclusive().map_err(|_| LockError::AlreadyLocked(path.clone()))?;
        Ok(Self { file, path })
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = self.file.unlock();
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_fails_while_first_is_held() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wnm.lock");
        let guard = LockGuard::acquire(&path).unwrap();
        assert!(LockGuard::acquire(&path).is_err());
        drop(guard);
    }

    #[test]
    fn test_lock_is_reacquirable_after_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wnm.lock");
        {
            let _guard = LockGuard::acquire(&path).unwrap();
        }
        assert!(LockGuard::acquire(&path).is_ok());
    }
}
