//! Advisory cross-process lock guarding the registry file.
//!
//! The lock lives on a sidecar file rather than the registry itself: every
//! write replaces the registry by rename, which would leave a lock held on the
//! old inode behind.

use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

/// Lock mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Many readers at once
    Shared,
    /// A single writer, no readers
    Exclusive,
}

/// RAII guard for a held registry lock; released on drop.
#[derive(Debug)]
pub struct RegistryLock {
    file: File,
    path: PathBuf,
    mode: LockMode,
}

impl RegistryLock {
    /// Block until the lock on `path` is held in `mode`.
    ///
    /// The lock file is created if missing and never deleted.
    pub fn acquire(path: &Path, mode: LockMode) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        match mode {
            LockMode::Shared => FileExt::lock_shared(&file)?,
            LockMode::Exclusive => FileExt::lock_exclusive(&file)?,
        }
        tracing::trace!(path = %path.display(), ?mode, "Acquired registry lock");

        Ok(Self {
            file,
            path: path.to_path_buf(),
            mode,
        })
    }
}

impl Drop for RegistryLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to release registry lock");
            return;
        }
        tracing::trace!(path = %self.path.display(), mode = ?self.mode, "Released registry lock");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_exclusive_blocks_other_handles() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("instances.lock");

        let guard = RegistryLock::acquire(&path, LockMode::Exclusive).unwrap();

        let (tx, rx) = mpsc::channel();
        let contender_path = path.clone();
        let contender = std::thread::spawn(move || {
            let _guard = RegistryLock::acquire(&contender_path, LockMode::Exclusive).unwrap();
            tx.send(()).unwrap();
        });

        // Still blocked while the first guard is alive
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());

        drop(guard);
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        contender.join().unwrap();
    }

    #[test]
    fn test_shared_locks_coexist() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("instances.lock");

        let _a = RegistryLock::acquire(&path, LockMode::Shared).unwrap();
        let _b = RegistryLock::acquire(&path, LockMode::Shared).unwrap();
    }
}
