use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::debug;

use crate::errors::ServiceError;

/// Exclusive advisory lock guarding a read-modify-write span on a ledger
/// file. Requests are independent processes, so the lock is taken on a
/// sibling `<name>.lock` file rather than in memory.
///
/// Readers do not take the lock; a reader racing a writer may observe the
/// previous snapshot, which is the accepted consistency window. The lock
/// releases on drop.
#[derive(Debug)]
pub struct LedgerLock {
    file: File,
    path: PathBuf,
}

impl LedgerLock {
    /// Blocks until the exclusive lock on `target`'s sibling lock file is
    /// held. Creates the parent directory and the lock file as needed.
    pub fn acquire(target: &Path) -> Result<Self, ServiceError> {
        let path = Self::lock_path(target);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&path)?;
        file.lock_exclusive()?;
        debug!(lock = %path.display(), "Acquired ledger lock");
        Ok(Self { file, path })
    }

    fn lock_path(target: &Path) -> PathBuf {
        let mut name = target
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "ledger".into());
        name.push(".lock");
        target.with_file_name(name)
    }
}

impl Drop for LedgerLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
        debug!(lock = %self.path.display(), "Released ledger lock");
    }
}
