//! Recovery lock.
//!
//! ```text
//! <log_dir>/
//! ├─ __recovery_lock            # Advisory lock held while recovery runs
//! ├─ log000000000000.tokulog29
//! └─ log000000000001.tokulog29
//! ```
//!
//! The lock keeps two processes from recovering the same log directory at
//! once. It is an `fs2` advisory lock, so it is dropped by the OS if the
//! holder dies.

use crate::error::{CoreError, CoreResult};
use crate::wal::absolute_dir;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name of the lock file inside the log directory.
pub const RECOVERY_LOCK_FILE: &str = "__recovery_lock";

/// An exclusive lock on a log directory, released on drop.
///
/// # Example
///
/// ```rust,ignore
/// use ftlog_core::dir::RecoveryLock;
/// use std::path::Path;
///
/// let lock = RecoveryLock::acquire(Path::new("logs"))?;
/// // ... recover ...
/// drop(lock);
/// ```
#[derive(Debug)]
pub struct RecoveryLock {
    /// Lock file path.
    path: PathBuf,
    /// Lock file handle (held for exclusive access).
    _lock_file: File,
}

impl RecoveryLock {
    /// Acquires the lock of `log_dir`, creating the directory if missing.
    ///
    /// # Errors
    ///
    /// Returns `Locked` if another holder has it (this does not wait), or an
    /// I/O error.
    pub fn acquire(log_dir: &Path) -> CoreResult<Self> {
        let log_dir = absolute_dir(log_dir)?;
        fs::create_dir_all(&log_dir)?;

        let path = log_dir.join(RECOVERY_LOCK_FILE);
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(CoreError::Locked { path });
        }
        debug!(lock = %path.display(), "recovery lock acquired");

        Ok(Self {
            path,
            _lock_file: lock_file,
        })
    }

    /// Returns the lock file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RecoveryLock {
    fn drop(&mut self) {
        // Closing the handle releases the fs2 lock.
        debug!(lock = %self.path.display(), "recovery lock released");
    }
}
