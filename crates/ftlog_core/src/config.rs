//! Recovery, cursor and log writer configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Options for a [`LogCursor`](crate::wal::LogCursor).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CursorOptions {
    /// Read each log file once sequentially before the cursor first opens
    /// it, so the page cache is warm for the seeks of a backward scan.
    /// Has no effect on what the cursor returns.
    pub prefetch: bool,
}

impl CursorOptions {
    /// Creates options with prefetch disabled.
    #[must_use]
    pub const fn new() -> Self {
        Self { prefetch: false }
    }

    /// Sets whether log files are pre-read.
    #[must_use]
    pub const fn prefetch(mut self, value: bool) -> Self {
        self.prefetch = value;
        self
    }
}

/// Options for a [`LogWriter`](crate::wal::LogWriter).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriterOptions {
    /// Size at which the writer moves on to a new log file.
    pub max_log_file_size: u64,
    /// Whether to fsync after every appended record.
    pub sync_on_write: bool,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            max_log_file_size: 100 * 1024 * 1024, // 100 MB
            sync_on_write: false,
        }
    }
}

impl WriterOptions {
    /// Creates options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the rotation threshold.
    #[must_use]
    pub const fn max_log_file_size(mut self, size: u64) -> Self {
        self.max_log_file_size = size;
        self
    }

    /// Sets whether every append is synced.
    #[must_use]
    pub const fn sync_on_write(mut self, value: bool) -> Self {
        self.sync_on_write = value;
        self
    }
}

/// Configuration for a recovery run.
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    /// Directory holding the log files and the recovery lock.
    pub log_dir: PathBuf,

    /// Directory holding the dictionary files.
    pub data_dir: PathBuf,

    /// Run the passes even when the log ends with a clean shutdown.
    pub force_recovery: bool,

    /// How often a long replay reports progress.
    pub progress_interval: Duration,

    /// Pre-read log files before scanning them.
    pub prefetch_log_files: bool,

    /// Rotation threshold for records written during recovery.
    pub max_log_file_size: u64,

    /// Whether every record written during recovery is synced.
    pub sync_on_write: bool,
}

impl RecoveryConfig {
    /// Creates a configuration for the given log and data directories.
    #[must_use]
    pub fn new(log_dir: impl AsRef<Path>, data_dir: impl AsRef<Path>) -> Self {
        let writer = WriterOptions::default();
        Self {
            log_dir: log_dir.as_ref().to_path_buf(),
            data_dir: data_dir.as_ref().to_path_buf(),
            force_recovery: false,
            progress_interval: Duration::from_secs(15),
            prefetch_log_files: true,
            max_log_file_size: writer.max_log_file_size,
            sync_on_write: writer.sync_on_write,
        }
    }

    /// Sets whether recovery runs on a cleanly shut down log.
    #[must_use]
    pub const fn force_recovery(mut self, value: bool) -> Self {
        self.force_recovery = value;
        self
    }

    /// Sets the progress reporting interval.
    #[must_use]
    pub const fn progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Sets whether log files are pre-read.
    #[must_use]
    pub const fn prefetch_log_files(mut self, value: bool) -> Self {
        self.prefetch_log_files = value;
        self
    }

    /// Sets the log rotation threshold.
    #[must_use]
    pub const fn max_log_file_size(mut self, size: u64) -> Self {
        self.max_log_file_size = size;
        self
    }

    /// Sets whether every record written is synced.
    #[must_use]
    pub const fn sync_on_write(mut self, value: bool) -> Self {
        self.sync_on_write = value;
        self
    }

    /// Cursor options derived from this configuration.
    #[must_use]
    pub const fn cursor_options(&self) -> CursorOptions {
        CursorOptions::new().prefetch(self.prefetch_log_files)
    }

    /// Writer options derived from this configuration.
    #[must_use]
    pub const fn writer_options(&self) -> WriterOptions {
        WriterOptions {
            max_log_file_size: self.max_log_file_size,
            sync_on_write: self.sync_on_write,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_recovery_config() {
        let config = RecoveryConfig::new("logs", "data");
        assert!(!config.force_recovery);
        assert!(config.prefetch_log_files);
        assert_eq!(config.progress_interval, Duration::from_secs(15));
        assert_eq!(config.log_dir, PathBuf::from("logs"));
    }

    #[test]
    fn builder_pattern() {
        let config = RecoveryConfig::new("logs", "data")
            .force_recovery(true)
            .prefetch_log_files(false)
            .max_log_file_size(4096)
            .sync_on_write(true);

        assert!(config.force_recovery);
        assert!(!config.cursor_options().prefetch);
        assert_eq!(config.writer_options().max_log_file_size, 4096);
        assert!(config.writer_options().sync_on_write);
    }
}
