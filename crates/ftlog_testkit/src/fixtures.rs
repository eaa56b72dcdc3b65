//! Test fixtures for log directories.
//!
//! Records can go through the real [`LogWriter`], or files can be laid out
//! by hand when a test needs something the writer never produces: chosen
//! LSNs, gaps, empty files or an old format version.

use ftlog_core::wal::{encode_header, LogCursor, LogEntry, LogFileName, LogRecord, LOG_VERSION};
use ftlog_core::{CoreError, CursorOptions, LogWriter, Lsn, RecoveryConfig, WriterOptions};
use ftlog_storage::{FileBackend, StorageBackend};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A temporary log directory with automatic cleanup.
pub struct LogFixture {
    dir: TempDir,
}

impl Default for LogFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl LogFixture {
    /// Creates an empty log directory.
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Returns the log directory.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// A data directory next to the log, for dictionaries.
    pub fn data_dir(&self) -> PathBuf {
        self.dir.path().join("data")
    }

    /// Recovery configuration over this log and [`LogFixture::data_dir`].
    pub fn recovery_config(&self) -> RecoveryConfig {
        RecoveryConfig::new(self.path(), self.data_dir())
    }

    /// Opens a writer with default options.
    pub fn writer(&self) -> LogWriter {
        self.writer_with(WriterOptions::new())
    }

    /// Opens a writer with `options`.
    pub fn writer_with(&self, options: WriterOptions) -> LogWriter {
        LogWriter::open(self.path(), options).expect("Failed to open log writer")
    }

    /// Appends `records` through a fresh writer and syncs. Returns the LSNs
    /// assigned.
    pub fn write(&self, records: Vec<LogRecord>) -> Vec<Lsn> {
        let mut writer = self.writer();
        let lsns = records
            .iter()
            .map(|record| writer.append(record).expect("Failed to append record"))
            .collect();
        writer.fsync().expect("Failed to sync log");
        lsns
    }

    /// Writes a log file with index `index` holding exactly `entries`.
    pub fn write_file(&self, index: u64, entries: &[LogEntry]) -> PathBuf {
        self.write_file_with_version(index, LOG_VERSION, entries)
    }

    /// Like [`LogFixture::write_file`], with the header claiming `version`.
    pub fn write_file_with_version(&self, index: u64, version: u32, entries: &[LogEntry]) -> PathBuf {
        let path = self.file_path(index, version);
        let mut backend = FileBackend::create_new(&path).expect("Failed to create log file");
        backend
            .append(&encode_header(version))
            .expect("Failed to write header");
        for entry in entries {
            backend.append(&entry.encode()).expect("Failed to write entry");
        }
        backend.sync().expect("Failed to sync log file");
        path
    }

    /// Creates an empty log file: header only, or zero bytes.
    pub fn empty_file(&self, index: u64, with_header: bool) -> PathBuf {
        if with_header {
            return self.write_file(index, &[]);
        }
        let path = self.file_path(index, LOG_VERSION);
        FileBackend::create_new(&path).expect("Failed to create log file");
        path
    }

    /// Path of the log file with `index` and `version`.
    pub fn file_path(&self, index: u64, version: u32) -> PathBuf {
        self.path().join(LogFileName::new(index, version).format())
    }

    /// Names of the log files present, oldest first.
    pub fn log_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<(LogFileName, PathBuf)> = std::fs::read_dir(self.path())
            .expect("Failed to read log directory")
            .filter_map(|e| e.ok())
            .filter_map(|e| {
                let name = LogFileName::parse(e.file_name().to_str()?)?;
                Some((name, e.path()))
            })
            .collect();
        files.sort();
        files.into_iter().map(|(_, path)| path).collect()
    }

    /// Opens a cursor over the log.
    pub fn cursor(&self) -> LogCursor {
        LogCursor::create(self.path(), CursorOptions::new()).expect("Failed to create cursor")
    }

    /// Every entry, oldest first.
    pub fn forward_entries(&self) -> Vec<LogEntry> {
        drain(&mut self.cursor(), LogCursor::next)
    }

    /// Every entry, newest first.
    pub fn backward_entries(&self) -> Vec<LogEntry> {
        drain(&mut self.cursor(), LogCursor::prev)
    }

    /// LSNs of every entry, oldest first.
    pub fn forward_lsns(&self) -> Vec<u64> {
        self.forward_entries().iter().map(|e| e.lsn.as_u64()).collect()
    }

    /// LSNs of every entry, newest first.
    pub fn backward_lsns(&self) -> Vec<u64> {
        self.backward_entries().iter().map(|e| e.lsn.as_u64()).collect()
    }
}

fn drain(
    cursor: &mut LogCursor,
    step: fn(&mut LogCursor) -> Result<&LogEntry, CoreError>,
) -> Vec<LogEntry> {
    let mut entries = Vec::new();
    loop {
        match step(cursor) {
            Ok(entry) => entries.push(entry.clone()),
            Err(CoreError::EndOfLog) => return entries,
            Err(e) => panic!("log scan failed: {e}"),
        }
    }
}

/// Builds an entry with an explicit LSN.
pub fn entry(lsn: u64, record: LogRecord) -> LogEntry {
    LogEntry {
        lsn: Lsn::new(lsn),
        record,
    }
}

/// Comment entries with consecutive LSNs starting at `first_lsn`.
pub fn comments(first_lsn: u64, texts: &[&str]) -> Vec<LogEntry> {
    texts
        .iter()
        .zip(first_lsn..)
        .map(|(text, lsn)| {
            entry(
                lsn,
                LogRecord::Comment {
                    timestamp: 0,
                    comment: text.as_bytes().to_vec(),
                },
            )
        })
        .collect()
}

/// The text of a comment entry.
pub fn comment_text(entry: &LogEntry) -> Option<String> {
    match &entry.record {
        LogRecord::Comment { comment, .. } => Some(String::from_utf8_lossy(comment).into_owned()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hand_written_files_read_back() {
        let log = LogFixture::new();
        log.empty_file(0, false);
        log.write_file(1, &comments(1, &["a", "b"]));
        log.empty_file(2, true);

        assert_eq!(log.log_files().len(), 3);
        assert_eq!(log.forward_lsns(), vec![1, 2]);
        assert_eq!(log.backward_lsns(), vec![2, 1]);
        let texts: Vec<_> = log.forward_entries().iter().filter_map(comment_text).collect();
        assert_eq!(texts, vec!["a", "b"]);
    }

    #[test]
    fn writer_continues_hand_written_log() {
        let log = LogFixture::new();
        log.write_file(0, &comments(10, &["x"]));
        let lsns = log.write(vec![LogRecord::comment("y")]);
        assert_eq!(lsns, vec![Lsn::new(11)]);
    }
}
