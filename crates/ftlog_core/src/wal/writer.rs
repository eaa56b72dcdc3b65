//! Log writer.

use crate::config::{CursorOptions, WriterOptions};
use crate::error::{CoreError, CoreResult};
use crate::types::{Lsn, TxnId};
use crate::wal::codec::{encode_header, frame_record, LOG_HEADER_SIZE, LOG_VERSION};
use crate::wal::cursor::LogCursor;
use crate::wal::file_set::{absolute_dir, LogFileName, LogFileSet};
use crate::wal::record::{timestamp_now, LogRecord};
use ftlog_storage::{FileBackend, StorageBackend};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Appends records to a log directory.
///
/// The writer never reopens an existing file: it continues the LSN sequence
/// of the log it finds in a new file of its own.
#[derive(Debug)]
pub struct LogWriter {
    dir: PathBuf,
    options: WriterOptions,
    file: LogFileName,
    backend: FileBackend,
    last_lsn: Lsn,
}

impl LogWriter {
    /// Opens `dir` (creating it if missing) for appending.
    ///
    /// The newest existing record determines the next LSN; a torn tail is
    /// repaired on the way.
    ///
    /// # Errors
    ///
    /// Returns an error if the existing log cannot be read or the new file
    /// cannot be created.
    pub fn open(dir: &Path, options: WriterOptions) -> CoreResult<Self> {
        let dir = absolute_dir(dir)?;
        fs::create_dir_all(&dir)?;

        let mut cursor = LogCursor::create(&dir, CursorOptions::new())?;
        let last_lsn = match cursor.last() {
            Ok(entry) => entry.lsn,
            Err(CoreError::EndOfLog) => Lsn::ZERO,
            Err(e) => return Err(e),
        };
        let next_index = cursor.files().newest().map_or(0, |name| name.index + 1);
        drop(cursor);

        let file = LogFileName::new(next_index, LOG_VERSION);
        let backend = create_log_file(&dir, file)?;
        info!(dir = %dir.display(), file = %file, %last_lsn, "log writer opened");

        Ok(Self {
            dir,
            options,
            file,
            backend,
            last_lsn,
        })
    }

    /// Appends one record and returns the LSN assigned to it.
    ///
    /// Moves on to a new file first if the current one has reached the
    /// rotation threshold.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn append(&mut self, record: &LogRecord) -> CoreResult<Lsn> {
        let size = self.backend.size()?;
        if size > LOG_HEADER_SIZE && size >= self.options.max_log_file_size {
            self.rotate()?;
        }

        let lsn = self.last_lsn.next();
        let data = frame_record(record.record_type().as_byte(), lsn, &record.encode_fields());
        self.backend.append(&data)?;
        if self.options.sync_on_write {
            self.backend.sync()?;
        }
        self.last_lsn = lsn;
        Ok(lsn)
    }

    /// Syncs the current file and starts the next one.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync or the file creation fails.
    pub fn rotate(&mut self) -> CoreResult<()> {
        self.backend.sync()?;
        let next = LogFileName::new(self.file.index + 1, LOG_VERSION);
        self.backend = create_log_file(&self.dir, next)?;
        debug!(from = %self.file, to = %next, "log rotated");
        self.file = next;
        Ok(())
    }

    /// Syncs everything written so far.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync fails.
    pub fn fsync(&mut self) -> CoreResult<()> {
        self.backend.flush()?;
        self.backend.sync()?;
        Ok(())
    }

    /// LSN of the last record written, or of the last record found when
    /// the writer was opened.
    #[must_use]
    pub fn last_lsn(&self) -> Lsn {
        self.last_lsn
    }

    /// Name of the file currently written.
    #[must_use]
    pub fn current_file(&self) -> LogFileName {
        self.file
    }

    /// Returns the log directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Appends a clean-shutdown marker and syncs.
    ///
    /// # Errors
    ///
    /// Returns an error if the write or sync fails.
    pub fn shutdown(&mut self, last_xid: TxnId) -> CoreResult<Lsn> {
        let lsn = self.append(&LogRecord::Shutdown {
            timestamp: timestamp_now(),
            last_xid,
        })?;
        self.fsync()?;
        Ok(lsn)
    }

    /// Deletes the log files whose records all have an LSN below `lsn`.
    ///
    /// The file being written is never deleted. Empty files older than a
    /// deleted file go with it. Returns the number of files removed.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be read or removed.
    pub fn trim(&mut self, lsn: Lsn) -> CoreResult<usize> {
        let files = LogFileSet::scan(&self.dir)?;
        let candidates: Vec<usize> = (0..files.len())
            .filter(|&i| files.names()[i] != self.file)
            .collect();

        let mut firsts = Vec::with_capacity(files.len());
        for index in 0..files.len() {
            firsts.push(first_lsn(&files, index)?);
        }

        // A file only holds LSNs below `lsn` if the next file with records
        // starts at or below it.
        let mut cut = None;
        for &index in &candidates {
            if firsts[index].is_none() {
                continue;
            }
            let next_first = firsts[index + 1..].iter().flatten().next().copied();
            match next_first {
                Some(next) if next <= lsn => cut = Some(index),
                _ => break,
            }
        }

        let Some(cut) = cut else {
            return Ok(0);
        };
        let mut removed = 0;
        for &index in candidates.iter().filter(|&&i| i <= cut) {
            let path = files.path(index);
            fs::remove_file(&path)?;
            debug!(file = %path.display(), "trimmed log file");
            removed += 1;
        }
        info!(%lsn, removed, "log trimmed");
        Ok(removed)
    }
}

fn create_log_file(dir: &Path, name: LogFileName) -> CoreResult<FileBackend> {
    let mut backend = FileBackend::create_new(&dir.join(name.format()))?;
    backend.append(&encode_header(LOG_VERSION))?;
    backend.sync()?;
    Ok(backend)
}

fn first_lsn(files: &LogFileSet, index: usize) -> CoreResult<Option<Lsn>> {
    let name = files.names()[index].format();
    let mut cursor = LogCursor::create_for_single_file(files.dir(), &name, CursorOptions::new())?;
    match cursor.first() {
        Ok(entry) => Ok(Some(entry.lsn)),
        Err(CoreError::EndOfLog) => Ok(None),
        Err(e) => Err(e),
    }
}
