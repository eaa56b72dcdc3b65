//! Bidirectional cursor over a directory of log files.
//!
//! The cursor presents the files of a [`LogFileSet`] as one stream of
//! records. It keeps one file open and a read window over it, and sits on
//! the boundary between two records: a forward read consumes the record
//! after the boundary, a backward read the one before it.
//!
//! # Direction changes
//!
//! After a forward read the boundary is behind the returned record; after a
//! backward read it is in front of it. Reading in the other direction first
//! steps the boundary across the record already returned. That record always
//! lives in the open file, so the step never crosses a file boundary; any
//! crossing happens afterwards, on the read itself.
//!
//! # Errors
//!
//! - `EndOfLog` when a read runs off either end. The cursor is then
//!   unpositioned, so the next `next`/`prev` starts over like `first`/`last`.
//! - `BadFormat` for an unreadable header or record.
//! - `SequenceError` when `next`/`prev` returns a record whose LSN is not
//!   adjacent to the previous one.

use crate::config::CursorOptions;
use crate::error::{CoreError, CoreResult, Direction};
use crate::wal::codec::{checked_record_len, decode_header, LOG_HEADER_SIZE};
use crate::wal::file_set::LogFileSet;
use crate::wal::record::LogEntry;
use ftlog_storage::{FileBackend, StorageBackend};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};

/// Read window size.
const READ_BUFFER_SIZE: usize = 64 * 1024; // 64 KB

/// One open log file with a read window.
#[derive(Debug)]
struct OpenLog {
    index: usize,
    path: PathBuf,
    backend: FileBackend,
    size: u64,
    /// Record boundary the stream sits on.
    pos: u64,
    window_start: u64,
    window: Vec<u8>,
}

impl OpenLog {
    /// Opens a log file and validates its header. Zero-length files have no
    /// header and read as empty.
    fn open(path: PathBuf, index: usize, direction: Direction) -> CoreResult<Self> {
        let backend = FileBackend::open_existing(&path)?;
        let size = backend.size()?;

        if size > 0 {
            let header_len = size.min(LOG_HEADER_SIZE) as usize;
            let header = backend.read_at(0, header_len)?;
            decode_header(&header).map_err(|e| annotate(&path, 0, e))?;
        }

        let pos = match direction {
            Direction::Forward => LOG_HEADER_SIZE,
            Direction::Backward => size.max(LOG_HEADER_SIZE),
        };

        Ok(Self {
            index,
            path,
            backend,
            size,
            pos,
            window_start: 0,
            window: Vec::new(),
        })
    }

    /// Returns `len` bytes at `offset`, refilling the window towards the
    /// direction of travel when they are not already buffered.
    fn bytes(&mut self, offset: u64, len: usize, direction: Direction) -> CoreResult<&[u8]> {
        let end = offset + len as u64;
        let window_end = self.window_start + self.window.len() as u64;

        if offset < self.window_start || end > window_end {
            let span = len.max(READ_BUFFER_SIZE) as u64;
            let (start, stop) = match direction {
                Direction::Forward => (offset, offset.saturating_add(span).min(self.size)),
                Direction::Backward => (end.saturating_sub(span).max(LOG_HEADER_SIZE).min(offset), end),
            };
            self.window = self.backend.read_at(start, (stop - start) as usize)?;
            self.window_start = start;
        }

        let from = (offset - self.window_start) as usize;
        Ok(&self.window[from..from + len])
    }

    fn length_field(&mut self, offset: u64, direction: Direction) -> CoreResult<usize> {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(self.bytes(offset, 4, direction)?);
        checked_record_len(raw)
    }

    /// Reads the record after the boundary. `Ok(None)` at end of file.
    fn read_forward(&mut self) -> CoreResult<Option<(LogEntry, u64)>> {
        if self.pos >= self.size {
            return Ok(None);
        }
        let start = self.pos;
        let available = self.size - start;
        if available < 4 {
            return Err(self.corrupt(start, "truncated record length"));
        }

        let len = match self.length_field(start, Direction::Forward) {
            Ok(len) => len,
            Err(e) => return Err(annotate(&self.path, start, e)),
        };
        if len as u64 > available {
            return Err(self.corrupt(start, format!("record of {len} bytes runs past end of file")));
        }

        let decoded = LogEntry::decode(self.bytes(start, len, Direction::Forward)?);
        let entry = decoded.map_err(|e| annotate(&self.path, start, e))?;
        self.pos = start + len as u64;
        Ok(Some((entry, len as u64)))
    }

    /// Reads the record before the boundary. `Ok(None)` at start of file.
    fn read_backward(&mut self) -> CoreResult<Option<(LogEntry, u64)>> {
        if self.pos <= LOG_HEADER_SIZE {
            return Ok(None);
        }
        let end = self.pos;
        let available = end - LOG_HEADER_SIZE;
        if available < 4 {
            return Err(self.corrupt(end, "truncated record length"));
        }

        let len = match self.length_field(end - 4, Direction::Backward) {
            Ok(len) => len,
            Err(e) => return Err(annotate(&self.path, end - 4, e)),
        };
        if len as u64 > available {
            return Err(self.corrupt(end, format!("record of {len} bytes runs past start of file")));
        }

        let start = end - len as u64;
        let decoded = LogEntry::decode(self.bytes(start, len, Direction::Backward)?);
        let entry = decoded.map_err(|e| annotate(&self.path, start, e))?;
        self.pos = start;
        Ok(Some((entry, len as u64)))
    }

    fn corrupt(&self, offset: u64, message: impl Into<String>) -> CoreError {
        annotate(&self.path, offset, CoreError::bad_format(message))
    }
}

fn annotate(path: &Path, offset: u64, err: CoreError) -> CoreError {
    match err {
        CoreError::BadFormat { message } => CoreError::bad_format(format!(
            "{} at offset {offset}: {message}",
            path.display()
        )),
        other => other,
    }
}

/// Reads a whole file once into a scratch buffer to pull it into the page
/// cache.
fn prefetch(path: &Path) -> CoreResult<()> {
    let mut file = File::open(path)?;
    let mut scratch = vec![0u8; READ_BUFFER_SIZE];
    let mut total = 0u64;
    loop {
        let n = file.read(&mut scratch)?;
        if n == 0 {
            break;
        }
        total += n as u64;
    }
    trace!(file = %path.display(), bytes = total, "prefetched log file");
    Ok(())
}

#[derive(Debug)]
struct Current {
    entry: LogEntry,
    len: u64,
}

/// A cursor over every record of a log directory.
///
/// At most one entry is materialized at a time; reading the next one
/// replaces (and drops) the previous. Dropping the cursor closes the open
/// file.
///
/// # Example
///
/// ```no_run
/// use ftlog_core::wal::LogCursor;
/// use ftlog_core::CursorOptions;
/// use std::path::Path;
///
/// let mut cursor = LogCursor::create(Path::new("logs"), CursorOptions::new())?;
/// loop {
///     match cursor.next() {
///         Ok(entry) => println!("{} {}", entry.lsn, entry.record_type().name()),
///         Err(e) if e.is_end_of_log() => break,
///         Err(e) => return Err(e),
///     }
/// }
/// # Ok::<(), ftlog_core::CoreError>(())
/// ```
#[derive(Debug)]
pub struct LogCursor {
    files: LogFileSet,
    options: CursorOptions,
    prefetched: Vec<bool>,
    log: Option<OpenLog>,
    current: Option<Current>,
    last_direction: Option<Direction>,
}

impl LogCursor {
    /// Creates a cursor over every log file in `dir`. No file is opened yet.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the directory cannot be enumerated.
    pub fn create(dir: &Path, options: CursorOptions) -> CoreResult<Self> {
        Ok(Self::with_files(LogFileSet::scan(dir)?, options))
    }

    /// Creates a cursor over the one log file `file_name` in `dir`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the file does not exist.
    pub fn create_for_single_file(
        dir: &Path,
        file_name: &str,
        options: CursorOptions,
    ) -> CoreResult<Self> {
        Ok(Self::with_files(LogFileSet::single(dir, file_name)?, options))
    }

    fn with_files(files: LogFileSet, options: CursorOptions) -> Self {
        debug!(dir = %files.dir().display(), files = files.len(), "log cursor created");
        Self {
            prefetched: vec![false; files.len()],
            files,
            options,
            log: None,
            current: None,
            last_direction: None,
        }
    }

    /// Returns true if the directory holds at least one log file, whether
    /// or not any of them holds a record.
    #[must_use]
    pub fn log_exists(&self) -> bool {
        !self.files.is_empty()
    }

    /// Returns the files this cursor walks.
    #[must_use]
    pub fn files(&self) -> &LogFileSet {
        &self.files
    }

    /// Returns the entry last read, if the cursor is positioned.
    #[must_use]
    pub fn current(&self) -> Option<&LogEntry> {
        self.current.as_ref().map(|c| &c.entry)
    }

    /// Path of the file holding the current entry.
    #[must_use]
    pub fn current_file(&self) -> Option<&Path> {
        self.log.as_ref().map(|log| log.path.as_path())
    }

    /// Positions the cursor on the oldest record of the log.
    ///
    /// # Errors
    ///
    /// Returns `EndOfLog` if no file holds a record.
    pub fn first(&mut self) -> CoreResult<&LogEntry> {
        self.reset();
        for index in 0..self.files.len() {
            let mut log = self.open_log(index, Direction::Forward)?;
            if let Some((entry, len)) = log.read_forward()? {
                return Ok(self.install(log, entry, len, Direction::Forward));
            }
        }
        Err(CoreError::EndOfLog)
    }

    /// Positions the cursor on the newest record of the log.
    ///
    /// A torn record at the end of the newest file is cut off first: the
    /// file is truncated after its last readable record.
    ///
    /// # Errors
    ///
    /// Returns `EndOfLog` if no file holds a record and `BadFormat` if the
    /// newest file cannot be repaired.
    pub fn last(&mut self) -> CoreResult<&LogEntry> {
        self.reset();
        let newest = self.files.len().checked_sub(1);
        for index in (0..self.files.len()).rev() {
            let mut log = self.open_log(index, Direction::Backward)?;
            let read = match log.read_backward() {
                Err(e) if e.is_bad_format() && Some(index) == newest => {
                    warn!(file = %log.path.display(), error = %e, "bad log tail, repairing");
                    drop(log);
                    repair_tail(&self.files.path(index), e)?;
                    log = self.open_log(index, Direction::Backward)?;
                    log.read_backward()?
                }
                other => other?,
            };
            if let Some((entry, len)) = read {
                return Ok(self.install(log, entry, len, Direction::Backward));
            }
        }
        Err(CoreError::EndOfLog)
    }

    /// Reads the record after the current one, or the first record if the
    /// cursor is not positioned.
    ///
    /// # Errors
    ///
    /// Returns `EndOfLog` past the newest record and `SequenceError` if the
    /// record read does not have the next LSN.
    pub fn next(&mut self) -> CoreResult<&LogEntry> {
        self.step(Direction::Forward)
    }

    /// Reads the record before the current one, or the last record if the
    /// cursor is not positioned.
    ///
    /// # Errors
    ///
    /// Returns `EndOfLog` before the oldest record and `SequenceError` if the
    /// record read does not have the previous LSN.
    pub fn prev(&mut self) -> CoreResult<&LogEntry> {
        self.step(Direction::Backward)
    }

    fn step(&mut self, direction: Direction) -> CoreResult<&LogEntry> {
        let (Some(current), Some(mut log)) = (self.current.take(), self.log.take()) else {
            return match direction {
                Direction::Forward => self.first(),
                Direction::Backward => self.last(),
            };
        };

        if self.last_direction != Some(direction) {
            match direction {
                Direction::Forward => log.pos += current.len,
                Direction::Backward => log.pos -= current.len,
            }
        }

        let prev_lsn = current.entry.lsn.as_u64();
        drop(current);

        let (entry, len) = match self.read_across(log, direction) {
            Ok(Some((log, entry, len))) => {
                let expected = match direction {
                    Direction::Forward => prev_lsn.saturating_add(1),
                    Direction::Backward => prev_lsn.saturating_sub(1),
                };
                if entry.lsn.as_u64() != expected {
                    self.reset();
                    return Err(CoreError::SequenceError {
                        direction,
                        expected,
                        actual: entry.lsn.as_u64(),
                    });
                }
                self.log = Some(log);
                (entry, len)
            }
            Ok(None) => {
                self.reset();
                return Err(CoreError::EndOfLog);
            }
            Err(e) => {
                self.reset();
                return Err(e);
            }
        };

        self.last_direction = Some(direction);
        Ok(&self.current.insert(Current { entry, len }).entry)
    }

    /// Reads one record from `log`, moving through neighbouring files (and
    /// past empty ones) when `log` is exhausted.
    fn read_across(
        &mut self,
        mut log: OpenLog,
        direction: Direction,
    ) -> CoreResult<Option<(OpenLog, LogEntry, u64)>> {
        loop {
            let read = match direction {
                Direction::Forward => log.read_forward()?,
                Direction::Backward => log.read_backward()?,
            };
            if let Some((entry, len)) = read {
                return Ok(Some((log, entry, len)));
            }

            let index = match direction {
                Direction::Forward if log.index + 1 < self.files.len() => log.index + 1,
                Direction::Backward if log.index > 0 => log.index - 1,
                _ => return Ok(None),
            };
            trace!(from = log.index, to = index, %direction, "crossing log file boundary");
            log = self.open_log(index, direction)?;
        }
    }

    fn open_log(&mut self, index: usize, direction: Direction) -> CoreResult<OpenLog> {
        let path = self.files.path(index);
        if self.options.prefetch && !self.prefetched[index] {
            prefetch(&path)?;
            self.prefetched[index] = true;
        }
        OpenLog::open(path, index, direction)
    }

    fn install(&mut self, log: OpenLog, entry: LogEntry, len: u64, direction: Direction) -> &LogEntry {
        self.log = Some(log);
        self.last_direction = Some(direction);
        &self.current.insert(Current { entry, len }).entry
    }

    fn reset(&mut self) {
        self.log = None;
        self.current = None;
        self.last_direction = None;
    }
}

impl Drop for LogCursor {
    fn drop(&mut self) {
        trace!(dir = %self.files.dir().display(), "log cursor destroyed");
    }
}

/// Truncates a log file after its last record that reads cleanly forward.
///
/// `cause` is returned if the forward scan finds nothing to cut.
fn repair_tail(path: &Path, cause: CoreError) -> CoreResult<()> {
    let mut log = OpenLog::open(path.to_path_buf(), 0, Direction::Forward)?;
    let mut good = LOG_HEADER_SIZE;
    let mut records = 0u64;

    loop {
        match log.read_forward() {
            Ok(Some(_)) => {
                good = log.pos;
                records += 1;
            }
            Ok(None) => return Err(cause),
            Err(e) if e.is_bad_format() => break,
            Err(e) => return Err(e),
        }
    }

    if records == 0 {
        return Err(CoreError::bad_format(format!(
            "{}: no readable record, cannot repair",
            path.display()
        )));
    }

    warn!(
        file = %path.display(),
        from = log.size,
        to = good,
        records,
        "truncating torn log tail"
    );
    log.backend.truncate(good)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Lsn;
    use crate::wal::codec::{encode_header, LOG_VERSION};
    use crate::wal::file_set::LogFileName;
    use crate::wal::record::LogRecord;
    use std::fs;
    use tempfile::tempdir;

    fn comment(lsn: u64, text: &str) -> LogEntry {
        LogEntry {
            lsn: Lsn::new(lsn),
            record: LogRecord::Comment {
                timestamp: lsn,
                comment: text.as_bytes().to_vec(),
            },
        }
    }

    fn write_log(dir: &Path, index: u64, entries: &[LogEntry]) -> PathBuf {
        let path = dir.join(LogFileName::new(index, LOG_VERSION).format());
        let mut data = encode_header(LOG_VERSION).to_vec();
        for entry in entries {
            data.extend_from_slice(&entry.encode());
        }
        fs::write(&path, data).unwrap();
        path
    }

    fn lsn(entry: CoreResult<&LogEntry>) -> u64 {
        entry.unwrap().lsn.as_u64()
    }

    #[test]
    fn empty_directory() {
        let dir = tempdir().unwrap();
        let mut cursor = LogCursor::create(dir.path(), CursorOptions::new()).unwrap();
        assert!(!cursor.log_exists());
        assert!(cursor.next().unwrap_err().is_end_of_log());
        assert!(cursor.prev().unwrap_err().is_end_of_log());
    }

    #[test]
    fn forward_and_backward_within_one_file() {
        let dir = tempdir().unwrap();
        write_log(dir.path(), 0, &[comment(1, "a"), comment(2, "b"), comment(3, "c")]);

        let mut cursor = LogCursor::create(dir.path(), CursorOptions::new()).unwrap();
        assert!(cursor.log_exists());
        assert_eq!(lsn(cursor.next()), 1);
        assert_eq!(lsn(cursor.next()), 2);
        assert_eq!(lsn(cursor.next()), 3);
        assert!(cursor.next().unwrap_err().is_end_of_log());

        assert_eq!(lsn(cursor.prev()), 3);
        assert_eq!(lsn(cursor.prev()), 2);
        assert_eq!(lsn(cursor.prev()), 1);
        assert!(cursor.prev().unwrap_err().is_end_of_log());
    }

    #[test]
    fn reversal_mid_file() {
        let dir = tempdir().unwrap();
        write_log(dir.path(), 0, &[comment(1, "a"), comment(2, "b"), comment(3, "c")]);

        let mut cursor = LogCursor::create(dir.path(), CursorOptions::new()).unwrap();
        assert_eq!(lsn(cursor.first()), 1);
        assert_eq!(lsn(cursor.next()), 2);
        assert_eq!(lsn(cursor.prev()), 1);
        assert_eq!(lsn(cursor.next()), 2);
        assert_eq!(lsn(cursor.next()), 3);
        assert_eq!(lsn(cursor.prev()), 2);
    }

    #[test]
    fn reversal_at_file_boundaries() {
        let dir = tempdir().unwrap();
        write_log(dir.path(), 0, &[comment(1, "a"), comment(2, "b")]);
        write_log(dir.path(), 1, &[]);
        write_log(dir.path(), 2, &[comment(3, "c"), comment(4, "d")]);

        let mut cursor = LogCursor::create(dir.path(), CursorOptions::new()).unwrap();

        // Last record of a file, then back across the boundary.
        assert_eq!(lsn(cursor.first()), 1);
        assert_eq!(lsn(cursor.next()), 2);
        assert_eq!(lsn(cursor.next()), 3);
        assert_eq!(lsn(cursor.prev()), 2);
        assert_eq!(lsn(cursor.next()), 3);

        // First record of a file, reached backward, then forward again.
        assert_eq!(lsn(cursor.last()), 4);
        assert_eq!(lsn(cursor.prev()), 3);
        assert_eq!(lsn(cursor.prev()), 2);
        assert_eq!(lsn(cursor.next()), 3);
        assert_eq!(lsn(cursor.prev()), 2);
        assert_eq!(lsn(cursor.prev()), 1);
        assert!(cursor.prev().unwrap_err().is_end_of_log());
    }

    #[test]
    fn end_of_log_unpositions_cursor() {
        let dir = tempdir().unwrap();
        write_log(dir.path(), 0, &[comment(1, "a"), comment(2, "b")]);

        let mut cursor = LogCursor::create(dir.path(), CursorOptions::new()).unwrap();
        assert_eq!(lsn(cursor.last()), 2);
        assert!(cursor.next().unwrap_err().is_end_of_log());
        assert!(cursor.current().is_none());
        assert_eq!(lsn(cursor.next()), 1);
    }

    #[test]
    fn lsn_gap_is_sequence_error() {
        let dir = tempdir().unwrap();
        write_log(dir.path(), 0, &[comment(1, "a"), comment(2, "b"), comment(4, "d")]);

        let mut cursor = LogCursor::create(dir.path(), CursorOptions::new()).unwrap();
        assert_eq!(lsn(cursor.next()), 1);
        assert_eq!(lsn(cursor.next()), 2);
        match cursor.next() {
            Err(CoreError::SequenceError {
                direction: Direction::Forward,
                expected: 3,
                actual: 4,
            }) => {}
            other => panic!("unexpected {other:?}"),
        }

        assert_eq!(lsn(cursor.last()), 4);
        assert!(matches!(
            cursor.prev(),
            Err(CoreError::SequenceError {
                direction: Direction::Backward,
                ..
            })
        ));
    }

    #[test]
    fn unsupported_version_is_bad_format() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(LogFileName::new(0, 24).format());
        fs::write(&path, encode_header(24)).unwrap();

        let mut cursor = LogCursor::create(dir.path(), CursorOptions::new()).unwrap();
        assert!(cursor.first().unwrap_err().is_bad_format());
    }

    #[test]
    fn torn_tail_is_truncated() {
        let dir = tempdir().unwrap();
        let path = write_log(dir.path(), 0, &[comment(1, "a"), comment(2, "b")]);
        let good_len = fs::metadata(&path).unwrap().len();

        let mut torn = fs::read(&path).unwrap();
        torn.extend_from_slice(&comment(3, "c").encode()[..10]);
        fs::write(&path, torn).unwrap();

        let mut cursor = LogCursor::create(dir.path(), CursorOptions::new()).unwrap();
        assert_eq!(lsn(cursor.last()), 2);
        assert_eq!(fs::metadata(&path).unwrap().len(), good_len);

        assert_eq!(lsn(cursor.last()), 2);
        assert_eq!(fs::metadata(&path).unwrap().len(), good_len);
    }

    #[test]
    fn unrepairable_tail_is_bad_format() {
        let dir = tempdir().unwrap();
        let path = write_log(dir.path(), 0, &[]);
        let mut data = fs::read(&path).unwrap();
        data.extend_from_slice(b"garbage garbage garbage");
        fs::write(&path, data).unwrap();

        let mut cursor = LogCursor::create(dir.path(), CursorOptions::new()).unwrap();
        assert!(cursor.last().unwrap_err().is_bad_format());
    }

    #[test]
    fn prefetch_does_not_change_results() {
        let dir = tempdir().unwrap();
        write_log(dir.path(), 0, &[comment(1, "a")]);
        write_log(dir.path(), 1, &[comment(2, "b")]);

        let mut cursor =
            LogCursor::create(dir.path(), CursorOptions::new().prefetch(true)).unwrap();
        assert_eq!(lsn(cursor.last()), 2);
        assert_eq!(lsn(cursor.prev()), 1);
    }

    #[test]
    fn zero_length_files_are_skipped() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(LogFileName::new(0, LOG_VERSION).format()), b"").unwrap();
        write_log(dir.path(), 1, &[comment(1, "a")]);
        fs::write(dir.path().join(LogFileName::new(2, LOG_VERSION).format()), b"").unwrap();

        let mut cursor = LogCursor::create(dir.path(), CursorOptions::new()).unwrap();
        assert_eq!(lsn(cursor.first()), 1);
        assert_eq!(lsn(cursor.last()), 1);
    }

    #[test]
    fn single_file_cursor_sees_only_that_file() {
        let dir = tempdir().unwrap();
        write_log(dir.path(), 0, &[comment(1, "a")]);
        write_log(dir.path(), 1, &[comment(2, "b")]);

        let name = LogFileName::new(1, LOG_VERSION).format();
        let mut cursor =
            LogCursor::create_for_single_file(dir.path(), &name, CursorOptions::new()).unwrap();
        assert_eq!(lsn(cursor.first()), 2);
        assert!(cursor.next().unwrap_err().is_end_of_log());
    }
}
