//! Crash simulation for log files.
//!
//! A crash in the middle of an append leaves the newest log file with a
//! partial record at its end. These helpers produce that state, and worse
//! ones, on files written by a fixture.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ftlog_testkit::prelude::*;
//!
//! let log = LogFixture::new();
//! let path = log.write_file(0, &comments(1, &["a", "b"]));
//! tear_tail(&path, 3);
//! assert_eq!(log.cursor().last().unwrap().lsn, Lsn::new(1));
//! ```

use ftlog_storage::{FileBackend, StorageBackend};
use std::path::Path;

/// Ways a crash can damage the end of a log file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailDamage {
    /// The last record was cut short by this many bytes.
    Torn(u64),
    /// Bytes of an unfinished record follow the last complete one.
    Garbage(usize),
    /// The last record's bytes are complete but one was flipped.
    FlippedByte,
}

/// Size of a file in bytes.
pub fn file_len(path: &Path) -> u64 {
    open(path).size().expect("Failed to stat log file")
}

/// Cuts the last `bytes` bytes off a file.
pub fn tear_tail(path: &Path, bytes: u64) {
    let mut backend = open(path);
    let size = backend.size().expect("Failed to stat log file");
    backend
        .truncate(size.saturating_sub(bytes))
        .expect("Failed to truncate log file");
}

/// Appends `len` bytes that do not form a record.
pub fn append_garbage(path: &Path, len: usize) {
    let mut backend = open(path);
    let garbage: Vec<u8> = (0..len).map(|i| 0xA5 ^ (i as u8)).collect();
    backend.append(&garbage).expect("Failed to append garbage");
    backend.sync().expect("Failed to sync log file");
}

/// Inverts the byte `from_end` bytes before the end of a file.
pub fn flip_byte_from_end(path: &Path, from_end: u64) {
    let mut backend = open(path);
    let size = backend.size().expect("Failed to stat log file");
    let offset = size
        .checked_sub(from_end)
        .expect("Offset lies before the start of the file");
    let byte = backend.read_at(offset, 1).expect("Failed to read byte")[0];
    backend
        .write_at(offset, &[!byte])
        .expect("Failed to write byte");
    backend.sync().expect("Failed to sync log file");
}

/// Applies `damage` to the end of a file.
pub fn damage_tail(path: &Path, damage: TailDamage) {
    match damage {
        TailDamage::Torn(bytes) => tear_tail(path, bytes),
        TailDamage::Garbage(len) => append_garbage(path, len),
        // Inside the CRC of the last record: header and footer lengths
        // still agree, so only the checksum catches it.
        TailDamage::FlippedByte => flip_byte_from_end(path, 6),
    }
}

fn open(path: &Path) -> FileBackend {
    FileBackend::open_existing(path).expect("Failed to open log file")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{comments, LogFixture};

    #[test]
    fn tear_and_garbage_change_length() {
        let log = LogFixture::new();
        let path = log.write_file(0, &comments(1, &["a"]));
        let len = file_len(&path);

        tear_tail(&path, 5);
        assert_eq!(file_len(&path), len - 5);
        append_garbage(&path, 9);
        assert_eq!(file_len(&path), len + 4);
    }

    #[test]
    fn flipped_byte_keeps_length() {
        let log = LogFixture::new();
        let path = log.write_file(0, &comments(1, &["a"]));
        let len = file_len(&path);
        damage_tail(&path, TailDamage::FlippedByte);
        assert_eq!(file_len(&path), len);
    }
}
