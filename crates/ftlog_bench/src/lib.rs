//! Benchmark utilities.

use ftlog_core::{FileNum, LogRecord, LogWriter, TxnIdPair, WriterOptions};
use std::path::Path;

/// Deterministic payload bytes of the given size.
pub fn payload(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 251) as u8).collect()
}

/// An insert record with a `key_size` key and `value_size` value.
pub fn insert_record(seq: u64, key_size: usize, value_size: usize) -> LogRecord {
    let mut key = payload(key_size);
    let seq_bytes = seq.to_be_bytes();
    let n = key.len().min(seq_bytes.len());
    key[..n].copy_from_slice(&seq_bytes[seq_bytes.len() - n..]);
    LogRecord::EnqInsert {
        filenum: FileNum::new(1),
        xid: TxnIdPair::root(1 + seq / 100),
        key,
        value: payload(value_size),
    }
}

/// Writes `count` insert records into `dir`, rotating at `max_file_size`.
pub fn populate_log(dir: &Path, count: u64, value_size: usize, max_file_size: u64) {
    let options = WriterOptions::new().max_log_file_size(max_file_size);
    let mut writer = LogWriter::open(dir, options).expect("open writer");
    for seq in 0..count {
        writer
            .append(&insert_record(seq, 16, value_size))
            .expect("append record");
    }
    writer.fsync().expect("sync log");
}
