//! Write-ahead log: file format, cursor and writer.
//!
//! ## Layout
//!
//! A log is a directory of files named `log{index:012}.tokulog{version}`.
//! Taken in index order they form one stream of records whose LSNs grow by
//! exactly one per record. Files may be empty (zero length or header only);
//! readers skip them.
//!
//! ```text
//! file:   | "tokulogg" | version u32 | record* |
//! record: | len u32 | tag u8 | lsn u64 | fields ... | crc32 u32 | len u32 |
//! ```
//!
//! ## Damage policy
//!
//! - **Torn tail** of the newest file: a crash mid-append leaves a partial
//!   record. [`LogCursor::last`] truncates the file after its last readable
//!   record and carries on.
//! - **Anything else** (bad magic, unsupported version, CRC mismatch inside
//!   the log, LSN gaps) is an error. Recovery must not run over it.

mod codec;
mod cursor;
mod file_set;
mod record;
mod writer;

pub use codec::{
    decode_header, encode_header, frame_record, unframe_record, FieldReader, FieldWriter,
    RawRecord, LOG_HEADER_SIZE, LOG_MAGIC, LOG_MIN_SUPPORTED_VERSION, LOG_VERSION,
    MAX_RECORD_LEN, RECORD_OVERHEAD,
};
pub use cursor::LogCursor;
pub use file_set::{absolute_dir, LogFileName, LogFileSet};
pub use record::{timestamp_now, LogEntry, LogRecord, LogRecordType, StillOpenInfo};
pub use writer::LogWriter;
