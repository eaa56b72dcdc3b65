//! # ftlog Core
//!
//! Write-ahead log reading and crash recovery for a fractal-tree storage
//! engine.
//!
//! This crate provides:
//! - The log file format and a bidirectional [`LogCursor`] over a log
//!   directory, with torn-tail repair
//! - A [`LogWriter`] for appending, rotating and trimming log files
//! - The two-pass [`recover`] driver: a backward scan to the newest complete
//!   checkpoint, forward replay into dictionaries, resolution of running
//!   transactions and a fresh checkpoint
//! - The [`Dictionary`] surface recovery mutates, with file and memory
//!   backed stores
//!
//! ## Example
//!
//! ```no_run
//! use ftlog_core::{recover, DirectoryStore, NoopHooks, RecoveryConfig};
//!
//! let config = RecoveryConfig::new("/var/lib/engine/log", "/var/lib/engine/data");
//! let mut store = DirectoryStore::new(&config.data_dir)?;
//! let outcome = recover(&config, &mut store, &mut NoopHooks)?;
//! println!("replayed {} entries", outcome.entries_replayed);
//! # Ok::<(), ftlog_core::CoreError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod dictionary;
pub mod dir;
pub mod error;
pub mod recovery;
pub mod types;
pub mod wal;

pub use config::{CursorOptions, RecoveryConfig, WriterOptions};
pub use dictionary::{
    Dictionary, DictionaryStore, DirectoryStore, FrameDictionary, MemoryStore, Mutation, RowImage,
};
pub use dir::RecoveryLock;
pub use error::{CoreError, CoreResult, Direction};
pub use recovery::{
    needs_recovery, recover, CheckpointLsns, NoopHooks, PreparedTxn, RecoveryHooks,
    RecoveryOutcome,
};
pub use types::{BlockNum, FileNum, Lsn, TxnId, TxnIdPair, XaXid, TXNID_NONE};
pub use wal::{LogCursor, LogEntry, LogFileName, LogRecord, LogRecordType, LogWriter};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
