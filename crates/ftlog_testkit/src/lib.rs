//! # ftlog Testkit
//!
//! Test utilities for ftlog.
//!
//! This crate provides:
//! - Log directory fixtures that write records through the real writer or
//!   lay out files by hand (empty files, LSN gaps, old versions)
//! - Crash helpers that tear or damage the tail of a log file
//! - Property-based generators for log records
//!
//! The cross-module test-suite lives in `tests/`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ftlog_testkit::prelude::*;
//!
//! #[test]
//! fn reads_back() {
//!     let log = LogFixture::new();
//!     log.write(vec![LogRecord::comment("hello")]);
//!     assert_eq!(log.forward_lsns(), vec![1]);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod crash;
pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::crash::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use ftlog_core::wal::{LogCursor, LogEntry, LogRecord};
    pub use ftlog_core::{CoreError, CursorOptions, Lsn};
}

pub use crash::*;
pub use fixtures::*;
pub use generators::*;
