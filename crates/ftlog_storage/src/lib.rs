//! # ftlog storage
//!
//! Byte-store backends for ftlog.
//!
//! Backends are **opaque byte stores**: they know nothing about log records,
//! checkpoints or dictionary frames. The log cursor uses them for positional
//! reads and tail truncation of log files, and the dictionary layer keeps its
//! frame files on top of them.
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For tests and throwaway dictionaries
//! - [`FileBackend`] - For persistent files using OS file APIs
//!
//! ## Example
//!
//! ```rust
//! use ftlog_storage::{StorageBackend, InMemoryBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"tokulogg").unwrap();
//! assert_eq!(backend.read_at(offset, 8).unwrap(), b"tokulogg");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
