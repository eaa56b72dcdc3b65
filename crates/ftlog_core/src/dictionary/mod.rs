//! Dictionaries: the data files log records mutate.
//!
//! Recovery only needs a small surface of a data file: apply a logged
//! mutation (once), undo it, and finalize the file header on close. The
//! [`Dictionary`] trait is that surface; [`DictionaryStore`] opens, creates
//! and removes dictionaries by internal file name (`iname`).

mod frame;
mod store;

pub use frame::{FrameDictionary, DICTIONARY_HEADER_SIZE, DICTIONARY_MAGIC};
pub use store::{DirectoryStore, MemoryStore};

use crate::error::CoreResult;
use crate::types::Lsn;
use std::fmt;

/// The application update function used by `enq_update` and
/// `enq_updatebroadcast`: `(key, old value, extra) -> new value`, where
/// `None` deletes the row.
pub type UpdateFn<'a> = &'a dyn Fn(&[u8], Option<&[u8]>, &[u8]) -> Option<Vec<u8>>;

/// The value a key had, `None` if it was absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowImage {
    /// Row key.
    pub key: Vec<u8>,
    /// Row value, `None` for no row.
    pub value: Option<Vec<u8>>,
}

/// A change to a dictionary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Insert a row.
    Insert {
        /// Row key.
        key: Vec<u8>,
        /// Row value.
        value: Vec<u8>,
        /// Replace an existing row (otherwise keep it).
        overwrite: bool,
    },
    /// Delete a row if present.
    Delete {
        /// Row key.
        key: Vec<u8>,
    },
    /// Run the update function on one key.
    Update {
        /// Row key.
        key: Vec<u8>,
        /// Update argument.
        extra: Vec<u8>,
    },
    /// Run the update function on every row.
    UpdateBroadcast {
        /// Update argument.
        extra: Vec<u8>,
    },
    /// Replace the descriptor.
    ChangeDescriptor {
        /// Descriptor expected before the change.
        old: Vec<u8>,
        /// Descriptor after the change.
        new: Vec<u8>,
    },
    /// Put rows back the way they were.
    Restore {
        /// Images to restore.
        rows: Vec<RowImage>,
    },
}

/// A data file as seen by recovery.
pub trait Dictionary: fmt::Debug {
    /// Internal file name.
    fn iname(&self) -> &str;

    /// Highest LSN applied to this dictionary.
    fn applied_lsn(&self) -> Lsn;

    /// Looks up a row.
    fn get(&self, key: &[u8]) -> Option<&[u8]>;

    /// Number of rows.
    fn len(&self) -> usize;

    /// Returns true if the dictionary holds no row.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current descriptor.
    fn descriptor(&self) -> &[u8];

    /// Applies the mutation logged at `lsn` and returns the mutation that
    /// undoes it (`None` if nothing changed).
    ///
    /// Applying an LSN that is already part of the dictionary changes
    /// nothing and returns the undo recorded when it was first applied, so
    /// replay after a crash still knows how to roll it back.
    ///
    /// # Errors
    ///
    /// Returns an error if the change cannot be written.
    fn apply(&mut self, lsn: Lsn, mutation: &Mutation, update: UpdateFn<'_>)
        -> CoreResult<Option<Mutation>>;

    /// Applies an undo mutation returned by [`Dictionary::apply`] as step
    /// `step` of the abort logged at `abort_lsn`.
    ///
    /// A step the dictionary already holds is skipped and `false` returned,
    /// so replaying an abort a second time cannot clobber rows written by
    /// later transactions.
    ///
    /// # Errors
    ///
    /// Returns an error if the change cannot be written.
    fn undo(&mut self, abort_lsn: Lsn, step: u32, mutation: &Mutation) -> CoreResult<bool>;

    /// Finalizes the header at `lsn` and syncs.
    ///
    /// # Errors
    ///
    /// Returns an error if the header cannot be written.
    fn close(&mut self, lsn: Lsn) -> CoreResult<()>;
}

/// Opens dictionaries by internal file name.
pub trait DictionaryStore {
    /// Opens `iname`.
    ///
    /// With `must_create` a fresh, empty dictionary is created (replacing
    /// any file of that name). Without it a missing file yields `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be read.
    fn open(&mut self, iname: &str, must_create: bool) -> CoreResult<Option<Box<dyn Dictionary>>>;

    /// Returns true if `iname` exists.
    fn exists(&self, iname: &str) -> bool;

    /// Removes `iname`. Returns false if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be removed.
    fn remove(&mut self, iname: &str) -> CoreResult<bool>;
}
