//! File numbers to open dictionaries.

use crate::dictionary::{Dictionary, DictionaryStore};
use crate::error::{CoreError, CoreResult};
use crate::types::{FileNum, Lsn};
use std::collections::BTreeMap;
use tracing::debug;

/// A dictionary opened during replay.
#[derive(Debug)]
pub struct FileMapEntry {
    /// File number the log refers to it by.
    pub filenum: FileNum,
    /// Internal file name.
    pub iname: String,
    /// Tree flags from the opening record.
    pub treeflags: u32,
    /// Remove the file when it is closed.
    pub unlink_on_close: bool,
    /// The open dictionary.
    pub dictionary: Box<dyn Dictionary>,
}

impl FileMapEntry {
    /// Closes the dictionary at `lsn`, removing the file if it was marked
    /// for deletion.
    ///
    /// # Errors
    ///
    /// Returns an error if the header cannot be written or the file cannot
    /// be removed.
    pub fn close(mut self, lsn: Lsn, store: &mut dyn DictionaryStore) -> CoreResult<()> {
        self.dictionary.close(lsn)?;
        let Self {
            filenum,
            iname,
            unlink_on_close,
            dictionary,
            ..
        } = self;
        drop(dictionary);
        if unlink_on_close {
            store.remove(&iname)?;
        }
        debug!(%filenum, %iname, %lsn, unlink_on_close, "dictionary closed");
        Ok(())
    }
}

/// The dictionaries open during replay, by file number.
#[derive(Debug, Default)]
pub struct FileMap {
    entries: BTreeMap<FileNum, FileMapEntry>,
}

impl FileMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an open dictionary.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` if `filenum` is already mapped. Replay
    /// opens each file at most once before closing it, so this is a bug,
    /// not a log condition.
    pub fn insert(
        &mut self,
        filenum: FileNum,
        treeflags: u32,
        dictionary: Box<dyn Dictionary>,
    ) -> CoreResult<&mut FileMapEntry> {
        if self.entries.contains_key(&filenum) {
            return Err(CoreError::invalid_operation(format!(
                "{filenum} is already open"
            )));
        }
        let entry = FileMapEntry {
            filenum,
            iname: dictionary.iname().to_string(),
            treeflags,
            unlink_on_close: false,
            dictionary,
        };
        debug!(%filenum, iname = %entry.iname, "dictionary opened");
        Ok(self.entries.entry(filenum).or_insert(entry))
    }

    /// Looks up a file number.
    #[must_use]
    pub fn find(&self, filenum: FileNum) -> Option<&FileMapEntry> {
        self.entries.get(&filenum)
    }

    /// Looks up a file number for mutation.
    pub fn find_mut(&mut self, filenum: FileNum) -> Option<&mut FileMapEntry> {
        self.entries.get_mut(&filenum)
    }

    /// Returns true if `filenum` is mapped.
    #[must_use]
    pub fn contains(&self, filenum: FileNum) -> bool {
        self.entries.contains_key(&filenum)
    }

    /// Removes a mapping without closing it.
    pub fn remove(&mut self, filenum: FileNum) -> Option<FileMapEntry> {
        self.entries.remove(&filenum)
    }

    /// Number of open dictionaries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is open.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates in file-number order.
    pub fn iter(&self) -> impl Iterator<Item = &FileMapEntry> {
        self.entries.values()
    }

    /// Closes every dictionary at `lsn` and empties the map. Returns how
    /// many were closed.
    ///
    /// # Errors
    ///
    /// Stops at the first dictionary that fails to close.
    pub fn close_all(&mut self, lsn: Lsn, store: &mut dyn DictionaryStore) -> CoreResult<usize> {
        let entries = std::mem::take(&mut self.entries);
        let count = entries.len();
        for entry in entries.into_values() {
            entry.close(lsn, store)?;
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::MemoryStore;

    fn open(store: &mut MemoryStore, iname: &str) -> Box<dyn Dictionary> {
        store.open(iname, true).unwrap().unwrap()
    }

    #[test]
    fn insert_find_remove() {
        let mut store = MemoryStore::new();
        let mut map = FileMap::new();
        map.insert(FileNum::new(3), 0, open(&mut store, "a.ft")).unwrap();

        assert_eq!(map.find(FileNum::new(3)).unwrap().iname, "a.ft");
        assert!(map.find(FileNum::new(4)).is_none());

        let entry = map.remove(FileNum::new(3)).unwrap();
        assert_eq!(entry.filenum, FileNum::new(3));
        assert!(map.is_empty());
    }

    #[test]
    fn duplicate_insert_fails_fast() {
        let mut store = MemoryStore::new();
        let mut map = FileMap::new();
        map.insert(FileNum::new(1), 0, open(&mut store, "a.ft")).unwrap();
        let err = map
            .insert(FileNum::new(1), 0, open(&mut store, "b.ft"))
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidOperation { .. }));
        assert_eq!(map.find(FileNum::new(1)).unwrap().iname, "a.ft");
    }

    #[test]
    fn close_all_finalizes_and_unlinks() {
        let mut store = MemoryStore::new();
        let mut map = FileMap::new();
        map.insert(FileNum::new(1), 0, open(&mut store, "keep.ft")).unwrap();
        map.insert(FileNum::new(2), 0, open(&mut store, "gone.ft"))
            .unwrap()
            .unlink_on_close = true;

        assert_eq!(map.close_all(Lsn::new(42), &mut store).unwrap(), 2);
        assert!(map.is_empty());
        assert_eq!(store.inames(), vec!["keep.ft".to_string()]);
        let kept = store.open_frame("keep.ft").unwrap().unwrap();
        assert_eq!(kept.closed_lsn(), Lsn::new(42));
    }
}
