//! In-memory storage backend.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use std::sync::Arc;

/// An in-memory storage backend.
///
/// Handles created through [`InMemoryBackend::share`] see the same bytes, so
/// an in-memory dictionary can be closed and reopened without losing what was
/// written, the way a file would survive.
///
/// # Example
///
/// ```rust
/// use ftlog_storage::{StorageBackend, InMemoryBackend};
///
/// let mut backend = InMemoryBackend::new();
/// let reopened = backend.share();
/// backend.append(b"frame").unwrap();
/// assert_eq!(reopened.size().unwrap(), 5);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    data: Arc<RwLock<Vec<u8>>>,
}

impl InMemoryBackend {
    /// Creates a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new in-memory backend with pre-existing data.
    #[must_use]
    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            data: Arc::new(RwLock::new(data)),
        }
    }

    /// Returns another handle onto the same bytes.
    #[must_use]
    pub fn share(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
        }
    }

    /// Returns a copy of all data in the backend.
    #[must_use]
    pub fn data(&self) -> Vec<u8> {
        self.data.read().clone()
    }
}

impl StorageBackend for InMemoryBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let data = self.data.read();
        let size = data.len() as u64;
        let start = offset as usize;
        let end = start.saturating_add(len);

        if offset > size || end > data.len() {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }

        Ok(data[start..end].to_vec())
    }

    fn append(&mut self, new_data: &[u8]) -> StorageResult<u64> {
        let mut data = self.data.write();
        let offset = data.len() as u64;
        data.extend_from_slice(new_data);
        Ok(offset)
    }

    fn write_at(&mut self, offset: u64, bytes: &[u8]) -> StorageResult<()> {
        let mut data = self.data.write();
        let size = data.len() as u64;
        if offset > size {
            return Err(StorageError::WritePastEnd { offset, size });
        }

        let start = offset as usize;
        let end = start + bytes.len();
        if end > data.len() {
            data.resize(end, 0);
        }
        data[start..end].copy_from_slice(bytes);
        Ok(())
    }

    fn flush(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.data.read().len() as u64)
    }

    fn sync(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        let mut data = self.data.write();
        let size = data.len() as u64;

        if new_size > size {
            return Err(StorageError::TruncateBeyondEnd {
                requested: new_size,
                size,
            });
        }

        data.truncate(new_size as usize);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_is_empty() {
        let backend = InMemoryBackend::new();
        assert!(backend.is_empty().unwrap());
    }

    #[test]
    fn append_returns_offsets() {
        let mut backend = InMemoryBackend::new();
        assert_eq!(backend.append(b"hello").unwrap(), 0);
        assert_eq!(backend.append(b" world").unwrap(), 5);
        assert_eq!(backend.read_at(6, 5).unwrap(), b"world");
    }

    #[test]
    fn read_extending_past_end_fails() {
        let backend = InMemoryBackend::with_data(b"hello".to_vec());
        assert!(matches!(
            backend.read_at(3, 10),
            Err(StorageError::ReadPastEnd { .. })
        ));
    }

    #[test]
    fn shared_handles_see_writes() {
        let mut writer = InMemoryBackend::new();
        let reader = writer.share();

        writer.append(b"abcdef").unwrap();
        writer.write_at(2, b"XY").unwrap();
        assert_eq!(reader.data(), b"abXYef");

        writer.truncate(3).unwrap();
        assert_eq!(reader.size().unwrap(), 3);
    }

    #[test]
    fn write_at_rejects_holes() {
        let mut backend = InMemoryBackend::new();
        assert!(matches!(
            backend.write_at(1, b"x"),
            Err(StorageError::WritePastEnd { .. })
        ));
        backend.write_at(0, b"xy").unwrap();
        assert_eq!(backend.data(), b"xy");
    }

    #[test]
    fn truncate_to_larger_size_fails() {
        let mut backend = InMemoryBackend::with_data(b"hello".to_vec());
        assert!(matches!(
            backend.truncate(100),
            Err(StorageError::TruncateBeyondEnd { .. })
        ));
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Op {
            Append(Vec<u8>),
            WriteAt(u8, Vec<u8>),
            Truncate(u8),
        }

        fn op() -> impl Strategy<Value = Op> {
            let bytes = || prop::collection::vec(any::<u8>(), 0..16);
            prop_oneof![
                bytes().prop_map(Op::Append),
                (any::<u8>(), bytes()).prop_map(|(at, data)| Op::WriteAt(at, data)),
                any::<u8>().prop_map(Op::Truncate),
            ]
        }

        proptest! {
            #[test]
            fn behaves_like_a_vec(ops in prop::collection::vec(op(), 0..40)) {
                let mut backend = InMemoryBackend::new();
                let mut model: Vec<u8> = Vec::new();

                for op in ops {
                    match op {
                        Op::Append(data) => {
                            prop_assert_eq!(backend.append(&data).unwrap(), model.len() as u64);
                            model.extend_from_slice(&data);
                        }
                        Op::WriteAt(at, data) => {
                            let at = usize::from(at);
                            let result = backend.write_at(at as u64, &data);
                            if at > model.len() {
                                prop_assert!(result.is_err());
                            } else {
                                result.unwrap();
                                if at + data.len() > model.len() {
                                    model.resize(at + data.len(), 0);
                                }
                                model[at..at + data.len()].copy_from_slice(&data);
                            }
                        }
                        Op::Truncate(to) => {
                            let to = usize::from(to);
                            let result = backend.truncate(to as u64);
                            if to > model.len() {
                                prop_assert!(result.is_err());
                            } else {
                                result.unwrap();
                                model.truncate(to);
                            }
                        }
                    }
                    prop_assert_eq!(backend.data(), model.clone());
                }
            }
        }
    }
}
