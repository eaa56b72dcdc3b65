//! Checkpoints taken at the end of recovery.

use crate::error::CoreResult;
use crate::recovery::file_map::FileMap;
use crate::recovery::txn::{TxnState, TxnTable};
use crate::types::{BlockNum, Lsn, TxnId, TxnIdPair};
use crate::wal::{timestamp_now, LogRecord, LogWriter, StillOpenInfo};
use tracing::info;

/// LSNs of a checkpoint's begin and end records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckpointLsns {
    /// Begin record.
    pub begin: Lsn,
    /// End record.
    pub end: Lsn,
}

/// Persists a checkpoint of the recovered state.
pub trait Checkpointer {
    /// Records the open files and running transactions so a later
    /// recovery can start here.
    ///
    /// # Errors
    ///
    /// Returns an error if the checkpoint cannot be made durable.
    fn checkpoint(&mut self, files: &FileMap, txns: &TxnTable, last_xid: TxnId)
        -> CoreResult<CheckpointLsns>;
}

/// Writes checkpoints into the log and trims what they make obsolete.
#[derive(Debug)]
pub struct LogCheckpointer<'a> {
    writer: &'a mut LogWriter,
}

impl<'a> LogCheckpointer<'a> {
    /// Creates a checkpointer appending through `writer`.
    pub fn new(writer: &'a mut LogWriter) -> Self {
        Self { writer }
    }
}

impl Checkpointer for LogCheckpointer<'_> {
    fn checkpoint(
        &mut self,
        files: &FileMap,
        txns: &TxnTable,
        last_xid: TxnId,
    ) -> CoreResult<CheckpointLsns> {
        // The begin record opens a fresh file so trimming at it keeps
        // nothing older.
        self.writer.rotate()?;
        let begin = self.writer.append(&LogRecord::BeginCheckpoint {
            timestamp: timestamp_now(),
            last_xid,
        })?;

        let mut num_fassociate = 0u32;
        for entry in files.iter() {
            self.writer.append(&LogRecord::Fassociate {
                filenum: entry.filenum,
                treeflags: entry.treeflags,
                iname: entry.iname.clone(),
                unlink_on_close: entry.unlink_on_close,
            })?;
            num_fassociate += 1;
        }

        let mut num_xstillopen = 0u32;
        for (_, txn) in txns.iter() {
            let info = txn.rollback_info.clone().unwrap_or_else(empty_info);
            let record = match (&txn.state, &txn.xa_xid) {
                (TxnState::Preparing, Some(xa_xid)) => LogRecord::XStillOpenPrepared {
                    xid: txn.xid,
                    xa_xid: xa_xid.clone(),
                    info,
                },
                _ => LogRecord::XStillOpen {
                    xid: txn.xid,
                    parentxid: txn
                        .parent
                        .and_then(|p| txns.at(p))
                        .map_or(TxnIdPair::NONE, |parent| parent.xid),
                    info,
                },
            };
            self.writer.append(&record)?;
            num_xstillopen += 1;
        }

        let end = self.writer.append(&LogRecord::EndCheckpoint {
            lsn_begin_checkpoint: begin,
            timestamp: timestamp_now(),
            num_fassociate_entries: num_fassociate,
            num_xstillopen_entries: num_xstillopen,
        })?;
        self.writer.fsync()?;
        let trimmed = self.writer.trim(begin)?;

        info!(%begin, %end, num_fassociate, num_xstillopen, trimmed, "checkpoint taken");
        Ok(CheckpointLsns { begin, end })
    }
}

fn empty_info() -> StillOpenInfo {
    StillOpenInfo {
        spilled_rollback_head: BlockNum::NONE,
        spilled_rollback_tail: BlockNum::NONE,
        current_rollback: BlockNum::NONE,
        ..StillOpenInfo::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CursorOptions, WriterOptions};
    use crate::dictionary::{DictionaryStore, MemoryStore};
    use crate::types::{FileNum, XaXid};
    use crate::wal::{LogCursor, LogRecordType};
    use tempfile::tempdir;

    #[test]
    fn writes_a_trimmed_checkpoint() {
        let dir = tempdir().unwrap();
        let mut writer = LogWriter::open(dir.path(), WriterOptions::new()).unwrap();
        writer.append(&LogRecord::comment("old")).unwrap();

        let mut store = MemoryStore::new();
        let mut files = FileMap::new();
        files
            .insert(FileNum::new(4), 2, store.open("t.ft", true).unwrap().unwrap())
            .unwrap();

        let mut txns = TxnTable::new();
        let root = TxnIdPair::root(8);
        txns.begin(root, TxnIdPair::NONE, Lsn::new(1)).unwrap();
        txns.begin(TxnIdPair::child(8, 1), root, Lsn::new(2)).unwrap();
        let prepared = TxnIdPair::root(9);
        txns.begin(prepared, TxnIdPair::NONE, Lsn::new(3)).unwrap();
        txns.prepare(prepared, XaXid::new(1, b"g".to_vec(), b"b".to_vec()))
            .unwrap();

        let lsns = LogCheckpointer::new(&mut writer)
            .checkpoint(&files, &txns, 9)
            .unwrap();
        assert_eq!(lsns.begin, Lsn::new(2));
        assert_eq!(lsns.end, Lsn::new(7));

        let mut cursor = LogCursor::create(dir.path(), CursorOptions::new()).unwrap();
        let mut types = vec![cursor.first().unwrap().record_type()];
        while let Ok(entry) = cursor.next() {
            types.push(entry.record_type());
        }
        assert_eq!(
            types,
            vec![
                LogRecordType::BeginCheckpoint,
                LogRecordType::Fassociate,
                LogRecordType::XStillOpen,
                LogRecordType::XStillOpen,
                LogRecordType::XStillOpenPrepared,
                LogRecordType::EndCheckpoint,
            ]
        );

        // Running off the end unpositioned the cursor, so prev starts over.
        assert_eq!(cursor.prev().unwrap().record_type(), LogRecordType::EndCheckpoint);
        match &cursor.prev().unwrap().record {
            LogRecord::XStillOpenPrepared { xid, .. } => assert_eq!(*xid, prepared),
            other => panic!("unexpected {other:?}"),
        }
        match &cursor.prev().unwrap().record {
            LogRecord::XStillOpen { xid, parentxid, info } => {
                assert_eq!(*xid, TxnIdPair::child(8, 1));
                assert_eq!(*parentxid, root);
                assert_eq!(info.current_rollback, BlockNum::NONE);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
