//! Forward-pass record handlers.

use crate::dictionary::{DictionaryStore, Mutation, UpdateFn};
use crate::error::{CoreError, CoreResult};
use crate::recovery::file_map::FileMap;
use crate::recovery::hooks::RecoveryHooks;
use crate::recovery::scan::{ScanInfo, ScanState};
use crate::recovery::txn::{RollbackEntry, TxnState, TxnTable};
use crate::types::{FileNum, Lsn, TxnId, TxnIdPair};
use crate::wal::{LogEntry, LogRecord};
use tracing::{debug, info, trace};

/// State rebuilt while replaying the log.
pub struct Replay<'a> {
    /// Checkpoint tracking.
    pub scan: ScanInfo,
    /// Open dictionaries.
    pub files: FileMap,
    /// Running transactions.
    pub txns: TxnTable,
    /// Highest transaction id seen.
    pub last_xid: TxnId,
    pub(crate) store: &'a mut dyn DictionaryStore,
    pub(crate) hooks: &'a mut dyn RecoveryHooks,
}

impl<'a> Replay<'a> {
    /// Creates an empty replay over `store`.
    pub fn new(store: &'a mut dyn DictionaryStore, hooks: &'a mut dyn RecoveryHooks) -> Self {
        Self {
            scan: ScanInfo::new(),
            files: FileMap::new(),
            txns: TxnTable::new(),
            last_xid: 0,
            store,
            hooks,
        }
    }

    /// Replays one entry of the forward scan.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolViolation` if the entry contradicts what was
    /// replayed before it, or the error of a failed dictionary operation.
    pub fn forward(&mut self, entry: &LogEntry) -> CoreResult<()> {
        self.scan.require_forward()?;
        let lsn = entry.lsn;
        trace!(%lsn, record = entry.record_type().name(), "replaying");

        match &entry.record {
            LogRecord::BeginCheckpoint { last_xid, .. } => self.begin_checkpoint(lsn, *last_xid),
            LogRecord::EndCheckpoint {
                lsn_begin_checkpoint,
                num_fassociate_entries,
                num_xstillopen_entries,
                ..
            } => self.end_checkpoint(
                lsn,
                *lsn_begin_checkpoint,
                *num_fassociate_entries,
                *num_xstillopen_entries,
            ),
            LogRecord::Fassociate {
                filenum,
                treeflags,
                iname,
                unlink_on_close,
            } => self.fassociate(*filenum, *treeflags, iname, *unlink_on_close),
            LogRecord::XStillOpen {
                xid,
                parentxid,
                info,
            } => {
                if self.scan.in_checkpoint() {
                    self.still_open_xid(*xid)?;
                    self.txns.begin(*xid, *parentxid, lsn)?;
                    self.txns.require(*xid, "xstillopen")?.rollback_info = Some(info.clone());
                    self.scan.num_xstillopen += 1;
                } else if self.txns.get(*xid).is_none() {
                    return Err(CoreError::protocol_violation(format!(
                        "xstillopen for unknown {xid}"
                    )));
                }
                Ok(())
            }
            LogRecord::XStillOpenPrepared { xid, xa_xid, info } => {
                if self.scan.in_checkpoint() {
                    self.still_open_xid(*xid)?;
                    self.txns.begin(*xid, TxnIdPair::NONE, lsn)?;
                    self.txns.prepare(*xid, xa_xid.clone())?;
                    self.txns.require(*xid, "xstillopenprepared")?.rollback_info =
                        Some(info.clone());
                    self.scan.num_xstillopen += 1;
                } else if self.txns.get(*xid).map(|t| t.state) != Some(TxnState::Preparing) {
                    return Err(CoreError::protocol_violation(format!(
                        "xstillopenprepared for {xid}, which is not prepared"
                    )));
                }
                Ok(())
            }
            LogRecord::XBegin { xid, parentxid } => {
                self.txns.begin(*xid, *parentxid, lsn)?;
                self.last_xid = self.last_xid.max(xid.parent_id64);
                Ok(())
            }
            LogRecord::XCommit { xid } => self.commit_txn(*xid),
            LogRecord::XAbort { xid } => self.abort_txn(*xid, lsn),
            LogRecord::XPrepare { xid, xa_xid } => self.txns.prepare(*xid, xa_xid.clone()),
            LogRecord::FCreate {
                xid,
                filenum,
                iname,
                treeflags,
                ..
            } => self.fcreate(*xid, *filenum, iname, *treeflags),
            LogRecord::FOpen {
                iname,
                filenum,
                treeflags,
            } => self.fopen(*filenum, iname, *treeflags),
            LogRecord::FClose { iname, filenum } => self.fclose(lsn, *filenum, iname),
            LogRecord::FDelete { xid, filenum } => {
                self.txns.require(*xid, "fdelete")?;
                if let Some(entry) = self.files.find(*filenum) {
                    let iname = entry.iname.clone();
                    self.txns.push_rollback(
                        *xid,
                        RollbackEntry::FileDelete {
                            filenum: *filenum,
                            iname,
                        },
                        "fdelete",
                    )?;
                }
                Ok(())
            }
            LogRecord::EnqInsert {
                filenum,
                xid,
                key,
                value,
            } => self.apply(
                lsn,
                *xid,
                *filenum,
                &Mutation::Insert {
                    key: key.clone(),
                    value: value.clone(),
                    overwrite: true,
                },
            ),
            LogRecord::EnqInsertNoOverwrite {
                filenum,
                xid,
                key,
                value,
            } => self.apply(
                lsn,
                *xid,
                *filenum,
                &Mutation::Insert {
                    key: key.clone(),
                    value: value.clone(),
                    overwrite: false,
                },
            ),
            LogRecord::EnqDeleteAny { filenum, xid, key } => {
                self.apply(lsn, *xid, *filenum, &Mutation::Delete { key: key.clone() })
            }
            LogRecord::EnqInsertMultiple {
                src_filenum,
                dest_filenums,
                xid,
                src_key,
                src_val,
            } => {
                if !self.source_available(*xid, *src_filenum)? {
                    return Ok(());
                }
                for &dest in dest_filenums {
                    if !self.files.contains(dest) {
                        continue;
                    }
                    if let Some((key, value)) = self.hooks.generate_row_for_put(dest, src_key, src_val) {
                        let mutation = Mutation::Insert {
                            key,
                            value,
                            overwrite: true,
                        };
                        self.apply(lsn, *xid, dest, &mutation)?;
                    }
                }
                Ok(())
            }
            LogRecord::EnqDeleteMultiple {
                src_filenum,
                dest_filenums,
                xid,
                src_key,
                src_val,
            } => {
                if !self.source_available(*xid, *src_filenum)? {
                    return Ok(());
                }
                for &dest in dest_filenums {
                    if !self.files.contains(dest) {
                        continue;
                    }
                    if let Some(key) = self.hooks.generate_row_for_del(dest, src_key, src_val) {
                        self.apply(lsn, *xid, dest, &Mutation::Delete { key })?;
                    }
                }
                Ok(())
            }
            LogRecord::EnqUpdate {
                filenum,
                xid,
                key,
                extra,
            } => self.apply(
                lsn,
                *xid,
                *filenum,
                &Mutation::Update {
                    key: key.clone(),
                    extra: extra.clone(),
                },
            ),
            LogRecord::EnqUpdateBroadcast {
                filenum,
                xid,
                extra,
                ..
            } => self.apply(
                lsn,
                *xid,
                *filenum,
                &Mutation::UpdateBroadcast {
                    extra: extra.clone(),
                },
            ),
            LogRecord::ChangeFDescriptor {
                filenum,
                xid,
                old_descriptor,
                new_descriptor,
                ..
            } => self.apply(
                lsn,
                *xid,
                *filenum,
                &Mutation::ChangeDescriptor {
                    old: old_descriptor.clone(),
                    new: new_descriptor.clone(),
                },
            ),
            LogRecord::HotIndex {
                xid,
                hot_index_filenums,
            } => self.txns.push_rollback(
                *xid,
                RollbackEntry::HotIndex {
                    filenums: hot_index_filenums.clone(),
                },
                "hot_index",
            ),
            LogRecord::Load {
                xid,
                old_filenum,
                new_iname,
            } => self.txns.push_rollback(
                *xid,
                RollbackEntry::Load {
                    old_filenum: *old_filenum,
                    new_iname: new_iname.clone(),
                },
                "load",
            ),
            LogRecord::Shutdown { last_xid, .. } => {
                self.last_xid = self.last_xid.max(*last_xid);
                Ok(())
            }
            LogRecord::Comment { .. } => Ok(()),
        }
    }

    fn begin_checkpoint(&mut self, lsn: Lsn, last_xid: TxnId) -> CoreResult<()> {
        match self.scan.state {
            ScanState::ForwardBetweenCheckpointBeginEnd => {
                if self.scan.checkpoint_begin_lsn != Some(lsn) {
                    return Err(CoreError::protocol_violation(format!(
                        "checkpoint begin at {lsn} inside the checkpoint being replayed"
                    )));
                }
                self.scan.last_xid = Some(last_xid);
                self.last_xid = self.last_xid.max(last_xid);
                Ok(())
            }
            _ => match self.scan.checkpoint_end_lsn {
                Some(end) if lsn <= end => Err(CoreError::protocol_violation(format!(
                    "checkpoint begin at {lsn} is not newer than checkpoint end {end}"
                ))),
                _ => Ok(()),
            },
        }
    }

    fn end_checkpoint(
        &mut self,
        lsn: Lsn,
        begin: Lsn,
        num_fassociate: u32,
        num_xstillopen: u32,
    ) -> CoreResult<()> {
        if !self.scan.in_checkpoint() {
            return Err(CoreError::protocol_violation(format!(
                "checkpoint end at {lsn} after the checkpoint being replayed"
            )));
        }
        let scan = &self.scan;
        if scan.checkpoint_begin_lsn != Some(begin)
            || scan.checkpoint_end_lsn != Some(lsn)
            || scan.expected_fassociate != num_fassociate
            || scan.expected_xstillopen != num_xstillopen
        {
            return Err(CoreError::protocol_violation(format!(
                "checkpoint end at {lsn} does not match the backward scan"
            )));
        }
        if scan.num_fassociate != num_fassociate || scan.num_xstillopen != num_xstillopen {
            return Err(CoreError::protocol_violation(format!(
                "checkpoint end at {lsn} announces {num_fassociate} fassociate and \
                 {num_xstillopen} xstillopen records, replayed {} and {}",
                scan.num_fassociate, scan.num_xstillopen
            )));
        }
        self.scan.state = ScanState::ForwardNewerCheckpointEnd;
        info!(%lsn, files = self.files.len(), txns = self.txns.len(), "checkpoint replayed");
        Ok(())
    }

    fn fassociate(
        &mut self,
        filenum: FileNum,
        treeflags: u32,
        iname: &str,
        unlink_on_close: bool,
    ) -> CoreResult<()> {
        if !self.scan.in_checkpoint() {
            return match self.files.find(filenum) {
                Some(entry) if entry.iname != iname => Err(CoreError::protocol_violation(format!(
                    "fassociate names {iname} for {filenum}, open as {}",
                    entry.iname
                ))),
                _ => Ok(()),
            };
        }

        self.scan.num_fassociate += 1;
        if self.files.contains(filenum) {
            return Err(CoreError::protocol_violation(format!(
                "fassociate for {filenum}, which is already open"
            )));
        }
        match self.store.open(iname, false)? {
            Some(dictionary) => {
                self.files.insert(filenum, treeflags, dictionary)?.unlink_on_close = unlink_on_close;
            }
            None => debug!(%filenum, iname, "fassociate for a missing file, skipped"),
        }
        Ok(())
    }

    fn still_open_xid(&self, xid: TxnIdPair) -> CoreResult<()> {
        let last_xid = self.scan.last_xid.ok_or_else(|| {
            CoreError::protocol_violation(format!("{xid} still open before the checkpoint begin"))
        })?;
        if xid.parent_id64 > last_xid {
            return Err(CoreError::protocol_violation(format!(
                "{xid} still open is newer than the checkpoint's last id {last_xid}"
            )));
        }
        Ok(())
    }

    fn fcreate(&mut self, xid: TxnIdPair, filenum: FileNum, iname: &str, treeflags: u32) -> CoreResult<()> {
        if !xid.is_none() {
            self.txns.require(xid, "fcreate")?;
        }
        if self.files.contains(filenum) {
            return Err(CoreError::protocol_violation(format!(
                "fcreate for {filenum}, which is already open"
            )));
        }

        self.store.remove(iname)?;
        let dictionary = self.store.open(iname, true)?.ok_or_else(|| {
            CoreError::invalid_operation(format!("store did not create {iname}"))
        })?;
        self.files.insert(filenum, treeflags, dictionary)?;

        if !xid.is_none() {
            self.txns.push_rollback(
                xid,
                RollbackEntry::FileCreate {
                    filenum,
                    iname: iname.to_string(),
                },
                "fcreate",
            )?;
        }
        Ok(())
    }

    fn fopen(&mut self, filenum: FileNum, iname: &str, treeflags: u32) -> CoreResult<()> {
        if self.files.contains(filenum) {
            return Err(CoreError::protocol_violation(format!(
                "fopen for {filenum}, which is already open"
            )));
        }
        match self.store.open(iname, false)? {
            Some(dictionary) => {
                self.files.insert(filenum, treeflags, dictionary)?;
            }
            None => debug!(%filenum, iname, "fopen for a missing file, skipped"),
        }
        Ok(())
    }

    fn fclose(&mut self, lsn: Lsn, filenum: FileNum, iname: &str) -> CoreResult<()> {
        match self.files.find(filenum) {
            Some(entry) if entry.iname != iname => {
                return Err(CoreError::protocol_violation(format!(
                    "fclose names {iname} for {filenum}, open as {}",
                    entry.iname
                )));
            }
            Some(_) => {}
            None => return Ok(()),
        }
        if let Some(entry) = self.files.remove(filenum) {
            entry.close(lsn, &mut *self.store)?;
        }
        Ok(())
    }

    /// Returns false when a `*_multiple` record must be skipped because its
    /// source dictionary is gone.
    fn source_available(&self, xid: TxnIdPair, src_filenum: FileNum) -> CoreResult<bool> {
        if !xid.is_none() && self.txns.get(xid).is_none() {
            return Err(CoreError::protocol_violation(format!(
                "row operation for unknown {xid}"
            )));
        }
        Ok(src_filenum.is_none() || self.files.contains(src_filenum))
    }

    /// Applies a row or descriptor change to an open dictionary and records
    /// its undo with the transaction. Missing dictionaries are skipped.
    fn apply(&mut self, lsn: Lsn, xid: TxnIdPair, filenum: FileNum, mutation: &Mutation) -> CoreResult<()> {
        if !xid.is_none() && self.txns.get(xid).is_none() {
            return Err(CoreError::protocol_violation(format!(
                "row operation at {lsn} for unknown {xid}"
            )));
        }
        let Some(entry) = self.files.find_mut(filenum) else {
            trace!(%lsn, %filenum, "dictionary not open, skipped");
            return Ok(());
        };

        let hooks = &*self.hooks;
        let update: UpdateFn<'_> = &|key, old, extra| hooks.update(key, old, extra);
        let undo = entry.dictionary.apply(lsn, mutation, update)?;

        if let (Some(undo), false) = (undo, xid.is_none()) {
            let iname = entry.iname.clone();
            self.txns
                .push_rollback(xid, RollbackEntry::Undo { filenum, iname, undo }, "row operation")?;
        }
        Ok(())
    }

    /// Commits `xid`. A root's deferred file deletions happen now.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolViolation` if `xid` cannot commit, or the error of a
    /// failed removal.
    pub fn commit_txn(&mut self, xid: TxnIdPair) -> CoreResult<()> {
        let Some(work) = self.txns.commit(xid)? else {
            return Ok(());
        };
        for entry in work {
            if let RollbackEntry::FileDelete { filenum, iname } = entry {
                match self.files.find_mut(filenum) {
                    Some(open) if open.iname == iname => open.unlink_on_close = true,
                    _ => {
                        self.store.remove(&iname)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Aborts `xid`, undoing its work newest first. Dictionaries closed
    /// since are reopened for the undo and closed again at `lsn`.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolViolation` if `xid` cannot abort, or the error of a
    /// failed undo.
    pub fn abort_txn(&mut self, xid: TxnIdPair, lsn: Lsn) -> CoreResult<()> {
        let work = self.txns.abort(xid)?;
        let count = work.len();
        for (step, entry) in work.into_iter().rev().enumerate() {
            self.roll_back(entry, lsn, step as u32)?;
        }
        debug!(%xid, %lsn, entries = count, "transaction rolled back");
        Ok(())
    }

    /// Carries out one rollback entry as step `step` of the abort at `lsn`.
    fn roll_back(&mut self, entry: RollbackEntry, lsn: Lsn, step: u32) -> CoreResult<()> {
        match entry {
            RollbackEntry::Undo { filenum, iname, undo } => match self.files.find_mut(filenum) {
                Some(open) if open.iname == iname => {
                    open.dictionary.undo(lsn, step, &undo)?;
                }
                _ => match self.store.open(&iname, false)? {
                    Some(mut dictionary) => {
                        dictionary.undo(lsn, step, &undo)?;
                        dictionary.close(lsn)?;
                    }
                    None => debug!(iname = %iname, "undo for a missing file, skipped"),
                },
            },
            RollbackEntry::FileCreate { filenum, iname } => {
                if self.files.find(filenum).is_some_and(|open| open.iname == iname) {
                    if let Some(open) = self.files.remove(filenum) {
                        open.close(lsn, &mut *self.store)?;
                    }
                }
                self.store.remove(&iname)?;
            }
            RollbackEntry::Load { new_iname, .. } => {
                self.store.remove(&new_iname)?;
            }
            RollbackEntry::FileDelete { .. } | RollbackEntry::HotIndex { .. } => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::MemoryStore;
    use crate::recovery::hooks::NoopHooks;

    struct Script<'a> {
        replay: Replay<'a>,
        lsn: u64,
    }

    impl<'a> Script<'a> {
        fn new(store: &'a mut MemoryStore, hooks: &'a mut NoopHooks) -> Self {
            let mut replay = Replay::new(store, hooks);
            replay.scan.state = ScanState::ForwardNewerCheckpointEnd;
            Self { replay, lsn: 0 }
        }

        fn play(&mut self, record: LogRecord) -> CoreResult<()> {
            self.lsn += 1;
            self.replay.forward(&LogEntry {
                lsn: Lsn::new(self.lsn),
                record,
            })
        }
    }

    fn insert(xid: TxnIdPair, key: &str, value: &str) -> LogRecord {
        LogRecord::EnqInsert {
            filenum: FileNum::new(1),
            xid,
            key: key.as_bytes().to_vec(),
            value: value.as_bytes().to_vec(),
        }
    }

    fn fcreate(xid: TxnIdPair, filenum: u32, iname: &str) -> LogRecord {
        LogRecord::FCreate {
            xid,
            filenum: FileNum::new(filenum),
            iname: iname.to_string(),
            mode: 0o644,
            treeflags: 0,
            nodesize: 4 << 20,
            basementnodesize: 128 << 10,
            compression_method: 0,
        }
    }

    fn value(replay: &Replay<'_>, key: &str) -> Option<Vec<u8>> {
        replay
            .files
            .find(FileNum::new(1))
            .and_then(|e| e.dictionary.get(key.as_bytes()))
            .map(<[u8]>::to_vec)
    }

    #[test]
    fn abort_undoes_rows_and_commit_keeps_them() {
        let mut store = MemoryStore::new();
        let mut hooks = NoopHooks;
        let mut s = Script::new(&mut store, &mut hooks);
        let t1 = TxnIdPair::root(1);
        let t2 = TxnIdPair::root(2);

        s.play(fcreate(TxnIdPair::NONE, 1, "t.ft")).unwrap();
        s.play(LogRecord::XBegin { xid: t1, parentxid: TxnIdPair::NONE }).unwrap();
        s.play(insert(t1, "a", "1")).unwrap();
        s.play(LogRecord::XCommit { xid: t1 }).unwrap();
        s.play(LogRecord::XBegin { xid: t2, parentxid: TxnIdPair::NONE }).unwrap();
        s.play(insert(t2, "a", "2")).unwrap();
        s.play(insert(t2, "b", "3")).unwrap();
        assert_eq!(value(&s.replay, "a"), Some(b"2".to_vec()));

        s.play(LogRecord::XAbort { xid: t2 }).unwrap();
        assert_eq!(value(&s.replay, "a"), Some(b"1".to_vec()));
        assert_eq!(value(&s.replay, "b"), None);
        assert_eq!(s.replay.last_xid, 2);
        assert!(s.replay.txns.is_empty());
    }

    #[test]
    fn aborted_create_removes_the_file() {
        let mut store = MemoryStore::new();
        let mut hooks = NoopHooks;
        {
            let mut s = Script::new(&mut store, &mut hooks);
            let t = TxnIdPair::root(4);
            s.play(LogRecord::XBegin { xid: t, parentxid: TxnIdPair::NONE }).unwrap();
            s.play(fcreate(t, 1, "new.ft")).unwrap();
            s.play(insert(t, "k", "v")).unwrap();
            s.play(LogRecord::XAbort { xid: t }).unwrap();
            assert!(s.replay.files.is_empty());
        }
        assert!(store.inames().is_empty());
    }

    #[test]
    fn committed_delete_unlinks_on_close() {
        let mut store = MemoryStore::new();
        let mut hooks = NoopHooks;
        {
            let mut s = Script::new(&mut store, &mut hooks);
            let t = TxnIdPair::root(1);
            s.play(fcreate(TxnIdPair::NONE, 1, "gone.ft")).unwrap();
            s.play(LogRecord::XBegin { xid: t, parentxid: TxnIdPair::NONE }).unwrap();
            s.play(LogRecord::FDelete { xid: t, filenum: FileNum::new(1) }).unwrap();
            s.play(LogRecord::XCommit { xid: t }).unwrap();
            assert!(s.replay.files.find(FileNum::new(1)).unwrap().unlink_on_close);
            s.play(LogRecord::FClose {
                iname: "gone.ft".to_string(),
                filenum: FileNum::new(1),
            })
            .unwrap();
        }
        assert!(store.inames().is_empty());
    }

    #[test]
    fn records_for_missing_files_are_skipped() {
        let mut store = MemoryStore::new();
        let mut hooks = NoopHooks;
        let mut s = Script::new(&mut store, &mut hooks);
        s.play(LogRecord::FOpen {
            iname: "missing.ft".to_string(),
            filenum: FileNum::new(1),
            treeflags: 0,
        })
        .unwrap();
        s.play(insert(TxnIdPair::NONE, "k", "v")).unwrap();
        s.play(LogRecord::FClose {
            iname: "missing.ft".to_string(),
            filenum: FileNum::new(1),
        })
        .unwrap();
        assert!(s.replay.files.is_empty());
    }

    #[test]
    fn unknown_transactions_are_violations() {
        let mut store = MemoryStore::new();
        let mut hooks = NoopHooks;
        let mut s = Script::new(&mut store, &mut hooks);
        s.play(fcreate(TxnIdPair::NONE, 1, "t.ft")).unwrap();
        let err = s.play(insert(TxnIdPair::root(9), "k", "v")).unwrap_err();
        assert!(matches!(err, CoreError::ProtocolViolation { .. }));
        assert!(s.play(LogRecord::XCommit { xid: TxnIdPair::root(9) }).is_err());
    }

    #[test]
    fn multiple_records_fan_out_to_open_destinations() {
        let mut store = MemoryStore::new();
        let mut hooks = NoopHooks;
        let mut s = Script::new(&mut store, &mut hooks);
        s.play(fcreate(TxnIdPair::NONE, 1, "a.ft")).unwrap();
        s.play(fcreate(TxnIdPair::NONE, 2, "b.ft")).unwrap();
        s.play(LogRecord::EnqInsertMultiple {
            src_filenum: FileNum::NONE,
            dest_filenums: vec![FileNum::new(1), FileNum::new(2), FileNum::new(3)],
            xid: TxnIdPair::NONE,
            src_key: b"k".to_vec(),
            src_val: b"v".to_vec(),
        })
        .unwrap();
        for filenum in [1, 2] {
            let entry = s.replay.files.find(FileNum::new(filenum)).unwrap();
            assert_eq!(entry.dictionary.get(b"k"), Some(&b"v"[..]));
        }

        // Source dictionary gone: nothing is applied.
        s.play(LogRecord::EnqDeleteMultiple {
            src_filenum: FileNum::new(7),
            dest_filenums: vec![FileNum::new(1)],
            xid: TxnIdPair::NONE,
            src_key: b"k".to_vec(),
            src_val: b"v".to_vec(),
        })
        .unwrap();
        assert_eq!(value(&s.replay, "k"), Some(b"v".to_vec()));
    }

    #[test]
    fn checkpoint_records_are_cross_checked() {
        let mut store = MemoryStore::new();
        let mut hooks = NoopHooks;
        let mut replay = Replay::new(&mut store, &mut hooks);
        replay.scan.state = ScanState::ForwardBetweenCheckpointBeginEnd;
        replay.scan.checkpoint_begin_lsn = Some(Lsn::new(10));
        replay.scan.checkpoint_end_lsn = Some(Lsn::new(12));
        replay.scan.expected_xstillopen = 1;

        let entry = |lsn: u64, record: LogRecord| LogEntry {
            lsn: Lsn::new(lsn),
            record,
        };
        replay
            .forward(&entry(10, LogRecord::BeginCheckpoint { timestamp: 0, last_xid: 5 }))
            .unwrap();
        replay
            .forward(&entry(
                11,
                LogRecord::XStillOpen {
                    xid: TxnIdPair::root(5),
                    parentxid: TxnIdPair::NONE,
                    info: Default::default(),
                },
            ))
            .unwrap();
        replay
            .forward(&entry(
                12,
                LogRecord::EndCheckpoint {
                    lsn_begin_checkpoint: Lsn::new(10),
                    timestamp: 0,
                    num_fassociate_entries: 0,
                    num_xstillopen_entries: 1,
                },
            ))
            .unwrap();
        assert_eq!(replay.scan.state, ScanState::ForwardNewerCheckpointEnd);
        assert!(replay.txns.get(TxnIdPair::root(5)).unwrap().rollback_info.is_some());

        let err = replay
            .forward(&entry(
                13,
                LogRecord::EndCheckpoint {
                    lsn_begin_checkpoint: Lsn::new(10),
                    timestamp: 0,
                    num_fassociate_entries: 0,
                    num_xstillopen_entries: 1,
                },
            ))
            .unwrap_err();
        assert!(matches!(err, CoreError::ProtocolViolation { .. }));
    }

    #[test]
    fn still_open_needs_a_seeded_counter() {
        let mut store = MemoryStore::new();
        let mut hooks = NoopHooks;
        let mut replay = Replay::new(&mut store, &mut hooks);
        replay.scan.state = ScanState::ForwardBetweenCheckpointBeginEnd;
        let err = replay
            .forward(&LogEntry {
                lsn: Lsn::new(2),
                record: LogRecord::XStillOpen {
                    xid: TxnIdPair::root(1),
                    parentxid: TxnIdPair::NONE,
                    info: Default::default(),
                },
            })
            .unwrap_err();
        assert!(matches!(err, CoreError::ProtocolViolation { .. }));
    }
}
