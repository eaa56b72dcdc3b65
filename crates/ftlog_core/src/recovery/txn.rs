//! Transactions rebuilt from the log.
//!
//! Transactions live in an arena and refer to each other by index, so a
//! family can be torn down child-first without dangling links.

use crate::dictionary::Mutation;
use crate::error::{CoreError, CoreResult};
use crate::types::{FileNum, Lsn, TxnIdPair, XaXid};
use crate::wal::StillOpenInfo;
use std::collections::HashMap;

/// Rollback-log bookkeeping carried over from a checkpoint.
pub type RollbackInfo = StillOpenInfo;

/// Index of a transaction in its [`TxnTable`].
pub type TxnIndex = usize;

/// State of a rebuilt transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnState {
    /// Running.
    Live,
    /// Prepared, waiting for an external decision.
    Preparing,
    /// Commit in progress.
    Committing,
    /// Abort in progress.
    Aborting,
    /// Finished.
    Retired,
}

/// Work a transaction leaves for its commit or abort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollbackEntry {
    /// Undo of a row or descriptor change.
    Undo {
        /// File changed.
        filenum: FileNum,
        /// Its internal name, to reopen it if it was closed since.
        iname: String,
        /// The undoing mutation.
        undo: Mutation,
    },
    /// A file created by the transaction; removed on abort.
    FileCreate {
        /// File number.
        filenum: FileNum,
        /// Internal name.
        iname: String,
    },
    /// A file deleted by the transaction; removed on commit.
    FileDelete {
        /// File number.
        filenum: FileNum,
        /// Internal name.
        iname: String,
    },
    /// A bulk load; the loaded file is removed on abort.
    Load {
        /// File replaced by the load.
        old_filenum: FileNum,
        /// Internal name of the loaded file.
        new_iname: String,
    },
    /// A hot index build. Nothing to do on either outcome.
    HotIndex {
        /// Indexes built.
        filenums: Vec<FileNum>,
    },
}

/// A transaction rebuilt from the log.
#[derive(Debug, Clone)]
pub struct Transaction {
    /// Transaction id.
    pub xid: TxnIdPair,
    /// Parent, for nested transactions.
    pub parent: Option<TxnIndex>,
    /// Children that are still running.
    pub children: Vec<TxnIndex>,
    /// State.
    pub state: TxnState,
    /// XA id once prepared.
    pub xa_xid: Option<XaXid>,
    /// Commit/abort work, oldest first.
    pub rollback: Vec<RollbackEntry>,
    /// Metadata from an `xstillopen` record.
    pub rollback_info: Option<RollbackInfo>,
    /// LSN of the record that created it.
    pub begin_lsn: Lsn,
}

/// Every transaction rebuilt so far.
#[derive(Debug, Default)]
pub struct TxnTable {
    arena: Vec<Option<Transaction>>,
    by_id: HashMap<TxnIdPair, TxnIndex>,
}

impl TxnTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking `xid`.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolViolation` if `xid` is already tracked, a root id
    /// has a child part, or the parent is unknown.
    pub fn begin(&mut self, xid: TxnIdPair, parent: TxnIdPair, lsn: Lsn) -> CoreResult<TxnIndex> {
        if xid.is_none() {
            return Err(CoreError::protocol_violation("transaction begun with no id"));
        }
        if self.by_id.contains_key(&xid) {
            return Err(CoreError::protocol_violation(format!("{xid} begun twice")));
        }

        let parent_index = if parent.is_none() {
            if !xid.is_root() {
                return Err(CoreError::protocol_violation(format!(
                    "root {xid} has a child id"
                )));
            }
            None
        } else {
            let index = self.index_of(parent).ok_or_else(|| {
                CoreError::protocol_violation(format!("{xid} begun under unknown parent {parent}"))
            })?;
            Some(index)
        };

        let index = self.arena.len();
        self.arena.push(Some(Transaction {
            xid,
            parent: parent_index,
            children: Vec::new(),
            state: TxnState::Live,
            xa_xid: None,
            rollback: Vec::new(),
            rollback_info: None,
            begin_lsn: lsn,
        }));
        if let Some(p) = parent_index {
            if let Some(parent) = self.arena[p].as_mut() {
                parent.children.push(index);
            }
        }
        self.by_id.insert(xid, index);
        Ok(index)
    }

    /// Index of `xid`, if tracked.
    #[must_use]
    pub fn index_of(&self, xid: TxnIdPair) -> Option<TxnIndex> {
        self.by_id.get(&xid).copied()
    }

    /// Looks up a transaction by id.
    #[must_use]
    pub fn get(&self, xid: TxnIdPair) -> Option<&Transaction> {
        self.index_of(xid).and_then(|i| self.at(i))
    }

    /// Looks up a transaction by index.
    #[must_use]
    pub fn at(&self, index: TxnIndex) -> Option<&Transaction> {
        self.arena.get(index).and_then(Option::as_ref)
    }

    /// Looks up a transaction by id, failing if it is unknown.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolViolation` naming `what` if `xid` is not tracked.
    pub fn require(&mut self, xid: TxnIdPair, what: &str) -> CoreResult<&mut Transaction> {
        let index = self.index_of(xid).ok_or_else(|| {
            CoreError::protocol_violation(format!("{what} for unknown {xid}"))
        })?;
        self.arena[index]
            .as_mut()
            .ok_or_else(|| CoreError::protocol_violation(format!("{what} for retired {xid}")))
    }

    /// Adds commit/abort work to `xid`.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolViolation` if `xid` is not tracked.
    pub fn push_rollback(&mut self, xid: TxnIdPair, entry: RollbackEntry, what: &str) -> CoreResult<()> {
        self.require(xid, what)?.rollback.push(entry);
        Ok(())
    }

    /// Marks `xid` prepared.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolViolation` if `xid` is unknown, nested, or not live.
    pub fn prepare(&mut self, xid: TxnIdPair, xa_xid: XaXid) -> CoreResult<()> {
        let txn = self.require(xid, "xprepare")?;
        if !txn.xid.is_root() || txn.state != TxnState::Live {
            return Err(CoreError::protocol_violation(format!(
                "cannot prepare {xid} in state {:?}",
                txn.state
            )));
        }
        txn.state = TxnState::Preparing;
        txn.xa_xid = Some(xa_xid);
        Ok(())
    }

    /// Retires `xid` as committed.
    ///
    /// A child's work moves to its parent and `None` is returned. A root's
    /// work is returned (oldest first) for the caller to carry out.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolViolation` if `xid` is unknown or has running
    /// children.
    pub fn commit(&mut self, xid: TxnIdPair) -> CoreResult<Option<Vec<RollbackEntry>>> {
        let (index, txn) = self.retire(xid, "xcommit", TxnState::Committing)?;
        match txn.parent {
            Some(parent) => {
                if let Some(parent) = self.arena[parent].as_mut() {
                    parent.children.retain(|&c| c != index);
                    parent.rollback.extend(txn.rollback);
                }
                Ok(None)
            }
            None => Ok(Some(txn.rollback)),
        }
    }

    /// Retires `xid` as aborted and returns its work, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolViolation` if `xid` is unknown or has running
    /// children.
    pub fn abort(&mut self, xid: TxnIdPair) -> CoreResult<Vec<RollbackEntry>> {
        let (index, txn) = self.retire(xid, "xabort", TxnState::Aborting)?;
        if let Some(parent) = txn.parent.and_then(|p| self.arena[p].as_mut()) {
            parent.children.retain(|&c| c != index);
        }
        Ok(txn.rollback)
    }

    fn retire(
        &mut self,
        xid: TxnIdPair,
        what: &str,
        state: TxnState,
    ) -> CoreResult<(TxnIndex, Transaction)> {
        let index = self.index_of(xid).ok_or_else(|| {
            CoreError::protocol_violation(format!("{what} for unknown {xid}"))
        })?;
        let running_children = self.at(index).map_or(0, |t| t.children.len());
        if running_children > 0 {
            return Err(CoreError::protocol_violation(format!(
                "{what} for {xid} with {running_children} running children"
            )));
        }
        let mut txn = self.arena[index]
            .take()
            .ok_or_else(|| CoreError::protocol_violation(format!("{what} for retired {xid}")))?;
        self.by_id.remove(&xid);
        txn.state = state;
        Ok((index, txn))
    }

    /// Number of tracked transactions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Returns true if nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Tracked transactions in creation order; parents come before their
    /// children.
    pub fn iter(&self) -> impl Iterator<Item = (TxnIndex, &Transaction)> {
        self.arena
            .iter()
            .enumerate()
            .filter_map(|(i, t)| t.as_ref().map(|t| (i, t)))
    }

    /// Tracked root transactions, newest id first.
    #[must_use]
    pub fn roots_newest_first(&self) -> Vec<TxnIdPair> {
        let mut roots: Vec<TxnIdPair> = self
            .iter()
            .filter(|(_, t)| t.parent.is_none())
            .map(|(_, t)| t.xid)
            .collect();
        roots.sort_unstable_by(|a, b| b.cmp(a));
        roots
    }
}
