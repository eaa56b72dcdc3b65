//! Recovery callbacks.

use crate::types::{FileNum, Lsn, TxnIdPair, XaXid};

/// A transaction left prepared at the end of recovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedTxn {
    /// Transaction id.
    pub xid: TxnIdPair,
    /// XA id given when it was prepared.
    pub xa_xid: XaXid,
}

/// Callbacks a recovery run makes into the engine that owns it.
///
/// Every method has a default, so an implementation only overrides what it
/// needs. Row generation and the update function mirror what the engine did
/// when it wrote the original records; replay must reproduce the same rows.
pub trait RecoveryHooks {
    /// Called once the backward scan stops. `turnaround` is the LSN of the
    /// checkpoint begin the forward scan starts from, `None` if it starts
    /// at the first record.
    fn after_backward_scan(&mut self, turnaround: Option<Lsn>) {
        let _ = turnaround;
    }

    /// Called once the forward scan reaches the end of the log.
    fn after_forward_scan(&mut self, entries: u64) {
        let _ = entries;
    }

    /// Receives a transaction that is still prepared. It stays unresolved
    /// in the log until the engine commits or aborts it.
    fn on_prepared(&mut self, txn: &PreparedTxn) {
        let _ = txn;
    }

    /// Row to put into `dest` for an `enq_insert_multiple`. `None` skips
    /// that destination. Defaults to the source row.
    fn generate_row_for_put(
        &self,
        dest: FileNum,
        src_key: &[u8],
        src_val: &[u8],
    ) -> Option<(Vec<u8>, Vec<u8>)> {
        let _ = dest;
        Some((src_key.to_vec(), src_val.to_vec()))
    }

    /// Key to delete from `dest` for an `enq_delete_multiple`. `None`
    /// skips that destination. Defaults to the source key.
    fn generate_row_for_del(&self, dest: FileNum, src_key: &[u8], src_val: &[u8]) -> Option<Vec<u8>> {
        let _ = (dest, src_val);
        Some(src_key.to_vec())
    }

    /// The update function: new value for `key` given its old value and
    /// the logged `extra`. `None` deletes the row. Defaults to storing
    /// `extra`.
    fn update(&self, key: &[u8], old: Option<&[u8]>, extra: &[u8]) -> Option<Vec<u8>> {
        let _ = (key, old);
        Some(extra.to_vec())
    }
}

/// Hooks that keep every default.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl RecoveryHooks for NoopHooks {}
