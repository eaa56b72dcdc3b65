//! Resolution of the transactions still running when the log ends.

use crate::error::CoreResult;
use crate::recovery::handlers::Replay;
use crate::recovery::hooks::PreparedTxn;
use crate::recovery::txn::{TxnIndex, TxnState};
use crate::types::TxnIdPair;
use crate::wal::{LogRecord, LogWriter};
use tracing::{debug, info};

/// What resolution did.
#[derive(Debug, Default)]
pub struct Resolution {
    /// Transactions aborted, children before their parents.
    pub aborted: Vec<TxnIdPair>,
    /// Transactions left prepared.
    pub prepared: Vec<PreparedTxn>,
}

/// Aborts every running transaction that is not prepared, newest root
/// first, and hands prepared ones to the hooks.
///
/// Each abort is logged through `writer` before it is carried out.
///
/// # Errors
///
/// Returns an error if an abort cannot be logged or undone.
pub fn resolve_live(replay: &mut Replay<'_>, writer: &mut LogWriter) -> CoreResult<Resolution> {
    let mut resolution = Resolution::default();

    for xid in replay.txns.roots_newest_first() {
        let Some(index) = replay.txns.index_of(xid) else {
            continue;
        };
        let prepared = replay.txns.at(index).and_then(|txn| match (txn.state, &txn.xa_xid) {
            (TxnState::Preparing, Some(xa_xid)) => Some(PreparedTxn {
                xid: txn.xid,
                xa_xid: xa_xid.clone(),
            }),
            _ => None,
        });
        match prepared {
            Some(prepared) => {
                debug!(%xid, "transaction left prepared");
                replay.hooks.on_prepared(&prepared);
                resolution.prepared.push(prepared);
            }
            None => abort_tree(replay, index, writer, &mut resolution.aborted)?,
        }
    }

    info!(
        aborted = resolution.aborted.len(),
        prepared = resolution.prepared.len(),
        "live transactions resolved"
    );
    Ok(resolution)
}

fn abort_tree(
    replay: &mut Replay<'_>,
    index: TxnIndex,
    writer: &mut LogWriter,
    aborted: &mut Vec<TxnIdPair>,
) -> CoreResult<()> {
    let Some(txn) = replay.txns.at(index) else {
        return Ok(());
    };
    let xid = txn.xid;
    let children = txn.children.clone();

    for child in children.into_iter().rev() {
        abort_tree(replay, child, writer, aborted)?;
    }

    let lsn = writer.append(&LogRecord::XAbort { xid })?;
    replay.abort_txn(xid, lsn)?;
    aborted.push(xid);
    Ok(())
}
