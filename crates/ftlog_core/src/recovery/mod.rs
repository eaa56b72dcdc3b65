//! Crash recovery.
//!
//! Recovery reads the log twice. The backward scan starts at the newest
//! record and stops at the begin record of the newest complete checkpoint
//! (or runs off the start of the log when there is none). The forward scan
//! replays from there to the end of the log, rebuilding open dictionaries
//! and running transactions. Transactions still running at the end are
//! aborted, prepared ones are handed to the caller, and a fresh checkpoint
//! makes the result durable.
//!
//! Every failure is fatal: [`recover`] reports it as
//! [`CoreError::RecoveryFailed`] and the engine must not start.

mod checkpoint;
mod file_map;
mod handlers;
mod hooks;
mod resolve;
mod scan;
mod txn;

pub use checkpoint::{CheckpointLsns, Checkpointer, LogCheckpointer};
pub use file_map::{FileMap, FileMapEntry};
pub use handlers::Replay;
pub use hooks::{NoopHooks, PreparedTxn, RecoveryHooks};
pub use resolve::{resolve_live, Resolution};
pub use scan::{Progress, ScanInfo, ScanState};
pub use txn::{RollbackEntry, RollbackInfo, Transaction, TxnIndex, TxnState, TxnTable};

use crate::config::{CursorOptions, RecoveryConfig};
use crate::dictionary::DictionaryStore;
use crate::dir::RecoveryLock;
use crate::error::{CoreError, CoreResult};
use crate::types::{Lsn, TxnId, TxnIdPair};
use crate::wal::{LogCursor, LogEntry, LogRecord, LogWriter};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, error, info};

/// Comment written once recovery has replayed the log.
pub const RECOVERY_COMMENT: &str = "recover";

/// What a call to [`recover`] did.
#[derive(Debug, Clone, Default)]
pub struct RecoveryOutcome {
    /// False if the log was clean and nothing ran.
    pub recovered: bool,
    /// Begin record of the checkpoint replay started from.
    pub checkpoint_begin: Option<Lsn>,
    /// End record of that checkpoint.
    pub checkpoint_end: Option<Lsn>,
    /// Entries replayed by the forward scan.
    pub entries_replayed: u64,
    /// Transactions aborted at the end of the log.
    pub aborted: Vec<TxnIdPair>,
    /// Transactions left prepared.
    pub prepared: Vec<PreparedTxn>,
    /// Highest transaction id in the log.
    pub last_xid: TxnId,
    /// Checkpoint written once recovery finished.
    pub new_checkpoint: Option<CheckpointLsns>,
}

/// Returns true unless the log ends with a clean shutdown.
///
/// An empty log needs recovery only when `ignore_log_empty` is false. A log
/// that cannot be read needs recovery, which will report what is wrong.
///
/// # Errors
///
/// Currently infallible; read failures count as needing recovery.
pub fn needs_recovery(log_dir: &Path, ignore_log_empty: bool) -> CoreResult<bool> {
    let mut cursor = match LogCursor::create(log_dir, CursorOptions::new()) {
        Ok(cursor) => cursor,
        Err(e) => {
            debug!(error = %e, "log unreadable, recovery needed");
            return Ok(true);
        }
    };
    let needed = match cursor.last() {
        Ok(entry) => !matches!(entry.record, LogRecord::Shutdown { .. }),
        Err(CoreError::EndOfLog) => !ignore_log_empty,
        Err(e) => {
            debug!(error = %e, "log tail unreadable, recovery needed");
            true
        }
    };
    Ok(needed)
}

/// Recovers the log in `config.log_dir` into the dictionaries of `store`.
///
/// Takes the recovery lock for the whole run. A clean log is left alone
/// unless `config.force_recovery` is set.
///
/// # Errors
///
/// Returns `Locked` if another process holds the recovery lock, and
/// `RecoveryFailed` wrapping the cause for anything else.
pub fn recover<S: DictionaryStore, H: RecoveryHooks>(
    config: &RecoveryConfig,
    store: &mut S,
    hooks: &mut H,
) -> CoreResult<RecoveryOutcome> {
    let _lock = RecoveryLock::acquire(&config.log_dir)?;

    let needed = needs_recovery(&config.log_dir, true).map_err(CoreError::recovery_failed)?;
    if !needed && !config.force_recovery {
        info!(log_dir = %config.log_dir.display(), "log is clean, recovery skipped");
        return Ok(RecoveryOutcome::default());
    }

    run(config, store, hooks).map_err(|e| {
        error!(error = %e, "recovery failed");
        CoreError::recovery_failed(e)
    })
}

fn run(
    config: &RecoveryConfig,
    store: &mut dyn DictionaryStore,
    hooks: &mut dyn RecoveryHooks,
) -> CoreResult<RecoveryOutcome> {
    let started = Instant::now();
    info!(log_dir = %config.log_dir.display(), data_dir = %config.data_dir.display(), "recovery started");

    let mut cursor = LogCursor::create(&config.log_dir, config.cursor_options())?;
    let mut replay = Replay::new(store, hooks);

    // Backward scan.
    info!(files = cursor.files().len(), "backward scan started");
    let mut progress = Progress::new(config.progress_interval);
    let mut read = read_entry(cursor.last());
    let start = loop {
        let Some(entry) = read? else {
            replay.scan.ran_off_start()?;
            break read_entry(cursor.first())?;
        };
        progress.tick("backward", entry.lsn);
        if replay.scan.backward(&entry)? {
            break Some(entry);
        }
        read = read_entry(cursor.prev());
    };
    replay.hooks.after_backward_scan(replay.scan.checkpoint_begin_lsn);

    // Forward scan.
    info!(from = ?start.as_ref().map(|e| e.lsn), state = %replay.scan.state, "forward scan started");
    let mut progress = Progress::new(config.progress_interval);
    let mut read = Ok(start);
    while let Some(entry) = read? {
        replay.forward(&entry)?;
        progress.tick("forward", entry.lsn);
        read = read_entry(cursor.next());
    }
    if replay.scan.state != ScanState::ForwardNewerCheckpointEnd {
        return Err(CoreError::protocol_violation(format!(
            "log ended in state {}",
            replay.scan.state
        )));
    }
    let entries_replayed = progress.entries();
    replay.hooks.after_forward_scan(entries_replayed);
    drop(cursor);
    info!(
        entries = entries_replayed,
        files = replay.files.len(),
        txns = replay.txns.len(),
        "forward scan finished"
    );

    let mut writer = LogWriter::open(&config.log_dir, config.writer_options())?;
    let resolution = resolve_live(&mut replay, &mut writer)?;

    let closed = replay
        .files
        .close_all(writer.last_lsn(), &mut *replay.store)?;
    info!(closed, "dictionaries closed");

    writer.append(&LogRecord::comment(RECOVERY_COMMENT))?;
    let last_xid = replay.last_xid;
    let new_checkpoint = LogCheckpointer::new(&mut writer).checkpoint(&replay.files, &replay.txns, last_xid)?;

    // Prepared transactions must be found again by the next recovery, so the
    // log only ends cleanly once none are left.
    if resolution.prepared.is_empty() {
        writer.shutdown(last_xid)?;
    }

    info!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        aborted = resolution.aborted.len(),
        prepared = resolution.prepared.len(),
        "recovery done"
    );
    Ok(RecoveryOutcome {
        recovered: true,
        checkpoint_begin: replay.scan.checkpoint_begin_lsn,
        checkpoint_end: replay.scan.checkpoint_end_lsn,
        entries_replayed,
        aborted: resolution.aborted,
        prepared: resolution.prepared,
        last_xid,
        new_checkpoint: Some(new_checkpoint),
    })
}

fn read_entry(read: CoreResult<&LogEntry>) -> CoreResult<Option<LogEntry>> {
    match read {
        Ok(entry) => Ok(Some(entry.clone())),
        Err(CoreError::EndOfLog) => Ok(None),
        Err(e) => Err(e),
    }
}
