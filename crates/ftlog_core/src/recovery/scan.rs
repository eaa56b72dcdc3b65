//! Checkpoint tracking for the two recovery passes.

use crate::error::{CoreError, CoreResult};
use crate::types::{Lsn, TxnId};
use crate::wal::{LogEntry, LogRecord};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Where a recovery run is, in the order the states are visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    /// Scanning backward, no checkpoint end seen yet.
    BackwardNewerCheckpointEnd,
    /// Scanning backward between a checkpoint end and its begin.
    BackwardBetweenCheckpointBeginEnd,
    /// Scanning forward inside the checkpoint.
    ForwardBetweenCheckpointBeginEnd,
    /// Scanning forward past the checkpoint end.
    ForwardNewerCheckpointEnd,
}

impl fmt::Display for ScanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::BackwardNewerCheckpointEnd => "backward_newer_checkpoint_end",
            Self::BackwardBetweenCheckpointBeginEnd => "backward_between_checkpoint_begin_end",
            Self::ForwardBetweenCheckpointBeginEnd => "forward_between_checkpoint_begin_end",
            Self::ForwardNewerCheckpointEnd => "forward_newer_checkpoint_end",
        };
        f.write_str(name)
    }
}

/// What the scans have learned about the checkpoint recovery starts from.
#[derive(Debug, Clone)]
pub struct ScanInfo {
    /// Current state.
    pub state: ScanState,
    /// LSN of the checkpoint begin.
    pub checkpoint_begin_lsn: Option<Lsn>,
    /// LSN of the checkpoint end.
    pub checkpoint_end_lsn: Option<Lsn>,
    /// Timestamp of the checkpoint begin.
    pub checkpoint_begin_timestamp: u64,
    /// Timestamp of the checkpoint end.
    pub checkpoint_end_timestamp: u64,
    /// `fassociate` records the checkpoint end announces.
    pub expected_fassociate: u32,
    /// `xstillopen` records the checkpoint end announces.
    pub expected_xstillopen: u32,
    /// `fassociate` records replayed inside the checkpoint.
    pub num_fassociate: u32,
    /// `xstillopen` records replayed inside the checkpoint.
    pub num_xstillopen: u32,
    /// Transaction id counter seeded by the checkpoint begin.
    pub last_xid: Option<TxnId>,
}

impl Default for ScanInfo {
    fn default() -> Self {
        Self {
            state: ScanState::BackwardNewerCheckpointEnd,
            checkpoint_begin_lsn: None,
            checkpoint_end_lsn: None,
            checkpoint_begin_timestamp: 0,
            checkpoint_end_timestamp: 0,
            expected_fassociate: 0,
            expected_xstillopen: 0,
            num_fassociate: 0,
            num_xstillopen: 0,
            last_xid: None,
        }
    }
}

impl ScanInfo {
    /// Creates the state a recovery run starts in.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Handles one entry of the backward scan. Returns true once the scan
    /// has reached the checkpoint begin it should turn around at.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolViolation` for two checkpoint ends with no begin
    /// between them, or a begin that does not match the end.
    pub fn backward(&mut self, entry: &LogEntry) -> CoreResult<bool> {
        match (self.state, &entry.record) {
            (
                ScanState::BackwardNewerCheckpointEnd,
                LogRecord::EndCheckpoint {
                    lsn_begin_checkpoint,
                    timestamp,
                    num_fassociate_entries,
                    num_xstillopen_entries,
                },
            ) => {
                self.checkpoint_begin_lsn = Some(*lsn_begin_checkpoint);
                self.checkpoint_end_lsn = Some(entry.lsn);
                self.checkpoint_end_timestamp = *timestamp;
                self.expected_fassociate = *num_fassociate_entries;
                self.expected_xstillopen = *num_xstillopen_entries;
                self.state = ScanState::BackwardBetweenCheckpointBeginEnd;
                debug!(end = %entry.lsn, begin = %lsn_begin_checkpoint, "checkpoint end found");
                Ok(false)
            }
            (ScanState::BackwardBetweenCheckpointBeginEnd, LogRecord::EndCheckpoint { .. }) => {
                Err(CoreError::protocol_violation(format!(
                    "checkpoint end at {} follows another checkpoint end",
                    entry.lsn
                )))
            }
            (
                ScanState::BackwardBetweenCheckpointBeginEnd,
                LogRecord::BeginCheckpoint { timestamp, .. },
            ) => {
                if self.checkpoint_begin_lsn != Some(entry.lsn) {
                    return Err(CoreError::protocol_violation(format!(
                        "checkpoint begin at {} does not match the checkpoint end",
                        entry.lsn
                    )));
                }
                self.checkpoint_begin_timestamp = *timestamp;
                self.state = ScanState::ForwardBetweenCheckpointBeginEnd;
                info!(lsn = %entry.lsn, "backward scan turned around at checkpoint begin");
                Ok(true)
            }
            (ScanState::BackwardNewerCheckpointEnd | ScanState::BackwardBetweenCheckpointBeginEnd, _) => {
                Ok(false)
            }
            (state, _) => Err(CoreError::invalid_operation(format!(
                "backward scan entry in state {state}"
            ))),
        }
    }

    /// Handles the backward scan running off the start of the log.
    ///
    /// Without a checkpoint end the forward scan replays the whole log. An
    /// end whose begin is gone is corruption rather than a checkpoint cut
    /// short: the writer trims only up to a begin whose end is on disk.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolViolation` if a checkpoint end was seen but its
    /// begin is missing.
    pub fn ran_off_start(&mut self) -> CoreResult<()> {
        match self.state {
            ScanState::BackwardNewerCheckpointEnd => {
                self.state = ScanState::ForwardNewerCheckpointEnd;
                info!("no complete checkpoint, replaying the whole log");
                Ok(())
            }
            ScanState::BackwardBetweenCheckpointBeginEnd => Err(CoreError::protocol_violation(
                format!(
                    "checkpoint begin {} is missing from the log",
                    self.checkpoint_begin_lsn.unwrap_or_default()
                ),
            )),
            state => Err(CoreError::invalid_operation(format!(
                "backward scan ended in state {state}"
            ))),
        }
    }

    /// Returns true while replaying inside the checkpoint.
    #[must_use]
    pub fn in_checkpoint(&self) -> bool {
        self.state == ScanState::ForwardBetweenCheckpointBeginEnd
    }

    /// Fails unless the scan is in a forward state.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` during the backward scan.
    pub fn require_forward(&self) -> CoreResult<()> {
        match self.state {
            ScanState::ForwardBetweenCheckpointBeginEnd | ScanState::ForwardNewerCheckpointEnd => Ok(()),
            state => Err(CoreError::invalid_operation(format!(
                "forward scan entry in state {state}"
            ))),
        }
    }
}

/// Time-based progress reporting for long scans.
#[derive(Debug)]
pub struct Progress {
    interval: Duration,
    last_report: Instant,
    entries: u64,
}

impl Progress {
    /// Entries between two clock checks.
    pub const CHECK_EVERY: u64 = 1000;

    /// Creates a tracker reporting at most once per `interval`.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_report: Instant::now(),
            entries: 0,
        }
    }

    /// Counts one entry and reports if the interval has passed.
    pub fn tick(&mut self, pass: &'static str, lsn: Lsn) {
        self.entries += 1;
        if self.entries % Self::CHECK_EVERY == 0 && self.last_report.elapsed() >= self.interval {
            info!(pass, %lsn, entries = self.entries, "recovery progress");
            self.last_report = Instant::now();
        }
    }

    /// Entries counted so far.
    #[must_use]
    pub fn entries(&self) -> u64 {
        self.entries
    }
}
