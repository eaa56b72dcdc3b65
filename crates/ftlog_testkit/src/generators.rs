//! Property-based test generators using proptest.
//!
//! Provides strategies for log records and for ways of spreading a run of
//! entries over log files.

use ftlog_core::wal::{LogRecord, StillOpenInfo};
use ftlog_core::{BlockNum, FileNum, Lsn, TxnIdPair, XaXid};
use proptest::prelude::*;

/// Strategy for byte strings such as keys and values.
pub fn bytes_strategy(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..max_len)
}

/// Strategy for transaction id pairs, including none and nested ids.
pub fn xid_strategy() -> impl Strategy<Value = TxnIdPair> {
    prop_oneof![
        Just(TxnIdPair::NONE),
        (1u64..1000).prop_map(TxnIdPair::root),
        (1u64..1000, 1u64..10).prop_map(|(root, child)| TxnIdPair::child(root, child)),
    ]
}

/// Strategy for file numbers.
pub fn filenum_strategy() -> impl Strategy<Value = FileNum> {
    (0u32..64).prop_map(FileNum::new)
}

/// Strategy for internal file names.
pub fn iname_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z]{1,8}(/[a-z]{1,8})?\\.ft").expect("Invalid regex")
}

fn xa_xid_strategy() -> impl Strategy<Value = XaXid> {
    (any::<i32>(), bytes_strategy(64), bytes_strategy(64))
        .prop_map(|(format_id, gtrid, bqual)| XaXid::new(format_id, gtrid, bqual))
}

fn still_open_info_strategy() -> impl Strategy<Value = StillOpenInfo> {
    (
        any::<u64>(),
        prop::collection::vec(filenum_strategy(), 0..4),
        any::<bool>(),
        any::<u64>(),
        -1i64..100,
    )
        .prop_map(|(raw, open_filenums, force, nodes, block)| StillOpenInfo {
            rollentry_raw_count: raw,
            open_filenums,
            force_fsync_on_commit: force,
            num_rollback_nodes: nodes,
            num_rollentries: raw / 2,
            spilled_rollback_head: BlockNum(block),
            spilled_rollback_tail: BlockNum(block),
            current_rollback: BlockNum::NONE,
        })
}

/// Strategy for log records of every kind.
///
/// Field values are arbitrary; the records are meant for the codec and the
/// cursor, not for replay.
pub fn record_strategy() -> impl Strategy<Value = LogRecord> {
    prop_oneof![
        (any::<u64>(), bytes_strategy(64))
            .prop_map(|(timestamp, comment)| LogRecord::Comment { timestamp, comment }),
        (any::<u64>(), any::<u64>())
            .prop_map(|(timestamp, last_xid)| LogRecord::BeginCheckpoint { timestamp, last_xid }),
        (any::<u64>(), any::<u64>(), any::<u32>(), any::<u32>()).prop_map(|(lsn, timestamp, f, x)| {
            LogRecord::EndCheckpoint {
                lsn_begin_checkpoint: Lsn::new(lsn),
                timestamp,
                num_fassociate_entries: f,
                num_xstillopen_entries: x,
            }
        }),
        (filenum_strategy(), any::<u32>(), iname_strategy(), any::<bool>()).prop_map(
            |(filenum, treeflags, iname, unlink_on_close)| LogRecord::Fassociate {
                filenum,
                treeflags,
                iname,
                unlink_on_close,
            }
        ),
        (xid_strategy(), xid_strategy(), still_open_info_strategy())
            .prop_map(|(xid, parentxid, info)| LogRecord::XStillOpen { xid, parentxid, info }),
        (xid_strategy(), xa_xid_strategy(), still_open_info_strategy())
            .prop_map(|(xid, xa_xid, info)| LogRecord::XStillOpenPrepared { xid, xa_xid, info }),
        (xid_strategy(), xid_strategy())
            .prop_map(|(xid, parentxid)| LogRecord::XBegin { xid, parentxid }),
        xid_strategy().prop_map(|xid| LogRecord::XCommit { xid }),
        xid_strategy().prop_map(|xid| LogRecord::XAbort { xid }),
        (xid_strategy(), xa_xid_strategy()).prop_map(|(xid, xa_xid)| LogRecord::XPrepare { xid, xa_xid }),
        (xid_strategy(), filenum_strategy(), iname_strategy(), any::<u32>(), any::<u8>()).prop_map(
            |(xid, filenum, iname, treeflags, compression_method)| LogRecord::FCreate {
                xid,
                filenum,
                iname,
                mode: 0o644,
                treeflags,
                nodesize: 4 << 20,
                basementnodesize: 128 << 10,
                compression_method,
            }
        ),
        (iname_strategy(), filenum_strategy(), any::<u32>()).prop_map(|(iname, filenum, treeflags)| {
            LogRecord::FOpen {
                iname,
                filenum,
                treeflags,
            }
        }),
        (iname_strategy(), filenum_strategy())
            .prop_map(|(iname, filenum)| LogRecord::FClose { iname, filenum }),
        (xid_strategy(), filenum_strategy())
            .prop_map(|(xid, filenum)| LogRecord::FDelete { xid, filenum }),
        (filenum_strategy(), xid_strategy(), bytes_strategy(32), bytes_strategy(256)).prop_map(
            |(filenum, xid, key, value)| LogRecord::EnqInsert {
                filenum,
                xid,
                key,
                value,
            }
        ),
        (filenum_strategy(), xid_strategy(), bytes_strategy(32), bytes_strategy(256)).prop_map(
            |(filenum, xid, key, value)| LogRecord::EnqInsertNoOverwrite {
                filenum,
                xid,
                key,
                value,
            }
        ),
        (filenum_strategy(), xid_strategy(), bytes_strategy(32))
            .prop_map(|(filenum, xid, key)| LogRecord::EnqDeleteAny { filenum, xid, key }),
        (
            filenum_strategy(),
            prop::collection::vec(filenum_strategy(), 0..4),
            xid_strategy(),
            bytes_strategy(32),
            bytes_strategy(64),
        )
            .prop_map(|(src_filenum, dest_filenums, xid, src_key, src_val)| {
                LogRecord::EnqInsertMultiple {
                    src_filenum,
                    dest_filenums,
                    xid,
                    src_key,
                    src_val,
                }
            }),
        (
            filenum_strategy(),
            prop::collection::vec(filenum_strategy(), 0..4),
            xid_strategy(),
            bytes_strategy(32),
            bytes_strategy(64),
        )
            .prop_map(|(src_filenum, dest_filenums, xid, src_key, src_val)| {
                LogRecord::EnqDeleteMultiple {
                    src_filenum,
                    dest_filenums,
                    xid,
                    src_key,
                    src_val,
                }
            }),
        (filenum_strategy(), xid_strategy(), bytes_strategy(32), bytes_strategy(32)).prop_map(
            |(filenum, xid, key, extra)| LogRecord::EnqUpdate {
                filenum,
                xid,
                key,
                extra,
            }
        ),
        (filenum_strategy(), xid_strategy(), bytes_strategy(32), any::<bool>()).prop_map(
            |(filenum, xid, extra, is_resetting_op)| LogRecord::EnqUpdateBroadcast {
                filenum,
                xid,
                extra,
                is_resetting_op,
            }
        ),
        (any::<u64>(), any::<u64>())
            .prop_map(|(timestamp, last_xid)| LogRecord::Shutdown { timestamp, last_xid }),
        (
            filenum_strategy(),
            xid_strategy(),
            bytes_strategy(32),
            bytes_strategy(32),
            any::<bool>(),
        )
            .prop_map(|(filenum, xid, old_descriptor, new_descriptor, update_cmp_descriptor)| {
                LogRecord::ChangeFDescriptor {
                    filenum,
                    xid,
                    old_descriptor,
                    new_descriptor,
                    update_cmp_descriptor,
                }
            }),
        (xid_strategy(), prop::collection::vec(filenum_strategy(), 0..4))
            .prop_map(|(xid, hot_index_filenums)| LogRecord::HotIndex {
                xid,
                hot_index_filenums,
            }),
        (xid_strategy(), filenum_strategy(), iname_strategy()).prop_map(
            |(xid, old_filenum, new_iname)| LogRecord::Load {
                xid,
                old_filenum,
                new_iname,
            }
        ),
    ]
}

/// Strategy for a non-empty run of records.
pub fn records_strategy(max_len: usize) -> impl Strategy<Value = Vec<LogRecord>> {
    prop::collection::vec(record_strategy(), 1..max_len.max(2))
}

/// How many entries go into each log file; zeros are empty files.
///
/// Returns `(per_file_counts, header_only)` where `header_only[i]` says
/// whether an empty file gets a header or is zero bytes long.
pub fn file_layout_strategy(entries: usize) -> impl Strategy<Value = (Vec<usize>, Vec<bool>)> {
    prop::collection::vec((0..=entries, any::<bool>()), 1..8).prop_map(move |cuts| {
        let mut points: Vec<usize> = cuts.iter().map(|(p, _)| *p).collect();
        points.sort_unstable();
        let mut counts = Vec::with_capacity(points.len() + 1);
        let mut prev = 0;
        for point in &points {
            counts.push(point - prev);
            prev = *point;
        }
        counts.push(entries - prev);
        let mut header_only: Vec<bool> = cuts.into_iter().map(|(_, h)| h).collect();
        header_only.push(true);
        (counts, header_only)
    })
}
