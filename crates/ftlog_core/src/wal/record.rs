//! Log record types and their field encodings.

use crate::error::{CoreError, CoreResult};
use crate::types::{BlockNum, FileNum, Lsn, TxnId, TxnIdPair, XaXid};
use crate::wal::codec::{frame_record, unframe_record, FieldReader, FieldWriter};
use std::time::{SystemTime, UNIX_EPOCH};

/// Type tag of a log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LogRecordType {
    /// Checkpoint start.
    BeginCheckpoint = b'x',
    /// Checkpoint end.
    EndCheckpoint = b'X',
    /// File open at checkpoint time.
    Fassociate = b'f',
    /// Transaction open at checkpoint time.
    XStillOpen = b's',
    /// Prepared transaction open at checkpoint time.
    XStillOpenPrepared = b'p',
    /// Transaction begin.
    XBegin = b'b',
    /// Transaction commit.
    XCommit = b'C',
    /// Transaction abort.
    XAbort = b'q',
    /// Transaction prepare.
    XPrepare = b'P',
    /// Dictionary creation.
    FCreate = b'F',
    /// Dictionary open.
    FOpen = b'O',
    /// Dictionary close.
    FClose = b'e',
    /// Dictionary deletion.
    FDelete = b'U',
    /// Insert with overwrite.
    EnqInsert = b'I',
    /// Insert without overwrite.
    EnqInsertNoOverwrite = b'i',
    /// Delete by key.
    EnqDeleteAny = b'E',
    /// Insert into several dictionaries.
    EnqInsertMultiple = b'm',
    /// Delete from several dictionaries.
    EnqDeleteMultiple = b'M',
    /// Update of one key.
    EnqUpdate = b'u',
    /// Update of every key.
    EnqUpdateBroadcast = b'B',
    /// Free-form comment.
    Comment = b'T',
    /// Clean shutdown marker.
    Shutdown = b'Q',
    /// Descriptor change.
    ChangeFDescriptor = b'D',
    /// Hot index build.
    HotIndex = b'h',
    /// Bulk load.
    Load = b'l',
}

impl LogRecordType {
    /// Every record type, in tag order of declaration.
    pub const ALL: [Self; 25] = [
        Self::BeginCheckpoint,
        Self::EndCheckpoint,
        Self::Fassociate,
        Self::XStillOpen,
        Self::XStillOpenPrepared,
        Self::XBegin,
        Self::XCommit,
        Self::XAbort,
        Self::XPrepare,
        Self::FCreate,
        Self::FOpen,
        Self::FClose,
        Self::FDelete,
        Self::EnqInsert,
        Self::EnqInsertNoOverwrite,
        Self::EnqDeleteAny,
        Self::EnqInsertMultiple,
        Self::EnqDeleteMultiple,
        Self::EnqUpdate,
        Self::EnqUpdateBroadcast,
        Self::Comment,
        Self::Shutdown,
        Self::ChangeFDescriptor,
        Self::HotIndex,
        Self::Load,
    ];

    /// Converts a tag byte to a record type.
    pub fn from_byte(b: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_byte() == b)
    }

    /// Converts the record type to its tag byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }

    /// Lower-case record name as printed by log dumps.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::BeginCheckpoint => "begin_checkpoint",
            Self::EndCheckpoint => "end_checkpoint",
            Self::Fassociate => "fassociate",
            Self::XStillOpen => "xstillopen",
            Self::XStillOpenPrepared => "xstillopenprepared",
            Self::XBegin => "xbegin",
            Self::XCommit => "xcommit",
            Self::XAbort => "xabort",
            Self::XPrepare => "xprepare",
            Self::FCreate => "fcreate",
            Self::FOpen => "fopen",
            Self::FClose => "fclose",
            Self::FDelete => "fdelete",
            Self::EnqInsert => "enq_insert",
            Self::EnqInsertNoOverwrite => "enq_insert_no_overwrite",
            Self::EnqDeleteAny => "enq_delete_any",
            Self::EnqInsertMultiple => "enq_insert_multiple",
            Self::EnqDeleteMultiple => "enq_delete_multiple",
            Self::EnqUpdate => "enq_update",
            Self::EnqUpdateBroadcast => "enq_updatebroadcast",
            Self::Comment => "comment",
            Self::Shutdown => "shutdown",
            Self::ChangeFDescriptor => "change_fdescriptor",
            Self::HotIndex => "hot_index",
            Self::Load => "load",
        }
    }
}

/// Rollback-log bookkeeping carried by `xstillopen` records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StillOpenInfo {
    /// Raw count of rollback entries.
    pub rollentry_raw_count: u64,
    /// Files the transaction had touched.
    pub open_filenums: Vec<FileNum>,
    /// Whether commit must fsync the log.
    pub force_fsync_on_commit: bool,
    /// Rollback nodes written.
    pub num_rollback_nodes: u64,
    /// Rollback entries written.
    pub num_rollentries: u64,
    /// Oldest spilled rollback block.
    pub spilled_rollback_head: BlockNum,
    /// Newest spilled rollback block.
    pub spilled_rollback_tail: BlockNum,
    /// Rollback block currently being filled.
    pub current_rollback: BlockNum,
}

/// A log record body.
///
/// Every variant owns its byte strings, so dropping an entry releases its
/// payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogRecord {
    /// A checkpoint begins.
    BeginCheckpoint {
        /// Wall-clock time in microseconds.
        timestamp: u64,
        /// Largest transaction id handed out so far.
        last_xid: TxnId,
    },
    /// A checkpoint ends.
    EndCheckpoint {
        /// LSN of the matching begin record.
        lsn_begin_checkpoint: Lsn,
        /// Wall-clock time in microseconds.
        timestamp: u64,
        /// Number of `fassociate` records written by the checkpoint.
        num_fassociate_entries: u32,
        /// Number of `xstillopen*` records written by the checkpoint.
        num_xstillopen_entries: u32,
    },
    /// Binds a file number to an internal file name at checkpoint time.
    Fassociate {
        /// File number.
        filenum: FileNum,
        /// Tree flags.
        treeflags: u32,
        /// Internal file name.
        iname: String,
        /// Whether the file is removed when closed.
        unlink_on_close: bool,
    },
    /// A transaction that was live when the checkpoint began.
    XStillOpen {
        /// Transaction id.
        xid: TxnIdPair,
        /// Parent id, `NONE` for a root.
        parentxid: TxnIdPair,
        /// Rollback metadata.
        info: StillOpenInfo,
    },
    /// A prepared transaction that was live when the checkpoint began.
    XStillOpenPrepared {
        /// Transaction id.
        xid: TxnIdPair,
        /// XA id it was prepared with.
        xa_xid: XaXid,
        /// Rollback metadata.
        info: StillOpenInfo,
    },
    /// Transaction begin.
    XBegin {
        /// Transaction id.
        xid: TxnIdPair,
        /// Parent id, `NONE` for a root.
        parentxid: TxnIdPair,
    },
    /// Transaction commit.
    XCommit {
        /// Transaction id.
        xid: TxnIdPair,
    },
    /// Transaction abort.
    XAbort {
        /// Transaction id.
        xid: TxnIdPair,
    },
    /// Transaction prepare (XA phase one).
    XPrepare {
        /// Transaction id.
        xid: TxnIdPair,
        /// XA id.
        xa_xid: XaXid,
    },
    /// Dictionary creation.
    FCreate {
        /// Creating transaction.
        xid: TxnIdPair,
        /// File number.
        filenum: FileNum,
        /// Internal file name.
        iname: String,
        /// Unix mode bits.
        mode: u32,
        /// Tree flags.
        treeflags: u32,
        /// Node size.
        nodesize: u32,
        /// Basement node size.
        basementnodesize: u32,
        /// Compression method.
        compression_method: u8,
    },
    /// Dictionary open.
    FOpen {
        /// Internal file name.
        iname: String,
        /// File number.
        filenum: FileNum,
        /// Tree flags.
        treeflags: u32,
    },
    /// Dictionary close.
    FClose {
        /// Internal file name.
        iname: String,
        /// File number.
        filenum: FileNum,
    },
    /// Dictionary deletion, effective when the transaction commits.
    FDelete {
        /// Deleting transaction.
        xid: TxnIdPair,
        /// File number.
        filenum: FileNum,
    },
    /// Insert that replaces an existing value.
    EnqInsert {
        /// Target file.
        filenum: FileNum,
        /// Transaction.
        xid: TxnIdPair,
        /// Key.
        key: Vec<u8>,
        /// Value.
        value: Vec<u8>,
    },
    /// Insert that keeps an existing value.
    EnqInsertNoOverwrite {
        /// Target file.
        filenum: FileNum,
        /// Transaction.
        xid: TxnIdPair,
        /// Key.
        key: Vec<u8>,
        /// Value.
        value: Vec<u8>,
    },
    /// Delete by key.
    EnqDeleteAny {
        /// Target file.
        filenum: FileNum,
        /// Transaction.
        xid: TxnIdPair,
        /// Key.
        key: Vec<u8>,
    },
    /// Insert of a source row and the rows derived from it.
    EnqInsertMultiple {
        /// Source file, `FileNum::NONE` if there is none.
        src_filenum: FileNum,
        /// Destination files.
        dest_filenums: Vec<FileNum>,
        /// Transaction.
        xid: TxnIdPair,
        /// Source key.
        src_key: Vec<u8>,
        /// Source value.
        src_val: Vec<u8>,
    },
    /// Delete of a source row and the rows derived from it.
    EnqDeleteMultiple {
        /// Source file, `FileNum::NONE` if there is none.
        src_filenum: FileNum,
        /// Destination files.
        dest_filenums: Vec<FileNum>,
        /// Transaction.
        xid: TxnIdPair,
        /// Source key.
        src_key: Vec<u8>,
        /// Source value.
        src_val: Vec<u8>,
    },
    /// Update of one key through the update function.
    EnqUpdate {
        /// Target file.
        filenum: FileNum,
        /// Transaction.
        xid: TxnIdPair,
        /// Key.
        key: Vec<u8>,
        /// Update argument.
        extra: Vec<u8>,
    },
    /// Update of every key through the update function.
    EnqUpdateBroadcast {
        /// Target file.
        filenum: FileNum,
        /// Transaction.
        xid: TxnIdPair,
        /// Update argument.
        extra: Vec<u8>,
        /// Whether the update resets the tree.
        is_resetting_op: bool,
    },
    /// Free-form comment.
    Comment {
        /// Wall-clock time in microseconds.
        timestamp: u64,
        /// Comment text.
        comment: Vec<u8>,
    },
    /// Clean shutdown marker.
    Shutdown {
        /// Wall-clock time in microseconds.
        timestamp: u64,
        /// Largest transaction id handed out.
        last_xid: TxnId,
    },
    /// Descriptor change.
    ChangeFDescriptor {
        /// Target file.
        filenum: FileNum,
        /// Transaction.
        xid: TxnIdPair,
        /// Previous descriptor.
        old_descriptor: Vec<u8>,
        /// New descriptor.
        new_descriptor: Vec<u8>,
        /// Whether the comparison descriptor changes too.
        update_cmp_descriptor: bool,
    },
    /// Hot index build.
    HotIndex {
        /// Transaction.
        xid: TxnIdPair,
        /// Indexes being built.
        hot_index_filenums: Vec<FileNum>,
    },
    /// Bulk load replacing a dictionary file.
    Load {
        /// Transaction.
        xid: TxnIdPair,
        /// File being replaced.
        old_filenum: FileNum,
        /// Internal name of the loaded file.
        new_iname: String,
    },
}

/// A decoded log record with its position in the log stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Record LSN.
    pub lsn: Lsn,
    /// Record body.
    pub record: LogRecord,
}

impl LogEntry {
    /// Returns the record type.
    #[must_use]
    pub fn record_type(&self) -> LogRecordType {
        self.record.record_type()
    }

    /// Encodes this entry as one framed record.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        frame_record(
            self.record.record_type().as_byte(),
            self.lsn,
            &self.record.encode_fields(),
        )
    }

    /// Decodes one framed record.
    ///
    /// # Errors
    ///
    /// Returns `BadFormat` for framing problems, unknown tags, or malformed
    /// fields.
    pub fn decode(data: &[u8]) -> CoreResult<Self> {
        let raw = unframe_record(data)?;
        let record_type = LogRecordType::from_byte(raw.tag).ok_or_else(|| {
            CoreError::bad_format(format!("unknown record tag 0x{:02x}", raw.tag))
        })?;
        let record = LogRecord::decode_fields(record_type, raw.fields)?;
        Ok(Self {
            lsn: raw.lsn,
            record,
        })
    }
}

/// Current wall-clock time in microseconds since the Unix epoch.
#[must_use]
pub fn timestamp_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}

fn write_info(w: &mut FieldWriter, info: &StillOpenInfo) {
    w.u64(info.rollentry_raw_count)
        .filenums(&info.open_filenums)
        .bool(info.force_fsync_on_commit)
        .u64(info.num_rollback_nodes)
        .u64(info.num_rollentries)
        .blocknum(info.spilled_rollback_head)
        .blocknum(info.spilled_rollback_tail)
        .blocknum(info.current_rollback);
}

fn read_info(r: &mut FieldReader<'_>) -> CoreResult<StillOpenInfo> {
    Ok(StillOpenInfo {
        rollentry_raw_count: r.u64()?,
        open_filenums: r.filenums()?,
        force_fsync_on_commit: r.bool()?,
        num_rollback_nodes: r.u64()?,
        num_rollentries: r.u64()?,
        spilled_rollback_head: r.blocknum()?,
        spilled_rollback_tail: r.blocknum()?,
        current_rollback: r.blocknum()?,
    })
}

impl LogRecord {
    /// Returns the record type.
    #[must_use]
    pub fn record_type(&self) -> LogRecordType {
        match self {
            Self::BeginCheckpoint { .. } => LogRecordType::BeginCheckpoint,
            Self::EndCheckpoint { .. } => LogRecordType::EndCheckpoint,
            Self::Fassociate { .. } => LogRecordType::Fassociate,
            Self::XStillOpen { .. } => LogRecordType::XStillOpen,
            Self::XStillOpenPrepared { .. } => LogRecordType::XStillOpenPrepared,
            Self::XBegin { .. } => LogRecordType::XBegin,
            Self::XCommit { .. } => LogRecordType::XCommit,
            Self::XAbort { .. } => LogRecordType::XAbort,
            Self::XPrepare { .. } => LogRecordType::XPrepare,
            Self::FCreate { .. } => LogRecordType::FCreate,
            Self::FOpen { .. } => LogRecordType::FOpen,
            Self::FClose { .. } => LogRecordType::FClose,
            Self::FDelete { .. } => LogRecordType::FDelete,
            Self::EnqInsert { .. } => LogRecordType::EnqInsert,
            Self::EnqInsertNoOverwrite { .. } => LogRecordType::EnqInsertNoOverwrite,
            Self::EnqDeleteAny { .. } => LogRecordType::EnqDeleteAny,
            Self::EnqInsertMultiple { .. } => LogRecordType::EnqInsertMultiple,
            Self::EnqDeleteMultiple { .. } => LogRecordType::EnqDeleteMultiple,
            Self::EnqUpdate { .. } => LogRecordType::EnqUpdate,
            Self::EnqUpdateBroadcast { .. } => LogRecordType::EnqUpdateBroadcast,
            Self::Comment { .. } => LogRecordType::Comment,
            Self::Shutdown { .. } => LogRecordType::Shutdown,
            Self::ChangeFDescriptor { .. } => LogRecordType::ChangeFDescriptor,
            Self::HotIndex { .. } => LogRecordType::HotIndex,
            Self::Load { .. } => LogRecordType::Load,
        }
    }

    /// Returns the transaction this record belongs to, if any.
    #[must_use]
    pub fn xid(&self) -> Option<TxnIdPair> {
        match self {
            Self::XStillOpen { xid, .. }
            | Self::XStillOpenPrepared { xid, .. }
            | Self::XBegin { xid, .. }
            | Self::XCommit { xid }
            | Self::XAbort { xid }
            | Self::XPrepare { xid, .. }
            | Self::FCreate { xid, .. }
            | Self::FDelete { xid, .. }
            | Self::EnqInsert { xid, .. }
            | Self::EnqInsertNoOverwrite { xid, .. }
            | Self::EnqDeleteAny { xid, .. }
            | Self::EnqInsertMultiple { xid, .. }
            | Self::EnqDeleteMultiple { xid, .. }
            | Self::EnqUpdate { xid, .. }
            | Self::EnqUpdateBroadcast { xid, .. }
            | Self::ChangeFDescriptor { xid, .. }
            | Self::HotIndex { xid, .. }
            | Self::Load { xid, .. } => Some(*xid),
            Self::BeginCheckpoint { .. }
            | Self::EndCheckpoint { .. }
            | Self::Fassociate { .. }
            | Self::FOpen { .. }
            | Self::FClose { .. }
            | Self::Comment { .. }
            | Self::Shutdown { .. } => None,
        }
    }

    /// Creates a comment record stamped with the current time.
    #[must_use]
    pub fn comment(text: impl Into<Vec<u8>>) -> Self {
        Self::Comment {
            timestamp: timestamp_now(),
            comment: text.into(),
        }
    }

    /// Serializes the record fields (without framing).
    #[must_use]
    pub fn encode_fields(&self) -> Vec<u8> {
        let mut w = FieldWriter::new();

        match self {
            Self::BeginCheckpoint {
                timestamp,
                last_xid,
            }
            | Self::Shutdown {
                timestamp,
                last_xid,
            } => {
                w.u64(*timestamp).u64(*last_xid);
            }
            Self::EndCheckpoint {
                lsn_begin_checkpoint,
                timestamp,
                num_fassociate_entries,
                num_xstillopen_entries,
            } => {
                w.lsn(*lsn_begin_checkpoint)
                    .u64(*timestamp)
                    .u32(*num_fassociate_entries)
                    .u32(*num_xstillopen_entries);
            }
            Self::Fassociate {
                filenum,
                treeflags,
                iname,
                unlink_on_close,
            } => {
                w.filenum(*filenum)
                    .u32(*treeflags)
                    .str(iname)
                    .bool(*unlink_on_close);
            }
            Self::XStillOpen {
                xid,
                parentxid,
                info,
            } => {
                w.xid(*xid).xid(*parentxid);
                write_info(&mut w, info);
            }
            Self::XStillOpenPrepared { xid, xa_xid, info } => {
                w.xid(*xid).xa_xid(xa_xid);
                write_info(&mut w, info);
            }
            Self::XBegin { xid, parentxid } => {
                w.xid(*xid).xid(*parentxid);
            }
            Self::XCommit { xid } | Self::XAbort { xid } => {
                w.xid(*xid);
            }
            Self::XPrepare { xid, xa_xid } => {
                w.xid(*xid).xa_xid(xa_xid);
            }
            Self::FCreate {
                xid,
                filenum,
                iname,
                mode,
                treeflags,
                nodesize,
                basementnodesize,
                compression_method,
            } => {
                w.xid(*xid)
                    .filenum(*filenum)
                    .str(iname)
                    .u32(*mode)
                    .u32(*treeflags)
                    .u32(*nodesize)
                    .u32(*basementnodesize)
                    .u8(*compression_method);
            }
            Self::FOpen {
                iname,
                filenum,
                treeflags,
            } => {
                w.str(iname).filenum(*filenum).u32(*treeflags);
            }
            Self::FClose { iname, filenum } => {
                w.str(iname).filenum(*filenum);
            }
            Self::FDelete { xid, filenum } => {
                w.xid(*xid).filenum(*filenum);
            }
            Self::EnqInsert {
                filenum,
                xid,
                key,
                value,
            }
            | Self::EnqInsertNoOverwrite {
                filenum,
                xid,
                key,
                value,
            } => {
                w.filenum(*filenum).xid(*xid).bytes(key).bytes(value);
            }
            Self::EnqDeleteAny { filenum, xid, key } => {
                w.filenum(*filenum).xid(*xid).bytes(key);
            }
            Self::EnqInsertMultiple {
                src_filenum,
                dest_filenums,
                xid,
                src_key,
                src_val,
            }
            | Self::EnqDeleteMultiple {
                src_filenum,
                dest_filenums,
                xid,
                src_key,
                src_val,
            } => {
                w.filenum(*src_filenum)
                    .filenums(dest_filenums)
                    .xid(*xid)
                    .bytes(src_key)
                    .bytes(src_val);
            }
            Self::EnqUpdate {
                filenum,
                xid,
                key,
                extra,
            } => {
                w.filenum(*filenum).xid(*xid).bytes(key).bytes(extra);
            }
            Self::EnqUpdateBroadcast {
                filenum,
                xid,
                extra,
                is_resetting_op,
            } => {
                w.filenum(*filenum)
                    .xid(*xid)
                    .bytes(extra)
                    .bool(*is_resetting_op);
            }
            Self::Comment { timestamp, comment } => {
                w.u64(*timestamp).bytes(comment);
            }
            Self::ChangeFDescriptor {
                filenum,
                xid,
                old_descriptor,
                new_descriptor,
                update_cmp_descriptor,
            } => {
                w.filenum(*filenum)
                    .xid(*xid)
                    .bytes(old_descriptor)
                    .bytes(new_descriptor)
                    .bool(*update_cmp_descriptor);
            }
            Self::HotIndex {
                xid,
                hot_index_filenums,
            } => {
                w.xid(*xid).filenums(hot_index_filenums);
            }
            Self::Load {
                xid,
                old_filenum,
                new_iname,
            } => {
                w.xid(*xid).filenum(*old_filenum).str(new_iname);
            }
        }

        w.into_inner()
    }

    /// Deserializes record fields of the given type.
    ///
    /// # Errors
    ///
    /// Returns `BadFormat` if the fields are truncated, malformed, or followed
    /// by trailing bytes.
    pub fn decode_fields(record_type: LogRecordType, fields: &[u8]) -> CoreResult<Self> {
        let mut r = FieldReader::new(fields);

        let record = match record_type {
            LogRecordType::BeginCheckpoint => Self::BeginCheckpoint {
                timestamp: r.u64()?,
                last_xid: r.u64()?,
            },
            LogRecordType::EndCheckpoint => Self::EndCheckpoint {
                lsn_begin_checkpoint: r.lsn()?,
                timestamp: r.u64()?,
                num_fassociate_entries: r.u32()?,
                num_xstillopen_entries: r.u32()?,
            },
            LogRecordType::Fassociate => Self::Fassociate {
                filenum: r.filenum()?,
                treeflags: r.u32()?,
                iname: r.string()?,
                unlink_on_close: r.bool()?,
            },
            LogRecordType::XStillOpen => Self::XStillOpen {
                xid: r.xid()?,
                parentxid: r.xid()?,
                info: read_info(&mut r)?,
            },
            LogRecordType::XStillOpenPrepared => Self::XStillOpenPrepared {
                xid: r.xid()?,
                xa_xid: r.xa_xid()?,
                info: read_info(&mut r)?,
            },
            LogRecordType::XBegin => Self::XBegin {
                xid: r.xid()?,
                parentxid: r.xid()?,
            },
            LogRecordType::XCommit => Self::XCommit { xid: r.xid()? },
            LogRecordType::XAbort => Self::XAbort { xid: r.xid()? },
            LogRecordType::XPrepare => Self::XPrepare {
                xid: r.xid()?,
                xa_xid: r.xa_xid()?,
            },
            LogRecordType::FCreate => Self::FCreate {
                xid: r.xid()?,
                filenum: r.filenum()?,
                iname: r.string()?,
                mode: r.u32()?,
                treeflags: r.u32()?,
                nodesize: r.u32()?,
                basementnodesize: r.u32()?,
                compression_method: r.u8()?,
            },
            LogRecordType::FOpen => Self::FOpen {
                iname: r.string()?,
                filenum: r.filenum()?,
                treeflags: r.u32()?,
            },
            LogRecordType::FClose => Self::FClose {
                iname: r.string()?,
                filenum: r.filenum()?,
            },
            LogRecordType::FDelete => Self::FDelete {
                xid: r.xid()?,
                filenum: r.filenum()?,
            },
            LogRecordType::EnqInsert => Self::EnqInsert {
                filenum: r.filenum()?,
                xid: r.xid()?,
                key: r.bytes()?,
                value: r.bytes()?,
            },
            LogRecordType::EnqInsertNoOverwrite => Self::EnqInsertNoOverwrite {
                filenum: r.filenum()?,
                xid: r.xid()?,
                key: r.bytes()?,
                value: r.bytes()?,
            },
            LogRecordType::EnqDeleteAny => Self::EnqDeleteAny {
                filenum: r.filenum()?,
                xid: r.xid()?,
                key: r.bytes()?,
            },
            LogRecordType::EnqInsertMultiple => Self::EnqInsertMultiple {
                src_filenum: r.filenum()?,
                dest_filenums: r.filenums()?,
                xid: r.xid()?,
                src_key: r.bytes()?,
                src_val: r.bytes()?,
            },
            LogRecordType::EnqDeleteMultiple => Self::EnqDeleteMultiple {
                src_filenum: r.filenum()?,
                dest_filenums: r.filenums()?,
                xid: r.xid()?,
                src_key: r.bytes()?,
                src_val: r.bytes()?,
            },
            LogRecordType::EnqUpdate => Self::EnqUpdate {
                filenum: r.filenum()?,
                xid: r.xid()?,
                key: r.bytes()?,
                extra: r.bytes()?,
            },
            LogRecordType::EnqUpdateBroadcast => Self::EnqUpdateBroadcast {
                filenum: r.filenum()?,
                xid: r.xid()?,
                extra: r.bytes()?,
                is_resetting_op: r.bool()?,
            },
            LogRecordType::Comment => Self::Comment {
                timestamp: r.u64()?,
                comment: r.bytes()?,
            },
            LogRecordType::Shutdown => Self::Shutdown {
                timestamp: r.u64()?,
                last_xid: r.u64()?,
            },
            LogRecordType::ChangeFDescriptor => Self::ChangeFDescriptor {
                filenum: r.filenum()?,
                xid: r.xid()?,
                old_descriptor: r.bytes()?,
                new_descriptor: r.bytes()?,
                update_cmp_descriptor: r.bool()?,
            },
            LogRecordType::HotIndex => Self::HotIndex {
                xid: r.xid()?,
                hot_index_filenums: r.filenums()?,
            },
            LogRecordType::Load => Self::Load {
                xid: r.xid()?,
                old_filenum: r.filenum()?,
                new_iname: r.string()?,
            },
        };

        r.finish(record_type.name())?;
        Ok(record)
    }
}
