//! Dump log command implementation.

use ftlog_core::wal::{LogCursor, LogEntry, LogRecord};
use ftlog_core::{CoreError, CoreResult, CursorOptions, FileNum};
use serde::Serialize;
use std::path::Path;

/// Log record representation for output.
#[derive(Debug, Serialize)]
pub struct LogRecordInfo {
    /// Record LSN.
    pub lsn: u64,
    /// Record type.
    pub record_type: &'static str,
    /// Transaction id (if applicable).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xid: Option<String>,
    /// File number (if applicable).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filenum: Option<u32>,
    /// Record-specific details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Runs the dump-log command.
pub fn run(
    dir: &Path,
    limit: Option<usize>,
    reverse: bool,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let records = read_log_records(dir, limit, reverse)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        _ => {
            print_text_output(&records);
        }
    }

    Ok(())
}

/// Reads up to `limit` records, newest first with `reverse`.
pub fn read_log_records(
    dir: &Path,
    limit: Option<usize>,
    reverse: bool,
) -> CoreResult<Vec<LogRecordInfo>> {
    let mut cursor = LogCursor::create(dir, CursorOptions::new())?;
    let max_records = limit.unwrap_or(usize::MAX);
    let mut records = Vec::new();

    while records.len() < max_records {
        let read = if reverse { cursor.prev() } else { cursor.next() };
        match read {
            Ok(entry) => records.push(describe(entry)),
            Err(CoreError::EndOfLog) => break,
            Err(e) => return Err(e),
        }
    }

    Ok(records)
}

fn describe(entry: &LogEntry) -> LogRecordInfo {
    let record = &entry.record;
    let (filenum, detail) = match record {
        LogRecord::BeginCheckpoint { last_xid, .. } => (None, Some(format!("last_xid={last_xid}"))),
        LogRecord::EndCheckpoint {
            lsn_begin_checkpoint,
            num_fassociate_entries,
            num_xstillopen_entries,
            ..
        } => (
            None,
            Some(format!(
                "begin={} fassociate={num_fassociate_entries} xstillopen={num_xstillopen_entries}",
                lsn_begin_checkpoint.as_u64()
            )),
        ),
        LogRecord::Fassociate { filenum, iname, .. }
        | LogRecord::FCreate { filenum, iname, .. }
        | LogRecord::FOpen { filenum, iname, .. }
        | LogRecord::FClose { filenum, iname } => (Some(*filenum), Some(format!("iname={iname}"))),
        LogRecord::XBegin { parentxid, .. } | LogRecord::XStillOpen { parentxid, .. } => {
            (None, (!parentxid.is_none()).then(|| format!("parent={parentxid}")))
        }
        LogRecord::FDelete { filenum, .. } | LogRecord::EnqUpdateBroadcast { filenum, .. } => {
            (Some(*filenum), None)
        }
        LogRecord::EnqInsert { filenum, key, value, .. }
        | LogRecord::EnqInsertNoOverwrite { filenum, key, value, .. } => (
            Some(*filenum),
            Some(format!("key={} value={} bytes", hex_preview(key), value.len())),
        ),
        LogRecord::EnqDeleteAny { filenum, key, .. } | LogRecord::EnqUpdate { filenum, key, .. } => {
            (Some(*filenum), Some(format!("key={}", hex_preview(key))))
        }
        LogRecord::EnqInsertMultiple {
            src_filenum,
            dest_filenums,
            src_key,
            ..
        }
        | LogRecord::EnqDeleteMultiple {
            src_filenum,
            dest_filenums,
            src_key,
            ..
        } => (
            Some(*src_filenum),
            Some(format!(
                "dest={} key={}",
                join_filenums(dest_filenums),
                hex_preview(src_key)
            )),
        ),
        LogRecord::ChangeFDescriptor { filenum, new_descriptor, .. } => (
            Some(*filenum),
            Some(format!("descriptor={} bytes", new_descriptor.len())),
        ),
        LogRecord::HotIndex {
            hot_index_filenums, ..
        } => (None, Some(format!("indexes={}", join_filenums(hot_index_filenums)))),
        LogRecord::Load {
            old_filenum,
            new_iname,
            ..
        } => (Some(*old_filenum), Some(format!("new_iname={new_iname}"))),
        LogRecord::Comment { comment, .. } => {
            (None, Some(String::from_utf8_lossy(comment).into_owned()))
        }
        LogRecord::Shutdown { last_xid, .. } => (None, Some(format!("last_xid={last_xid}"))),
        LogRecord::XStillOpenPrepared { .. }
        | LogRecord::XCommit { .. }
        | LogRecord::XAbort { .. }
        | LogRecord::XPrepare { .. } => (None, None),
    };

    LogRecordInfo {
        lsn: entry.lsn.as_u64(),
        record_type: entry.record_type().name(),
        xid: record.xid().filter(|x| !x.is_none()).map(|x| x.to_string()),
        filenum: filenum.filter(|f| !f.is_none()).map(FileNum::as_u32),
        detail,
    }
}

fn join_filenums(filenums: &[FileNum]) -> String {
    filenums
        .iter()
        .map(|f| f.as_u32().to_string())
        .collect::<Vec<_>>()
        .join(",")
}

fn hex_preview(bytes: &[u8]) -> String {
    let hex: String = bytes.iter().take(8).map(|b| format!("{:02x}", b)).collect();
    if bytes.len() > 8 {
        format!("{hex}...")
    } else {
        hex
    }
}

fn print_text_output(records: &[LogRecordInfo]) {
    println!("Log Records ({} total)", records.len());
    println!("================");
    println!();

    for record in records {
        print!("[{:012}] {:24}", record.lsn, record.record_type);

        if let Some(ref xid) = record.xid {
            print!(" {}", xid);
        }
        if let Some(filenum) = record.filenum {
            print!(" file={}", filenum);
        }
        if let Some(ref detail) = record.detail {
            print!(" {}", detail);
        }

        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ftlog_core::{LogWriter, TxnIdPair, WriterOptions};
    use tempfile::tempdir;

    #[test]
    fn reads_in_both_directions_with_limit() {
        let dir = tempdir().unwrap();
        let mut writer = LogWriter::open(dir.path(), WriterOptions::new()).unwrap();
        writer
            .append(&LogRecord::XBegin {
                xid: TxnIdPair::root(3),
                parentxid: TxnIdPair::NONE,
            })
            .unwrap();
        writer.append(&LogRecord::comment("hello")).unwrap();
        writer.shutdown(3).unwrap();

        let forward = read_log_records(dir.path(), Some(2), false).unwrap();
        assert_eq!(forward.len(), 2);
        assert_eq!(forward[0].record_type, "xbegin");
        assert_eq!(forward[0].xid.as_deref(), Some("txn:3"));
        assert_eq!(forward[1].detail.as_deref(), Some("hello"));

        let backward = read_log_records(dir.path(), None, true).unwrap();
        let lsns: Vec<u64> = backward.iter().map(|r| r.lsn).collect();
        assert_eq!(lsns, vec![3, 2, 1]);
        assert_eq!(backward[0].record_type, "shutdown");
    }

    #[test]
    fn hex_preview_truncates() {
        assert_eq!(hex_preview(b"\x01\x02"), "0102");
        assert_eq!(hex_preview(&[0xab; 9]), "abababababababab...");
    }
}
