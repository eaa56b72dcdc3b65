//! Byte-level framing of log files and log records.
//!
//! ```text
//! file:   | magic "tokulogg" (8) | version u32 (4) | record* |
//! record: | len u32 | tag u8 | lsn u64 | fields ... | crc32 u32 | len u32 |
//! ```
//!
//! `len` counts the whole record and is repeated at the end so a record can
//! be found from its end offset when reading backward. The CRC covers every
//! byte from the leading `len` through the last field.

use crate::error::{CoreError, CoreResult};
use crate::types::{BlockNum, FileNum, Lsn, TxnIdPair, XaXid};

/// Magic bytes at the start of every log file.
pub const LOG_MAGIC: [u8; 8] = *b"tokulogg";

/// Log format version written by this crate.
pub const LOG_VERSION: u32 = 29;

/// Oldest log format version the cursor accepts.
pub const LOG_MIN_SUPPORTED_VERSION: u32 = 25;

/// Size of the file header: magic (8) + version (4).
pub const LOG_HEADER_SIZE: u64 = 12;

/// Bytes of framing around the fields of a record:
/// len (4) + tag (1) + lsn (8) + crc (4) + len (4).
pub const RECORD_OVERHEAD: usize = 21;

/// Upper bound on a single record. Anything larger is treated as garbage
/// rather than allocated.
pub const MAX_RECORD_LEN: usize = 256 * 1024 * 1024;

/// Encodes a log file header.
#[must_use]
pub fn encode_header(version: u32) -> [u8; LOG_HEADER_SIZE as usize] {
    let mut header = [0u8; LOG_HEADER_SIZE as usize];
    header[..8].copy_from_slice(&LOG_MAGIC);
    header[8..].copy_from_slice(&version.to_le_bytes());
    header
}

/// Validates a log file header and returns its version.
///
/// # Errors
///
/// Returns `BadFormat` on a short header, wrong magic, or a version outside
/// `LOG_MIN_SUPPORTED_VERSION..=LOG_VERSION`.
pub fn decode_header(bytes: &[u8]) -> CoreResult<u32> {
    if bytes.len() < LOG_HEADER_SIZE as usize {
        return Err(CoreError::bad_format(format!(
            "log header truncated: {} of {LOG_HEADER_SIZE} bytes",
            bytes.len()
        )));
    }
    if bytes[..8] != LOG_MAGIC {
        return Err(CoreError::bad_format("invalid log magic"));
    }
    let version = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
    if !(LOG_MIN_SUPPORTED_VERSION..=LOG_VERSION).contains(&version) {
        return Err(CoreError::bad_format(format!(
            "unsupported log version {version} (supported {LOG_MIN_SUPPORTED_VERSION}..={LOG_VERSION})"
        )));
    }
    Ok(version)
}

/// Reads a record length field and checks it is plausible.
///
/// # Errors
///
/// Returns `BadFormat` if the length is shorter than the framing or larger
/// than [`MAX_RECORD_LEN`].
pub fn checked_record_len(bytes: [u8; 4]) -> CoreResult<usize> {
    let len = u32::from_le_bytes(bytes) as usize;
    if len < RECORD_OVERHEAD || len > MAX_RECORD_LEN {
        return Err(CoreError::bad_format(format!("implausible record length {len}")));
    }
    Ok(len)
}

/// Wraps encoded fields into a framed record.
#[must_use]
pub fn frame_record(tag: u8, lsn: Lsn, fields: &[u8]) -> Vec<u8> {
    let total = RECORD_OVERHEAD + fields.len();
    let len = total as u32;

    let mut data = Vec::with_capacity(total);
    data.extend_from_slice(&len.to_le_bytes());
    data.push(tag);
    data.extend_from_slice(&lsn.as_u64().to_le_bytes());
    data.extend_from_slice(fields);

    let crc = crc32fast::hash(&data);
    data.extend_from_slice(&crc.to_le_bytes());
    data.extend_from_slice(&len.to_le_bytes());
    data
}

/// A framed record whose envelope has been verified.
#[derive(Debug)]
pub struct RawRecord<'a> {
    /// Record type tag.
    pub tag: u8,
    /// Record LSN.
    pub lsn: Lsn,
    /// Encoded fields.
    pub fields: &'a [u8],
}

/// Verifies the envelope of one complete record.
///
/// # Errors
///
/// Returns `BadFormat` on length mismatch or CRC mismatch.
pub fn unframe_record(data: &[u8]) -> CoreResult<RawRecord<'_>> {
    if data.len() < RECORD_OVERHEAD {
        return Err(CoreError::bad_format(format!(
            "record too short: {} bytes",
            data.len()
        )));
    }
    let n = data.len();
    let head_len = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
    let tail_len = u32::from_le_bytes([data[n - 4], data[n - 3], data[n - 2], data[n - 1]]) as usize;
    if head_len != n || tail_len != n {
        return Err(CoreError::bad_format(format!(
            "record length mismatch: header {head_len}, footer {tail_len}, actual {n}"
        )));
    }

    let stored_crc = u32::from_le_bytes([data[n - 8], data[n - 7], data[n - 6], data[n - 5]]);
    let computed_crc = crc32fast::hash(&data[..n - 8]);
    if stored_crc != computed_crc {
        return Err(CoreError::bad_format(format!(
            "record checksum mismatch: stored {stored_crc:08x}, computed {computed_crc:08x}"
        )));
    }

    let mut lsn = [0u8; 8];
    lsn.copy_from_slice(&data[5..13]);
    Ok(RawRecord {
        tag: data[4],
        lsn: Lsn::new(u64::from_le_bytes(lsn)),
        fields: &data[13..n - 8],
    })
}

/// Appends record fields to a buffer.
#[derive(Debug, Default)]
pub struct FieldWriter {
    buf: Vec<u8>,
}

impl FieldWriter {
    /// Creates an empty writer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the encoded fields.
    #[must_use]
    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    /// Writes one byte.
    pub fn u8(&mut self, v: u8) -> &mut Self {
        self.buf.push(v);
        self
    }

    /// Writes a bool as one byte.
    pub fn bool(&mut self, v: bool) -> &mut Self {
        self.u8(u8::from(v))
    }

    /// Writes a little-endian u32.
    pub fn u32(&mut self, v: u32) -> &mut Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    /// Writes a little-endian i32.
    pub fn i32(&mut self, v: i32) -> &mut Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    /// Writes a little-endian u64.
    pub fn u64(&mut self, v: u64) -> &mut Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    /// Writes a length-prefixed byte string.
    pub fn bytes(&mut self, v: &[u8]) -> &mut Self {
        self.u32(v.len() as u32);
        self.buf.extend_from_slice(v);
        self
    }

    /// Writes a length-prefixed UTF-8 string.
    pub fn str(&mut self, v: &str) -> &mut Self {
        self.bytes(v.as_bytes())
    }

    /// Writes an LSN.
    pub fn lsn(&mut self, v: Lsn) -> &mut Self {
        self.u64(v.as_u64())
    }

    /// Writes a file number.
    pub fn filenum(&mut self, v: FileNum) -> &mut Self {
        self.u32(v.as_u32())
    }

    /// Writes a counted list of file numbers.
    pub fn filenums(&mut self, v: &[FileNum]) -> &mut Self {
        self.u32(v.len() as u32);
        for f in v {
            self.filenum(*f);
        }
        self
    }

    /// Writes a transaction id pair.
    pub fn xid(&mut self, v: TxnIdPair) -> &mut Self {
        self.u64(v.parent_id64).u64(v.child_id64)
    }

    /// Writes a rollback block number.
    pub fn blocknum(&mut self, v: BlockNum) -> &mut Self {
        self.buf.extend_from_slice(&v.0.to_le_bytes());
        self
    }

    /// Writes an XA id.
    pub fn xa_xid(&mut self, v: &XaXid) -> &mut Self {
        self.i32(v.format_id)
            .u32(v.gtrid.len() as u32)
            .u32(v.bqual.len() as u32);
        self.buf.extend_from_slice(&v.gtrid);
        self.buf.extend_from_slice(&v.bqual);
        self
    }
}

/// Reads record fields from a slice.
#[derive(Debug)]
pub struct FieldReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> FieldReader<'a> {
    /// Creates a reader over encoded fields.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> CoreResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| CoreError::bad_format("unexpected end of record fields"))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> CoreResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    /// Reads one byte.
    pub fn u8(&mut self) -> CoreResult<u8> {
        Ok(self.take(1)?[0])
    }

    /// Reads a bool, rejecting anything but 0 or 1.
    pub fn bool(&mut self) -> CoreResult<bool> {
        match self.u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(CoreError::bad_format(format!("invalid bool byte {other}"))),
        }
    }

    /// Reads a little-endian u32.
    pub fn u32(&mut self) -> CoreResult<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    /// Reads a little-endian i32.
    pub fn i32(&mut self) -> CoreResult<i32> {
        Ok(i32::from_le_bytes(self.array()?))
    }

    /// Reads a little-endian u64.
    pub fn u64(&mut self) -> CoreResult<u64> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    /// Reads a length-prefixed byte string.
    pub fn bytes(&mut self) -> CoreResult<Vec<u8>> {
        let len = self.u32()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    /// Reads a length-prefixed UTF-8 string.
    pub fn string(&mut self) -> CoreResult<String> {
        String::from_utf8(self.bytes()?)
            .map_err(|_| CoreError::bad_format("file name is not valid UTF-8"))
    }

    /// Reads an LSN.
    pub fn lsn(&mut self) -> CoreResult<Lsn> {
        Ok(Lsn::new(self.u64()?))
    }

    /// Reads a file number.
    pub fn filenum(&mut self) -> CoreResult<FileNum> {
        Ok(FileNum::new(self.u32()?))
    }

    /// Reads a counted list of file numbers.
    pub fn filenums(&mut self) -> CoreResult<Vec<FileNum>> {
        let count = self.u32()? as usize;
        if count.saturating_mul(4) > self.remaining() {
            return Err(CoreError::bad_format(format!("file number count {count} overruns record")));
        }
        (0..count).map(|_| self.filenum()).collect()
    }

    /// Reads a transaction id pair.
    pub fn xid(&mut self) -> CoreResult<TxnIdPair> {
        Ok(TxnIdPair {
            parent_id64: self.u64()?,
            child_id64: self.u64()?,
        })
    }

    /// Reads a rollback block number.
    pub fn blocknum(&mut self) -> CoreResult<BlockNum> {
        Ok(BlockNum(i64::from_le_bytes(self.array()?)))
    }

    /// Reads an XA id.
    pub fn xa_xid(&mut self) -> CoreResult<XaXid> {
        let format_id = self.i32()?;
        let gtrid_len = self.u32()? as usize;
        let bqual_len = self.u32()? as usize;
        let gtrid = self.take(gtrid_len)?.to_vec();
        let bqual = self.take(bqual_len)?.to_vec();
        Ok(XaXid {
            format_id,
            gtrid,
            bqual,
        })
    }

    /// Returns the number of unread bytes.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Fails if any bytes are left unread.
    ///
    /// # Errors
    ///
    /// Returns `BadFormat` naming the record kind when trailing bytes exist.
    pub fn finish(&self, what: &str) -> CoreResult<()> {
        if self.remaining() != 0 {
            return Err(CoreError::bad_format(format!(
                "{} trailing bytes in {what} record",
                self.remaining()
            )));
        }
        Ok(())
    }
}
