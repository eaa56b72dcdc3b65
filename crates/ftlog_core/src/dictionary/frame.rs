//! Append-only frame dictionary.
//!
//! ```text
//! file:  | "ftdict01" (8) | closed_lsn u64 (8) | frame* |
//! frame: | len u32 | kind u8 | lsn u64 | fields ... | crc32 u32 | len u32 |
//! ```
//!
//! Frames share the log record envelope. A rows frame (`R`) lists
//! `(key, new, old)` triples, a descriptor frame (`D`) the new and old
//! descriptor. Undo frames (`r`, `d`) carry the LSN of the abort that wrote
//! them and start with a `u32` step, the position of the undo within that
//! abort. Opening replays every frame into an ordered map; a torn frame at
//! the end is cut off.

use crate::dictionary::{Dictionary, Mutation, RowImage, UpdateFn};
use crate::error::{CoreError, CoreResult};
use crate::types::Lsn;
use crate::wal::{frame_record, unframe_record, FieldReader, FieldWriter, MAX_RECORD_LEN, RECORD_OVERHEAD};
use ftlog_storage::StorageBackend;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use tracing::warn;

/// Magic bytes at the start of a dictionary file.
pub const DICTIONARY_MAGIC: [u8; 8] = *b"ftdict01";

/// Size of the dictionary header: magic (8) + closed LSN (8).
pub const DICTIONARY_HEADER_SIZE: u64 = 16;

const ROWS_FRAME: u8 = b'R';
const DESCRIPTOR_FRAME: u8 = b'D';
const UNDO_ROWS_FRAME: u8 = b'r';
const UNDO_DESCRIPTOR_FRAME: u8 = b'd';

/// One row change: key, value after, value before.
type RowChange = (Vec<u8>, Option<Vec<u8>>, Option<Vec<u8>>);

enum Frame {
    Rows(Vec<RowChange>),
    Descriptor { new: Vec<u8>, old: Vec<u8> },
}

impl Frame {
    fn encode(&self, lsn: Lsn, undo_step: Option<u32>) -> Vec<u8> {
        let mut w = FieldWriter::new();
        if let Some(step) = undo_step {
            w.u32(step);
        }
        let tag = match self {
            Self::Rows(rows) => {
                w.u32(rows.len() as u32);
                for (key, new, old) in rows {
                    w.bytes(key);
                    write_opt(&mut w, new.as_deref());
                    write_opt(&mut w, old.as_deref());
                }
                ROWS_FRAME
            }
            Self::Descriptor { new, old } => {
                w.bytes(new).bytes(old);
                DESCRIPTOR_FRAME
            }
        };
        let tag = match (undo_step, tag) {
            (None, tag) => tag,
            (Some(_), ROWS_FRAME) => UNDO_ROWS_FRAME,
            (Some(_), _) => UNDO_DESCRIPTOR_FRAME,
        };
        frame_record(tag, lsn, &w.into_inner())
    }

    fn decode(tag: u8, fields: &[u8]) -> CoreResult<(Self, Option<u32>)> {
        let mut r = FieldReader::new(fields);
        let undo_step = match tag {
            UNDO_ROWS_FRAME | UNDO_DESCRIPTOR_FRAME => Some(r.u32()?),
            _ => None,
        };
        let frame = match tag {
            ROWS_FRAME | UNDO_ROWS_FRAME => {
                let count = r.u32()? as usize;
                let mut rows = Vec::with_capacity(count.min(r.remaining()));
                for _ in 0..count {
                    let key = r.bytes()?;
                    let new = read_opt(&mut r)?;
                    let old = read_opt(&mut r)?;
                    rows.push((key, new, old));
                }
                Self::Rows(rows)
            }
            DESCRIPTOR_FRAME | UNDO_DESCRIPTOR_FRAME => Self::Descriptor {
                new: r.bytes()?,
                old: r.bytes()?,
            },
            other => {
                return Err(CoreError::bad_format(format!(
                    "unknown dictionary frame 0x{other:02x}"
                )))
            }
        };
        r.finish("dictionary frame")?;
        Ok((frame, undo_step))
    }

    fn undo(&self) -> Option<Mutation> {
        match self {
            Self::Rows(rows) if rows.is_empty() => None,
            Self::Rows(rows) => Some(Mutation::Restore {
                rows: rows
                    .iter()
                    .map(|(key, _, old)| RowImage {
                        key: key.clone(),
                        value: old.clone(),
                    })
                    .collect(),
            }),
            Self::Descriptor { new, old } => Some(Mutation::ChangeDescriptor {
                old: new.clone(),
                new: old.clone(),
            }),
        }
    }
}

fn write_opt(w: &mut FieldWriter, value: Option<&[u8]>) {
    match value {
        Some(v) => {
            w.bool(true).bytes(v);
        }
        None => {
            w.bool(false);
        }
    }
}

fn read_opt(r: &mut FieldReader<'_>) -> CoreResult<Option<Vec<u8>>> {
    if r.bool()? {
        Ok(Some(r.bytes()?))
    } else {
        Ok(None)
    }
}

/// A dictionary kept as an append-only frame file over any storage backend.
pub struct FrameDictionary<B: StorageBackend> {
    iname: String,
    backend: B,
    rows: BTreeMap<Vec<u8>, Vec<u8>>,
    descriptor: Vec<u8>,
    applied_lsn: Lsn,
    closed_lsn: Lsn,
    undo_by_lsn: HashMap<Lsn, Option<Mutation>>,
    undone: HashSet<(Lsn, u32)>,
}

impl<B: StorageBackend> fmt::Debug for FrameDictionary<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameDictionary")
            .field("iname", &self.iname)
            .field("rows", &self.rows.len())
            .field("applied_lsn", &self.applied_lsn)
            .field("closed_lsn", &self.closed_lsn)
            .finish_non_exhaustive()
    }
}

impl<B: StorageBackend> FrameDictionary<B> {
    /// Opens a dictionary over `backend`, initializing an empty backend.
    ///
    /// # Errors
    ///
    /// Returns `BadFormat` if the header is not a dictionary header.
    pub fn open(iname: impl Into<String>, mut backend: B) -> CoreResult<Self> {
        let iname = iname.into();
        let size = backend.size()?;
        if size == 0 {
            backend.append(&encode_header(Lsn::ZERO))?;
        } else if size < DICTIONARY_HEADER_SIZE {
            return Err(CoreError::bad_format(format!(
                "{iname}: dictionary header truncated"
            )));
        }

        let data = backend.read_at(0, backend.size()? as usize)?;
        if data[..8] != DICTIONARY_MAGIC {
            return Err(CoreError::bad_format(format!("{iname}: not a dictionary file")));
        }
        let mut closed = [0u8; 8];
        closed.copy_from_slice(&data[8..16]);
        let closed_lsn = Lsn::new(u64::from_le_bytes(closed));

        let mut dict = Self {
            iname,
            backend,
            rows: BTreeMap::new(),
            descriptor: Vec::new(),
            applied_lsn: closed_lsn,
            closed_lsn,
            undo_by_lsn: HashMap::new(),
            undone: HashSet::new(),
        };

        let mut pos = DICTIONARY_HEADER_SIZE as usize;
        while pos < data.len() {
            match read_frame(&data[pos..]) {
                Some((lsn, frame, undo_step, len)) => {
                    dict.install(lsn, &frame, undo_step);
                    pos += len;
                }
                None => {
                    warn!(
                        dictionary = %dict.iname,
                        from = data.len(),
                        to = pos,
                        "truncating torn dictionary frame"
                    );
                    dict.backend.truncate(pos as u64)?;
                    break;
                }
            }
        }

        Ok(dict)
    }

    /// Every row, in key order.
    #[must_use]
    pub fn rows(&self) -> &BTreeMap<Vec<u8>, Vec<u8>> {
        &self.rows
    }

    /// LSN written by the last close.
    #[must_use]
    pub fn closed_lsn(&self) -> Lsn {
        self.closed_lsn
    }

    fn install(&mut self, lsn: Lsn, frame: &Frame, undo_step: Option<u32>) {
        match frame {
            Frame::Rows(rows) => {
                for (key, new, _) in rows {
                    match new {
                        Some(value) => {
                            self.rows.insert(key.clone(), value.clone());
                        }
                        None => {
                            self.rows.remove(key);
                        }
                    }
                }
            }
            Frame::Descriptor { new, .. } => self.descriptor.clone_from(new),
        }
        self.applied_lsn = self.applied_lsn.max(lsn);
        match undo_step {
            Some(step) => {
                self.undone.insert((lsn, step));
            }
            None => {
                self.undo_by_lsn.insert(lsn, frame.undo());
            }
        }
    }

    fn write(&mut self, lsn: Lsn, frame: Frame, undo_step: Option<u32>) -> CoreResult<Option<Mutation>> {
        self.backend.append(&frame.encode(lsn, undo_step))?;
        self.install(lsn, &frame, undo_step);
        Ok(frame.undo())
    }

    /// Carries out `mutation` and records it as one frame at `lsn`.
    fn mutate(
        &mut self,
        lsn: Lsn,
        mutation: &Mutation,
        update: UpdateFn<'_>,
        undo_step: Option<u32>,
    ) -> CoreResult<Option<Mutation>> {
        let mut changes = Vec::new();
        match mutation {
            Mutation::Insert {
                key,
                value,
                overwrite,
            } => {
                if *overwrite || !self.rows.contains_key(key) {
                    self.change(key, Some(value.clone()), &mut changes);
                }
            }
            Mutation::Delete { key } => self.change(key, None, &mut changes),
            Mutation::Update { key, extra } => {
                let new = update(key, self.get(key), extra);
                self.change(key, new, &mut changes);
            }
            Mutation::UpdateBroadcast { extra } => {
                let updated: Vec<(Vec<u8>, Option<Vec<u8>>)> = self
                    .rows
                    .iter()
                    .map(|(key, value)| (key.clone(), update(key, Some(value.as_slice()), extra)))
                    .collect();
                for (key, new) in updated {
                    self.change(&key, new, &mut changes);
                }
            }
            Mutation::Restore { rows } => {
                for image in rows {
                    self.change(&image.key, image.value.clone(), &mut changes);
                }
            }
            Mutation::ChangeDescriptor { new, .. } => {
                let old = self.descriptor.clone();
                return self.write(lsn, Frame::Descriptor { new: new.clone(), old }, undo_step);
            }
        }

        self.write(lsn, Frame::Rows(changes), undo_step)
    }

    fn change(&self, key: &[u8], new: Option<Vec<u8>>, out: &mut Vec<RowChange>) {
        let old = self.rows.get(key).cloned();
        if old != new {
            out.push((key.to_vec(), new, old));
        }
    }
}

/// Update function for undo: undo mutations never update.
fn keep_old(_: &[u8], old: Option<&[u8]>, _: &[u8]) -> Option<Vec<u8>> {
    old.map(<[u8]>::to_vec)
}

fn encode_header(closed_lsn: Lsn) -> [u8; DICTIONARY_HEADER_SIZE as usize] {
    let mut header = [0u8; DICTIONARY_HEADER_SIZE as usize];
    header[..8].copy_from_slice(&DICTIONARY_MAGIC);
    header[8..].copy_from_slice(&closed_lsn.as_u64().to_le_bytes());
    header
}

/// Parses one frame at the start of `data`; `None` if it is torn.
fn read_frame(data: &[u8]) -> Option<(Lsn, Frame, Option<u32>, usize)> {
    if data.len() < 4 {
        return None;
    }
    let len = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
    if !(RECORD_OVERHEAD..=MAX_RECORD_LEN).contains(&len) || len > data.len() {
        return None;
    }
    let raw = unframe_record(&data[..len]).ok()?;
    let (frame, undo_step) = Frame::decode(raw.tag, raw.fields).ok()?;
    Some((raw.lsn, frame, undo_step, len))
}

impl<B: StorageBackend> Dictionary for FrameDictionary<B> {
    fn iname(&self) -> &str {
        &self.iname
    }

    fn applied_lsn(&self) -> Lsn {
        self.applied_lsn
    }

    fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.rows.get(key).map(Vec::as_slice)
    }

    fn len(&self) -> usize {
        self.rows.len()
    }

    fn descriptor(&self) -> &[u8] {
        &self.descriptor
    }

    fn apply(
        &mut self,
        lsn: Lsn,
        mutation: &Mutation,
        update: UpdateFn<'_>,
    ) -> CoreResult<Option<Mutation>> {
        if lsn <= self.applied_lsn {
            return Ok(self.undo_by_lsn.get(&lsn).cloned().flatten());
        }
        self.mutate(lsn, mutation, update, None)
    }

    fn undo(&mut self, abort_lsn: Lsn, step: u32, mutation: &Mutation) -> CoreResult<bool> {
        if self.undone.contains(&(abort_lsn, step)) {
            return Ok(false);
        }
        self.mutate(abort_lsn, mutation, &keep_old, Some(step))?;
        Ok(true)
    }

    fn close(&mut self, lsn: Lsn) -> CoreResult<()> {
        let closed = lsn.max(self.applied_lsn);
        self.backend.write_at(0, &encode_header(closed))?;
        self.backend.flush()?;
        self.backend.sync()?;
        self.closed_lsn = closed;
        self.applied_lsn = closed;
        Ok(())
    }
}
