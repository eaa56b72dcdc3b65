//! Core type definitions for ftlog.

use std::fmt;

/// Log sequence number.
///
/// LSNs are assigned by the log writer, start at 1 and grow by exactly one per
/// record across the whole (multi-file) log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Lsn(pub u64);

impl Lsn {
    /// The "no LSN" value. No record is ever written with it.
    pub const ZERO: Self = Self(0);

    /// The largest possible LSN.
    pub const MAX: Self = Self(u64::MAX);

    /// Creates a new LSN.
    #[must_use]
    pub const fn new(lsn: u64) -> Self {
        Self(lsn)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the following LSN.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Lsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lsn:{}", self.0)
    }
}

/// Identifier of an open data file (dictionary or rollback file) within a log.
///
/// File numbers are only meaningful between the record that binds them
/// (`fassociate`, `fcreate`, `fopen`) and the matching `fclose`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileNum(pub u32);

impl FileNum {
    /// Sentinel used by `enq_*_multiple` records that have no source file.
    pub const NONE: Self = Self(u32::MAX);

    /// Creates a new file number.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Returns true for [`FileNum::NONE`].
    #[must_use]
    pub const fn is_none(self) -> bool {
        self.0 == u32::MAX
    }
}

impl fmt::Display for FileNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "file:{}", self.0)
    }
}

/// Raw transaction id.
pub type TxnId = u64;

/// The "no transaction" id.
pub const TXNID_NONE: TxnId = 0;

/// Transaction id pair.
///
/// `parent_id64` is the id of the root transaction of the family and
/// `child_id64` distinguishes nested transactions inside it. A root
/// transaction has `child_id64 == TXNID_NONE`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TxnIdPair {
    /// Root transaction id.
    pub parent_id64: TxnId,
    /// Nested transaction id, `TXNID_NONE` for a root.
    pub child_id64: TxnId,
}

impl TxnIdPair {
    /// The "no transaction" pair.
    pub const NONE: Self = Self {
        parent_id64: TXNID_NONE,
        child_id64: TXNID_NONE,
    };

    /// Id pair of a root transaction.
    #[must_use]
    pub const fn root(id: TxnId) -> Self {
        Self {
            parent_id64: id,
            child_id64: TXNID_NONE,
        }
    }

    /// Id pair of a nested transaction.
    #[must_use]
    pub const fn child(root: TxnId, child: TxnId) -> Self {
        Self {
            parent_id64: root,
            child_id64: child,
        }
    }

    /// Returns true for [`TxnIdPair::NONE`].
    #[must_use]
    pub const fn is_none(&self) -> bool {
        self.parent_id64 == TXNID_NONE && self.child_id64 == TXNID_NONE
    }

    /// Returns true if this pair names a root transaction.
    #[must_use]
    pub const fn is_root(&self) -> bool {
        self.child_id64 == TXNID_NONE
    }
}

impl fmt::Display for TxnIdPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            write!(f, "txn:{}", self.parent_id64)
        } else {
            write!(f, "txn:{}.{}", self.parent_id64, self.child_id64)
        }
    }
}

/// Block number inside the rollback file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockNum(pub i64);

impl BlockNum {
    /// No block.
    pub const NONE: Self = Self(-1);
}

/// XA transaction identifier, as handed to the transaction coordinator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct XaXid {
    /// Format identifier; `-1` means null.
    pub format_id: i32,
    /// Global transaction id bytes.
    pub gtrid: Vec<u8>,
    /// Branch qualifier bytes.
    pub bqual: Vec<u8>,
}

impl XaXid {
    /// Creates an XA id from its parts.
    #[must_use]
    pub fn new(format_id: i32, gtrid: impl Into<Vec<u8>>, bqual: impl Into<Vec<u8>>) -> Self {
        Self {
            format_id,
            gtrid: gtrid.into(),
            bqual: bqual.into(),
        }
    }
}
