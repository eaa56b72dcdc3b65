//! Error types for ftlog core.

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Direction of a cursor read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Towards newer records.
    Forward,
    /// Towards older records.
    Backward,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Forward => f.write_str("forward"),
            Self::Backward => f.write_str("backward"),
        }
    }
}

/// Errors that can occur in log traversal and recovery.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The traversal ran off either end of the log file set.
    ///
    /// This is the normal "no more records" signal, not a failure.
    #[error("end of log")]
    EndOfLog,

    /// A file header or record could not be parsed.
    #[error("bad log format: {message}")]
    BadFormat {
        /// Description of the problem, including the file and offset.
        message: String,
    },

    /// Two consecutively read records do not have adjacent LSNs.
    #[error("LSN sequence broken reading {direction}: expected {expected}, found {actual}; full recovery required")]
    SequenceError {
        /// Direction of travel.
        direction: Direction,
        /// The LSN the cursor expected.
        expected: u64,
        /// The LSN it found.
        actual: u64,
    },

    /// The checkpoint or transaction protocol saw an impossible transition.
    #[error("recovery protocol violation: {message}")]
    ProtocolViolation {
        /// Description of the violated expectation.
        message: String,
    },

    /// The log directory could not be enumerated.
    #[error("log directory not found: {}", path.display())]
    NotFound {
        /// The directory that was requested.
        path: PathBuf,
    },

    /// Another process holds the recovery lock.
    #[error("recovery lock held by another process: {}", path.display())]
    Locked {
        /// The lock file.
        path: PathBuf,
    },

    /// Operation not permitted in the current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why the operation is invalid.
        message: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] ftlog_storage::StorageError),

    /// Recovery aborted; the log needs manual attention before the engine
    /// may start.
    #[error("recovery failed, manual recovery required: {source}")]
    RecoveryFailed {
        /// What stopped recovery.
        #[source]
        source: Box<CoreError>,
    },
}

impl CoreError {
    /// Creates a bad format error.
    pub fn bad_format(message: impl Into<String>) -> Self {
        Self::BadFormat {
            message: message.into(),
        }
    }

    /// Creates a protocol violation error.
    pub fn protocol_violation(message: impl Into<String>) -> Self {
        Self::ProtocolViolation {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Wraps an error as a fatal recovery failure.
    #[must_use]
    pub fn recovery_failed(source: CoreError) -> Self {
        match source {
            already @ Self::RecoveryFailed { .. } => already,
            other => Self::RecoveryFailed {
                source: Box::new(other),
            },
        }
    }

    /// Returns true for [`CoreError::EndOfLog`].
    #[must_use]
    pub fn is_end_of_log(&self) -> bool {
        matches!(self, Self::EndOfLog)
    }

    /// Returns true for [`CoreError::BadFormat`].
    #[must_use]
    pub fn is_bad_format(&self) -> bool {
        matches!(self, Self::BadFormat { .. })
    }

    /// Returns the innermost error of a [`CoreError::RecoveryFailed`] chain.
    #[must_use]
    pub fn root_cause(&self) -> &CoreError {
        match self {
            Self::RecoveryFailed { source } => source.root_cause(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovery_failed_does_not_nest() {
        let err = CoreError::recovery_failed(CoreError::recovery_failed(CoreError::EndOfLog));
        match &err {
            CoreError::RecoveryFailed { source } => assert!(source.is_end_of_log()),
            other => panic!("unexpected {other}"),
        }
        assert!(err.root_cause().is_end_of_log());
    }

    #[test]
    fn sequence_error_message_mentions_recovery() {
        let err = CoreError::SequenceError {
            direction: Direction::Forward,
            expected: 5,
            actual: 7,
        };
        let text = err.to_string();
        assert!(text.contains("forward"));
        assert!(text.contains("full recovery"));
    }
}
