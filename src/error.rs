//! Error types for timer operations

use std::{fmt, path::PathBuf};

use thiserror::Error;

use crate::state::{TimerId, TimerStatus};

/// A `Result` alias with [`TimerError`] as the error type.
pub type Result<T> = std::result::Result<T, TimerError>;

/// The state-changing operation a caller attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Start,
    Pause,
    Cancel,
    Reset,
    Adjust,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Start => "start",
            Operation::Pause => "pause",
            Operation::Cancel => "cancel",
            Operation::Reset => "reset",
            Operation::Adjust => "adjust",
            Operation::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// Errors surfaced by the controller and the entity layer.
#[derive(Debug, Error)]
pub enum TimerError {
    /// Malformed input, such as a zero duration.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// No timer with this id exists in the store.
    #[error("timer {0} not found")]
    NotFound(TimerId),

    /// The operation is not permitted from the timer's current status.
    #[error("cannot {operation} timer {id} while it is {from}")]
    InvalidTransition {
        id: TimerId,
        operation: Operation,
        from: TimerStatus,
    },

    /// The backing store failed.
    #[error("store failure: {0}")]
    Store(#[from] StoreError),
}

impl TimerError {
    pub(crate) fn invalid_transition(id: TimerId, operation: Operation, from: TimerStatus) -> Self {
        TimerError::InvalidTransition {
            id,
            operation,
            from,
        }
    }
}

/// Failures reported by a [`TimerStore`](crate::store::TimerStore) backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A persisted record could not be decoded.
    #[error("corrupt record {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether retrying the same call later may succeed.
    pub fn is_transient(&self) -> bool {
        !matches!(self, StoreError::Corrupt { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_transition_message_names_operation_and_state() {
        let id = TimerId::new();
        let err = TimerError::invalid_transition(id, Operation::Pause, TimerStatus::Created);
        assert_eq!(
            err.to_string(),
            format!("cannot pause timer {} while it is created", id)
        );
    }

    #[test]
    fn corrupt_records_are_not_transient() {
        let source = serde_json::from_str::<u8>("nope").unwrap_err();
        let corrupt = StoreError::Corrupt {
            path: PathBuf::from("x.json"),
            source,
        };
        assert!(!corrupt.is_transient());
        assert!(StoreError::Unavailable("down".into()).is_transient());
    }
}
