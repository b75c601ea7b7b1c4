use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Classification shared by every layer's error type.
///
/// `NotFound`, `InvalidInput` and `BoundaryConflict` are recoverable and
/// guarantee the document was left untouched. `StaleState` blocks until the
/// caller reloads or forces a save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    InvalidInput,
    BoundaryConflict,
    StaleState,
    StructuralInvariantViolation,
    IoFailure,
}

impl ErrorKind {
    /// Whether the failed call is guaranteed to have had no side effects
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ErrorKind::NotFound | ErrorKind::InvalidInput | ErrorKind::BoundaryConflict
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::NotFound => "not found",
            ErrorKind::InvalidInput => "invalid input",
            ErrorKind::BoundaryConflict => "boundary conflict",
            ErrorKind::StaleState => "stale state",
            ErrorKind::StructuralInvariantViolation => "structural invariant violation",
            ErrorKind::IoFailure => "io failure",
        };
        f.write_str(name)
    }
}

/// Errors raised by the shared helpers in this crate
#[derive(Error, Debug)]
pub enum CommonError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot expand home directory in {0}: no home directory found")]
    NoHomeDirectory(String),
}

impl CommonError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CommonError::Io(_) => ErrorKind::IoFailure,
            CommonError::NoHomeDirectory(_) => ErrorKind::InvalidInput,
        }
    }
}
