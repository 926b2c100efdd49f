//! Error types for the Oracle adapter core.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum OraError {
    /// Update or delete without an effective WHERE predicate.
    #[error("WHERE conditions required")]
    MissingWhereClause,

    /// Batch create called with an empty slice.
    #[error("empty slice found")]
    EmptySlice,

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("empty identifier")]
    EmptyIdentifier,

    /// Case-insensitive naming requires every identifier to be representable
    /// unquoted.
    #[error("identifier {0:?} not representable unquoted with case-insensitive naming")]
    UnquotableIdentifier(String),

    #[error("index {index}: {reason}")]
    InvalidIndex { index: String, reason: String },

    #[error("unsupported conversion of column {column} from {from} to {to}")]
    UnsupportedConversion {
        column: String,
        from: String,
        to: String,
    },

    #[error("migration failed: {0}")]
    Migration(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("driver error: {0}")]
    Driver(String),
}

pub type OraResult<T> = Result<T, OraError>;

impl OraError {
    pub fn invalid_index(index: &str, reason: impl Into<String>) -> Self {
        Self::InvalidIndex {
            index: index.to_string(),
            reason: reason.into(),
        }
    }
}

/// The driver reports "output parameter should be pointer type" when an
/// `UPDATE ... RETURNING` matches zero rows and never writes its out binds.
/// That is not a failure of the statement, so the error is swallowed and the
/// caller observes zero rows affected.
pub fn translate(err: OraError) -> Option<OraError> {
    if let OraError::Driver(ref msg) = err {
        if msg.contains("output parameter should be pointer type") {
            return None;
        }
    }
    Some(err)
}
