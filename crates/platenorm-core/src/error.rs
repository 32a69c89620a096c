//! Error types for normalization and data-source operations.

use thiserror::Error;

/// Boxed error produced by an external collaborator (database, feature store).
pub type SourceError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised by the statistical core and the data-source seams.
#[derive(Error, Debug)]
pub enum NormError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Non-finite value at row {row}, column {column}")]
    NonFinite { row: usize, column: usize },

    #[error("Column count mismatch ({what}): expected {expected}, got {actual}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid plate id: {0:?}")]
    InvalidPlateId(String),

    #[error("Invalid predicate {predicate:?}: {reason}")]
    InvalidPredicate { predicate: String, reason: String },

    #[error("Data source error: {0}")]
    Source(#[source] SourceError),
}

/// Result type for core operations.
pub type NormResult<T> = Result<T, NormError>;

impl NormError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        NormError::InvalidInput(msg.into())
    }

    /// Wrap a collaborator failure so it propagates unchanged.
    pub fn source(err: impl Into<SourceError>) -> Self {
        NormError::Source(err.into())
    }
}
