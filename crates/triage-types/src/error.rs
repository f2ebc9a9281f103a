use thiserror::Error;

/// Errors produced by type construction and parsing.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TypeError {
    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("confidence must be within [0.0, 1.0], got {0}")]
    ConfidenceOutOfRange(f64),

    #[error("unknown bucket: {0}")]
    UnknownBucket(String),

    #[error("unknown entity type: {0}")]
    UnknownEntityType(String),
}
