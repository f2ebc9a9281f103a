use triage_types::{EntityId, EntityType};

use crate::records::{EventKind, PayloadShape};

/// Errors produced by ledger operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LedgerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("integrity violation at seq {seq}: {reason}")]
    IntegrityViolation { seq: u64, reason: String },

    #[error("invalid sequence range: from={from}, to={to}")]
    InvalidRange { from: u64, to: u64 },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("{0} lock poisoned")]
    LockPoisoned(&'static str),
}

/// Input rejected before it reached the ledger's state.
///
/// Every variant names the field at fault. Retrying the same input will fail
/// the same way.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("missing required field `{field}`")]
    MissingField { field: &'static str },

    #[error("invalid field `{field}`: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("payload for {kind} must be a {expected} payload, got {found}")]
    PayloadShapeMismatch {
        kind: EventKind,
        expected: PayloadShape,
        found: PayloadShape,
    },

    #[error("entity {entity} is recorded as {expected}, cannot append as {found}")]
    EntityTypeMismatch {
        entity: EntityId,
        expected: EntityType,
        found: EntityType,
    },

    #[error("kind name `{0}` is reserved or empty")]
    InvalidKindName(String),
}

impl ValidationError {
    /// The field that caused the rejection.
    pub fn field(&self) -> &'static str {
        match self {
            Self::MissingField { field } | Self::InvalidField { field, .. } => field,
            Self::PayloadShapeMismatch { .. } => "payload",
            Self::EntityTypeMismatch { .. } => "entity_type",
            Self::InvalidKindName(_) => "kind",
        }
    }
}

impl LedgerError {
    /// Returns the validation failure, if this error is one.
    pub fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            Self::Validation(inner) => Some(inner),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;

    #[test]
    fn validation_errors_display_once() {
        let error = LedgerError::from(ValidationError::MissingField { field: "entity_id" });
        assert_eq!(error.to_string(), "missing required field `entity_id`");
        assert!(error.source().is_none());
        assert_eq!(error.as_validation().map(ValidationError::field), Some("entity_id"));
    }
}
