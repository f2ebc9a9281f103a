//! Typed emitters: the sanctioned way to record each known event kind.
//!
//! The ledger only checks that a payload's shape fits its kind. Emitters own
//! the semantic rules (confidence range, non-empty identifiers, text limits)
//! and report the offending field by name. Each successful call performs
//! exactly one append; deduplication is left to the caller, which can consult
//! [`LedgerReader::latest_of_kind`](crate::LedgerReader::latest_of_kind).

use triage_types::{ActionId, Bucket, Confidence, EntityId, EntityType};

use crate::config::LedgerConfig;
use crate::error::{LedgerError, ValidationError};
use crate::records::{Classification, EventKind, EventPayload, EventRecord, ReplyRef, WorkRef};
use crate::traits::LedgerWriter;

/// Builds well-formed records and appends them through a [`LedgerWriter`].
pub struct Emitter<'a, W: LedgerWriter + ?Sized> {
    writer: &'a W,
    max_reasoning_items: usize,
    max_text_len: usize,
}

impl<'a, W: LedgerWriter + ?Sized> Emitter<'a, W> {
    /// Emitter using the default limits.
    pub fn new(writer: &'a W) -> Self {
        Self::with_config(writer, &LedgerConfig::default())
    }

    pub fn with_config(writer: &'a W, config: &LedgerConfig) -> Self {
        Self {
            writer,
            max_reasoning_items: config.max_reasoning_items,
            max_text_len: config.max_text_len,
        }
    }

    /// Record a classification for `entity_id`.
    ///
    /// `reasoning` may be empty, but each line must be non-blank.
    pub fn classified(
        &self,
        entity_id: &str,
        entity_type: EntityType,
        bucket: Bucket,
        confidence: f64,
        reasoning: Vec<String>,
    ) -> Result<EventRecord, LedgerError> {
        let entity_id = parse_entity(entity_id)?;
        let confidence = Confidence::new(confidence).map_err(|e| invalid("confidence", e))?;

        if reasoning.len() > self.max_reasoning_items {
            return Err(ValidationError::InvalidField {
                field: "reasoning",
                reason: format!(
                    "{} items exceeds the limit of {}",
                    reasoning.len(),
                    self.max_reasoning_items
                ),
            }
            .into());
        }
        for (index, line) in reasoning.iter().enumerate() {
            if line.trim().is_empty() {
                return Err(ValidationError::InvalidField {
                    field: "reasoning",
                    reason: format!("item {index} is blank"),
                }
                .into());
            }
            self.check_len("reasoning", line)?;
        }

        self.writer.append(
            &entity_id,
            entity_type,
            EventKind::Classified,
            EventPayload::Classification(Classification {
                bucket,
                confidence,
                reasoning,
            }),
        )
    }

    /// Record that work on `action_id` began.
    pub fn work_started(
        &self,
        entity_id: &str,
        entity_type: EntityType,
        action_id: &str,
        actor_role: &str,
    ) -> Result<EventRecord, LedgerError> {
        self.work(EventKind::WorkStarted, entity_id, entity_type, action_id, actor_role)
    }

    /// Record that `action_id` was completed.
    pub fn work_finished(
        &self,
        entity_id: &str,
        entity_type: EntityType,
        action_id: &str,
        actor_role: &str,
    ) -> Result<EventRecord, LedgerError> {
        self.work(EventKind::WorkFinished, entity_id, entity_type, action_id, actor_role)
    }

    /// Record an acknowledged reply. The subject is kept for audit only and
    /// may be empty (emails without a subject are answered too).
    pub fn replied(
        &self,
        entity_id: &str,
        entity_type: EntityType,
        subject: &str,
    ) -> Result<EventRecord, LedgerError> {
        let entity_id = parse_entity(entity_id)?;
        self.check_len("subject", subject)?;

        self.writer.append(
            &entity_id,
            entity_type,
            EventKind::Replied,
            EventPayload::Reply(ReplyRef {
                subject: subject.to_string(),
            }),
        )
    }

    fn work(
        &self,
        kind: EventKind,
        entity_id: &str,
        entity_type: EntityType,
        action_id: &str,
        actor_role: &str,
    ) -> Result<EventRecord, LedgerError> {
        let entity_id = parse_entity(entity_id)?;
        let action_id = ActionId::new(action_id).map_err(|_| missing("action_id"))?;
        self.check_len("action_id", action_id.as_str())?;
        if actor_role.trim().is_empty() {
            return Err(missing("actor_role").into());
        }
        self.check_len("actor_role", actor_role)?;

        self.writer.append(
            &entity_id,
            entity_type,
            kind,
            EventPayload::Work(WorkRef {
                action_id,
                actor_role: actor_role.to_string(),
            }),
        )
    }

    fn check_len(&self, field: &'static str, value: &str) -> Result<(), ValidationError> {
        if value.len() > self.max_text_len {
            return Err(ValidationError::InvalidField {
                field,
                reason: format!(
                    "{} bytes exceeds the limit of {}",
                    value.len(),
                    self.max_text_len
                ),
            });
        }
        Ok(())
    }
}

fn parse_entity(raw: &str) -> Result<EntityId, ValidationError> {
    EntityId::new(raw).map_err(|_| missing("entity_id"))
}

fn missing(field: &'static str) -> ValidationError {
    ValidationError::MissingField { field }
}

fn invalid(field: &'static str, error: impl std::fmt::Display) -> ValidationError {
    ValidationError::InvalidField {
        field,
        reason: error.to_string(),
    }
}
