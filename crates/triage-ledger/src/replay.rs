use tracing::{debug, warn};
use triage_types::EntityId;

use crate::error::LedgerError;
use crate::interpreter::{apply, Effect, Status};
use crate::records::EventRecord;
use crate::traits::LedgerReader;

/// Result of replaying an entity's history into its status.
#[derive(Clone, Debug, PartialEq)]
pub struct ReplayResult {
    pub entity_id: EntityId,
    pub status: Status,
    pub evaluated: u64,
    pub applied: u64,
    pub audit_only: u64,
    pub skipped_unknown: u64,
    pub last_sequence: Option<u64>,
}

/// Replay helpers with bookkeeping on top of [`derive_status`].
///
/// The status a replay produces is always identical to
/// [`derive_status`](crate::derive_status) over the same records; the engine
/// only adds counts and logging.
pub struct ReplayEngine;

impl ReplayEngine {
    /// Replay the entity's full history.
    pub fn replay<R: LedgerReader + ?Sized>(
        reader: &R,
        entity_id: &EntityId,
    ) -> Result<ReplayResult, LedgerError> {
        let records = reader.history(entity_id)?;
        Ok(Self::replay_records(entity_id, &records))
    }

    /// Status as it stood right after `through_seq` was appended.
    pub fn replay_through<R: LedgerReader + ?Sized>(
        reader: &R,
        entity_id: &EntityId,
        through_seq: u64,
    ) -> Result<ReplayResult, LedgerError> {
        if through_seq == 0 {
            return Ok(Self::replay_records(entity_id, &[]));
        }
        let records = reader.read_range(entity_id, 1, through_seq)?;
        Ok(Self::replay_records(entity_id, &records))
    }

    /// Replay an already-loaded, ordered history (e.g. from an export).
    pub fn replay_records(entity_id: &EntityId, records: &[EventRecord]) -> ReplayResult {
        let mut status = Status::default();
        let mut applied = 0u64;
        let mut audit_only = 0u64;
        let mut skipped_unknown = 0u64;

        for record in records {
            match apply(&mut status, record) {
                Effect::Applied => applied += 1,
                Effect::AuditOnly => audit_only += 1,
                Effect::SkippedUnknown => {
                    skipped_unknown += 1;
                    warn!(entity = %entity_id, seq = record.sequence, kind = %record.kind, "skipping unknown event kind");
                }
                Effect::Malformed => {
                    warn!(entity = %entity_id, seq = record.sequence, kind = %record.kind, "skipping malformed payload");
                }
            }
        }

        let result = ReplayResult {
            entity_id: entity_id.clone(),
            status,
            evaluated: records.len() as u64,
            applied,
            audit_only,
            skipped_unknown,
            last_sequence: records.last().map(|r| r.sequence),
        };
        debug!(
            entity = %entity_id,
            evaluated = result.evaluated,
            applied = result.applied,
            skipped = result.skipped_unknown,
            "replay complete"
        );
        result
    }

    /// Replay twice from independent reads and compare status fingerprints.
    pub fn verify_determinism<R: LedgerReader + ?Sized>(
        reader: &R,
        entity_id: &EntityId,
    ) -> Result<bool, LedgerError> {
        let first = Self::replay(reader, entity_id)?;
        let second = Self::replay(reader, entity_id)?;
        Ok(first.status.fingerprint()? == second.status.fingerprint()?)
    }
}

#[cfg(test)]
mod tests {
    use triage_types::{Bucket, EntityType};

    use crate::emit::Emitter;
    use crate::interpreter::derive_status;
    use crate::memory::InMemoryLedger;
    use crate::records::{EventKind, EventPayload};
    use crate::traits::LedgerWriter;

    use super::*;

    fn entity(raw: &str) -> EntityId {
        EntityId::new(raw).unwrap()
    }

    fn seeded() -> (InMemoryLedger, EntityId) {
        let ledger = InMemoryLedger::default();
        let email = entity("m1");
        let emit = Emitter::new(&ledger);
        emit.classified("m1", EntityType::Email, Bucket::Fyi, 0.4, vec!["fyi".into()])
            .unwrap();
        emit.work_started("m1", EntityType::Email, "m1-action-0", "assistant")
            .unwrap();
        ledger
            .append(
                &email,
                EntityType::Email,
                EventKind::Unknown("WORK_STOPPED".into()),
                EventPayload::Opaque(serde_json::json!({"action_id": "m1-action-0"})),
            )
            .unwrap();
        emit.classified("m1", EntityType::Email, Bucket::NeedsReply, 0.85, vec!["question".into()])
            .unwrap();
        emit.work_finished("m1", EntityType::Email, "m1-action-0", "assistant")
            .unwrap();
        emit.replied("m1", EntityType::Email, "RE: question").unwrap();
        (ledger, email)
    }

    #[test]
    fn replay_counts_effects_and_matches_derive_status() {
        let (ledger, email) = seeded();
        let result = ReplayEngine::replay(&ledger, &email).unwrap();

        assert_eq!(result.evaluated, 6);
        assert_eq!(result.applied, 4);
        assert_eq!(result.audit_only, 1);
        assert_eq!(result.skipped_unknown, 1);
        assert_eq!(result.last_sequence, Some(6));
        assert_eq!(result.status, derive_status(&ledger.history(&email).unwrap()));
        assert!(result.status.replied);
    }

    #[test]
    fn replay_through_shows_past_status() {
        let (ledger, email) = seeded();

        let early = ReplayEngine::replay_through(&ledger, &email, 2).unwrap();
        let classification = early.status.classification.clone().unwrap();
        assert_eq!(classification.bucket, Bucket::Fyi);
        assert!(early.status.finished.is_empty());
        assert!(!early.status.replied);
        assert_eq!(early.last_sequence, Some(2));

        let genesis = ReplayEngine::replay_through(&ledger, &email, 0).unwrap();
        assert_eq!(genesis.status, Status::default());

        let beyond = ReplayEngine::replay_through(&ledger, &email, 99).unwrap();
        assert_eq!(beyond.status, ReplayEngine::replay(&ledger, &email).unwrap().status);
    }

    #[test]
    fn replay_empty_entity() {
        let ledger = InMemoryLedger::default();
        let result = ReplayEngine::replay(&ledger, &entity("unknown-id")).unwrap();
        assert_eq!(result.evaluated, 0);
        assert_eq!(result.last_sequence, None);
        assert_eq!(result.status, Status::default());
    }

    #[test]
    fn determinism_holds_for_seeded_history() {
        let (ledger, email) = seeded();
        assert!(ReplayEngine::verify_determinism(&ledger, &email).unwrap());
    }
}
