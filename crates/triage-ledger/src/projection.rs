use chrono::{DateTime, Utc};
use serde::Serialize;
use triage_types::{EntityId, EntityType, EventId};

use crate::error::LedgerError;
use crate::records::{EventKind, EventPayload, EventRecord};
use crate::traits::LedgerReader;

/// Row in an entity's audit trail.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AuditEntry {
    pub sequence: u64,
    pub id: EventId,
    pub kind: EventKind,
    pub entity_type: EntityType,
    pub occurred_at: DateTime<Utc>,
    pub summary: String,
}

/// Human-readable account of every record in an entity's history,
/// including ones the interpreter ignores.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AuditTrail {
    pub entity_id: EntityId,
    pub entries: Vec<AuditEntry>,
}

impl AuditTrail {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Builds audit trails from ledger history.
pub struct AuditProjection;

impl AuditProjection {
    pub fn trail<R: LedgerReader + ?Sized>(
        reader: &R,
        entity_id: &EntityId,
    ) -> Result<AuditTrail, LedgerError> {
        let records = reader.history(entity_id)?;
        Ok(Self::from_records(entity_id, &records))
    }

    pub fn from_records(entity_id: &EntityId, records: &[EventRecord]) -> AuditTrail {
        let entries = records
            .iter()
            .map(|record| AuditEntry {
                sequence: record.sequence,
                id: record.id,
                kind: record.kind.clone(),
                entity_type: record.entity_type,
                occurred_at: record.occurred_at,
                summary: summarize(record),
            })
            .collect();

        AuditTrail {
            entity_id: entity_id.clone(),
            entries,
        }
    }
}

fn summarize(record: &EventRecord) -> String {
    match (&record.kind, &record.payload) {
        (EventKind::Classified, EventPayload::Classification(c)) => {
            let mut line = format!("classified as {} ({})", c.bucket, c.confidence);
            if let Some(first) = c.reasoning.first() {
                line.push_str(": ");
                line.push_str(first);
                if c.reasoning.len() > 1 {
                    line.push_str(&format!(" (+{} more)", c.reasoning.len() - 1));
                }
            }
            line
        }
        (EventKind::WorkStarted, EventPayload::Work(w)) => {
            format!("started {} as {}", w.action_id, w.actor_role)
        }
        (EventKind::WorkFinished, EventPayload::Work(w)) => {
            format!("finished {} as {}", w.action_id, w.actor_role)
        }
        (EventKind::Replied, EventPayload::Reply(r)) if r.subject.is_empty() => {
            "replied (no subject)".into()
        }
        (EventKind::Replied, EventPayload::Reply(r)) => format!("replied: {}", r.subject),
        (EventKind::Unknown(name), _) => format!("unrecognized event {name}"),
        (kind, payload) => format!("malformed {kind} carrying a {} payload", payload.shape()),
    }
}

#[cfg(test)]
mod tests {
    use triage_types::Bucket;

    use crate::emit::Emitter;
    use crate::memory::InMemoryLedger;
    use crate::traits::LedgerWriter;

    use super::*;

    fn entity(raw: &str) -> EntityId {
        EntityId::new(raw).unwrap()
    }

    #[test]
    fn trail_lists_every_record_in_order() {
        let ledger = InMemoryLedger::default();
        let emit = Emitter::new(&ledger);
        emit.classified(
            "m1",
            EntityType::Email,
            Bucket::Urgent,
            0.92,
            vec!["Urgency keyword: asap".into(), "Due today".into()],
        )
        .unwrap();
        emit.work_started("m1", EntityType::Email, "m1-action-0", "assistant")
            .unwrap();
        emit.work_finished("m1", EntityType::Email, "m1-action-0", "assistant")
            .unwrap();
        emit.replied("m1", EntityType::Email, "RE: launch").unwrap();

        let trail = AuditProjection::trail(&ledger, &entity("m1")).unwrap();
        let summaries: Vec<_> = trail.entries.iter().map(|e| e.summary.as_str()).collect();
        assert_eq!(
            summaries,
            vec![
                "classified as urgent (0.92): Urgency keyword: asap (+1 more)",
                "started m1-action-0 as assistant",
                "finished m1-action-0 as assistant",
                "replied: RE: launch",
            ]
        );
        let sequences: Vec<_> = trail.entries.iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, vec![1, 2, 3, 4]);
    }

    #[test]
    fn unknown_kinds_stay_visible() {
        let ledger = InMemoryLedger::default();
        ledger
            .append(
                &entity("m1"),
                EntityType::Email,
                EventKind::Unknown("SNOOZED".into()),
                EventPayload::Opaque(serde_json::json!({"until": "tomorrow"})),
            )
            .unwrap();

        let trail = AuditProjection::trail(&ledger, &entity("m1")).unwrap();
        assert_eq!(trail.len(), 1);
        assert_eq!(trail.entries[0].summary, "unrecognized event SNOOZED");
    }

    #[test]
    fn empty_subject_and_empty_history() {
        let ledger = InMemoryLedger::default();
        assert!(AuditProjection::trail(&ledger, &entity("m1"))
            .unwrap()
            .is_empty());

        Emitter::new(&ledger)
            .replied("m1", EntityType::Email, "")
            .unwrap();
        let trail = AuditProjection::trail(&ledger, &entity("m1")).unwrap();
        assert_eq!(trail.entries[0].summary, "replied (no subject)");
    }

    #[test]
    fn mismatched_payload_is_flagged() {
        let ledger = InMemoryLedger::default();
        let mut record = Emitter::new(&ledger)
            .replied("m1", EntityType::Email, "hi")
            .unwrap();
        record.kind = EventKind::Classified;

        let trail = AuditProjection::from_records(&entity("m1"), &[record]);
        assert_eq!(
            trail.entries[0].summary,
            "malformed CLASSIFIED carrying a reply payload"
        );
    }
}
