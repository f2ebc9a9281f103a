use triage_types::{EntityId, EntityType};

use crate::error::LedgerError;
use crate::records::{EventKind, EventPayload, EventRecord};

/// Write boundary for ledger append operations.
pub trait LedgerWriter: Send + Sync {
    /// Append one record to `entity_id`'s history.
    ///
    /// The ledger assigns `id`, `sequence` and `occurred_at`. A payload whose
    /// shape does not fit `kind` is rejected before any state changes.
    fn append(
        &self,
        entity_id: &EntityId,
        entity_type: EntityType,
        kind: EventKind,
        payload: EventPayload,
    ) -> Result<EventRecord, LedgerError>;
}

/// Read boundary for ledger query/replay operations.
///
/// Unknown entities are not an error: they have an empty history.
pub trait LedgerReader: Send + Sync {
    /// Every record for the entity, ascending by sequence.
    fn history(&self, entity_id: &EntityId) -> Result<Vec<EventRecord>, LedgerError>;

    /// The highest-sequence record of `kind` for the entity.
    fn latest_of_kind(
        &self,
        entity_id: &EntityId,
        kind: &EventKind,
    ) -> Result<Option<EventRecord>, LedgerError>;

    /// Records with `from_seq <= sequence <= to_seq` (1-based, inclusive).
    fn read_range(
        &self,
        entity_id: &EntityId,
        from_seq: u64,
        to_seq: u64,
    ) -> Result<Vec<EventRecord>, LedgerError>;

    /// Every entity with at least one record, sorted by id.
    fn entities(&self) -> Result<Vec<EntityId>, LedgerError>;

    fn event_count(&self, entity_id: &EntityId) -> Result<u64, LedgerError>;
}
