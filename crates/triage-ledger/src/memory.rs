use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use chrono::Utc;
use tracing::debug;
use triage_types::{EntityId, EntityType, EventId};

use crate::config::LedgerConfig;
use crate::error::{LedgerError, ValidationError};
use crate::records::{EventKind, EventPayload, EventRecord};
use crate::traits::{LedgerReader, LedgerWriter};
use crate::validation::{group_streams, StreamValidator};

/// One entity's history. Guarded separately so writers to different
/// entities never contend on the same lock.
type Stream = Arc<RwLock<Vec<EventRecord>>>;

/// In-memory ledger for a single triage session.
///
/// Sequence numbers are assigned while holding the entity's stream lock, so
/// they are gap-free per entity and readers (which clone under the read
/// lock) always observe a complete prefix.
pub struct InMemoryLedger {
    config: LedgerConfig,
    last_id: AtomicU64,
    streams: RwLock<HashMap<EntityId, Stream>>,
}

impl InMemoryLedger {
    pub fn new(config: LedgerConfig) -> Self {
        Self {
            config,
            last_id: AtomicU64::new(0),
            streams: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Rebuild a ledger from previously exported records.
    ///
    /// Records may arrive in any order; each entity's stream must validate
    /// (contiguous sequences from 1, payloads fitting their kinds, and one
    /// entity type when `config` enforces it) and record ids must be unique
    /// across the whole export.
    pub fn restore(
        records: Vec<EventRecord>,
        config: LedgerConfig,
    ) -> Result<Self, LedgerError> {
        let mut seen_ids = HashSet::new();
        let mut last_id = 0u64;
        for record in &records {
            if !seen_ids.insert(record.id) {
                return Err(LedgerError::IntegrityViolation {
                    seq: record.sequence,
                    reason: format!("duplicate record id {}", record.id),
                });
            }
            last_id = last_id.max(record.id.value());
        }

        let validator = StreamValidator::new(&config);
        let grouped = group_streams(records);
        let mut streams = HashMap::with_capacity(grouped.len());
        for (entity_id, records) in grouped {
            let report = validator.validate_records(&entity_id, &records);
            if let Some(violation) = report.violations.first() {
                return Err(LedgerError::IntegrityViolation {
                    seq: violation.seq,
                    reason: violation.description.clone(),
                });
            }
            streams.insert(entity_id, Arc::new(RwLock::new(records)));
        }

        debug!(entities = streams.len(), last_id, "ledger restored");

        Ok(Self {
            config,
            last_id: AtomicU64::new(last_id),
            streams: RwLock::new(streams),
        })
    }

    /// Every record in the ledger, grouped by entity (sorted) and ordered by
    /// sequence within each entity.
    pub fn export(&self) -> Result<Vec<EventRecord>, LedgerError> {
        let mut all = Vec::new();
        for entity_id in self.entities()? {
            all.extend(self.history(&entity_id)?);
        }
        Ok(all)
    }

    fn existing_stream(&self, entity_id: &EntityId) -> Result<Option<Stream>, LedgerError> {
        let streams = self
            .streams
            .read()
            .map_err(|_| LedgerError::LockPoisoned("ledger registry"))?;
        Ok(streams.get(entity_id).cloned())
    }

    fn stream_for_append(&self, entity_id: &EntityId) -> Result<Stream, LedgerError> {
        if let Some(stream) = self.existing_stream(entity_id)? {
            return Ok(stream);
        }
        let mut streams = self
            .streams
            .write()
            .map_err(|_| LedgerError::LockPoisoned("ledger registry"))?;
        Ok(streams.entry(entity_id.clone()).or_default().clone())
    }

    fn check_structure(kind: &EventKind, payload: &EventPayload) -> Result<(), ValidationError> {
        if let EventKind::Unknown(name) = kind {
            // A hand-built Unknown must not shadow a known wire name.
            if name.trim().is_empty() || EventKind::from(name.as_str()).is_known() {
                return Err(ValidationError::InvalidKindName(name.clone()));
            }
        }
        if !payload.fits(kind) {
            return Err(ValidationError::PayloadShapeMismatch {
                kind: kind.clone(),
                expected: kind.expected_shape(),
                found: payload.shape(),
            });
        }
        Ok(())
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new(LedgerConfig::default())
    }
}

impl LedgerWriter for InMemoryLedger {
    fn append(
        &self,
        entity_id: &EntityId,
        entity_type: EntityType,
        kind: EventKind,
        payload: EventPayload,
    ) -> Result<EventRecord, LedgerError> {
        Self::check_structure(&kind, &payload)?;

        let stream = self.stream_for_append(entity_id)?;
        let mut records = stream
            .write()
            .map_err(|_| LedgerError::LockPoisoned("entity stream"))?;

        if self.config.strict_entity_types {
            if let Some(first) = records.first() {
                if first.entity_type != entity_type {
                    return Err(ValidationError::EntityTypeMismatch {
                        entity: entity_id.clone(),
                        expected: first.entity_type,
                        found: entity_type,
                    }
                    .into());
                }
            }
        }

        let sequence = records.len() as u64 + 1;
        let id = EventId::new(self.last_id.fetch_add(1, Ordering::SeqCst) + 1);
        let record = EventRecord {
            id,
            sequence,
            entity_id: entity_id.clone(),
            entity_type,
            kind,
            payload,
            occurred_at: Utc::now(),
        };
        records.push(record.clone());

        debug!(entity = %entity_id, kind = %record.kind, seq = sequence, id = %id, "event appended");
        Ok(record)
    }
}

impl LedgerReader for InMemoryLedger {
    fn history(&self, entity_id: &EntityId) -> Result<Vec<EventRecord>, LedgerError> {
        let Some(stream) = self.existing_stream(entity_id)? else {
            return Ok(vec![]);
        };
        let records = stream
            .read()
            .map_err(|_| LedgerError::LockPoisoned("entity stream"))?;
        Ok(records.clone())
    }

    fn latest_of_kind(
        &self,
        entity_id: &EntityId,
        kind: &EventKind,
    ) -> Result<Option<EventRecord>, LedgerError> {
        let Some(stream) = self.existing_stream(entity_id)? else {
            return Ok(None);
        };
        let records = stream
            .read()
            .map_err(|_| LedgerError::LockPoisoned("entity stream"))?;
        Ok(records.iter().rev().find(|r| &r.kind == kind).cloned())
    }

    fn read_range(
        &self,
        entity_id: &EntityId,
        from_seq: u64,
        to_seq: u64,
    ) -> Result<Vec<EventRecord>, LedgerError> {
        if from_seq == 0 || to_seq == 0 || from_seq > to_seq {
            return Err(LedgerError::InvalidRange {
                from: from_seq,
                to: to_seq,
            });
        }

        let Some(stream) = self.existing_stream(entity_id)? else {
            return Ok(vec![]);
        };
        let records = stream
            .read()
            .map_err(|_| LedgerError::LockPoisoned("entity stream"))?;

        let start = (from_seq - 1) as usize;
        if start >= records.len() {
            return Ok(vec![]);
        }

        let end_exclusive = to_seq.min(records.len() as u64) as usize;
        Ok(records[start..end_exclusive].to_vec())
    }

    fn entities(&self) -> Result<Vec<EntityId>, LedgerError> {
        let streams = self
            .streams
            .read()
            .map_err(|_| LedgerError::LockPoisoned("ledger registry"))?;

        let mut ids = Vec::with_capacity(streams.len());
        for (id, stream) in streams.iter() {
            let records = stream
                .read()
                .map_err(|_| LedgerError::LockPoisoned("entity stream"))?;
            // Streams are registered just before their first record lands.
            if !records.is_empty() {
                ids.push(id.clone());
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn event_count(&self, entity_id: &EntityId) -> Result<u64, LedgerError> {
        let Some(stream) = self.existing_stream(entity_id)? else {
            return Ok(0);
        };
        let records = stream
            .read()
            .map_err(|_| LedgerError::LockPoisoned("entity stream"))?;
        Ok(records.len() as u64)
    }
}
