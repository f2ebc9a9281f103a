use std::collections::BTreeMap;

use triage_types::EntityId;

use crate::config::LedgerConfig;
use crate::error::LedgerError;
use crate::records::EventRecord;
use crate::traits::LedgerReader;

/// Result of stream validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationReport {
    pub entity_id: EntityId,
    pub record_count: u64,
    pub sequence_contiguous: bool,
    pub ids_increasing: bool,
    pub single_entity: bool,
    pub payloads_fit_kinds: bool,
    pub violations: Vec<Violation>,
}

impl ValidationReport {
    /// Returns `true` if all checks passed.
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }
}

/// A specific integrity violation detected during validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    pub seq: u64,
    pub kind: ViolationKind,
    pub description: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViolationKind {
    SequenceGap,
    IdNotIncreasing,
    ForeignEntity,
    MixedEntityType,
    PayloadShapeMismatch,
}

/// Stream integrity validator.
///
/// Mixed entity types within one stream are only a violation when the
/// ledger that wrote it enforces them, so the check follows
/// [`LedgerConfig::strict_entity_types`].
#[derive(Clone, Copy, Debug)]
pub struct StreamValidator {
    strict_entity_types: bool,
}

impl Default for StreamValidator {
    fn default() -> Self {
        Self::new(&LedgerConfig::default())
    }
}

impl StreamValidator {
    pub fn new(config: &LedgerConfig) -> Self {
        Self {
            strict_entity_types: config.strict_entity_types,
        }
    }

    /// Validate a single entity stream held by a reader.
    pub fn validate_stream<R: LedgerReader + ?Sized>(
        &self,
        reader: &R,
        entity_id: &EntityId,
    ) -> Result<ValidationReport, LedgerError> {
        let records = reader.history(entity_id)?;
        Ok(self.validate_records(entity_id, &records))
    }

    /// Validate records claimed to be `entity_id`'s full history, in the
    /// order given.
    pub fn validate_records(
        &self,
        entity_id: &EntityId,
        records: &[EventRecord],
    ) -> ValidationReport {
        let mut violations = Vec::new();
        let mut sequence_contiguous = true;
        let mut ids_increasing = true;
        let mut single_entity = true;
        let mut payloads_fit_kinds = true;
        let stream_type = records.first().map(|r| r.entity_type);

        for (index, record) in records.iter().enumerate() {
            let expected_seq = index as u64 + 1;
            if record.sequence != expected_seq {
                sequence_contiguous = false;
                violations.push(Violation {
                    seq: record.sequence,
                    kind: ViolationKind::SequenceGap,
                    description: format!("expected seq {expected_seq}, got {}", record.sequence),
                });
            }

            if index > 0 && records[index - 1].id >= record.id {
                ids_increasing = false;
                violations.push(Violation {
                    seq: record.sequence,
                    kind: ViolationKind::IdNotIncreasing,
                    description: format!(
                        "id {} does not follow {}",
                        record.id,
                        records[index - 1].id
                    ),
                });
            }

            if &record.entity_id != entity_id {
                single_entity = false;
                violations.push(Violation {
                    seq: record.sequence,
                    kind: ViolationKind::ForeignEntity,
                    description: format!("record belongs to {}", record.entity_id),
                });
            }

            if self.strict_entity_types && stream_type.is_some_and(|t| t != record.entity_type) {
                single_entity = false;
                violations.push(Violation {
                    seq: record.sequence,
                    kind: ViolationKind::MixedEntityType,
                    description: format!(
                        "entity type {} differs from stream type",
                        record.entity_type
                    ),
                });
            }

            if !record.payload.fits(&record.kind) {
                payloads_fit_kinds = false;
                violations.push(Violation {
                    seq: record.sequence,
                    kind: ViolationKind::PayloadShapeMismatch,
                    description: format!(
                        "{} expects a {} payload, got {}",
                        record.kind,
                        record.kind.expected_shape(),
                        record.payload.shape()
                    ),
                });
            }
        }

        ValidationReport {
            entity_id: entity_id.clone(),
            record_count: records.len() as u64,
            sequence_contiguous,
            ids_increasing,
            single_entity,
            payloads_fit_kinds,
            violations,
        }
    }

    /// Validate every entity in the ledger.
    pub fn validate_all<R: LedgerReader + ?Sized>(
        &self,
        reader: &R,
    ) -> Result<Vec<ValidationReport>, LedgerError> {
        let entities = reader.entities()?;
        let mut reports = Vec::with_capacity(entities.len());
        for entity_id in &entities {
            reports.push(self.validate_stream(reader, entity_id)?);
        }
        Ok(reports)
    }

    /// Validate a flat export without loading it into a ledger.
    ///
    /// Records are grouped by entity and ordered by sequence, so a report is
    /// produced for every stream even when some of them are broken.
    pub fn validate_export(&self, records: Vec<EventRecord>) -> Vec<ValidationReport> {
        group_streams(records)
            .iter()
            .map(|(entity_id, stream)| self.validate_records(entity_id, stream))
            .collect()
    }
}

/// Split a flat export into per-entity streams, each sorted by sequence.
pub fn group_streams(records: Vec<EventRecord>) -> BTreeMap<EntityId, Vec<EventRecord>> {
    let mut grouped: BTreeMap<EntityId, Vec<EventRecord>> = BTreeMap::new();
    for record in records {
        grouped
            .entry(record.entity_id.clone())
            .or_default()
            .push(record);
    }
    for stream in grouped.values_mut() {
        stream.sort_by_key(|r| r.sequence);
    }
    grouped
}
