//! Deterministic status interpreter.
//!
//! [`derive_status`] folds an entity's ordered history into a [`Status`]. It
//! reads nothing but `{sequence, kind, payload}` of the records it is given:
//! no clocks, no ledger, no logging. The same history always yields the same
//! status, and [`Status::fingerprint`] yields the same digest.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use triage_types::ActionId;

use crate::error::LedgerError;
use crate::records::{Classification, EventKind, EventRecord};

/// Current state of an entity, derived from its history.
///
/// Never stored. The zero value (`Status::default()`) is the status of an
/// entity with no history.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Status {
    /// From the highest-sequence `CLASSIFIED` record.
    pub classification: Option<Classification>,
    /// Every action ever finished. Entries are never removed.
    pub finished: BTreeSet<ActionId>,
    /// Sticky once a `REPLIED` record has been seen.
    pub replied: bool,
}

impl Status {
    pub fn is_finished(&self, action_id: &ActionId) -> bool {
        self.finished.contains(action_id)
    }

    /// BLAKE3 digest of the canonical JSON encoding.
    pub fn fingerprint(&self) -> Result<[u8; 32], LedgerError> {
        let encoded =
            serde_json::to_vec(self).map_err(|e| LedgerError::Serialization(e.to_string()))?;
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"triage-status-v1:");
        hasher.update(&encoded);
        Ok(*hasher.finalize().as_bytes())
    }

    pub fn fingerprint_hex(&self) -> Result<String, LedgerError> {
        self.fingerprint().map(hex::encode)
    }
}

/// What applying one record did to the status.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Effect {
    /// The record changed (or re-affirmed) part of the status.
    Applied,
    /// Known kind recorded for audit only (`WORK_STARTED`).
    AuditOnly,
    /// Kind not known to this build.
    SkippedUnknown,
    /// Known kind whose payload does not fit it. Only returned in release
    /// builds; debug builds panic instead.
    Malformed,
}

/// Fold an ordered history into its status.
///
/// `history` must be one entity's records in strictly ascending sequence
/// order. Violations are programming errors and fail a `debug_assert!`.
pub fn derive_status(history: &[EventRecord]) -> Status {
    let mut status = Status::default();
    let mut previous: Option<&EventRecord> = None;
    for record in history {
        if let Some(prev) = previous {
            debug_assert!(
                record.sequence > prev.sequence,
                "history out of order: seq {} after seq {}",
                record.sequence,
                prev.sequence
            );
            debug_assert!(
                record.entity_id == prev.entity_id,
                "history mixes entities {} and {}",
                prev.entity_id,
                record.entity_id
            );
        }
        apply(&mut status, record);
        previous = Some(record);
    }
    status
}

/// Apply a single record to `status`.
pub fn apply(status: &mut Status, record: &EventRecord) -> Effect {
    match &record.kind {
        EventKind::Classified => match record.payload.as_classification() {
            Some(classification) => {
                status.classification = Some(classification.clone());
                Effect::Applied
            }
            None => malformed(record),
        },
        EventKind::WorkStarted => match record.payload.as_work() {
            Some(_) => Effect::AuditOnly,
            None => malformed(record),
        },
        EventKind::WorkFinished => match record.payload.as_work() {
            Some(work) => {
                status.finished.insert(work.action_id.clone());
                Effect::Applied
            }
            None => malformed(record),
        },
        EventKind::Replied => match record.payload.as_reply() {
            Some(_) => {
                status.replied = true;
                Effect::Applied
            }
            None => malformed(record),
        },
        EventKind::Unknown(_) => Effect::SkippedUnknown,
    }
}

fn malformed(record: &EventRecord) -> Effect {
    if cfg!(debug_assertions) {
        panic!(
            "{} carries a {} payload",
            record.short_ref(),
            record.payload.shape()
        );
    }
    Effect::Malformed
}
