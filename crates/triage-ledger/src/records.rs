use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use triage_types::{ActionId, Bucket, Confidence, EntityId, EntityType, EventId};

/// Kind of lifecycle event recorded in the ledger.
///
/// The set is closed: the four known kinds plus a catch-all that keeps the
/// wire name of any kind written by a newer producer. Serialized as the
/// upper-snake wire name, so unknown kinds survive an export round trip.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventKind {
    /// An email was assigned a triage bucket.
    Classified,
    /// Work on a sub-action began.
    WorkStarted,
    /// A sub-action was completed.
    WorkFinished,
    /// A reply was delivered.
    Replied,
    /// A kind this build does not know. Replay treats it as a no-op.
    Unknown(String),
}

impl EventKind {
    pub const CLASSIFIED: &'static str = "CLASSIFIED";
    pub const WORK_STARTED: &'static str = "WORK_STARTED";
    pub const WORK_FINISHED: &'static str = "WORK_FINISHED";
    pub const REPLIED: &'static str = "REPLIED";

    pub fn as_str(&self) -> &str {
        match self {
            Self::Classified => Self::CLASSIFIED,
            Self::WorkStarted => Self::WORK_STARTED,
            Self::WorkFinished => Self::WORK_FINISHED,
            Self::Replied => Self::REPLIED,
            Self::Unknown(name) => name,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }

    /// Payload shape this kind must carry.
    pub fn expected_shape(&self) -> PayloadShape {
        match self {
            Self::Classified => PayloadShape::Classification,
            Self::WorkStarted | Self::WorkFinished => PayloadShape::Work,
            Self::Replied => PayloadShape::Reply,
            Self::Unknown(_) => PayloadShape::Opaque,
        }
    }
}

impl From<String> for EventKind {
    fn from(name: String) -> Self {
        match name.as_str() {
            Self::CLASSIFIED => Self::Classified,
            Self::WORK_STARTED => Self::WorkStarted,
            Self::WORK_FINISHED => Self::WorkFinished,
            Self::REPLIED => Self::Replied,
            _ => Self::Unknown(name),
        }
    }
}

impl From<&str> for EventKind {
    fn from(name: &str) -> Self {
        Self::from(name.to_string())
    }
}

impl From<EventKind> for String {
    fn from(kind: EventKind) -> Self {
        match kind {
            EventKind::Unknown(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification result carried by a `CLASSIFIED` event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub bucket: Bucket,
    pub confidence: Confidence,
    /// Ordered reasons, most significant first.
    pub reasoning: Vec<String>,
}

/// Sub-action reference carried by `WORK_STARTED` / `WORK_FINISHED`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkRef {
    pub action_id: ActionId,
    pub actor_role: String,
}

/// Reply acknowledgement carried by `REPLIED`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyRef {
    pub subject: String,
}

/// Kind-specific payload of an event record.
///
/// Serialized untagged: the record's `kind` says which shape to expect, and
/// [`EventKind::expected_shape`] is checked on append and on validation.
/// Anything that matches no known shape is kept verbatim as `Opaque`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventPayload {
    Classification(Classification),
    Work(WorkRef),
    Reply(ReplyRef),
    Opaque(Value),
}

impl EventPayload {
    pub fn shape(&self) -> PayloadShape {
        match self {
            Self::Classification(_) => PayloadShape::Classification,
            Self::Work(_) => PayloadShape::Work,
            Self::Reply(_) => PayloadShape::Reply,
            Self::Opaque(_) => PayloadShape::Opaque,
        }
    }

    /// Whether this payload may accompany `kind`. Unknown kinds accept any
    /// payload, since their shape is defined by whoever wrote them.
    pub fn fits(&self, kind: &EventKind) -> bool {
        match kind {
            EventKind::Unknown(_) => true,
            known => known.expected_shape() == self.shape(),
        }
    }

    pub fn as_classification(&self) -> Option<&Classification> {
        match self {
            Self::Classification(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_work(&self) -> Option<&WorkRef> {
        match self {
            Self::Work(w) => Some(w),
            _ => None,
        }
    }

    pub fn as_reply(&self) -> Option<&ReplyRef> {
        match self {
            Self::Reply(r) => Some(r),
            _ => None,
        }
    }
}

/// Structural shape of an [`EventPayload`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PayloadShape {
    Classification,
    Work,
    Reply,
    Opaque,
}

impl fmt::Display for PayloadShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Classification => write!(f, "classification"),
            Self::Work => write!(f, "work"),
            Self::Reply => write!(f, "reply"),
            Self::Opaque => write!(f, "opaque"),
        }
    }
}

/// One immutable fact about an entity's lifecycle.
///
/// `id` and `sequence` are assigned by the ledger. `sequence` is the only
/// ordering key; `occurred_at` is wall-clock metadata and never consulted
/// for ordering or by the interpreter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: EventId,
    pub sequence: u64,
    pub entity_id: EntityId,
    pub entity_type: EntityType,
    pub kind: EventKind,
    pub payload: EventPayload,
    pub occurred_at: DateTime<Utc>,
}

impl EventRecord {
    /// Short reference used in logs and audit output.
    pub fn short_ref(&self) -> String {
        format!("{}#{} ({})", self.entity_id, self.sequence, self.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_wire_names_round_trip() {
        for kind in [
            EventKind::Classified,
            EventKind::WorkStarted,
            EventKind::WorkFinished,
            EventKind::Replied,
        ] {
            let wire: String = kind.clone().into();
            assert_eq!(EventKind::from(wire), kind);
        }
    }

    #[test]
    fn unrecognized_kind_keeps_its_name() {
        let kind: EventKind = serde_json::from_str("\"WORK_STOPPED\"").unwrap();
        assert_eq!(kind, EventKind::Unknown("WORK_STOPPED".into()));
        assert!(!kind.is_known());
        assert_eq!(serde_json::to_string(&kind).unwrap(), "\"WORK_STOPPED\"");
    }

    #[test]
    fn payload_shapes_deserialize_untagged() {
        let classification: EventPayload = serde_json::from_str(
            r#"{"bucket":"urgent","confidence":0.9,"reasoning":["deadline tomorrow"]}"#,
        )
        .unwrap();
        assert_eq!(classification.shape(), PayloadShape::Classification);

        let work: EventPayload =
            serde_json::from_str(r#"{"action_id":"m1-action-0","actor_role":"assistant"}"#)
                .unwrap();
        assert_eq!(work.shape(), PayloadShape::Work);

        let reply: EventPayload = serde_json::from_str(r#"{"subject":"RE: Invoice"}"#).unwrap();
        assert_eq!(reply.shape(), PayloadShape::Reply);

        let opaque: EventPayload = serde_json::from_str(r#"{"reason":"undo"}"#).unwrap();
        assert_eq!(opaque.shape(), PayloadShape::Opaque);
    }

    #[test]
    fn out_of_range_confidence_does_not_parse_as_classification() {
        let payload: EventPayload = serde_json::from_str(
            r#"{"bucket":"urgent","confidence":1.7,"reasoning":[]}"#,
        )
        .unwrap();
        assert_eq!(payload.shape(), PayloadShape::Opaque);
        assert!(!payload.fits(&EventKind::Classified));
    }

    #[test]
    fn unknown_kinds_accept_any_payload() {
        let payload = EventPayload::Reply(ReplyRef {
            subject: "x".into(),
        });
        assert!(payload.fits(&EventKind::Unknown("ARCHIVED".into())));
        assert!(payload.fits(&EventKind::Replied));
        assert!(!payload.fits(&EventKind::WorkFinished));
    }
}
