//! Event-sourced activity ledger for email triage.
//!
//! This crate records what happened to each email and derives its current
//! status from that record. It provides:
//! - `EventRecord` and the closed `EventKind` set with typed payloads
//! - `LedgerWriter` / `LedgerReader` trait boundaries
//! - `InMemoryLedger` with per-entity, gap-free sequencing
//! - Typed emitters for the four lifecycle events
//! - `derive_status`, a pure fold from history to status
//! - Replay, audit trails, and stream validation

pub mod config;
pub mod emit;
pub mod error;
pub mod interpreter;
pub mod memory;
pub mod projection;
pub mod records;
pub mod replay;
pub mod traits;
pub mod validation;

pub use config::LedgerConfig;
pub use emit::Emitter;
pub use error::{LedgerError, ValidationError};
pub use interpreter::{apply, derive_status, Effect, Status};
pub use memory::InMemoryLedger;
pub use projection::{AuditEntry, AuditProjection, AuditTrail};
pub use records::{
    Classification, EventKind, EventPayload, EventRecord, PayloadShape, ReplyRef, WorkRef,
};
pub use replay::{ReplayEngine, ReplayResult};
pub use traits::{LedgerReader, LedgerWriter};
pub use validation::{group_streams, StreamValidator, ValidationReport, Violation, ViolationKind};
