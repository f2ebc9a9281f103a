//! Session facade for the triage activity ledger.
//!
//! A [`Session`] owns its own ledger and implements the calls the
//! presentation layer makes: classify on first selection, record sub-action
//! progress and replies, and read back derived status. This is the main
//! entry point for applications embedding the ledger.

pub mod config;
pub mod error;
pub mod session;

pub use config::SessionConfig;
pub use error::{SdkError, SdkResult};
pub use session::{ActionEvents, Session};

// Re-export key types
pub use triage_ledger::{AuditTrail, EventKind, EventRecord, ReplayResult, Status};
pub use triage_types::{ActionId, Bucket, EntityId, EntityType, SessionId};
