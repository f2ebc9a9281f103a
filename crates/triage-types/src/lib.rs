//! Foundation types for the triage activity ledger.
//!
//! This crate provides the identity and classification types shared by the
//! ledger, the session facade and the CLI. Every other triage crate depends
//! on `triage-types`.
//!
//! # Key Types
//!
//! - [`EntityId`]: Identifier of a tracked subject (an email or a sub-action)
//! - [`EntityType`]: Tag separating entity kinds that share one id-space
//! - [`ActionId`]: Deterministic sub-action identifier (`<emailId>-action-<index>`)
//! - [`EventId`]: Ledger-assigned record identifier
//! - [`SessionId`]: UUID v7 session identifier
//! - [`Bucket`]: Triage classification bucket
//! - [`Confidence`]: Classification confidence in `[0.0, 1.0]`

pub mod classification;
pub mod entity;
pub mod error;
pub mod session;

pub use classification::{Bucket, Confidence};
pub use entity::{ActionId, EntityId, EntityType, EventId};
pub use error::TypeError;
pub use session::SessionId;
