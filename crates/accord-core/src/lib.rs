#![deny(clippy::dbg_macro)]
#![deny(clippy::todo)]
//! # Accord Core - Layer 1: Membership Model and Interfaces
//!
//! Foundation crate for the Accord permissioned-network membership system:
//! - Identifier types (`PartyId`, `RecordId`, `TransactionId`)
//! - The versioned `MembershipRecord` and its lifecycle status
//! - The `Transition` envelope validated by the lifecycle rules and ordered
//!   by the uniqueness oracle
//! - Wire messages (notifications, reconciliation request/response)
//! - The error taxonomy and configuration
//! - Effect traits for every external collaborator
//!
//! ## What Does NOT Belong Here
//!
//! - Handler implementations (belong in accord-effects / accord-testkit)
//! - Validation rules and orchestration (belong in accord-lifecycle)
//! - Caching (belongs in accord-cache)

pub mod config;
pub mod effects;
pub mod errors;
pub mod identifiers;
pub mod record;
pub mod time;
pub mod transition;
pub mod wire;

pub use config::{AccordConfig, CacheConfig, OrchestratorConfig, ReconcileConfig};
pub use errors::{ErrorCode, MembershipError, Result, ValidationError};
pub use identifiers::{PartyId, RecordId, TransactionId};
pub use record::{MembershipMetadata, MembershipRecord, MembershipStatus, VersionRef};
pub use time::PhysicalTime;
pub use transition::{FinalizedTransaction, Transition, TransitionKind};
pub use wire::{MembershipNotification, ReconcileRequest, ReconcileResponse};
