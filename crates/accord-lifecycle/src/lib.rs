//! # Accord Lifecycle - Layer 4: Membership State Machine
//!
//! Drives membership records through `PENDING -> ACTIVE <-> REVOKED` with
//! joint requests and amendments:
//! - [`validation`]: pure rules every transition must satisfy
//! - [`AuthorityOrchestrator`]: authority-only `Activate` / `Revoke`, with
//!   oracle-ordered finality and fire-and-forget notification; also the
//!   authority's co-signer for member flows
//! - [`MemberFlows`]: member-initiated `Request` / `Amend`
//! - [`authority`]: `verify_authority` / `find_record` capability helpers
//!
//! The uniqueness oracle is the only serialization point. Validation and
//! orchestration for different records run concurrently without coordination.

pub mod authority;
mod commit;
mod dispatch;
pub mod effects;
pub mod member;
pub mod orchestrator;
pub mod validation;

pub use authority::{find_record, verify_authority};
pub use effects::{LifecycleEffects, UnsettledWrites};
pub use member::MemberFlows;
pub use orchestrator::AuthorityOrchestrator;
pub use validation::{validate, validate_tagged, validate_transition};
