//! # Accord Reconcile - Layer 4: Shared-History Recovery
//!
//! Lets a node recover the finalized transactions it shares with each
//! counterpart after local data loss:
//! - [`ReconcileResponder`]: serves the participant-intersection slice of a
//!   local ledger
//! - [`Reconciler`]: requests, verifies and idempotently merges that slice,
//!   with retry and fallback-participant policy
//! - [`LoopbackTransport`]: in-process peer mesh for simulation
//!
//! A transaction every participant has lost is unrecoverable; nothing here
//! tries to reconstruct it.

#![allow(missing_docs)]

pub mod loopback;
pub mod reconciler;
pub mod responder;

pub use loopback::LoopbackTransport;
pub use reconciler::{ReconcileReport, ReconcileSummary, Reconciler};
pub use responder::{shared_history, ReconcileResponder};
