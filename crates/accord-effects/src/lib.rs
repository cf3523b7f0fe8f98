//! # Accord Effects - Layer 2: Handler Implementations
//!
//! Stateless or process-local handlers for the effect traits declared in
//! `accord-core`:
//! - [`SystemClock`]: wall-clock time
//! - [`MemoryMembershipStore`]: process-local backing store
//! - [`MemoryTransactionLog`]: process-local finalized-transaction history

#![allow(missing_docs)]

pub mod ledger;
pub mod store;
pub mod time;

pub use ledger::MemoryTransactionLog;
pub use store::MemoryMembershipStore;
pub use time::SystemClock;
