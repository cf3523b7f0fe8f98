//! # Accord Testkit - Layer 5: Test Infrastructure
//!
//! Shared fakes and fixtures for every Accord crate:
//! - [`fixtures`]: deterministic identities, record builders and transitions
//! - [`ManualClock`]: controllable `PhysicalTimeEffects`
//! - [`InMemoryOracle`]: uniqueness oracle enforcing one accepted successor
//!   per consumed version
//! - [`RecordingNotifier`] / [`RoutingNotifier`]: notification sinks
//! - [`strategies`]: proptest strategies for valid lifecycles
//! - [`init_test_tracing`]: idempotent subscriber setup
//!
//! Cross-crate end-to-end tests live in this crate's `tests/` directory.

#![allow(missing_docs)]

pub mod fixtures;
pub mod logging;
pub mod notify;
pub mod oracle;
pub mod strategies;
pub mod time;

pub use logging::init_test_tracing;
pub use notify::{RecordingNotifier, RoutingNotifier};
pub use oracle::InMemoryOracle;
pub use time::ManualClock;
