//! Effect interfaces
//!
//! Everything the membership core needs from the outside world is expressed
//! as an async trait here: clock, backing store, uniqueness oracle,
//! notification delivery, transaction log, co-signing and peer transport.
//! Handlers live in `accord-effects` (production) and `accord-testkit` (fakes).

pub mod cosign;
pub mod ledger;
pub mod notify;
pub mod oracle;
pub mod store;
pub mod time;
pub mod transport;

pub use cosign::CosignEffects;
pub use ledger::TransactionLogEffects;
pub use notify::NotificationEffects;
pub use oracle::{OracleVerdict, UniquenessOracle};
pub use store::MembershipStoreEffects;
pub use time::PhysicalTimeEffects;
pub use transport::PeerTransportEffects;
