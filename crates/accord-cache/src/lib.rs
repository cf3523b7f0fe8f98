//! # Accord Cache - Layer 3: Membership Eligibility Cache
//!
//! Per-node, read-optimised view of the active membership set:
//! - [`MembershipCache`]: concurrency-safe member → record map with
//!   version-guarded incremental updates
//! - [`NotificationHandler`]: applies pushed membership notifications
//! - [`CacheRefresher`]: full reload from the authoritative store, on demand
//!   or periodically
//!
//! The cache is never authoritative for decisions that need immediate
//! revocation enforcement; use [`CacheRefresher::is_active_authoritative`]
//! for those.

#![allow(missing_docs)]

pub mod cache;
pub mod notifications;
pub mod refresh;

pub use cache::{CacheUpdate, MembershipCache, RefreshMark};
pub use notifications::NotificationHandler;
pub use refresh::{CacheRefresher, RefreshHandle};
