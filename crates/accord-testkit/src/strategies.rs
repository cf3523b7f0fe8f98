//! Property test strategies for membership types
//!
//! Strategies generate deterministic identities and *valid* transition
//! chains: every generated chain starts with a jointly signed `Request` and
//! only contains steps the lifecycle rules accept from the current status.

use proptest::prelude::*;

// Re-export proptest for convenience
pub use proptest;

use crate::fixtures::{activate, amend, party, request, revoke, RecordBuilder};
use accord_core::{MembershipMetadata, MembershipStatus, PartyId, PhysicalTime, Transition};

/// One step of a generated lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainStep {
    Activate,
    Revoke,
    Amend(MembershipMetadata),
}

/// Strategy for a (member, authority) pair of distinct identities.
pub fn arb_party_pair() -> impl Strategy<Value = (PartyId, PartyId)> {
    (any::<u8>(), any::<u8>())
        .prop_filter("member and authority must differ", |(m, a)| m != a)
        .prop_map(|(m, a)| (party(m), party(a)))
}

/// Strategy for membership metadata drawn from a small vocabulary, so
/// amendments sometimes collide with the current value.
pub fn arb_metadata() -> impl Strategy<Value = MembershipMetadata> {
    (
        prop::sample::select(vec!["member", "operator", "auditor", "observer"]),
        prop::option::of("[a-z]{1,8}"),
    )
        .prop_map(|(role, name)| {
            let metadata = MembershipMetadata::with_role(role);
            match name {
                Some(name) => metadata.alternative_name(name),
                None => metadata,
            }
        })
}

/// Strategy for a single lifecycle step.
pub fn arb_chain_step() -> impl Strategy<Value = ChainStep> {
    prop_oneof![
        Just(ChainStep::Activate),
        Just(ChainStep::Revoke),
        arb_metadata().prop_map(ChainStep::Amend),
    ]
}

/// Strategy for a valid transition chain on one record.
///
/// Steps that would be rejected from the current status (activating an
/// active record, a no-op amendment, ...) are skipped, and each successor's
/// `modified` is stamped after a random clock gap, possibly zero.
pub fn arb_valid_chain(max_steps: usize) -> impl Strategy<Value = Vec<Transition>> {
    (
        arb_party_pair(),
        0u64..1_000_000,
        prop::collection::vec((arb_chain_step(), 0u64..5_000), 0..max_steps),
    )
        .prop_map(|((member, authority), issued, steps)| {
            build_chain(member, authority, issued, steps)
        })
}

/// Build a valid chain from explicit steps.
pub fn build_chain(
    member: PartyId,
    authority: PartyId,
    issued_ms: u64,
    steps: Vec<(ChainStep, u64)>,
) -> Vec<Transition> {
    let genesis = RecordBuilder::new(member, authority)
        .issued(issued_ms)
        .modified(issued_ms)
        .build();
    let mut chain = vec![request(&genesis)];
    let mut current = genesis;

    for (step, gap_ms) in steps {
        let now = PhysicalTime::from_millis(current.modified.ts_ms.saturating_add(gap_ms));
        let modified = current.next_modified(now).ts_ms;
        let next = match step {
            ChainStep::Activate if current.status != MembershipStatus::Active => {
                activate(&current, modified)
            }
            ChainStep::Revoke if current.status != MembershipStatus::Revoked => {
                revoke(&current, modified)
            }
            ChainStep::Amend(metadata) if current.is_active() && metadata != current.metadata => {
                amend(&current, metadata, modified)
            }
            _ => continue,
        };
        current = next.successor.clone();
        chain.push(next);
    }
    chain
}
