//! Deterministic identities, records and transitions for tests.

use accord_core::{
    MembershipMetadata, MembershipRecord, MembershipStatus, PartyId, PhysicalTime, RecordId,
    Transition, TransitionKind,
};
use uuid::Uuid;

/// Deterministic party identity derived from a seed byte.
pub fn party(seed: u8) -> PartyId {
    PartyId::new_from_entropy([seed; 32])
}

/// Deterministic record identity derived from a seed.
pub fn record_id(seed: u128) -> RecordId {
    RecordId::from_uuid(Uuid::from_u128(seed))
}

/// Builder for membership record versions.
///
/// Defaults: `Pending`, `issued = modified = 1_000ms`, role `"member"`.
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    record: MembershipRecord,
}

impl RecordBuilder {
    pub fn new(member: PartyId, authority: PartyId) -> Self {
        let now = PhysicalTime::from_millis(1_000);
        let mut record = MembershipRecord::pending(
            member,
            authority,
            MembershipMetadata::with_role("member"),
            now,
        );
        record.record_id = RecordId::from_uuid(Uuid::from_u128(u128::from_be_bytes(
            pair_seed(&member, &authority),
        )));
        Self { record }
    }

    pub fn record_id(mut self, record_id: RecordId) -> Self {
        self.record.record_id = record_id;
        self
    }

    pub fn status(mut self, status: MembershipStatus) -> Self {
        self.record.status = status;
        self
    }

    pub fn active(self) -> Self {
        self.status(MembershipStatus::Active)
    }

    pub fn issued(mut self, ms: u64) -> Self {
        self.record.issued = PhysicalTime::from_millis(ms);
        if self.record.modified < self.record.issued {
            self.record.modified = self.record.issued;
        }
        self
    }

    pub fn modified(mut self, ms: u64) -> Self {
        self.record.modified = PhysicalTime::from_millis(ms);
        if self.record.issued > self.record.modified {
            self.record.issued = self.record.modified;
        }
        self
    }

    pub fn metadata(mut self, metadata: MembershipMetadata) -> Self {
        self.record.metadata = metadata;
        self
    }

    pub fn build(self) -> MembershipRecord {
        self.record
    }
}

fn pair_seed(member: &PartyId, authority: &PartyId) -> [u8; 16] {
    let mut seed = member.to_bytes();
    for (byte, other) in seed.iter_mut().zip(authority.to_bytes()) {
        *byte ^= other.rotate_left(3);
    }
    seed
}

/// A jointly signed `Request` for a fresh pending record.
pub fn request(record: &MembershipRecord) -> Transition {
    Transition::new(
        TransitionKind::Request,
        None,
        record.clone(),
        [record.member, record.authority],
    )
}

/// An authority-signed status transition from `predecessor` at `modified_ms`.
pub fn status_transition(
    kind: TransitionKind,
    predecessor: &MembershipRecord,
    status: MembershipStatus,
    modified_ms: u64,
) -> Transition {
    let successor = predecessor.with_status(status, PhysicalTime::from_millis(modified_ms));
    Transition::new(
        kind,
        Some(predecessor.clone()),
        successor,
        [predecessor.authority],
    )
}

/// Authority-signed activation of `predecessor`.
pub fn activate(predecessor: &MembershipRecord, modified_ms: u64) -> Transition {
    status_transition(
        TransitionKind::Activate,
        predecessor,
        MembershipStatus::Active,
        modified_ms,
    )
}

/// Authority-signed revocation of `predecessor`.
pub fn revoke(predecessor: &MembershipRecord, modified_ms: u64) -> Transition {
    status_transition(
        TransitionKind::Revoke,
        predecessor,
        MembershipStatus::Revoked,
        modified_ms,
    )
}

/// Jointly signed amendment of an active `predecessor`.
pub fn amend(
    predecessor: &MembershipRecord,
    metadata: MembershipMetadata,
    modified_ms: u64,
) -> Transition {
    let successor = predecessor.with_metadata(metadata, PhysicalTime::from_millis(modified_ms));
    Transition::new(
        TransitionKind::Amend,
        Some(predecessor.clone()),
        successor,
        [predecessor.member, predecessor.authority],
    )
}
