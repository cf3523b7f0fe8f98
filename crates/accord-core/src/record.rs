//! Membership record model
//!
//! A [`MembershipRecord`] is one immutable version of a membership. Every
//! later version is produced by exactly one transition that consumes the
//! previous version; records are never physically deleted, a revoked record
//! simply stays `Revoked`.

use crate::identifiers::{PartyId, RecordId};
use crate::time::PhysicalTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Lifecycle status of a membership record version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MembershipStatus {
    /// Requested jointly, awaiting activation by the authority
    Pending,
    /// Current member of the network
    Active,
    /// Membership withdrawn by the authority
    Revoked,
}

impl fmt::Display for MembershipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::Active => "ACTIVE",
            Self::Revoked => "REVOKED",
        };
        f.write_str(s)
    }
}

/// Free-form membership attributes.
///
/// `role` and `alternative_name` are the well-known keys; anything else goes
/// into `attributes`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MembershipMetadata {
    /// Role of the member within the network
    pub role: Option<String>,
    /// Human-readable display name
    pub alternative_name: Option<String>,
    /// Extension attributes
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl MembershipMetadata {
    /// Metadata carrying only a role.
    pub fn with_role(role: impl Into<String>) -> Self {
        Self {
            role: Some(role.into()),
            ..Self::default()
        }
    }

    /// Builder-style display name.
    pub fn alternative_name(mut self, name: impl Into<String>) -> Self {
        self.alternative_name = Some(name.into());
        self
    }

    /// Builder-style extension attribute.
    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// Reference to one specific version of a record.
///
/// This is the unit the uniqueness oracle serialises on: at most one
/// transition may ever consume a given `VersionRef`. A `Request` consumes the
/// genesis reference (`modified == None`), so a record ID can only be created
/// once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VersionRef {
    /// Record being versioned
    pub record_id: RecordId,
    /// `modified` stamp of the consumed version, `None` for genesis
    pub modified: Option<PhysicalTime>,
}

impl VersionRef {
    /// The genesis reference for a record ID.
    pub fn genesis(record_id: RecordId) -> Self {
        Self {
            record_id,
            modified: None,
        }
    }
}

impl fmt::Display for VersionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.modified {
            Some(modified) => write!(f, "{}@{}", self.record_id, modified),
            None => write!(f, "{}@genesis", self.record_id),
        }
    }
}

/// One version of a membership record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MembershipRecord {
    /// Stable identifier across all versions
    pub record_id: RecordId,
    /// The member this record admits
    pub member: PartyId,
    /// The network authority managing this record
    pub authority: PartyId,
    /// Free-form attributes
    pub metadata: MembershipMetadata,
    /// Timestamp of the first version, immutable afterwards
    pub issued: PhysicalTime,
    /// Timestamp of this version
    pub modified: PhysicalTime,
    /// Lifecycle status
    pub status: MembershipStatus,
}

impl MembershipRecord {
    /// First version of a new membership, in `Pending` status.
    pub fn pending(
        member: PartyId,
        authority: PartyId,
        metadata: MembershipMetadata,
        now: PhysicalTime,
    ) -> Self {
        Self {
            record_id: RecordId::new(),
            member,
            authority,
            metadata,
            issued: now,
            modified: now,
            status: MembershipStatus::Pending,
        }
    }

    /// The record's participants: exactly the member and the authority.
    pub fn participants(&self) -> BTreeSet<PartyId> {
        [self.member, self.authority].into_iter().collect()
    }

    /// Whether `party` is one of this record's participants.
    pub fn involves(&self, party: &PartyId) -> bool {
        self.member == *party || self.authority == *party
    }

    /// Reference to this version.
    pub fn version_ref(&self) -> VersionRef {
        VersionRef {
            record_id: self.record_id,
            modified: Some(self.modified),
        }
    }

    /// Whether this version is `Active`.
    pub fn is_active(&self) -> bool {
        self.status == MembershipStatus::Active
    }

    /// Whether `other` is a strictly newer version of the same record.
    pub fn is_superseded_by(&self, other: &MembershipRecord) -> bool {
        self.record_id == other.record_id && other.modified > self.modified
    }

    /// Successor with a new status, metadata untouched.
    pub fn with_status(&self, status: MembershipStatus, modified: PhysicalTime) -> Self {
        Self {
            status,
            modified,
            ..self.clone()
        }
    }

    /// Successor with new metadata, status untouched.
    pub fn with_metadata(&self, metadata: MembershipMetadata, modified: PhysicalTime) -> Self {
        Self {
            metadata,
            modified,
            ..self.clone()
        }
    }

    /// Modification stamp for a successor of this version.
    ///
    /// Uses `now` unless that would not advance past this version's stamp.
    pub fn next_modified(&self, now: PhysicalTime) -> PhysicalTime {
        now.max(self.modified.successor())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> MembershipRecord {
        MembershipRecord::pending(
            PartyId::new_from_entropy([1u8; 32]),
            PartyId::new_from_entropy([2u8; 32]),
            MembershipMetadata::with_role("operator"),
            PhysicalTime::from_millis(1_000),
        )
    }

    #[test]
    fn participants_are_member_and_authority() {
        let r = record();
        let participants = r.participants();
        assert_eq!(participants.len(), 2);
        assert!(r.involves(&r.member));
        assert!(r.involves(&r.authority));
        assert!(!r.involves(&PartyId::new_from_entropy([3u8; 32])));
    }

    #[test]
    fn next_modified_always_advances() {
        let r = record();
        assert_eq!(
            r.next_modified(PhysicalTime::from_millis(500)),
            PhysicalTime::from_millis(1_001)
        );
        assert_eq!(
            r.next_modified(PhysicalTime::from_millis(5_000)),
            PhysicalTime::from_millis(5_000)
        );
    }

    proptest::proptest! {
        #[test]
        fn next_modified_is_after_predecessor_and_not_before_now(
            modified in 0u64..u64::MAX / 2,
            now in 0u64..u64::MAX / 2,
        ) {
            let mut r = record();
            r.issued = PhysicalTime::from_millis(0);
            r.modified = PhysicalTime::from_millis(modified);
            let next = r.next_modified(PhysicalTime::from_millis(now));
            proptest::prop_assert!(next > r.modified);
            proptest::prop_assert!(next >= PhysicalTime::from_millis(now));
        }
    }

    #[test]
    fn status_serializes_in_wire_form() {
        let json = serde_json::to_string(&MembershipStatus::Revoked).unwrap();
        assert_eq!(json, "\"REVOKED\"");
    }
}
