//! Pure transition validation
//!
//! Effect-free rules deciding whether a proposed transition may be accepted.
//! Every rejection names the specific rule that failed.
//!
//! ## Rules by kind
//! - `Request`: no predecessor, successor `PENDING`, signed by exactly
//!   `{member, authority}`
//! - `Activate`: predecessor not already `ACTIVE`, successor `ACTIVE`,
//!   signed by exactly `{authority}`, metadata unchanged
//! - `Revoke`: predecessor not already `REVOKED`, successor `REVOKED`,
//!   signed by exactly `{authority}`, metadata unchanged
//! - `Amend`: predecessor and successor `ACTIVE`, signed by exactly
//!   `{member, authority}`, metadata changed
//!
//! Record invariants checked on every successor: `modified >= issued` and
//! distinct participants. With a predecessor: same participants, same
//! `record_id`, same `issued`, strictly increasing `modified`.

use accord_core::{
    MembershipError, MembershipRecord, MembershipStatus, PartyId, Transition, TransitionKind,
    ValidationError,
};
use std::collections::BTreeSet;

/// Validate a transition envelope.
pub fn validate_transition(transition: &Transition) -> Result<(), ValidationError> {
    validate(
        transition.predecessor.as_ref(),
        &transition.successor,
        transition.kind,
        &transition.signers,
    )
}

/// Validate a transition whose kind arrives as a wire tag.
///
/// Unknown tags are rejected as unsupported before any rule runs.
pub fn validate_tagged(
    tag: &str,
    predecessor: Option<&MembershipRecord>,
    successor: &MembershipRecord,
    signers: &BTreeSet<PartyId>,
) -> Result<(), MembershipError> {
    let kind: TransitionKind = tag.parse()?;
    validate(predecessor, successor, kind, signers).map_err(MembershipError::from)
}

/// Validate a proposed successor against its optional predecessor.
pub fn validate(
    predecessor: Option<&MembershipRecord>,
    successor: &MembershipRecord,
    kind: TransitionKind,
    signers: &BTreeSet<PartyId>,
) -> Result<(), ValidationError> {
    check_record(successor)?;

    match kind {
        TransitionKind::Request => {
            if predecessor.is_some() {
                return Err(ValidationError::UnexpectedPredecessor { kind });
            }
            expect_successor_status(kind, successor, MembershipStatus::Pending)?;
            expect_signers(kind, signers, successor.participants())
        }
        TransitionKind::Activate | TransitionKind::Revoke => {
            let predecessor = require_predecessor(kind, predecessor)?;
            let target = if kind == TransitionKind::Activate {
                MembershipStatus::Active
            } else {
                MembershipStatus::Revoked
            };
            if predecessor.status == target {
                return Err(ValidationError::PredecessorAlreadyInStatus {
                    kind,
                    status: target,
                });
            }
            expect_successor_status(kind, successor, target)?;
            expect_signers(kind, signers, [successor.authority].into_iter().collect())?;
            if predecessor.metadata != successor.metadata {
                return Err(ValidationError::MetadataChanged { kind });
            }
            check_succession(predecessor, successor)
        }
        TransitionKind::Amend => {
            let predecessor = require_predecessor(kind, predecessor)?;
            if predecessor.status != MembershipStatus::Active {
                return Err(ValidationError::PredecessorStatus {
                    kind,
                    expected: MembershipStatus::Active,
                    actual: predecessor.status,
                });
            }
            expect_successor_status(kind, successor, MembershipStatus::Active)?;
            expect_signers(kind, signers, successor.participants())?;
            if predecessor.metadata == successor.metadata {
                return Err(ValidationError::MetadataUnchanged);
            }
            check_succession(predecessor, successor)
        }
    }
}

/// Invariants that hold for any single version.
pub fn check_record(record: &MembershipRecord) -> Result<(), ValidationError> {
    if record.modified < record.issued {
        return Err(ValidationError::ModifiedBeforeIssued {
            issued: record.issued,
            modified: record.modified,
        });
    }
    if record.member == record.authority {
        return Err(ValidationError::ParticipantsNotDistinct(record.member));
    }
    Ok(())
}

/// Invariants linking a version to its immediate predecessor.
pub fn check_succession(
    predecessor: &MembershipRecord,
    successor: &MembershipRecord,
) -> Result<(), ValidationError> {
    if predecessor.participants() != successor.participants()
        || predecessor.member != successor.member
    {
        return Err(ValidationError::ParticipantsChanged);
    }
    if predecessor.record_id != successor.record_id {
        return Err(ValidationError::RecordIdChanged {
            predecessor: predecessor.record_id,
            successor: successor.record_id,
        });
    }
    if predecessor.issued != successor.issued {
        return Err(ValidationError::IssuedChanged {
            predecessor: predecessor.issued,
            successor: successor.issued,
        });
    }
    if successor.modified <= predecessor.modified {
        return Err(ValidationError::ModifiedNotIncreasing {
            predecessor: predecessor.modified,
            successor: successor.modified,
        });
    }
    Ok(())
}

fn require_predecessor(
    kind: TransitionKind,
    predecessor: Option<&MembershipRecord>,
) -> Result<&MembershipRecord, ValidationError> {
    predecessor.ok_or(ValidationError::MissingPredecessor { kind })
}

fn expect_successor_status(
    kind: TransitionKind,
    successor: &MembershipRecord,
    expected: MembershipStatus,
) -> Result<(), ValidationError> {
    if successor.status != expected {
        return Err(ValidationError::SuccessorStatus {
            kind,
            expected,
            actual: successor.status,
        });
    }
    Ok(())
}

fn expect_signers(
    kind: TransitionKind,
    signers: &BTreeSet<PartyId>,
    required: BTreeSet<PartyId>,
) -> Result<(), ValidationError> {
    if *signers != required {
        return Err(ValidationError::SignerSetMismatch {
            kind,
            required,
            actual: signers.clone(),
        });
    }
    Ok(())
}
