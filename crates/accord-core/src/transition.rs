//! Transition envelope
//!
//! A [`Transition`] is the unit validated by the lifecycle rules and totally
//! ordered by the uniqueness oracle: the consumed predecessor (if any), the
//! produced successor, the declared kind and the identities that signed it.

use crate::errors::{MembershipError, Result};
use crate::identifiers::{PartyId, TransactionId};
use crate::record::{MembershipRecord, VersionRef};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Declared kind of a membership transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TransitionKind {
    /// Joint creation of a pending record
    Request,
    /// Authority activates a pending or revoked record
    Activate,
    /// Authority revokes a record
    Revoke,
    /// Joint metadata change on an active record
    Amend,
}

impl TransitionKind {
    /// Wire tag for this kind
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Request => "Request",
            Self::Activate => "Activate",
            Self::Revoke => "Revoke",
            Self::Amend => "Amend",
        }
    }

    /// Whether only the authority may drive this kind.
    pub fn is_authority_only(&self) -> bool {
        matches!(self, Self::Activate | Self::Revoke)
    }
}

impl fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for TransitionKind {
    type Err = MembershipError;

    fn from_str(tag: &str) -> Result<Self> {
        match tag {
            "Request" => Ok(Self::Request),
            "Activate" => Ok(Self::Activate),
            "Revoke" => Ok(Self::Revoke),
            "Amend" => Ok(Self::Amend),
            other => Err(MembershipError::UnsupportedTransition(other.to_string())),
        }
    }
}

impl TryFrom<String> for TransitionKind {
    type Error = MembershipError;

    fn try_from(tag: String) -> Result<Self> {
        tag.parse()
    }
}

impl From<TransitionKind> for String {
    fn from(kind: TransitionKind) -> Self {
        kind.tag().to_string()
    }
}

/// A proposed or finalized state transition on one membership record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Transition {
    /// Declared kind
    pub kind: TransitionKind,
    /// Consumed version, absent for `Request`
    pub predecessor: Option<MembershipRecord>,
    /// Produced version
    pub successor: MembershipRecord,
    /// Identities that signed the transition
    pub signers: BTreeSet<PartyId>,
}

impl Transition {
    /// Assemble a transition.
    pub fn new(
        kind: TransitionKind,
        predecessor: Option<MembershipRecord>,
        successor: MembershipRecord,
        signers: impl IntoIterator<Item = PartyId>,
    ) -> Self {
        Self {
            kind,
            predecessor,
            successor,
            signers: signers.into_iter().collect(),
        }
    }

    /// Content-derived identity of this transition.
    pub fn id(&self) -> Result<TransactionId> {
        let bytes = serde_json::to_vec(self)?;
        Ok(TransactionId::digest(&bytes))
    }

    /// The record version this transition consumes.
    pub fn consumed_ref(&self) -> VersionRef {
        match &self.predecessor {
            Some(predecessor) => predecessor.version_ref(),
            None => VersionRef::genesis(self.successor.record_id),
        }
    }

    /// Participants of the transaction: the successor's member and authority.
    pub fn participants(&self) -> BTreeSet<PartyId> {
        self.successor.participants()
    }

    /// Add a signature from `signer`.
    pub fn sign(mut self, signer: PartyId) -> Self {
        self.signers.insert(signer);
        self
    }
}

/// A transition accepted by the uniqueness oracle, as stored in a ledger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FinalizedTransaction {
    /// Content-derived identity
    pub id: TransactionId,
    /// The finalized transition
    pub transition: Transition,
    /// Every identity participating in the transaction
    pub participants: BTreeSet<PartyId>,
}

impl FinalizedTransaction {
    /// Wrap an accepted transition, deriving its identity and participants.
    pub fn new(transition: Transition) -> Result<Self> {
        let id = transition.id()?;
        let participants = transition.participants();
        Ok(Self {
            id,
            transition,
            participants,
        })
    }

    /// Whether every identity in `parties` participates.
    pub fn involves_all<'a>(&self, parties: impl IntoIterator<Item = &'a PartyId>) -> bool {
        parties
            .into_iter()
            .all(|party| self.participants.contains(party))
    }

    /// Whether the stored identity and participants match the content.
    pub fn is_consistent(&self) -> bool {
        match self.transition.id() {
            Ok(id) => id == self.id && self.participants == self.transition.participants(),
            Err(_) => false,
        }
    }
}
