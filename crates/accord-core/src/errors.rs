//! Error taxonomy for membership operations
//!
//! [`ValidationError`] names the exact invariant or signer-set rule a proposed
//! transition broke. [`MembershipError`] is what orchestration, cache refresh
//! and reconciliation surface to callers.

use crate::identifiers::{PartyId, RecordId, TransactionId};
use crate::record::{MembershipRecord, MembershipStatus, VersionRef};
use crate::time::PhysicalTime;
use crate::transition::TransitionKind;
use std::collections::BTreeSet;
use thiserror::Error;

/// Stable, machine-readable error codes for diagnostics.
pub trait ErrorCode {
    /// Short snake_case code
    fn code(&self) -> &'static str;
}

/// A proposed transition violated an invariant or signer-set rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A `Request` named a predecessor
    #[error("{kind} transition must not consume a predecessor")]
    UnexpectedPredecessor {
        /// Offending kind
        kind: TransitionKind,
    },

    /// A kind that consumes a version named none
    #[error("{kind} transition requires a predecessor")]
    MissingPredecessor {
        /// Offending kind
        kind: TransitionKind,
    },

    /// Successor status is not the one the kind produces
    #[error("{kind} transition must produce {expected}, got {actual}")]
    SuccessorStatus {
        /// Offending kind
        kind: TransitionKind,
        /// Status the kind produces
        expected: MembershipStatus,
        /// Status found on the successor
        actual: MembershipStatus,
    },

    /// Predecessor already has the status the kind would produce
    #[error("{kind} transition cannot consume a predecessor that is already {status}")]
    PredecessorAlreadyInStatus {
        /// Offending kind
        kind: TransitionKind,
        /// Status of the predecessor
        status: MembershipStatus,
    },

    /// Predecessor status is not one the kind may consume
    #[error("{kind} transition requires an {expected} predecessor, got {actual}")]
    PredecessorStatus {
        /// Offending kind
        kind: TransitionKind,
        /// Status the kind consumes
        expected: MembershipStatus,
        /// Status found on the predecessor
        actual: MembershipStatus,
    },

    /// Signers differ from the set the kind requires
    #[error("{kind} transition signers {actual:?} do not match required {required:?}")]
    SignerSetMismatch {
        /// Offending kind
        kind: TransitionKind,
        /// Exact signer set the kind requires
        required: BTreeSet<PartyId>,
        /// Signers present on the transition
        actual: BTreeSet<PartyId>,
    },

    /// `modified` is earlier than `issued`
    #[error("modified {modified} precedes issued {issued}")]
    ModifiedBeforeIssued {
        /// Issue timestamp of the record
        issued: PhysicalTime,
        /// Offending modification timestamp
        modified: PhysicalTime,
    },

    /// Member and authority are the same identity
    #[error("member and authority must be distinct identities ({0})")]
    ParticipantsNotDistinct(PartyId),

    /// Member or authority differs between predecessor and successor
    #[error("participants changed between versions")]
    ParticipantsChanged,

    /// Successor carries a different record id
    #[error("record id changed from {predecessor} to {successor}")]
    RecordIdChanged {
        /// Id on the predecessor
        predecessor: RecordId,
        /// Id on the successor
        successor: RecordId,
    },

    /// Successor carries a different `issued` timestamp
    #[error("issued timestamp changed from {predecessor} to {successor}")]
    IssuedChanged {
        /// `issued` on the predecessor
        predecessor: PhysicalTime,
        /// `issued` on the successor
        successor: PhysicalTime,
    },

    /// Successor `modified` does not advance past the predecessor's
    #[error("successor modified {successor} is not after predecessor modified {predecessor}")]
    ModifiedNotIncreasing {
        /// `modified` on the predecessor
        predecessor: PhysicalTime,
        /// `modified` on the successor
        successor: PhysicalTime,
    },

    /// A status change also touched metadata
    #[error("{kind} transition must not change metadata")]
    MetadataChanged {
        /// Offending kind
        kind: TransitionKind,
    },

    /// An `Amend` left metadata as it was
    #[error("amendment does not change metadata")]
    MetadataUnchanged,
}

impl ErrorCode for ValidationError {
    fn code(&self) -> &'static str {
        match self {
            Self::UnexpectedPredecessor { .. } => "validation_unexpected_predecessor",
            Self::MissingPredecessor { .. } => "validation_missing_predecessor",
            Self::SuccessorStatus { .. } => "validation_successor_status",
            Self::PredecessorAlreadyInStatus { .. } => "validation_predecessor_already_in_status",
            Self::PredecessorStatus { .. } => "validation_predecessor_status",
            Self::SignerSetMismatch { .. } => "validation_signer_set_mismatch",
            Self::ModifiedBeforeIssued { .. } => "validation_modified_before_issued",
            Self::ParticipantsNotDistinct(_) => "validation_participants_not_distinct",
            Self::ParticipantsChanged => "validation_participants_changed",
            Self::RecordIdChanged { .. } => "validation_record_id_changed",
            Self::IssuedChanged { .. } => "validation_issued_changed",
            Self::ModifiedNotIncreasing { .. } => "validation_modified_not_increasing",
            Self::MetadataChanged { .. } => "validation_metadata_changed",
            Self::MetadataUnchanged => "validation_metadata_unchanged",
        }
    }
}

/// Errors surfaced by membership orchestration, caching and reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MembershipError {
    /// Proposed transition failed validation
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Caller is not the record's authority
    #[error("{caller} is not the authority of {record_id} (authority is {authority})")]
    NotAuthority {
        /// Identity that attempted the operation
        caller: PartyId,
        /// The record's actual authority
        authority: PartyId,
        /// Record the operation targeted
        record_id: RecordId,
    },

    /// No membership record exists for the identity
    #[error("no membership record found for {0}")]
    MembershipNotFound(PartyId),

    /// Unknown transition kind tag
    #[error("unsupported transition kind: {0}")]
    UnsupportedTransition(String),

    /// The consumed version was already consumed by another transition
    #[error("{consumed} was already consumed by {consumed_by}")]
    OracleRejection {
        /// Version the transition tried to consume
        consumed: VersionRef,
        /// Transaction that consumed it first
        consumed_by: TransactionId,
    },

    /// No oracle verdict within the configured bound
    #[error("uniqueness oracle gave no verdict for {consumed} within {timeout_ms}ms")]
    OracleTimeout {
        /// Version the transition tried to consume
        consumed: VersionRef,
        /// Bound that elapsed
        timeout_ms: u64,
    },

    /// The oracle accepted `record` but it could not be written locally
    ///
    /// The version is final. Callers must not resubmit the predecessor;
    /// `current_version` resolves to `record` until the write lands.
    #[error("finalized version of {} not persisted locally: {message}", .record.record_id)]
    Unpersisted {
        /// Finalized successor
        record: Box<MembershipRecord>,
        /// Last local write failure
        message: String,
    },

    /// Reconciliation counterpart could not be reached
    #[error("peer {peer} unreachable after {attempts} attempt(s): {reason}")]
    UnreachablePeer {
        /// Peer that did not answer
        peer: PartyId,
        /// Requests sent before giving up
        attempts: u32,
        /// Last failure observed
        reason: String,
    },

    /// Backing store failure
    #[error("store error: {message}")]
    Store {
        /// Failure description
        message: String,
    },

    /// Notification delivery failure
    #[error("notification to {recipient} failed: {message}")]
    Notification {
        /// Intended recipient
        recipient: PartyId,
        /// Failure description
        message: String,
    },

    /// Configuration could not be loaded or is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Failure description
        message: String,
    },

    /// Encoding failure
    #[error("serialization error: {message}")]
    Serialization {
        /// Failure description
        message: String,
    },
}

impl MembershipError {
    /// Create a store error
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create a notification delivery error
    pub fn notification(recipient: PartyId, message: impl Into<String>) -> Self {
        Self::Notification {
            recipient,
            message: message.into(),
        }
    }

    /// Create an unreachable-peer error
    pub fn unreachable(peer: PartyId, attempts: u32, reason: impl Into<String>) -> Self {
        Self::UnreachablePeer {
            peer,
            attempts,
            reason: reason.into(),
        }
    }

    /// Whether the caller should re-read current state and decide whether to retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::OracleRejection { .. } | Self::OracleTimeout { .. } | Self::UnreachablePeer { .. }
        )
    }
}

impl ErrorCode for MembershipError {
    fn code(&self) -> &'static str {
        match self {
            Self::Validation(inner) => inner.code(),
            Self::NotAuthority { .. } => "membership_not_authority",
            Self::MembershipNotFound(_) => "membership_not_found",
            Self::UnsupportedTransition(_) => "membership_unsupported_transition",
            Self::OracleRejection { .. } => "membership_oracle_rejection",
            Self::OracleTimeout { .. } => "membership_oracle_timeout",
            Self::Unpersisted { .. } => "membership_unpersisted",
            Self::UnreachablePeer { .. } => "membership_unreachable_peer",
            Self::Store { .. } => "membership_store",
            Self::Notification { .. } => "membership_notification",
            Self::Config { .. } => "membership_config",
            Self::Serialization { .. } => "membership_serialization",
        }
    }
}

impl From<serde_json::Error> for MembershipError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

/// Standard Result type for membership operations
pub type Result<T> = std::result::Result<T, MembershipError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::MembershipMetadata;
    use std::collections::HashSet;

    #[test]
    fn error_codes_are_unique() {
        let party = PartyId::new_from_entropy([1u8; 32]);
        let record_id = RecordId::new();
        let consumed = VersionRef::genesis(record_id);
        let errors = vec![
            MembershipError::Validation(ValidationError::MetadataUnchanged),
            MembershipError::NotAuthority {
                caller: party,
                authority: party,
                record_id,
            },
            MembershipError::MembershipNotFound(party),
            MembershipError::UnsupportedTransition("Merge".into()),
            MembershipError::OracleRejection {
                consumed,
                consumed_by: TransactionId::digest(b"x"),
            },
            MembershipError::OracleTimeout {
                consumed,
                timeout_ms: 1,
            },
            MembershipError::Unpersisted {
                record: Box::new(MembershipRecord::pending(
                    party,
                    PartyId::new_from_entropy([2u8; 32]),
                    MembershipMetadata::default(),
                    PhysicalTime::from_millis(1),
                )),
                message: "x".into(),
            },
            MembershipError::unreachable(party, 1, "down"),
            MembershipError::store("x"),
            MembershipError::notification(party, "x"),
            MembershipError::config("x"),
            MembershipError::serialization("x"),
        ];

        let codes: HashSet<_> = errors.iter().map(ErrorCode::code).collect();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn validation_error_names_the_rule() {
        let err = MembershipError::from(ValidationError::ModifiedNotIncreasing {
            predecessor: PhysicalTime::from_millis(5),
            successor: PhysicalTime::from_millis(5),
        });
        let msg = err.to_string();
        assert!(msg.contains("not after predecessor"));
        assert_eq!(err.code(), "validation_modified_not_increasing");
        assert!(!err.is_retryable());
    }
}
