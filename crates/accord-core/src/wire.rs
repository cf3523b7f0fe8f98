//! Wire messages exchanged between nodes.

use crate::identifiers::PartyId;
use crate::record::MembershipRecord;
use crate::transition::{FinalizedTransaction, TransitionKind};
use serde::{Deserialize, Serialize};

/// Schema version carried by every reconciliation request
pub const WIRE_SCHEMA_VERSION: u16 = 1;

/// Best-effort broadcast announcing a finalized transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipNotification {
    /// Kind of the finalized transition
    pub transition_kind: TransitionKind,
    /// The version it produced
    pub record: MembershipRecord,
}

impl MembershipNotification {
    /// Notification for a version produced by a `transition_kind` transition.
    pub fn new(transition_kind: TransitionKind, record: MembershipRecord) -> Self {
        Self {
            transition_kind,
            record,
        }
    }
}

/// Ask a peer for the finalized transactions shared with `counterpart`.
///
/// When the responder is the counterpart itself this is the plain pairwise
/// request. A responder that is some other participant acts as a fallback
/// source and only returns transactions it also participates in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileRequest {
    /// Sender's [`WIRE_SCHEMA_VERSION`]
    pub schema_version: u16,
    /// Node recovering its history
    pub initiator: PartyId,
    /// Peer whose shared history is being recovered
    pub counterpart: PartyId,
}

impl ReconcileRequest {
    /// Request at the current schema version.
    pub fn new(initiator: PartyId, counterpart: PartyId) -> Self {
        Self {
            schema_version: WIRE_SCHEMA_VERSION,
            initiator,
            counterpart,
        }
    }
}

/// Peer reply to a [`ReconcileRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReconcileResponse {
    /// Filtered shared history
    Transactions(Vec<FinalizedTransaction>),
    /// The responder declined (unsupported schema, malformed request)
    Refused {
        /// Why the request was declined
        reason: String,
    },
}
