//! Authoritative membership record store.

use crate::errors::Result;
use crate::identifiers::{PartyId, RecordId};
use crate::record::MembershipRecord;
use async_trait::async_trait;

/// Backing store holding the latest version of every membership record.
///
/// This is the authoritative source the membership cache is rebuilt from and
/// the fallback for authorization checks that cannot tolerate cache staleness.
#[async_trait]
pub trait MembershipStoreEffects: Send + Sync {
    /// Latest version of the record whose member is `member`.
    async fn current_record(&self, member: &PartyId) -> Result<Option<MembershipRecord>>;

    /// Latest version of a record by its ID.
    async fn record(&self, record_id: &RecordId) -> Result<Option<MembershipRecord>>;

    /// Every record whose latest version is `Active`.
    async fn all_active_records(&self) -> Result<Vec<MembershipRecord>>;

    /// Store a finalized version, superseding earlier versions of the same record.
    async fn append(&self, record: MembershipRecord) -> Result<()>;
}
