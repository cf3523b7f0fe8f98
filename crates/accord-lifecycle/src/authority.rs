//! Authority capability helpers
//!
//! The two checks authority-privileged flows share, as free functions over
//! explicit dependencies.

use accord_cache::MembershipCache;
use accord_core::effects::MembershipStoreEffects;
use accord_core::{MembershipError, MembershipRecord, PartyId, Result};

/// Fail with `NotAuthority` unless `caller` is the record's authority.
pub fn verify_authority(caller: &PartyId, record: &MembershipRecord) -> Result<()> {
    if record.authority != *caller {
        return Err(MembershipError::NotAuthority {
            caller: *caller,
            authority: record.authority,
            record_id: record.record_id,
        });
    }
    Ok(())
}

/// Current record version for `member`.
///
/// The cache only holds active members, so a miss falls through to the
/// backing store. A cached version that has since been superseded surfaces
/// later as an oracle rejection.
pub async fn find_record(
    member: &PartyId,
    cache: Option<&MembershipCache>,
    store: &dyn MembershipStoreEffects,
) -> Result<MembershipRecord> {
    if let Some(record) = cache.and_then(|cache| cache.lookup(member)) {
        return Ok(record);
    }
    store
        .current_record(member)
        .await?
        .ok_or(MembershipError::MembershipNotFound(*member))
}
