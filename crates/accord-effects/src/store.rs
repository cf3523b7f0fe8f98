//! Process-local membership store.

use accord_core::effects::MembershipStoreEffects;
use accord_core::{MembershipRecord, PartyId, RecordId, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// In-memory [`MembershipStoreEffects`] keeping the latest version per record.
///
/// Appending an older version than the one held is a no-op, so replaying
/// finalized versions in any order converges on the newest.
#[derive(Debug, Clone, Default)]
pub struct MemoryMembershipStore {
    records: Arc<RwLock<HashMap<RecordId, MembershipRecord>>>,
}

impl MemoryMembershipStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with existing versions.
    pub fn with_records(records: impl IntoIterator<Item = MembershipRecord>) -> Self {
        let store = Self::new();
        {
            let mut map = store.records.write();
            for record in records {
                upsert(&mut map, record);
            }
        }
        store
    }

    /// Number of records held.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

fn upsert(map: &mut HashMap<RecordId, MembershipRecord>, record: MembershipRecord) -> bool {
    match map.get(&record.record_id) {
        Some(existing) if existing.modified >= record.modified => false,
        _ => {
            map.insert(record.record_id, record);
            true
        }
    }
}

#[async_trait]
impl MembershipStoreEffects for MemoryMembershipStore {
    async fn current_record(&self, member: &PartyId) -> Result<Option<MembershipRecord>> {
        let records = self.records.read();
        // A member may hold several records over time; the most recently
        // modified one is current.
        Ok(records
            .values()
            .filter(|record| record.member == *member)
            .max_by_key(|record| record.modified)
            .cloned())
    }

    async fn record(&self, record_id: &RecordId) -> Result<Option<MembershipRecord>> {
        Ok(self.records.read().get(record_id).cloned())
    }

    async fn all_active_records(&self) -> Result<Vec<MembershipRecord>> {
        let records = self.records.read();
        let mut active: Vec<_> = records
            .values()
            .filter(|record| record.is_active())
            .cloned()
            .collect();
        active.sort_by_key(|record| record.member);
        Ok(active)
    }

    async fn append(&self, record: MembershipRecord) -> Result<()> {
        let record_id = record.record_id;
        let modified = record.modified;
        if !upsert(&mut self.records.write(), record) {
            tracing::debug!(record = %record_id, %modified, "Ignoring stale record version");
        }
        Ok(())
    }
}
