//! Membership cache
//!
//! Process-local view of which members are currently active. The cache is an
//! eligibility view, not an audit log: a revoked member is removed rather
//! than flagged.
//!
//! # Consistency
//!
//! The cache is eventually consistent with the backing store. It is rebuilt
//! wholesale by [`MembershipCache::load`] and mutated incrementally by
//! notifications in between. Incremental updates are version-guarded: a
//! version older than the one already applied is ignored, which makes every
//! update idempotent and tolerant of reordering. Revocations leave a
//! per-member watermark so that a delayed activation for an already-revoked
//! version cannot resurrect the member before the next full load.
//!
//! A full load races with notifications applied while its listing was being
//! read. [`MembershipCache::mark`] numbers the incremental updates seen so
//! far; [`MembershipCache::load_since`] keeps every update made after that
//! mark on top of the listing, so a revocation applied mid-refresh stays
//! applied.

use accord_core::{MembershipRecord, PartyId, PhysicalTime};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Outcome of an incremental cache update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheUpdate {
    /// No entry existed for the member
    Inserted,
    /// An older entry was replaced
    Replaced,
    /// The entry already reflected this version or a newer one
    Unchanged,
    /// The update does not describe an active member
    Ignored,
}

/// Position in the sequence of incremental updates, taken before a listing
/// is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RefreshMark(u64);

#[derive(Debug, Clone, Copy)]
struct Watermark {
    modified: PhysicalTime,
    seq: u64,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<PartyId, MembershipRecord>,
    /// Highest revoked `modified` seen per member since the last load
    revoked: HashMap<PartyId, Watermark>,
    /// Sequence number of the last incremental upsert per member
    updated: HashMap<PartyId, u64>,
    seq: u64,
    expiry: Option<PhysicalTime>,
    loaded: bool,
}

impl CacheState {
    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    fn raise_watermark(&mut self, member: PartyId, modified: PhysicalTime) {
        let seq = self.next_seq();
        let watermark = self
            .revoked
            .entry(member)
            .or_insert(Watermark { modified, seq });
        watermark.seq = seq;
        if modified > watermark.modified {
            watermark.modified = modified;
        }
    }
}

/// Concurrency-safe map from member identity to its current active record.
///
/// Shared between handlers behind an `Arc`; every operation takes the lock
/// once and never awaits while holding it.
#[derive(Debug, Default)]
pub struct MembershipCache {
    state: RwLock<CacheState>,
}

impl MembershipCache {
    /// Create a cold cache. A cold cache reports `needs_refresh`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically replace the entire contents with an authoritative listing.
    ///
    /// Non-active records in the listing are skipped.
    pub fn load(&self, listing: Vec<MembershipRecord>, expiry: Option<PhysicalTime>) {
        let mark = self.mark();
        self.load_since(mark, listing, expiry);
    }

    /// Current position in the update sequence.
    pub fn mark(&self) -> RefreshMark {
        RefreshMark(self.state.read().seq)
    }

    /// Replace the contents with a listing read after `mark` was taken.
    ///
    /// Updates applied after `mark` win over the listing: newer cached
    /// versions are kept and listed versions at or below a later revocation
    /// are dropped. Older watermarks are cleared.
    pub fn load_since(
        &self,
        mark: RefreshMark,
        listing: Vec<MembershipRecord>,
        expiry: Option<PhysicalTime>,
    ) {
        let mut entries = HashMap::with_capacity(listing.len());
        for record in listing.into_iter().filter(MembershipRecord::is_active) {
            match entries.get(&record.member) {
                Some(existing) if newer_or_equal(existing, &record) => {}
                _ => {
                    entries.insert(record.member, record);
                }
            }
        }

        let mut guard = self.state.write();
        let state = &mut *guard;

        state.updated.retain(|_, seq| *seq > mark.0);
        for member in state.updated.keys() {
            if let Some(current) = state.entries.get(member) {
                match entries.get(member) {
                    Some(listed) if newer_or_equal(listed, current) => {}
                    _ => {
                        entries.insert(*member, current.clone());
                    }
                }
            }
        }

        state.revoked.retain(|_, watermark| watermark.seq > mark.0);
        let mut suppressed = 0usize;
        for (member, watermark) in &state.revoked {
            if entries
                .get(member)
                .is_some_and(|record| record.modified <= watermark.modified)
            {
                entries.remove(member);
                suppressed += 1;
            }
        }

        let count = entries.len();
        state.entries = entries;
        state.expiry = expiry;
        state.loaded = true;
        drop(guard);

        if suppressed > 0 {
            tracing::debug!(revocations = suppressed, "Kept revocations applied during refresh");
        }
        tracing::debug!(members = count, expiry = ?expiry, "Membership cache loaded");
    }

    /// Cached active record for `member`, or `None` if unknown.
    ///
    /// After [`invalidate`](Self::invalidate) every lookup is `None`; callers
    /// must treat that as "refresh required" rather than "not a member"
    /// (see [`needs_refresh`](Self::needs_refresh)).
    pub fn lookup(&self, member: &PartyId) -> Option<MembershipRecord> {
        self.state.read().entries.get(member).cloned()
    }

    /// Apply an activation notification.
    pub fn apply_activation(&self, record: &MembershipRecord) -> CacheUpdate {
        self.upsert_active(record)
    }

    /// Apply an amendment notification.
    pub fn apply_amendment(&self, record: &MembershipRecord) -> CacheUpdate {
        self.upsert_active(record)
    }

    /// Remove `member` unconditionally. Returns whether an entry was removed.
    pub fn apply_revocation(&self, member: &PartyId) -> bool {
        let mut state = self.state.write();
        match state.entries.remove(member) {
            Some(removed) => {
                state.raise_watermark(*member, removed.modified);
                true
            }
            None => false,
        }
    }

    /// Remove the member named by a revoked record version, unless the cache
    /// already holds a newer version for that member.
    pub fn apply_revocation_of(&self, revoked: &MembershipRecord) -> bool {
        let mut guard = self.state.write();
        let state = &mut *guard;
        state.raise_watermark(revoked.member, revoked.modified);

        match state.entries.get(&revoked.member) {
            Some(existing) if existing.modified > revoked.modified => {
                tracing::debug!(
                    member = %revoked.member,
                    "Ignoring revocation older than cached version"
                );
                false
            }
            Some(_) => state.entries.remove(&revoked.member).is_some(),
            None => false,
        }
    }

    /// Drop all cached state. The next reader must refresh before answering.
    pub fn invalidate(&self) {
        let mut state = self.state.write();
        state.entries.clear();
        state.revoked.clear();
        state.updated.clear();
        state.expiry = None;
        state.loaded = false;
        drop(state);

        tracing::debug!("Membership cache invalidated");
    }

    /// Whether the cache is cold, invalidated, or past its listing expiry.
    pub fn needs_refresh(&self, now: PhysicalTime) -> bool {
        let state = self.state.read();
        !state.loaded || state.expiry.is_some_and(|expiry| now >= expiry)
    }

    /// Whether a full listing has been loaded since the last invalidation.
    pub fn is_loaded(&self) -> bool {
        self.state.read().loaded
    }

    /// Expiry inherited from the last full load.
    pub fn expiry(&self) -> Option<PhysicalTime> {
        self.state.read().expiry
    }

    /// Identities of every cached active member, sorted.
    pub fn active_members(&self) -> Vec<PartyId> {
        let mut members: Vec<_> = self.state.read().entries.keys().copied().collect();
        members.sort();
        members
    }

    /// Copy of every cached record, sorted by member.
    pub fn snapshot(&self) -> Vec<MembershipRecord> {
        let mut records: Vec<_> = self.state.read().entries.values().cloned().collect();
        records.sort_by_key(|record| record.member);
        records
    }

    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().entries.is_empty()
    }

    fn upsert_active(&self, record: &MembershipRecord) -> CacheUpdate {
        if !record.is_active() {
            tracing::warn!(
                member = %record.member,
                status = %record.status,
                "Refusing to cache non-active record"
            );
            return CacheUpdate::Ignored;
        }

        let mut guard = self.state.write();
        let state = &mut *guard;

        if let Some(watermark) = state.revoked.get(&record.member) {
            if record.modified <= watermark.modified {
                return CacheUpdate::Unchanged;
            }
        }

        let update = match state.entries.get(&record.member) {
            Some(existing) if newer_or_equal(existing, record) => return CacheUpdate::Unchanged,
            Some(_) => CacheUpdate::Replaced,
            None => CacheUpdate::Inserted,
        };
        state.entries.insert(record.member, record.clone());
        let seq = state.next_seq();
        state.updated.insert(record.member, seq);
        update
    }
}

fn newer_or_equal(existing: &MembershipRecord, candidate: &MembershipRecord) -> bool {
    existing.modified >= candidate.modified
}

#[cfg(test)]
mod tests {
    use super::*;
    use accord_core::MembershipStatus;
    use accord_testkit::fixtures::{party, RecordBuilder};

    #[test]
    fn cold_cache_needs_refresh() {
        let cache = MembershipCache::new();
        assert!(cache.needs_refresh(PhysicalTime::EPOCH));
        assert!(!cache.is_loaded());

        cache.load(Vec::new(), None);
        assert!(!cache.needs_refresh(PhysicalTime::from_millis(u64::MAX)));
    }

    #[test]
    fn expiry_forces_refresh() {
        let cache = MembershipCache::new();
        cache.load(Vec::new(), Some(PhysicalTime::from_millis(1_000)));
        assert!(!cache.needs_refresh(PhysicalTime::from_millis(999)));
        assert!(cache.needs_refresh(PhysicalTime::from_millis(1_000)));
    }

    #[test]
    fn load_skips_non_active_records() {
        let active = RecordBuilder::new(party(1), party(0)).active().build();
        let pending = RecordBuilder::new(party(2), party(0)).build();
        let revoked = RecordBuilder::new(party(3), party(0))
            .status(MembershipStatus::Revoked)
            .build();

        let cache = MembershipCache::new();
        cache.load(vec![active.clone(), pending, revoked], None);

        assert_eq!(cache.snapshot(), vec![active]);
    }

    #[test]
    fn activation_is_idempotent() {
        let cache = MembershipCache::new();
        let record = RecordBuilder::new(party(1), party(0)).active().build();

        assert_eq!(cache.apply_activation(&record), CacheUpdate::Inserted);
        let once = cache.snapshot();
        assert_eq!(cache.apply_activation(&record), CacheUpdate::Unchanged);
        assert_eq!(cache.snapshot(), once);
    }

    #[test]
    fn stale_amendment_does_not_regress() {
        let cache = MembershipCache::new();
        let v1 = RecordBuilder::new(party(1), party(0))
            .active()
            .modified(100)
            .build();
        let v2 = v1.with_metadata(
            accord_core::MembershipMetadata::with_role("auditor"),
            PhysicalTime::from_millis(200),
        );

        cache.apply_activation(&v1);
        assert_eq!(cache.apply_amendment(&v2), CacheUpdate::Replaced);
        assert_eq!(cache.apply_amendment(&v1), CacheUpdate::Unchanged);
        assert_eq!(cache.lookup(&v1.member), Some(v2));
    }

    #[test]
    fn revocation_removes_entry() {
        let cache = MembershipCache::new();
        let record = RecordBuilder::new(party(1), party(0)).active().build();
        cache.apply_activation(&record);

        assert!(cache.apply_revocation(&record.member));
        assert_eq!(cache.lookup(&record.member), None);
        assert!(!cache.apply_revocation(&record.member));
    }

    #[test]
    fn delayed_activation_cannot_resurrect_revoked_member() {
        let cache = MembershipCache::new();
        let active = RecordBuilder::new(party(1), party(0))
            .active()
            .modified(100)
            .build();
        let revoked = active.with_status(MembershipStatus::Revoked, PhysicalTime::from_millis(200));

        // Revocation overtakes the activation it supersedes.
        assert!(!cache.apply_revocation_of(&revoked));
        assert_eq!(cache.apply_activation(&active), CacheUpdate::Unchanged);
        assert_eq!(cache.lookup(&active.member), None);

        // A later reactivation is honoured.
        let reactivated =
            revoked.with_status(MembershipStatus::Active, PhysicalTime::from_millis(300));
        assert_eq!(cache.apply_activation(&reactivated), CacheUpdate::Inserted);
    }

    #[test]
    fn revocation_older_than_cached_version_is_ignored() {
        let cache = MembershipCache::new();
        let v1 = RecordBuilder::new(party(1), party(0))
            .active()
            .modified(100)
            .build();
        let revoked = v1.with_status(MembershipStatus::Revoked, PhysicalTime::from_millis(200));
        let reactivated =
            revoked.with_status(MembershipStatus::Active, PhysicalTime::from_millis(300));

        cache.apply_activation(&reactivated);
        assert!(!cache.apply_revocation_of(&revoked));
        assert_eq!(cache.lookup(&v1.member), Some(reactivated));
    }

    #[test]
    fn invalidate_clears_and_requires_refresh() {
        let cache = MembershipCache::new();
        let record = RecordBuilder::new(party(1), party(0)).active().build();
        cache.load(vec![record.clone()], None);

        cache.invalidate();
        assert!(cache.is_empty());
        assert!(cache.needs_refresh(PhysicalTime::EPOCH));
        assert_eq!(cache.lookup(&record.member), None);
    }

    #[test]
    fn revocation_during_refresh_survives_the_load() {
        let cache = MembershipCache::new();
        let active = RecordBuilder::new(party(1), party(0))
            .active()
            .modified(100)
            .build();
        cache.load(vec![active.clone()], None);

        let mark = cache.mark();
        // Listing read before the revocation landed.
        let listing = vec![active.clone()];
        let revoked = active.with_status(MembershipStatus::Revoked, PhysicalTime::from_millis(200));
        cache.apply_revocation_of(&revoked);

        cache.load_since(mark, listing, None);
        assert_eq!(cache.lookup(&active.member), None);

        // The next refresh reads a listing that already reflects it.
        let reactivated =
            revoked.with_status(MembershipStatus::Active, PhysicalTime::from_millis(300));
        cache.load(vec![reactivated.clone()], None);
        assert_eq!(cache.lookup(&active.member), Some(reactivated));
    }

    #[test]
    fn activation_during_refresh_survives_the_load() {
        let cache = MembershipCache::new();
        let newcomer = RecordBuilder::new(party(2), party(0))
            .active()
            .modified(100)
            .build();

        let mark = cache.mark();
        assert_eq!(cache.apply_activation(&newcomer), CacheUpdate::Inserted);
        cache.load_since(mark, Vec::new(), None);
        assert_eq!(cache.lookup(&newcomer.member), Some(newcomer.clone()));

        // A plain load is authoritative for everything applied before it.
        cache.load(Vec::new(), None);
        assert_eq!(cache.lookup(&newcomer.member), None);
    }

    #[test]
    fn watermarks_from_before_the_mark_are_cleared() {
        let cache = MembershipCache::new();
        let active = RecordBuilder::new(party(1), party(0))
            .active()
            .modified(100)
            .build();
        let revoked = active.with_status(MembershipStatus::Revoked, PhysicalTime::from_millis(200));
        cache.apply_revocation_of(&revoked);

        let mark = cache.mark();
        cache.load_since(mark, vec![active.clone()], None);
        assert_eq!(cache.lookup(&active.member), Some(active));
    }

    #[test]
    fn non_active_update_is_ignored() {
        let cache = MembershipCache::new();
        let pending = RecordBuilder::new(party(1), party(0)).build();
        assert_eq!(cache.apply_activation(&pending), CacheUpdate::Ignored);
        assert!(cache.is_empty());
    }
}
