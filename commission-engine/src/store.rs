//! Referral store
//!
//! Rows are keyed by referral ID with a unique index on the referred user
//! (a user is referred at most once). Referrer-scoped reads return rows in
//! creation order, which is the order withdrawals distribute in.

use crate::types::Referral;
use card_ledger::UserId;
use dashmap::mapref::entry::Entry;
use dashmap::mapref::one::RefMut;
use dashmap::DashMap;
use uuid::Uuid;

/// Referral collection
pub struct ReferralStore {
    referrals: DashMap<Uuid, Referral>,
    by_referred: DashMap<UserId, Uuid>,
}

impl ReferralStore {
    /// Create empty store
    pub fn new() -> Self {
        Self {
            referrals: DashMap::new(),
            by_referred: DashMap::new(),
        }
    }

    /// Insert a row, claiming the referred user. Returns false (and stores
    /// nothing) when the user already has a referral.
    pub fn insert(&self, referral: Referral) -> bool {
        match self.by_referred.entry(referral.referred_user.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(referral.id);
                self.referrals.insert(referral.id, referral);
                true
            }
        }
    }

    /// Fetch by ID
    pub fn get(&self, id: Uuid) -> Option<Referral> {
        self.referrals.get(&id).map(|r| r.clone())
    }

    /// Exclusive handle on a row
    pub fn get_mut(&self, id: Uuid) -> Option<RefMut<'_, Uuid, Referral>> {
        self.referrals.get_mut(&id)
    }

    /// The row where `user` is the referred user
    pub fn find_by_referred(&self, user: &UserId) -> Option<Uuid> {
        self.by_referred.get(user).map(|id| *id)
    }

    /// All rows of `referrer`, oldest first. Ties on the creation timestamp
    /// break on the row ID so the order is total and stable.
    pub fn by_referrer(&self, referrer: &UserId) -> Vec<Referral> {
        let mut rows: Vec<Referral> = self
            .referrals
            .iter()
            .filter(|r| &r.referrer == referrer)
            .map(|r| r.clone())
            .collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        rows
    }

    /// Number of rows of `referrer`
    pub fn count_by_referrer(&self, referrer: &UserId) -> u32 {
        self.referrals
            .iter()
            .filter(|r| &r.referrer == referrer)
            .count() as u32
    }
}

impl Default for ReferralStore {
    fn default() -> Self {
        Self::new()
    }
}
