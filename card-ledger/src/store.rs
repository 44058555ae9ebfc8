//! In-memory authoritative store
//!
//! One store per entity family, each a concurrent map plus the secondary
//! indices the ledger needs for uniqueness checks and owner-scoped queries.
//! Entry guards (`get_mut`) give exclusive access to a single record, which is
//! the unit of mutation everywhere in this crate.

use crate::types::{Card, Transaction, TxKind, UserId, UserProfile};
use dashmap::mapref::entry::Entry;
use dashmap::mapref::one::RefMut;
use dashmap::DashMap;
use uuid::Uuid;

/// Card collection with the system-wide code-hash uniqueness index
pub struct CardStore {
    cards: DashMap<Uuid, Card>,
    code_index: DashMap<String, Uuid>,
}

impl CardStore {
    /// Create empty store
    pub fn new() -> Self {
        Self {
            cards: DashMap::new(),
            code_index: DashMap::new(),
        }
    }

    /// Insert a card, claiming its code hash. Returns false (and stores
    /// nothing) when the hash is already registered.
    pub fn insert(&self, card: Card) -> bool {
        match self.code_index.entry(card.code_hash.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(card.id);
                self.cards.insert(card.id, card);
                true
            }
        }
    }

    /// Fetch a card by ID
    pub fn get(&self, id: Uuid) -> Option<Card> {
        self.cards.get(&id).map(|c| c.clone())
    }

    /// Exclusive handle on a card entry
    pub fn get_mut(&self, id: Uuid) -> Option<RefMut<'_, Uuid, Card>> {
        self.cards.get_mut(&id)
    }

    /// Remove a card and release its code hash
    pub fn remove(&self, id: Uuid) -> Option<Card> {
        let (_, card) = self.cards.remove(&id)?;
        self.code_index.remove(&card.code_hash);
        Some(card)
    }

    /// All cards belonging to `owner`
    pub fn by_owner(&self, owner: &UserId) -> Vec<Card> {
        let mut cards: Vec<Card> = self
            .cards
            .iter()
            .filter(|c| &c.owner == owner)
            .map(|c| c.clone())
            .collect();
        cards.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        cards
    }

    /// Number of cards in the store
    pub fn len(&self) -> usize {
        self.cards.len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

impl Default for CardStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Append-only transaction log
pub struct TransactionStore {
    transactions: DashMap<Uuid, Transaction>,
}

impl TransactionStore {
    /// Create empty store
    pub fn new() -> Self {
        Self {
            transactions: DashMap::new(),
        }
    }

    /// Append a transaction record
    pub fn insert(&self, tx: Transaction) {
        self.transactions.insert(tx.id, tx);
    }

    /// Fetch by ID
    pub fn get(&self, id: Uuid) -> Option<Transaction> {
        self.transactions.get(&id).map(|t| t.clone())
    }

    /// Exclusive handle for status/confirmation advancement
    pub fn get_mut(&self, id: Uuid) -> Option<RefMut<'_, Uuid, Transaction>> {
        self.transactions.get_mut(&id)
    }

    /// Transactions initiated by `user`, newest first, optionally filtered by kind
    pub fn by_initiator(&self, user: &UserId, kind: Option<TxKind>) -> Vec<Transaction> {
        let mut txs: Vec<Transaction> = self
            .transactions
            .iter()
            .filter(|t| &t.initiator == user && kind.map_or(true, |k| t.kind == k))
            .map(|t| t.clone())
            .collect();
        txs.sort_by(|a, b| b.initiated_at.cmp(&a.initiated_at));
        txs
    }
}

impl Default for TransactionStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-user bookkeeping profiles, created on first touch
pub struct ProfileStore {
    profiles: DashMap<UserId, UserProfile>,
}

impl ProfileStore {
    /// Create empty store
    pub fn new() -> Self {
        Self {
            profiles: DashMap::new(),
        }
    }

    /// Fetch a profile, creating the zeroed default if absent
    pub fn get_or_create(&self, user: &UserId) -> UserProfile {
        self.profiles
            .entry(user.clone())
            .or_insert_with(|| UserProfile::new(user.clone()))
            .clone()
    }

    /// Mutate a profile under its entry guard, creating it if absent
    pub fn update<R>(&self, user: &UserId, f: impl FnOnce(&mut UserProfile) -> R) -> R {
        let mut entry = self
            .profiles
            .entry(user.clone())
            .or_insert_with(|| UserProfile::new(user.clone()));
        f(entry.value_mut())
    }

    /// Bump lifetime counters after an economic event
    pub fn record_activity(&self, user: &UserId, volume: rust_decimal::Decimal) {
        self.update(user, |p| {
            p.total_transactions += 1;
            p.total_volume += volume;
        });
    }

    /// Referral code for `user`, generated on first request
    pub fn ensure_referral_code(&self, user: &UserId) -> String {
        self.update(user, |p| {
            p.referral_code
                .get_or_insert_with(generate_referral_code)
                .clone()
        })
    }

    /// Resolve a referral code to its owner
    pub fn find_by_referral_code(&self, code: &str) -> Option<UserId> {
        self.profiles
            .iter()
            .find(|p| p.referral_code.as_deref() == Some(code))
            .map(|p| p.user_id.clone())
    }
}

impl Default for ProfileStore {
    fn default() -> Self {
        Self::new()
    }
}

fn generate_referral_code() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_uppercase()
}
