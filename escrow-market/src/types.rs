//! Listing, escrow, and rating types
//!
//! The escrow sub-record is the correctness heart of the marketplace: funds
//! are held logically between purchase and confirmation, and `Held` is only
//! valid while the listing is sold and unsettled.

use card_ledger::types::DisputeRecord;
use card_ledger::{Brand, Currency, UserId};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Listing lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    /// Open for purchase
    Active,
    /// Purchased, escrow in flight or settled
    Sold,
    /// Withdrawn by the seller
    Cancelled,
    /// Listing horizon passed without a sale
    Expired,
}

/// Escrow hold state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EscrowStatus {
    /// No funds committed yet
    Pending,
    /// Funds logically committed to the sale, not settled
    Held,
    /// Settled to the seller
    Released,
    /// Returned to the buyer
    Refunded,
}

/// Listing-scoped escrow sub-record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Escrow {
    /// Whether funds are currently committed
    pub is_escrowed: bool,

    /// Hold state
    pub status: EscrowStatus,

    /// Amount committed
    pub amount: Decimal,

    /// When the hold was released to the seller
    pub released_at: Option<DateTime<Utc>>,

    /// When the hold was refunded to the buyer
    pub refunded_at: Option<DateTime<Utc>>,
}

impl Escrow {
    fn pending() -> Self {
        Self {
            is_escrowed: false,
            status: EscrowStatus::Pending,
            amount: Decimal::ZERO,
            released_at: None,
            refunded_at: None,
        }
    }
}

/// Purchase state attached to a listing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SaleInfo {
    /// Buyer, set exactly once on purchase
    pub buyer: Option<UserId>,

    /// Transaction created at purchase
    pub transaction_id: Option<Uuid>,

    /// When the purchase happened
    pub purchased_at: Option<DateTime<Utc>>,

    /// When the buyer confirmed receipt (settlement)
    pub completed_at: Option<DateTime<Utc>>,
}

/// One rating left by the buyer or seller after settlement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingEntry {
    /// Who rated
    pub rater: UserId,

    /// Score in [1, 5]
    pub score: u8,

    /// Free-form review text
    pub review: String,

    /// When the rating was left
    pub created_at: DateTime<Utc>,
}

/// Rating aggregate for a listing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RatingSummary {
    /// Mean of all scores, 0 when unrated
    pub average: f64,

    /// Number of ratings
    pub total: u32,

    /// The ratings themselves
    pub entries: Vec<RatingEntry>,
}

impl RatingSummary {
    /// Recompute the aggregate from the entries
    pub fn recompute(&mut self) {
        self.total = self.entries.len() as u32;
        if self.entries.is_empty() {
            self.average = 0.0;
        } else {
            let sum: u32 = self.entries.iter().map(|r| u32::from(r.score)).sum();
            self.average = f64::from(sum) / f64::from(self.total);
        }
    }
}

/// A marketplace listing backed by exactly one card
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    /// Unique listing ID
    pub id: Uuid,

    /// Selling user (the card owner)
    pub seller: UserId,

    /// Backing card; one open listing per card
    pub card_id: Uuid,

    /// Listing title
    pub title: String,

    /// Listing description
    pub description: String,

    /// Card brand, denormalized for browsing
    pub brand: Brand,

    /// Card face value
    pub denomination: Decimal,

    /// Currency
    pub currency: Currency,

    /// Price the seller asks
    pub asking_price: Decimal,

    /// Asking price as a percentage of face value
    pub price_percentage: Decimal,

    /// Discount from face value in percent
    pub discount: Decimal,

    /// Lifecycle status
    pub status: ListingStatus,

    /// Escrow sub-record
    pub escrow: Escrow,

    /// Purchase sub-record
    pub sale: SaleInfo,

    /// Rating aggregate
    pub rating: RatingSummary,

    /// Open dispute, if any
    pub dispute: Option<DisputeRecord>,

    /// View counter
    pub views: u64,

    /// Users who favorited this listing
    pub favorite_users: Vec<UserId>,

    /// Fixed horizon after which the listing expires unsold
    pub expires_at: DateTime<Utc>,

    /// Set when the horizon is observed in the past
    pub is_expired: bool,

    /// Created timestamp
    pub created_at: DateTime<Utc>,

    /// Last updated timestamp
    pub updated_at: DateTime<Utc>,
}

impl Listing {
    /// Build a fresh active listing over a card snapshot
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: Uuid,
        seller: UserId,
        card: &card_ledger::Card,
        title: String,
        description: String,
        asking_price: Decimal,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        let price_percentage = asking_price / card.denomination * Decimal::from(100);
        Self {
            id,
            seller,
            card_id: card.id,
            title,
            description,
            brand: card.brand,
            denomination: card.denomination,
            currency: card.currency,
            asking_price,
            price_percentage,
            discount: Decimal::from(100) - price_percentage,
            status: ListingStatus::Active,
            escrow: Escrow::pending(),
            sale: SaleInfo::default(),
            rating: RatingSummary::default(),
            dispute: None,
            views: 0,
            favorite_users: Vec::new(),
            expires_at: now + ttl,
            is_expired: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Time left before the listing horizon, zero once expired
    pub fn remaining_time(&self, now: DateTime<Utc>) -> Duration {
        if self.is_expired {
            return Duration::zero();
        }
        (self.expires_at - now).max(Duration::zero())
    }

    /// Open for purchase at `now`
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.status == ListingStatus::Active
            && !self.is_expired
            && self.remaining_time(now) > Duration::zero()
    }

    /// Lazily flip the expired state once the horizon is observed in the
    /// past. An active listing moves to `Expired`; sold listings keep their
    /// status.
    pub fn refresh_expiry(&mut self, now: DateTime<Utc>) {
        if self.is_expired || self.expires_at >= now {
            return;
        }
        self.is_expired = true;
        if self.status == ListingStatus::Active {
            self.status = ListingStatus::Expired;
        }
        self.updated_at = now;
    }

    /// Number of users who favorited this listing
    pub fn favorites(&self) -> usize {
        self.favorite_users.len()
    }
}
