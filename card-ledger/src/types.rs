//! Core types for the card ledger
//!
//! All monetary fields use exact decimal arithmetic. Derived quantities
//! (remaining value, age, expiry) are computed accessors over stored fields,
//! never persisted, so they cannot go stale.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use uuid::Uuid;

/// User identifier, supplied by the external identity provider
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    /// Create new user ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// ISO 4217 currency code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Currency {
    /// US Dollar
    USD,
    /// Euro
    EUR,
    /// British Pound
    GBP,
    /// Canadian Dollar
    CAD,
    /// Australian Dollar
    AUD,
}

impl Currency {
    /// ISO 4217 code
    pub fn code(&self) -> &'static str {
        match self {
            Currency::USD => "USD",
            Currency::EUR => "EUR",
            Currency::GBP => "GBP",
            Currency::CAD => "CAD",
            Currency::AUD => "AUD",
        }
    }

    /// Parse from string
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "USD" => Some(Currency::USD),
            "EUR" => Some(Currency::EUR),
            "GBP" => Some(Currency::GBP),
            "CAD" => Some(Currency::CAD),
            "AUD" => Some(Currency::AUD),
            _ => None,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Card brand (the supported issuer set)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum Brand {
    Amazon,
    Apple,
    GooglePlay,
    Walmart,
    Target,
    BestBuy,
    Starbucks,
    Netflix,
    Spotify,
    Steam,
    PlayStation,
    Xbox,
    Nintendo,
    Uber,
    DoorDash,
    Other,
}

impl Brand {
    /// Display name
    pub fn as_str(&self) -> &'static str {
        match self {
            Brand::Amazon => "Amazon",
            Brand::Apple => "Apple",
            Brand::GooglePlay => "Google Play",
            Brand::Walmart => "Walmart",
            Brand::Target => "Target",
            Brand::BestBuy => "Best Buy",
            Brand::Starbucks => "Starbucks",
            Brand::Netflix => "Netflix",
            Brand::Spotify => "Spotify",
            Brand::Steam => "Steam",
            Brand::PlayStation => "PlayStation",
            Brand::Xbox => "Xbox",
            Brand::Nintendo => "Nintendo",
            Brand::Uber => "Uber",
            Brand::DoorDash => "DoorDash",
            Brand::Other => "Other",
        }
    }

    /// Parse from display name
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Amazon" => Some(Brand::Amazon),
            "Apple" => Some(Brand::Apple),
            "Google Play" => Some(Brand::GooglePlay),
            "Walmart" => Some(Brand::Walmart),
            "Target" => Some(Brand::Target),
            "Best Buy" => Some(Brand::BestBuy),
            "Starbucks" => Some(Brand::Starbucks),
            "Netflix" => Some(Brand::Netflix),
            "Spotify" => Some(Brand::Spotify),
            "Steam" => Some(Brand::Steam),
            "PlayStation" => Some(Brand::PlayStation),
            "Xbox" => Some(Brand::Xbox),
            "Nintendo" => Some(Brand::Nintendo),
            "Uber" => Some(Brand::Uber),
            "DoorDash" => Some(Brand::DoorDash),
            "Other" => Some(Brand::Other),
            _ => None,
        }
    }
}

impl fmt::Display for Brand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Card lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardStatus {
    /// Holds spendable value
    Active,
    /// Remaining value reached zero
    Used,
    /// Expiration date observed in the past (irreversible)
    Expired,
    /// Cancelled by the owner
    Cancelled,
    /// Under an open dispute
    Disputed,
}

/// How a card's authenticity was verified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum VerificationMethod {
    Manual,
    Api,
    Blockchain,
}

/// Where the card came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum CardSource {
    Purchased,
    Gifted,
    Earned,
    Other,
}

/// One partial conversion of card value
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversion {
    /// When the conversion was recorded
    pub timestamp: DateTime<Utc>,

    /// Source currency (the card's currency)
    pub from_currency: String,

    /// Target currency or coin
    pub to_currency: String,

    /// Card value consumed
    pub from_amount: Decimal,

    /// Amount received after fee, in target units
    pub to_amount: Decimal,

    /// Exchange rate applied
    pub exchange_rate: Decimal,

    /// Platform fee charged
    pub fee: Decimal,

    /// Transaction this conversion produced
    pub transaction_id: Uuid,
}

/// Dispute workflow status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum DisputeStatus {
    Open,
    Investigating,
    Resolved,
    Rejected,
}

/// Dispute sub-record attached to a card or listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisputeRecord {
    /// Why the dispute was raised
    pub reason: String,

    /// When it was reported
    pub reported_at: DateTime<Utc>,

    /// Who reported it
    pub reported_by: UserId,

    /// Workflow status
    pub status: DisputeStatus,

    /// Resolution text, once resolved
    pub resolution: Option<String>,

    /// When it was resolved
    pub resolved_at: Option<DateTime<Utc>>,
}

/// A registered prepaid-card asset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Card {
    /// Unique card ID
    pub id: Uuid,

    /// Owning user
    pub owner: UserId,

    /// Issuer brand
    pub brand: Brand,

    /// Face value at issuance
    pub denomination: Decimal,

    /// Currency of the denomination
    pub currency: Currency,

    /// SHA-256 of the card code; the code itself is never stored
    pub code_hash: String,

    /// Lifecycle status
    pub status: CardStatus,

    /// Authenticity verified
    pub is_verified: bool,

    /// How it was verified
    pub verification_method: Option<VerificationMethod>,

    /// When it was verified
    pub verified_at: Option<DateTime<Utc>>,

    /// Expiration date printed on the card
    pub expiration_date: DateTime<Utc>,

    /// Set the first time the expiration date is observed in the past
    pub is_expired: bool,

    /// Currently listed on the marketplace
    pub is_listed: bool,

    /// The open listing, when listed
    pub listing_id: Option<Uuid>,

    /// Ordered conversion history
    pub conversions: Vec<Conversion>,

    /// Open dispute, if any
    pub dispute: Option<DisputeRecord>,

    /// Provenance
    pub source: CardSource,

    /// Free-form owner notes
    pub notes: Option<String>,

    /// Created timestamp
    pub created_at: DateTime<Utc>,

    /// Last updated timestamp
    pub updated_at: DateTime<Utc>,
}

impl Card {
    /// Value not yet consumed by conversions, never negative
    pub fn remaining_value(&self) -> Decimal {
        let converted: Decimal = self.conversions.iter().map(|c| c.from_amount).sum();
        (self.denomination - converted).max(Decimal::ZERO)
    }

    /// Whole days since the card was registered
    pub fn age_in_days(&self, now: DateTime<Utc>) -> i64 {
        (now - self.created_at).num_days()
    }

    /// Whether the expiration date has passed at `now`
    pub fn is_past_expiration(&self, now: DateTime<Utc>) -> bool {
        self.expiration_date < now
    }

    /// Lazily force the expired state the first time the expiration date is
    /// observed in the past. Irreversible. Returns true if the card is expired.
    pub fn refresh_expiry(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_expired {
            return true;
        }
        if self.is_past_expiration(now) {
            self.is_expired = true;
            self.status = CardStatus::Expired;
            self.updated_at = now;
            return true;
        }
        false
    }
}

/// Hash a card code for the system-wide uniqueness index
pub fn hash_card_code(code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code.as_bytes());
    hex_encode(&hasher.finalize())
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Economic event type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum TxKind {
    CardUpload,
    CardConversion,
    MarketplaceBuy,
    ReferralReward,
    Withdrawal,
}

/// Transaction status; advances forward only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum TxStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
    Disputed,
}

impl TxStatus {
    /// Terminal states cannot advance further
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TxStatus::Completed | TxStatus::Failed | TxStatus::Cancelled
        )
    }
}

/// Blockchain network for externally reported confirmations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum ChainNetwork {
    Solana,
    Ethereum,
    Polygon,
}

impl ChainNetwork {
    /// Parse from string
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "solana" => Some(ChainNetwork::Solana),
            "ethereum" => Some(ChainNetwork::Ethereum),
            "polygon" => Some(ChainNetwork::Polygon),
            _ => None,
        }
    }
}

/// Externally reported on-chain confirmation state. The ledger records what
/// the verifier reported; it does not guarantee finality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainRecord {
    /// Network the transaction was observed on
    pub network: ChainNetwork,

    /// Transaction hash or signature
    pub tx_hash: String,

    /// Confirmations at last observation
    pub confirmations: u64,

    /// Block number (EVM chains) or slot (Solana)
    pub block_ref: Option<u64>,

    /// Destination wallet
    pub wallet_address: Option<String>,

    /// Confirmed at last observation
    pub is_confirmed: bool,

    /// When confirmation was first observed
    pub confirmed_at: Option<DateTime<Utc>>,
}

/// Conversion detail carried on a conversion transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionDetail {
    /// Source currency
    pub from_currency: String,
    /// Target currency or coin
    pub to_currency: String,
    /// Amount converted, source units
    pub from_amount: Decimal,
    /// Amount received, target units
    pub to_amount: Decimal,
    /// Rate applied
    pub exchange_rate: Decimal,
    /// When the rate was sampled
    pub rate_timestamp: DateTime<Utc>,
}

/// Append-only record of one economic event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique transaction ID
    pub id: Uuid,

    /// Event type
    pub kind: TxKind,

    /// Current status
    pub status: TxStatus,

    /// Initiating user
    pub initiator: UserId,

    /// Counterparty, if any
    pub recipient: Option<UserId>,

    /// Gross amount
    pub amount: Decimal,

    /// Currency
    pub currency: Currency,

    /// Platform fee
    pub fee: Decimal,

    /// Amount after fee
    pub net_amount: Decimal,

    /// Card back-reference
    pub card_id: Option<Uuid>,

    /// Listing back-reference
    pub listing_id: Option<Uuid>,

    /// Conversion detail, for conversion transactions
    pub conversion: Option<ConversionDetail>,

    /// Blockchain confirmation sub-record
    pub chain: Option<ChainRecord>,

    /// Human-readable description
    pub description: String,

    /// Created timestamp
    pub initiated_at: DateTime<Utc>,

    /// Completed timestamp
    pub completed_at: Option<DateTime<Utc>>,
}

impl Transaction {
    /// Advance to a terminal or later status. Backward transitions are ignored
    /// once a terminal state is reached.
    pub fn advance_status(&mut self, status: TxStatus, now: DateTime<Utc>) {
        if self.status.is_terminal() {
            return;
        }
        self.status = status;
        if status == TxStatus::Completed {
            self.completed_at = Some(now);
        }
    }
}

/// Completed-transaction event consumed by the commission engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionEvent {
    /// Transaction that completed
    pub transaction_id: Uuid,

    /// The transacting user (whose referrer earns commission)
    pub user: UserId,

    /// Gross transaction amount
    pub amount: Decimal,
}

/// Seller reputation snapshot
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Reputation {
    /// Mean rating across all rated listings, 0 when unrated
    pub rating: f64,

    /// Total ratings received
    pub review_count: u32,

    /// Ratings with score >= 4
    pub positive_reviews: u32,
}

impl Reputation {
    /// Share of reviews with score >= 4, 1.0 when unrated
    pub fn positive_ratio(&self) -> f64 {
        if self.review_count == 0 {
            return 1.0;
        }
        f64::from(self.positive_reviews) / f64::from(self.review_count)
    }
}

/// Internal bookkeeping view of a user. The acting identity comes from the
/// external identity provider; balances and counters live here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    /// User ID
    pub user_id: UserId,

    /// Fiat balance (bookkeeping number, not a payment rail)
    pub balance: Decimal,

    /// Crypto balance credited by conversions
    pub crypto_balance: Decimal,

    /// Lifetime transaction count
    pub total_transactions: u64,

    /// Lifetime transaction volume
    pub total_volume: Decimal,

    /// Lifetime referral commission credited
    pub referral_earnings: Decimal,

    /// Referral code handed to prospective signups
    pub referral_code: Option<String>,

    /// Seller reputation, recomputed from full rating history
    pub reputation: Reputation,

    /// KYC/verification flag from the identity provider
    pub is_verified: bool,
}

impl UserProfile {
    /// Fresh profile with zeroed counters
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            balance: Decimal::ZERO,
            crypto_balance: Decimal::ZERO,
            total_transactions: 0,
            total_volume: Decimal::ZERO,
            referral_earnings: Decimal::ZERO,
            referral_code: None,
            reputation: Reputation::default(),
            is_verified: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn card(denomination: Decimal) -> Card {
        let now = Utc::now();
        Card {
            id: Uuid::new_v4(),
            owner: UserId::new("u1"),
            brand: Brand::Amazon,
            denomination,
            currency: Currency::USD,
            code_hash: hash_card_code("CODE-1"),
            status: CardStatus::Active,
            is_verified: false,
            verification_method: None,
            verified_at: None,
            expiration_date: now + chrono::Duration::days(365),
            is_expired: false,
            is_listed: false,
            listing_id: None,
            conversions: vec![],
            dispute: None,
            source: CardSource::Purchased,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn remaining_value_full_when_unconverted() {
        let card = card(dec!(100));
        assert_eq!(card.remaining_value(), dec!(100));
    }

    #[test]
    fn remaining_value_never_negative() {
        let mut card = card(dec!(50));
        card.conversions.push(Conversion {
            timestamp: Utc::now(),
            from_currency: "USD".into(),
            to_currency: "BTC".into(),
            from_amount: dec!(80),
            to_amount: dec!(0.001),
            exchange_rate: dec!(80000),
            fee: dec!(2),
            transaction_id: Uuid::new_v4(),
        });
        assert_eq!(card.remaining_value(), Decimal::ZERO);
    }

    #[test]
    fn expiry_flip_is_irreversible() {
        let mut card = card(dec!(100));
        card.expiration_date = Utc::now() - chrono::Duration::days(1);
        assert!(card.refresh_expiry(Utc::now()));
        assert_eq!(card.status, CardStatus::Expired);

        // Re-checking with a clock before the expiration date must not undo it
        assert!(card.refresh_expiry(Utc::now() - chrono::Duration::days(30)));
        assert!(card.is_expired);
    }

    #[test]
    fn brand_round_trip() {
        assert_eq!(Brand::parse("Google Play"), Some(Brand::GooglePlay));
        assert_eq!(Brand::parse("Best Buy"), Some(Brand::BestBuy));
        assert_eq!(Brand::parse("Blockbuster"), None);
    }

    #[test]
    fn terminal_status_does_not_regress() {
        let now = Utc::now();
        let mut tx = Transaction {
            id: Uuid::new_v4(),
            kind: TxKind::MarketplaceBuy,
            status: TxStatus::Pending,
            initiator: UserId::new("buyer"),
            recipient: Some(UserId::new("seller")),
            amount: dec!(90),
            currency: Currency::USD,
            fee: dec!(2.25),
            net_amount: dec!(87.75),
            card_id: None,
            listing_id: None,
            conversion: None,
            chain: None,
            description: String::new(),
            initiated_at: now,
            completed_at: None,
        };

        tx.advance_status(TxStatus::Completed, now);
        assert_eq!(tx.status, TxStatus::Completed);
        assert!(tx.completed_at.is_some());

        tx.advance_status(TxStatus::Pending, now);
        assert_eq!(tx.status, TxStatus::Completed);
    }
}
