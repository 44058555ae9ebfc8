//! Card lifecycle and remaining-value accounting
//!
//! The ledger owns card mutations. Every read or mutate path runs the lazy
//! expiry check before evaluating the requested operation, so an expired card
//! can never be converted, listed, or verified regardless of which path
//! observes it first.

use crate::{
    clock::Clock,
    error::{Error, Result},
    store::{CardStore, ProfileStore, TransactionStore},
    types::{
        hash_card_code, Brand, Card, CardSource, CardStatus, Conversion, ConversionDetail,
        Currency, DisputeRecord, DisputeStatus, Transaction, TxKind, TxStatus, UserId,
        VerificationMethod,
    },
};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// Request to register a card
#[derive(Debug, Clone)]
pub struct NewCard {
    /// Owning user
    pub owner: UserId,
    /// Issuer brand
    pub brand: Brand,
    /// Face value, must be positive
    pub denomination: Decimal,
    /// Denomination currency
    pub currency: Currency,
    /// The card code; only its hash is retained
    pub code: String,
    /// Expiration date
    pub expiration_date: chrono::DateTime<chrono::Utc>,
    /// Provenance
    pub source: CardSource,
    /// Owner notes
    pub notes: Option<String>,
}

/// Aggregate view over an owner's cards
#[derive(Debug, Clone, Serialize)]
pub struct PortfolioStats {
    /// Total cards
    pub total: usize,
    /// Active cards
    pub active: usize,
    /// Fully consumed cards
    pub used: usize,
    /// Expired cards
    pub expired: usize,
    /// Sum of denominations
    pub total_value: Decimal,
    /// Sum of remaining values
    pub total_remaining: Decimal,
}

/// Card ledger: owns card state and its consistency with the transaction log
pub struct CardLedger {
    cards: Arc<CardStore>,
    transactions: Arc<TransactionStore>,
    profiles: Arc<ProfileStore>,
    clock: Arc<dyn Clock>,
}

impl CardLedger {
    /// Create a ledger over shared stores
    pub fn new(
        cards: Arc<CardStore>,
        transactions: Arc<TransactionStore>,
        profiles: Arc<ProfileStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            cards,
            transactions,
            profiles,
            clock,
        }
    }

    /// Shared card store
    pub fn cards(&self) -> &Arc<CardStore> {
        &self.cards
    }

    /// Shared transaction log
    pub fn transactions(&self) -> &Arc<TransactionStore> {
        &self.transactions
    }

    /// Shared profile store
    pub fn profiles(&self) -> &Arc<ProfileStore> {
        &self.profiles
    }

    /// Register a card. The code hash is unique system-wide, independent of
    /// owner; a collision fails with `DuplicateCode`.
    pub fn create_card(&self, req: NewCard) -> Result<Card> {
        if req.code.trim().is_empty() {
            return Err(Error::Validation("card code is required".into()));
        }
        if req.denomination <= Decimal::ZERO {
            return Err(Error::Validation(
                "denomination must be positive".into(),
            ));
        }

        let now = self.clock.now();
        let mut card = Card {
            id: Uuid::new_v4(),
            owner: req.owner.clone(),
            brand: req.brand,
            denomination: req.denomination,
            currency: req.currency,
            code_hash: hash_card_code(&req.code),
            status: CardStatus::Active,
            is_verified: false,
            verification_method: None,
            verified_at: None,
            expiration_date: req.expiration_date,
            is_expired: false,
            is_listed: false,
            listing_id: None,
            conversions: vec![],
            dispute: None,
            source: req.source,
            notes: req.notes,
            created_at: now,
            updated_at: now,
        };
        card.refresh_expiry(now);

        if !self.cards.insert(card.clone()) {
            return Err(Error::DuplicateCode);
        }

        self.transactions.insert(Transaction {
            id: Uuid::new_v4(),
            kind: TxKind::CardUpload,
            status: TxStatus::Completed,
            initiator: req.owner.clone(),
            recipient: None,
            amount: req.denomination,
            currency: req.currency,
            fee: Decimal::ZERO,
            net_amount: req.denomination,
            card_id: Some(card.id),
            listing_id: None,
            conversion: None,
            chain: None,
            description: format!("Uploaded {} gift card", req.brand),
            initiated_at: now,
            completed_at: Some(now),
        });
        self.profiles.record_activity(&req.owner, req.denomination);

        tracing::info!(card = %card.id, owner = %req.owner, "card registered");
        Ok(card)
    }

    /// Record a partial conversion of card value. Fails unless the card is
    /// active and unexpired, and the amount fits the remaining value. When the
    /// remaining value reaches zero the card flips to `Used`.
    pub fn record_conversion(
        &self,
        card_id: Uuid,
        owner: &UserId,
        to_currency: &str,
        amount: Decimal,
        rate: Decimal,
        fee: Decimal,
    ) -> Result<Transaction> {
        if amount <= Decimal::ZERO {
            return Err(Error::Validation("amount must be positive".into()));
        }
        if rate <= Decimal::ZERO {
            return Err(Error::Validation("rate must be positive".into()));
        }
        if fee < Decimal::ZERO || fee >= amount {
            return Err(Error::Validation("fee must fit within the amount".into()));
        }

        let now = self.clock.now();
        let tx_id = Uuid::new_v4();
        let net_amount = amount - fee;
        let to_amount = net_amount / rate;

        let (card_currency, brand) = {
            let mut card = self
                .cards
                .get_mut(card_id)
                .ok_or_else(|| Error::NotFound(format!("card {card_id}")))?;

            if card.refresh_expiry(now) {
                return Err(Error::InvalidState("card has expired".into()));
            }
            if &card.owner != owner {
                return Err(Error::Unauthorized(
                    "not authorized to convert this card".into(),
                ));
            }
            if card.status != CardStatus::Active {
                return Err(Error::InvalidState(format!(
                    "card is {:?} and cannot be converted",
                    card.status
                )));
            }

            let remaining = card.remaining_value();
            if amount > remaining {
                return Err(Error::InsufficientValue {
                    requested: amount,
                    remaining,
                });
            }

            let from_currency = card.currency.code().to_string();
            card.conversions.push(Conversion {
                timestamp: now,
                from_currency,
                to_currency: to_currency.to_string(),
                from_amount: amount,
                to_amount,
                exchange_rate: rate,
                fee,
                transaction_id: tx_id,
            });
            if card.remaining_value() == Decimal::ZERO {
                card.status = CardStatus::Used;
            }
            card.updated_at = now;
            (card.currency, card.brand)
        };

        let tx = Transaction {
            id: tx_id,
            kind: TxKind::CardConversion,
            status: TxStatus::Pending,
            initiator: owner.clone(),
            recipient: None,
            amount,
            currency: card_currency,
            fee,
            net_amount,
            card_id: Some(card_id),
            listing_id: None,
            conversion: Some(ConversionDetail {
                from_currency: card_currency.code().to_string(),
                to_currency: to_currency.to_string(),
                from_amount: amount,
                to_amount,
                exchange_rate: rate,
                rate_timestamp: now,
            }),
            chain: None,
            description: format!("Convert {} gift card to {}", brand, to_currency),
            initiated_at: now,
            completed_at: None,
        };
        self.transactions.insert(tx.clone());

        self.profiles.record_activity(owner, amount);
        self.profiles
            .update(owner, |p| p.crypto_balance += to_amount);

        tracing::info!(card = %card_id, %amount, %to_currency, "conversion recorded");
        Ok(tx)
    }

    /// Delete a card. Listed cards cannot be deleted.
    pub fn delete_card(&self, card_id: Uuid, owner: &UserId) -> Result<()> {
        {
            let card = self
                .cards
                .get_mut(card_id)
                .ok_or_else(|| Error::NotFound(format!("card {card_id}")))?;
            if &card.owner != owner {
                return Err(Error::Unauthorized(
                    "not authorized to delete this card".into(),
                ));
            }
            if card.is_listed {
                return Err(Error::Conflict(
                    "cannot delete a card that is listed on the marketplace".into(),
                ));
            }
        }
        self.cards.remove(card_id);
        Ok(())
    }

    /// Mark a card as verified
    pub fn verify_card(
        &self,
        card_id: Uuid,
        owner: &UserId,
        method: VerificationMethod,
    ) -> Result<Card> {
        let now = self.clock.now();
        let mut card = self
            .cards
            .get_mut(card_id)
            .ok_or_else(|| Error::NotFound(format!("card {card_id}")))?;
        card.refresh_expiry(now);
        if &card.owner != owner {
            return Err(Error::Unauthorized(
                "not authorized to verify this card".into(),
            ));
        }
        card.is_verified = true;
        card.verification_method = Some(method);
        card.verified_at = Some(now);
        card.updated_at = now;
        Ok(card.clone())
    }

    /// Report a dispute on a card; the card moves to `Disputed`
    pub fn report_dispute(&self, card_id: Uuid, owner: &UserId, reason: &str) -> Result<Card> {
        if reason.trim().is_empty() {
            return Err(Error::Validation("dispute reason is required".into()));
        }
        let now = self.clock.now();
        let mut card = self
            .cards
            .get_mut(card_id)
            .ok_or_else(|| Error::NotFound(format!("card {card_id}")))?;
        card.refresh_expiry(now);
        if &card.owner != owner {
            return Err(Error::Unauthorized(
                "not authorized to dispute this card".into(),
            ));
        }
        card.dispute = Some(DisputeRecord {
            reason: reason.to_string(),
            reported_at: now,
            reported_by: owner.clone(),
            status: DisputeStatus::Open,
            resolution: None,
            resolved_at: None,
        });
        card.status = CardStatus::Disputed;
        card.updated_at = now;
        tracing::warn!(card = %card_id, "dispute reported");
        Ok(card.clone())
    }

    /// Update owner-editable fields. Status changes are limited to the
    /// non-dispute set.
    pub fn update_card(
        &self,
        card_id: Uuid,
        owner: &UserId,
        notes: Option<String>,
        status: Option<CardStatus>,
    ) -> Result<Card> {
        let now = self.clock.now();
        let mut card = self
            .cards
            .get_mut(card_id)
            .ok_or_else(|| Error::NotFound(format!("card {card_id}")))?;
        card.refresh_expiry(now);
        if &card.owner != owner {
            return Err(Error::Unauthorized(
                "not authorized to update this card".into(),
            ));
        }
        if let Some(notes) = notes {
            card.notes = Some(notes);
        }
        if let Some(status) = status {
            if status == CardStatus::Disputed {
                return Err(Error::Validation(
                    "disputes are reported through the dispute operation".into(),
                ));
            }
            card.status = status;
        }
        card.updated_at = now;
        Ok(card.clone())
    }

    /// Fetch a card, owner only
    pub fn get_card(&self, card_id: Uuid, owner: &UserId) -> Result<Card> {
        let now = self.clock.now();
        let mut card = self
            .cards
            .get_mut(card_id)
            .ok_or_else(|| Error::NotFound(format!("card {card_id}")))?;
        card.refresh_expiry(now);
        if &card.owner != owner {
            return Err(Error::Unauthorized(
                "not authorized to access this card".into(),
            ));
        }
        Ok(card.clone())
    }

    /// All of an owner's cards plus portfolio stats, with optional filters
    pub fn list_cards(
        &self,
        owner: &UserId,
        status: Option<CardStatus>,
        brand: Option<Brand>,
    ) -> (Vec<Card>, PortfolioStats) {
        let now = self.clock.now();
        let ids: Vec<Uuid> = self.cards.by_owner(owner).iter().map(|c| c.id).collect();
        let mut cards = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(mut card) = self.cards.get_mut(id) {
                card.refresh_expiry(now);
                cards.push(card.clone());
            }
        }

        let stats = PortfolioStats {
            total: cards.len(),
            active: cards
                .iter()
                .filter(|c| c.status == CardStatus::Active)
                .count(),
            used: cards.iter().filter(|c| c.status == CardStatus::Used).count(),
            expired: cards
                .iter()
                .filter(|c| c.status == CardStatus::Expired)
                .count(),
            total_value: cards.iter().map(|c| c.denomination).sum(),
            total_remaining: cards.iter().map(|c| c.remaining_value()).sum(),
        };

        cards.retain(|c| {
            status.map_or(true, |s| c.status == s) && brand.map_or(true, |b| c.brand == b)
        });
        (cards, stats)
    }

    /// Conversion history with running totals, owner only
    pub fn conversion_history(
        &self,
        card_id: Uuid,
        owner: &UserId,
    ) -> Result<(Vec<Conversion>, Decimal, Decimal)> {
        let card = self.get_card(card_id, owner)?;
        let total_converted: Decimal = card.conversions.iter().map(|c| c.from_amount).sum();
        let remaining = card.remaining_value();
        Ok((card.conversions, total_converted, remaining))
    }

    /// Flip a card into the listed state, exclusively with the listing
    /// creation. Enforces seller == owner, active status, and not already
    /// listed, under the card's entry guard.
    pub fn begin_listing(&self, card_id: Uuid, seller: &UserId, listing_id: Uuid) -> Result<Card> {
        let now = self.clock.now();
        let mut card = self
            .cards
            .get_mut(card_id)
            .ok_or_else(|| Error::NotFound(format!("card {card_id}")))?;
        if card.refresh_expiry(now) {
            return Err(Error::InvalidState("card has expired".into()));
        }
        if &card.owner != seller {
            return Err(Error::Unauthorized(
                "not authorized to list this card".into(),
            ));
        }
        if card.is_listed {
            return Err(Error::Conflict("card is already listed".into()));
        }
        if card.status != CardStatus::Active {
            return Err(Error::InvalidState(format!(
                "card is {:?} and cannot be listed",
                card.status
            )));
        }
        card.is_listed = true;
        card.listing_id = Some(listing_id);
        card.updated_at = now;
        Ok(card.clone())
    }

    /// Release the listed flag after a listing is removed or cancelled
    pub fn clear_listing(&self, card_id: Uuid) -> Result<()> {
        let mut card = self
            .cards
            .get_mut(card_id)
            .ok_or_else(|| Error::NotFound(format!("card {card_id}")))?;
        card.is_listed = false;
        card.listing_id = None;
        card.updated_at = self.clock.now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{Duration, Utc};
    use rust_decimal_macros::dec;

    fn ledger() -> (CardLedger, ManualClock) {
        let clock = ManualClock::new(Utc::now());
        let ledger = CardLedger::new(
            Arc::new(CardStore::new()),
            Arc::new(TransactionStore::new()),
            Arc::new(ProfileStore::new()),
            Arc::new(clock.clone()),
        );
        (ledger, clock)
    }

    fn new_card(owner: &str, code: &str, denomination: Decimal) -> NewCard {
        NewCard {
            owner: UserId::new(owner),
            brand: Brand::Amazon,
            denomination,
            currency: Currency::USD,
            code: code.to_string(),
            expiration_date: Utc::now() + Duration::days(365),
            source: CardSource::Purchased,
            notes: None,
        }
    }

    #[test]
    fn create_rejects_duplicate_code() {
        let (ledger, _) = ledger();
        ledger.create_card(new_card("u1", "AMZN-1", dec!(100))).unwrap();

        // Same code from a different owner still collides
        let err = ledger
            .create_card(new_card("u2", "AMZN-1", dec!(50)))
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateCode));
    }

    #[test]
    fn create_rejects_non_positive_denomination() {
        let (ledger, _) = ledger();
        let err = ledger
            .create_card(new_card("u1", "AMZN-2", dec!(0)))
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn conversion_sequence_tracks_remaining_value() {
        let (ledger, _) = ledger();
        let owner = UserId::new("u1");
        let card = ledger.create_card(new_card("u1", "SEQ", dec!(100))).unwrap();

        // convert 40 -> remaining 60
        ledger
            .record_conversion(card.id, &owner, "BTC", dec!(40), dec!(50000), dec!(1))
            .unwrap();
        assert_eq!(
            ledger.get_card(card.id, &owner).unwrap().remaining_value(),
            dec!(60)
        );

        // converting 70 fails, state unchanged
        let err = ledger
            .record_conversion(card.id, &owner, "BTC", dec!(70), dec!(50000), dec!(1))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::InsufficientValue {
                requested,
                remaining
            } if requested == dec!(70) && remaining == dec!(60)
        ));
        assert_eq!(
            ledger.get_card(card.id, &owner).unwrap().remaining_value(),
            dec!(60)
        );

        // converting exactly 60 -> remaining 0, status used
        ledger
            .record_conversion(card.id, &owner, "BTC", dec!(60), dec!(50000), dec!(1))
            .unwrap();
        let card = ledger.get_card(card.id, &owner).unwrap();
        assert_eq!(card.remaining_value(), Decimal::ZERO);
        assert_eq!(card.status, CardStatus::Used);

        // a used card cannot convert again
        let err = ledger
            .record_conversion(card.id, &owner, "BTC", dec!(1), dec!(50000), dec!(0.01))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
    }

    #[test]
    fn expiry_is_checked_before_conversion() {
        let (ledger, clock) = ledger();
        let owner = UserId::new("u1");
        let mut req = new_card("u1", "EXP", dec!(100));
        req.expiration_date = clock.now() + Duration::days(10);
        let card = ledger.create_card(req).unwrap();

        clock.advance(Duration::days(11));
        let err = ledger
            .record_conversion(card.id, &owner, "ETH", dec!(10), dec!(3000), dec!(0.25))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));

        let card = ledger.get_card(card.id, &owner).unwrap();
        assert!(card.is_expired);
        assert_eq!(card.status, CardStatus::Expired);
    }

    #[test]
    fn listed_card_cannot_be_deleted() {
        let (ledger, _) = ledger();
        let owner = UserId::new("u1");
        let card = ledger.create_card(new_card("u1", "LIST", dec!(25))).unwrap();

        ledger
            .begin_listing(card.id, &owner, Uuid::new_v4())
            .unwrap();
        let err = ledger.delete_card(card.id, &owner).unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));

        ledger.clear_listing(card.id).unwrap();
        ledger.delete_card(card.id, &owner).unwrap();
    }

    #[test]
    fn begin_listing_is_exclusive() {
        let (ledger, _) = ledger();
        let owner = UserId::new("u1");
        let card = ledger.create_card(new_card("u1", "EXCL", dec!(25))).unwrap();

        ledger
            .begin_listing(card.id, &owner, Uuid::new_v4())
            .unwrap();
        let err = ledger
            .begin_listing(card.id, &owner, Uuid::new_v4())
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[test]
    fn non_owner_is_rejected() {
        let (ledger, _) = ledger();
        let card = ledger.create_card(new_card("u1", "OWN", dec!(25))).unwrap();
        let stranger = UserId::new("u2");

        assert!(matches!(
            ledger.get_card(card.id, &stranger).unwrap_err(),
            Error::Unauthorized(_)
        ));
        assert!(matches!(
            ledger.delete_card(card.id, &stranger).unwrap_err(),
            Error::Unauthorized(_)
        ));
        assert!(matches!(
            ledger
                .report_dispute(card.id, &stranger, "not mine")
                .unwrap_err(),
            Error::Unauthorized(_)
        ));
    }

    #[test]
    fn conversion_updates_owner_counters() {
        let (ledger, _) = ledger();
        let owner = UserId::new("u1");
        let card = ledger.create_card(new_card("u1", "CNT", dec!(100))).unwrap();
        ledger
            .record_conversion(card.id, &owner, "SOL", dec!(20), dec!(100), dec!(0.5))
            .unwrap();

        let profile = ledger.profiles().get_or_create(&owner);
        // one upload + one conversion
        assert_eq!(profile.total_transactions, 2);
        assert_eq!(profile.total_volume, dec!(120));
        assert_eq!(profile.crypto_balance, dec!(0.195));
    }
}
