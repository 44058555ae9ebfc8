//! Marketplace orchestration
//!
//! Owns the listing lifecycle and the escrow state machine:
//!
//! ```text
//! create_listing          purchase                confirm_receipt
//! (escrow pending) ────▶ (sold, escrow held) ────▶ (escrow released,
//!                          funds move nowhere        seller credited,
//!                          at this step              transaction completed)
//! ```
//!
//! "Sold" and "settled" are distinct: purchase commits funds logically and
//! nothing else; only the buyer's confirmation moves value.

use crate::{
    error::{Error, Result},
    store::{ListingFilter, ListingStore},
    types::{EscrowStatus, Listing, ListingStatus, RatingEntry},
};
use card_ledger::types::{DisputeRecord, DisputeStatus};
use card_ledger::{
    CardLedger, Clock, Reputation, Transaction, TransactionEvent, TxKind, TxStatus, UserId,
};
use chrono::Duration;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

/// Marketplace tuning
#[derive(Debug, Clone)]
pub struct MarketConfig {
    /// Platform fee in percent of the asking price
    pub fee_pct: Decimal,

    /// Fixed listing horizon from creation
    pub listing_ttl_days: i64,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            fee_pct: dec!(2.5),
            listing_ttl_days: 30,
        }
    }
}

/// Escrow marketplace over the card ledger
pub struct Marketplace {
    listings: Arc<ListingStore>,
    ledger: Arc<CardLedger>,
    clock: Arc<dyn Clock>,
    config: MarketConfig,
    events: Option<UnboundedSender<TransactionEvent>>,
}

impl Marketplace {
    /// Create a marketplace over shared stores
    pub fn new(
        listings: Arc<ListingStore>,
        ledger: Arc<CardLedger>,
        clock: Arc<dyn Clock>,
        config: MarketConfig,
    ) -> Self {
        Self {
            listings,
            ledger,
            clock,
            config,
            events: None,
        }
    }

    /// Emit completed-transaction events to `sender` (consumed by the
    /// commission engine)
    pub fn with_events(mut self, sender: UnboundedSender<TransactionEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    /// Shared listing store
    pub fn listings(&self) -> &Arc<ListingStore> {
        &self.listings
    }

    /// List a card for sale. The card's listed flag and the listing are
    /// created together: the flag flip happens under the card's entry guard
    /// and is the only gate, so a second listing attempt for the same card
    /// fails before a listing exists.
    pub fn create_listing(
        &self,
        card_id: Uuid,
        seller: &UserId,
        title: &str,
        description: &str,
        asking_price: Decimal,
    ) -> Result<Listing> {
        if title.trim().is_empty() {
            return Err(Error::Validation("title is required".into()));
        }
        if asking_price <= Decimal::ZERO {
            return Err(Error::Validation("asking price must be positive".into()));
        }

        let now = self.clock.now();
        let listing_id = Uuid::new_v4();
        let card = self.ledger.begin_listing(card_id, seller, listing_id)?;

        let listing = Listing::new(
            listing_id,
            seller.clone(),
            &card,
            title.to_string(),
            description.to_string(),
            asking_price,
            Duration::days(self.config.listing_ttl_days),
            now,
        );
        self.listings.insert(listing.clone());

        tracing::info!(listing = %listing_id, card = %card_id, %asking_price, "listing created");
        Ok(listing)
    }

    /// Update title, description, or asking price. Active listings only.
    pub fn update_listing(
        &self,
        listing_id: Uuid,
        seller: &UserId,
        title: Option<String>,
        description: Option<String>,
        asking_price: Option<Decimal>,
    ) -> Result<Listing> {
        let now = self.clock.now();
        let mut listing = self
            .listings
            .get_mut(listing_id)
            .ok_or_else(|| Error::NotFound(format!("listing {listing_id}")))?;
        listing.refresh_expiry(now);

        if &listing.seller != seller {
            return Err(Error::Unauthorized(
                "not authorized to update this listing".into(),
            ));
        }
        if listing.status != ListingStatus::Active {
            return Err(Error::InvalidState(format!(
                "cannot update a {:?} listing",
                listing.status
            )));
        }

        if let Some(title) = title {
            if title.trim().is_empty() {
                return Err(Error::Validation("title cannot be empty".into()));
            }
            listing.title = title;
        }
        if let Some(description) = description {
            listing.description = description;
        }
        if let Some(price) = asking_price {
            if price <= Decimal::ZERO {
                return Err(Error::Validation("asking price must be positive".into()));
            }
            listing.asking_price = price;
            listing.price_percentage = price / listing.denomination * Decimal::from(100);
            listing.discount = Decimal::from(100) - listing.price_percentage;
        }
        listing.updated_at = now;
        Ok(listing.clone())
    }

    /// Remove an unsold listing and release the card
    pub fn delete_listing(&self, listing_id: Uuid, seller: &UserId) -> Result<()> {
        let card_id = {
            let listing = self
                .listings
                .get_mut(listing_id)
                .ok_or_else(|| Error::NotFound(format!("listing {listing_id}")))?;
            if &listing.seller != seller {
                return Err(Error::Unauthorized(
                    "not authorized to delete this listing".into(),
                ));
            }
            if listing.status == ListingStatus::Sold {
                return Err(Error::Conflict("cannot delete a sold listing".into()));
            }
            listing.card_id
        };

        self.listings.remove(listing_id);
        self.ledger.clear_listing(card_id)?;
        Ok(())
    }

    /// Purchase a listing, moving it to sold with escrow held.
    ///
    /// Funds are logically held, not transferred: neither balance changes
    /// here. Runs under the listing's entry guard, so of two concurrent
    /// purchases exactly one wins and the other observes the winner's buyer
    /// and fails with `Conflict`.
    pub fn purchase(&self, listing_id: Uuid, buyer: &UserId) -> Result<Transaction> {
        let now = self.clock.now();
        let fee_pct = self.config.fee_pct;

        let tx = {
            let mut listing = self
                .listings
                .get_mut(listing_id)
                .ok_or_else(|| Error::NotFound(format!("listing {listing_id}")))?;
            listing.refresh_expiry(now);

            if &listing.seller == buyer {
                return Err(Error::SelfPurchase);
            }
            if listing.sale.buyer.is_some() {
                return Err(Error::Conflict(
                    "listing has already been purchased".into(),
                ));
            }
            if !listing.is_active(now) {
                return Err(Error::InvalidState(
                    "listing is not available for purchase".into(),
                ));
            }

            let amount = listing.asking_price;
            let fee = amount * fee_pct / Decimal::from(100);
            let tx = Transaction {
                id: Uuid::new_v4(),
                kind: TxKind::MarketplaceBuy,
                status: TxStatus::Pending,
                initiator: buyer.clone(),
                recipient: Some(listing.seller.clone()),
                amount,
                currency: listing.currency,
                fee,
                net_amount: amount - fee,
                card_id: Some(listing.card_id),
                listing_id: Some(listing_id),
                conversion: None,
                chain: None,
                description: format!("Purchase {} gift card from marketplace", listing.brand),
                initiated_at: now,
                completed_at: None,
            };

            listing.sale.buyer = Some(buyer.clone());
            listing.sale.transaction_id = Some(tx.id);
            listing.sale.purchased_at = Some(now);
            listing.escrow.is_escrowed = true;
            listing.escrow.status = EscrowStatus::Held;
            listing.escrow.amount = amount;
            listing.status = ListingStatus::Sold;
            listing.updated_at = now;
            tx
        };

        self.ledger.transactions().insert(tx.clone());
        self.ledger.profiles().record_activity(buyer, tx.amount);

        tracing::info!(listing = %listing_id, buyer = %buyer, amount = %tx.amount, "escrow held");
        Ok(tx)
    }

    /// Buyer confirms receipt: escrow releases and the sale settles.
    ///
    /// The seller is credited the net amount; the platform fee was accounted
    /// on the transaction at purchase time and is not paid out.
    pub fn confirm_receipt(&self, listing_id: Uuid, caller: &UserId) -> Result<Listing> {
        let now = self.clock.now();

        let snapshot = {
            let mut listing = self
                .listings
                .get_mut(listing_id)
                .ok_or_else(|| Error::NotFound(format!("listing {listing_id}")))?;

            if listing.sale.buyer.as_ref() != Some(caller) {
                return Err(Error::Unauthorized(
                    "only the buyer can confirm receipt".into(),
                ));
            }
            if listing.escrow.status != EscrowStatus::Held {
                return Err(Error::InvalidState("escrow is not in held status".into()));
            }

            listing.escrow.status = EscrowStatus::Released;
            listing.escrow.released_at = Some(now);
            listing.sale.completed_at = Some(now);
            listing.updated_at = now;
            listing.clone()
        };

        // Settlement: the seller receives the escrowed amount net of the
        // platform fee, which was accounted once on the transaction at
        // purchase time.
        let mut credited = snapshot.escrow.amount * (Decimal::from(100) - self.config.fee_pct)
            / Decimal::from(100);
        if let Some(tx_id) = snapshot.sale.transaction_id {
            if let Some(mut tx) = self.ledger.transactions().get_mut(tx_id) {
                tx.advance_status(TxStatus::Completed, now);
                credited = tx.net_amount;
            }
        }
        self.ledger.profiles().update(&snapshot.seller, |p| {
            p.balance += credited;
        });

        if let Some(events) = &self.events {
            let event = TransactionEvent {
                transaction_id: snapshot.sale.transaction_id.unwrap_or_default(),
                user: caller.clone(),
                amount: snapshot.escrow.amount,
            };
            if events.send(event).is_err() {
                tracing::debug!("transaction event receiver dropped");
            }
        }

        tracing::info!(listing = %listing_id, seller = %snapshot.seller, %credited, "escrow released");
        Ok(snapshot)
    }

    /// Rate a settled listing. Buyer or seller, once each.
    pub fn rate_listing(
        &self,
        listing_id: Uuid,
        rater: &UserId,
        score: u8,
        review: &str,
    ) -> Result<Listing> {
        if !(1..=5).contains(&score) {
            return Err(Error::Validation(
                "rating must be between 1 and 5".into(),
            ));
        }

        let now = self.clock.now();
        let (snapshot, seller) = {
            let mut listing = self
                .listings
                .get_mut(listing_id)
                .ok_or_else(|| Error::NotFound(format!("listing {listing_id}")))?;

            if listing.sale.completed_at.is_none() {
                return Err(Error::InvalidState(
                    "can only rate completed transactions".into(),
                ));
            }
            let is_buyer = listing.sale.buyer.as_ref() == Some(rater);
            let is_seller = &listing.seller == rater;
            if !is_buyer && !is_seller {
                return Err(Error::Unauthorized(
                    "not authorized to rate this listing".into(),
                ));
            }
            if listing.rating.entries.iter().any(|r| &r.rater == rater) {
                return Err(Error::Conflict("listing already rated".into()));
            }

            listing.rating.entries.push(RatingEntry {
                rater: rater.clone(),
                score,
                review: review.to_string(),
                created_at: now,
            });
            listing.rating.recompute();
            listing.updated_at = now;
            (listing.clone(), listing.seller.clone())
        };

        // Full recomputation over the seller's complete rating history: the
        // stored reputation always equals the true mean, it never drifts.
        self.recompute_seller_reputation(&seller);
        Ok(snapshot)
    }

    /// Report a dispute on a purchased listing. Buyer or seller.
    pub fn report_dispute(&self, listing_id: Uuid, caller: &UserId, reason: &str) -> Result<Listing> {
        if reason.trim().is_empty() {
            return Err(Error::Validation("dispute reason is required".into()));
        }

        let now = self.clock.now();
        let (snapshot, tx_id) = {
            let mut listing = self
                .listings
                .get_mut(listing_id)
                .ok_or_else(|| Error::NotFound(format!("listing {listing_id}")))?;

            let is_buyer = listing.sale.buyer.as_ref() == Some(caller);
            let is_seller = &listing.seller == caller;
            if !is_buyer && !is_seller {
                return Err(Error::Unauthorized(
                    "not authorized to dispute this listing".into(),
                ));
            }
            if listing.dispute.is_some() {
                return Err(Error::Conflict("listing is already disputed".into()));
            }

            listing.dispute = Some(DisputeRecord {
                reason: reason.to_string(),
                reported_at: now,
                reported_by: caller.clone(),
                status: DisputeStatus::Open,
                resolution: None,
                resolved_at: None,
            });
            listing.updated_at = now;
            (listing.clone(), listing.sale.transaction_id)
        };

        if let Some(tx_id) = tx_id {
            if let Some(mut tx) = self.ledger.transactions().get_mut(tx_id) {
                tx.advance_status(TxStatus::Disputed, now);
            }
        }

        tracing::warn!(listing = %listing_id, by = %caller, "listing dispute reported");
        Ok(snapshot)
    }

    /// Favorite a listing. Fails on duplicate.
    pub fn add_favorite(&self, listing_id: Uuid, user: &UserId) -> Result<Listing> {
        let mut listing = self
            .listings
            .get_mut(listing_id)
            .ok_or_else(|| Error::NotFound(format!("listing {listing_id}")))?;
        if listing.favorite_users.contains(user) {
            return Err(Error::Conflict("already added to favorites".into()));
        }
        listing.favorite_users.push(user.clone());
        Ok(listing.clone())
    }

    /// Unfavorite a listing. Removing a non-favorite is a no-op.
    pub fn remove_favorite(&self, listing_id: Uuid, user: &UserId) -> Result<Listing> {
        let mut listing = self
            .listings
            .get_mut(listing_id)
            .ok_or_else(|| Error::NotFound(format!("listing {listing_id}")))?;
        listing.favorite_users.retain(|u| u != user);
        Ok(listing.clone())
    }

    /// Fetch a listing and count the view
    pub fn get_listing(&self, listing_id: Uuid) -> Result<Listing> {
        let now = self.clock.now();
        let mut listing = self
            .listings
            .get_mut(listing_id)
            .ok_or_else(|| Error::NotFound(format!("listing {listing_id}")))?;
        listing.refresh_expiry(now);
        listing.views += 1;
        Ok(listing.clone())
    }

    /// Browse active listings
    pub fn list_listings(&self, filter: &ListingFilter) -> Vec<Listing> {
        self.sweep_expiry();
        self.listings.browse(filter)
    }

    /// Search active listings
    pub fn search(&self, query: &str, filter: &ListingFilter) -> Vec<Listing> {
        self.sweep_expiry();
        self.listings.search(query, filter)
    }

    /// The seller's own listings
    pub fn my_listings(&self, seller: &UserId, status: Option<ListingStatus>) -> Vec<Listing> {
        self.sweep_expiry();
        self.listings.by_seller(seller, status)
    }

    /// Listings the user has purchased
    pub fn my_purchases(&self, buyer: &UserId) -> Vec<Listing> {
        self.listings.by_buyer(buyer)
    }

    // Lazy expiry over the whole store; browsing paths call this so expired
    // listings are never served as active.
    fn sweep_expiry(&self) {
        let now = self.clock.now();
        for id in self.listings.ids() {
            if let Some(mut listing) = self.listings.get_mut(id) {
                listing.refresh_expiry(now);
            }
        }
    }

    // Reputation is the mean rating and positive ratio over all of the
    // seller's rated listings, recomputed from scratch on every rating event.
    fn recompute_seller_reputation(&self, seller: &UserId) {
        let ratings = self.listings.seller_ratings(seller);
        if ratings.is_empty() {
            return;
        }

        let total = ratings.len() as u32;
        let sum: u32 = ratings.iter().map(|r| u32::from(r.score)).sum();
        let positive = ratings.iter().filter(|r| r.score >= 4).count() as u32;
        let reputation = Reputation {
            rating: f64::from(sum) / f64::from(total),
            review_count: total,
            positive_reviews: positive,
        };

        self.ledger.profiles().update(seller, |p| {
            p.reputation = reputation;
        });
    }
}
