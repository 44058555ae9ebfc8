//! Listing store
//!
//! Concurrent map of listings. Entry guards are the mutual-exclusion unit:
//! purchase and confirmation on the same listing serialize on the entry, so a
//! losing concurrent purchase observes the winner's buyer and fails with a
//! conflict instead of overwriting it.

use crate::types::{Listing, ListingStatus};
use card_ledger::{Brand, UserId};
use dashmap::mapref::one::RefMut;
use dashmap::DashMap;
use rust_decimal::Decimal;
use uuid::Uuid;

/// Browse filters for listing queries
#[derive(Debug, Clone, Default)]
pub struct ListingFilter {
    /// Restrict to one brand
    pub brand: Option<Brand>,

    /// Minimum asking price
    pub min_price: Option<Decimal>,

    /// Maximum asking price
    pub max_price: Option<Decimal>,
}

/// Listing collection
pub struct ListingStore {
    listings: DashMap<Uuid, Listing>,
}

impl ListingStore {
    /// Create empty store
    pub fn new() -> Self {
        Self {
            listings: DashMap::new(),
        }
    }

    /// Insert a listing
    pub fn insert(&self, listing: Listing) {
        self.listings.insert(listing.id, listing);
    }

    /// Fetch by ID
    pub fn get(&self, id: Uuid) -> Option<Listing> {
        self.listings.get(&id).map(|l| l.clone())
    }

    /// Exclusive handle on a listing entry
    pub fn get_mut(&self, id: Uuid) -> Option<RefMut<'_, Uuid, Listing>> {
        self.listings.get_mut(&id)
    }

    /// Remove a listing
    pub fn remove(&self, id: Uuid) -> Option<Listing> {
        self.listings.remove(&id).map(|(_, l)| l)
    }

    /// IDs of every listing (for lazy-expiry sweeps during browsing)
    pub fn ids(&self) -> Vec<Uuid> {
        self.listings.iter().map(|l| l.id).collect()
    }

    /// Active listings matching `filter`, newest first
    pub fn browse(&self, filter: &ListingFilter) -> Vec<Listing> {
        let mut listings: Vec<Listing> = self
            .listings
            .iter()
            .filter(|l| {
                l.status == ListingStatus::Active
                    && !l.is_expired
                    && filter.brand.map_or(true, |b| l.brand == b)
                    && filter.min_price.map_or(true, |p| l.asking_price >= p)
                    && filter.max_price.map_or(true, |p| l.asking_price <= p)
            })
            .map(|l| l.clone())
            .collect();
        listings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        listings
    }

    /// Case-insensitive text search over title, description, and brand
    pub fn search(&self, query: &str, filter: &ListingFilter) -> Vec<Listing> {
        let needle = query.to_lowercase();
        self.browse(filter)
            .into_iter()
            .filter(|l| {
                l.title.to_lowercase().contains(&needle)
                    || l.description.to_lowercase().contains(&needle)
                    || l.brand.as_str().to_lowercase().contains(&needle)
            })
            .collect()
    }

    /// All listings by `seller`, newest first, optionally filtered by status
    pub fn by_seller(&self, seller: &UserId, status: Option<ListingStatus>) -> Vec<Listing> {
        let mut listings: Vec<Listing> = self
            .listings
            .iter()
            .filter(|l| &l.seller == seller && status.map_or(true, |s| l.status == s))
            .map(|l| l.clone())
            .collect();
        listings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        listings
    }

    /// All listings purchased by `buyer`, most recent purchase first
    pub fn by_buyer(&self, buyer: &UserId) -> Vec<Listing> {
        let mut listings: Vec<Listing> = self
            .listings
            .iter()
            .filter(|l| l.sale.buyer.as_ref() == Some(buyer))
            .map(|l| l.clone())
            .collect();
        listings.sort_by(|a, b| b.sale.purchased_at.cmp(&a.sale.purchased_at));
        listings
    }

    /// Every rating entry across all of `seller`'s listings
    pub fn seller_ratings(&self, seller: &UserId) -> Vec<crate::types::RatingEntry> {
        self.listings
            .iter()
            .filter(|l| &l.seller == seller)
            .flat_map(|l| l.rating.entries.clone())
            .collect()
    }
}

impl Default for ListingStore {
    fn default() -> Self {
        Self::new()
    }
}
