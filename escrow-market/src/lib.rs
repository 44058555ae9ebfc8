//! GiftRail Escrow Marketplace
//!
//! Peer-to-peer resale of registered cards under an escrow guarantee.
//!
//! # Invariants
//!
//! - One open listing per card, enforced through the card's listed flag
//! - Escrow is `Held` only while the listing is sold and unsettled
//! - `Sold` requires a buyer; a second purchase always conflicts
//! - Ratings only after settlement, only by buyer or seller, once each
//! - Seller reputation always equals the true mean over the full history

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod error;
pub mod market;
pub mod store;
pub mod types;

// Re-exports
pub use error::{Error, Result};
pub use market::{MarketConfig, Marketplace};
pub use store::{ListingFilter, ListingStore};
pub use types::{Escrow, EscrowStatus, Listing, ListingStatus, RatingEntry, RatingSummary, SaleInfo};
