//! GiftRail Card Ledger
//!
//! Owns the prepaid-card asset lifecycle and its remaining-value accounting,
//! plus the shared domain types, stores, and clock the other GiftRail crates
//! build on.
//!
//! # Invariants
//!
//! - `0 <= remaining_value <= denomination` after any conversion sequence
//! - A card flips to `Used` exactly when a conversion drains it to zero
//! - Expiry is observed lazily on any read/mutate path and is irreversible
//! - A listed card has exactly one open listing and cannot be deleted
//! - Card codes are unique system-wide via content hash

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod clock;
pub mod error;
pub mod ledger;
pub mod store;
pub mod types;

// Re-exports
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Error, Result};
pub use ledger::{CardLedger, NewCard, PortfolioStats};
pub use store::{CardStore, ProfileStore, TransactionStore};
pub use types::{
    hash_card_code, Brand, Card, CardSource, CardStatus, ChainNetwork, ChainRecord, Conversion,
    Currency, Reputation, Transaction, TransactionEvent, TxKind, TxStatus, UserId, UserProfile,
    VerificationMethod,
};
