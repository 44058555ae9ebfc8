//! Error types for the escrow marketplace

use thiserror::Error;

/// Result type for marketplace operations
pub type Result<T> = std::result::Result<T, Error>;

/// Marketplace errors
#[derive(Error, Debug)]
pub enum Error {
    /// Card ledger error (listing flag flips, ownership checks)
    #[error("Ledger error: {0}")]
    Ledger(#[from] card_ledger::Error),

    /// Missing or malformed input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Listing not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller is not the buyer/seller the operation requires
    #[error("Not authorized: {0}")]
    Unauthorized(String),

    /// Operation conflicts with current state (already purchased, already
    /// rated, already favorited, ...)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Buyers cannot purchase their own listing
    #[error("Cannot purchase your own listing")]
    SelfPurchase,

    /// Listing or escrow is not in a state that permits the operation
    #[error("Invalid state: {0}")]
    InvalidState(String),
}
