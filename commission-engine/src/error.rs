//! Error types for the commission engine

use rust_decimal::Decimal;
use thiserror::Error;

/// Result type for commission operations
pub type Result<T> = std::result::Result<T, Error>;

/// Commission errors
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or malformed input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Referral not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Operation conflicts with current state (already referred, already
    /// claimed, ...)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Withdrawal exceeds the referrer's available balance
    #[error("Insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance {
        /// Amount requested
        requested: Decimal,
        /// Sum of available balances across the referrer's rows
        available: Decimal,
    },
}
