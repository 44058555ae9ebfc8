//! Error types for the card ledger

use rust_decimal::Decimal;
use thiserror::Error;

/// Result type for card ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Card ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or malformed input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Entity not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller is not the owner of the entity
    #[error("Not authorized: {0}")]
    Unauthorized(String),

    /// Operation conflicts with current state (already listed, already claimed, ...)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Card code content-hash already registered (codes are unique system-wide)
    #[error("This card code has already been registered")]
    DuplicateCode,

    /// Conversion amount exceeds the card's remaining value
    #[error("Insufficient value: requested {requested}, remaining {remaining}")]
    InsufficientValue {
        /// Amount the caller asked to convert
        requested: Decimal,
        /// Value actually left on the card
        remaining: Decimal,
    },

    /// Entity is not in a state that permits the operation
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Validation(msg)
    }
}
