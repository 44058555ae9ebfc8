//! GiftRail Commission Engine
//!
//! Tiered referral commissions over completed-transaction events, plus the
//! multi-row withdrawal distribution.
//!
//! # Invariants
//!
//! - `total_earned - total_withdrawn >= 0` on every row, always
//! - A user is referred at most once
//! - Tier is a monotone non-decreasing function of the referral count
//! - A withdrawal distributes exactly the requested amount, oldest row first,
//!   and lands in full or not at all

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod engine;
pub mod error;
pub mod store;
pub mod types;

// Re-exports
pub use engine::{
    CommissionConfig, CommissionEngine, EarningsRow, ReferralStats, WithdrawalReceipt,
    WithdrawalSplit,
};
pub use error::{Error, Result};
pub use store::ReferralStore;
pub use types::{Referral, ReferralStatus, Tier, TierConfig, WithdrawalStatus};
