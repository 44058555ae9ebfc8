//! GiftRail Pricing Engine
//!
//! Pure fair-value computation for prepaid cards. Given a card snapshot, the
//! seller's reputation, and market supply/demand signals, produces a priced
//! quote with the applied adjustments and a confidence score.
//!
//! The engine is side-effect free and takes `now` from the caller: identical
//! inputs always produce identical output.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod engine;
pub mod types;

// Re-exports
pub use engine::fair_value;
pub use types::{Adjustment, MarketData, Quote};
