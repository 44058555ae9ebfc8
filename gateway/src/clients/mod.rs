//! External collaborator clients
//!
//! Typed wrappers over the exchange-rate provider and the blockchain
//! verifiers, each behind a process-wide TTL cache with stale fallback so an
//! upstream outage never fails a caller that has seen a good value before.

pub mod cache;
pub mod rates;
pub mod verifier;

pub use cache::TtlCache;
pub use rates::{ExchangeRates, RateProvider};
pub use verifier::{ChainVerifier, VerificationReport};
