//! GiftRail API Gateway
//!
//! REST surface over the card ledger, escrow marketplace, pricing engine,
//! and commission engine, plus the typed clients for external collaborators
//! (exchange rates, blockchain verification) with their process-wide caches.

#![forbid(unsafe_code)]

pub mod auth;
pub mod clients;
pub mod config;
pub mod error;
pub mod handlers;
pub mod state;

pub use config::Config;
pub use error::{Error, Result};
pub use state::AppState;
