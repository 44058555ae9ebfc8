//! Exchange-rate provider
//!
//! Fetches USD prices for the fixed coin set from the configured provider,
//! cached process-wide for five minutes. When the upstream errors the last
//! good value is served instead, however stale; that recovery is logged, not
//! silent.

use crate::clients::cache::TtlCache;
use crate::error::{Error, Result};
use card_ledger::Clock;
use chrono::{DateTime, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

const RATES_KEY: &str = "exchange_rates";

/// USD prices for the supported coin set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeRates {
    /// Bitcoin price in USD
    pub bitcoin: Decimal,

    /// Ethereum price in USD
    pub ethereum: Decimal,

    /// Solana price in USD
    pub solana: Decimal,

    /// When the rates were fetched
    pub timestamp: DateTime<Utc>,
}

impl ExchangeRates {
    /// Rate for a coin by name
    pub fn rate_for(&self, coin: &str) -> Option<Decimal> {
        match coin {
            "bitcoin" => Some(self.bitcoin),
            "ethereum" => Some(self.ethereum),
            "solana" => Some(self.solana),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CoinPrice {
    usd: f64,
}

/// Exchange-rate provider with the process-wide TTL cache
pub struct RateProvider {
    http: reqwest::Client,
    base_url: String,
    cache: TtlCache<&'static str, ExchangeRates>,
    clock: Arc<dyn Clock>,
}

impl RateProvider {
    /// Create a provider; `ttl_secs` bounds cache freshness
    pub fn new(
        http: reqwest::Client,
        base_url: String,
        ttl_secs: i64,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            http,
            base_url,
            cache: TtlCache::new(ttl_secs, clock.clone()),
            clock,
        }
    }

    /// Current rates, from cache when fresh. Upstream failure falls back to
    /// the last good value; with no cached value at all it surfaces as an
    /// upstream error.
    pub async fn get_rates(&self) -> Result<ExchangeRates> {
        if let Some(rates) = self.cache.fresh(&RATES_KEY) {
            return Ok(rates);
        }

        match self.fetch().await {
            Ok(rates) => {
                self.cache.put(RATES_KEY, rates.clone());
                Ok(rates)
            }
            Err(e) => {
                if let Some(stale) = self.cache.any(&RATES_KEY) {
                    tracing::warn!(error = %e, "rate fetch failed, serving stale cache");
                    Ok(stale)
                } else {
                    tracing::error!(error = %e, "rate fetch failed with no cached fallback");
                    Err(Error::Upstream("unable to fetch exchange rates".into()))
                }
            }
        }
    }

    async fn fetch(&self) -> std::result::Result<ExchangeRates, reqwest::Error> {
        let url = format!("{}/simple/price", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[
                ("ids", "bitcoin,ethereum,solana"),
                ("vs_currencies", "usd"),
            ])
            .send()
            .await?
            .error_for_status()?;

        let prices: HashMap<String, CoinPrice> = response.json().await?;
        Ok(parse_rates(&prices, self.clock.now()))
    }
}

fn parse_rates(prices: &HashMap<String, CoinPrice>, now: DateTime<Utc>) -> ExchangeRates {
    let price = |coin: &str| {
        prices
            .get(coin)
            .and_then(|p| Decimal::from_f64(p.usd))
            .unwrap_or(Decimal::ZERO)
    };
    ExchangeRates {
        bitcoin: price("bitcoin"),
        ethereum: price("ethereum"),
        solana: price("solana"),
        timestamp: now,
    }
}
