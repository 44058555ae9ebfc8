//! Quote and market-signal types

use card_ledger::Brand;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Market supply/demand signals, supplied by the caller
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketData {
    /// Per-brand supply/demand ratio. > 1.0 means oversupplied, < 1.0 means
    /// demand exceeds supply. Missing brands are treated as balanced.
    pub supply_demand_ratio: HashMap<Brand, f64>,
}

/// One factor applied in the pricing pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Adjustment {
    /// Factor name
    pub factor: String,

    /// Multiplier applied to the running price
    pub multiplier: f64,

    /// Price impact in percent (negative lowers the price)
    pub impact_pct: f64,
}

/// Fair-value quote for a card
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    /// Face value the pipeline started from
    pub base_price: Decimal,

    /// Recommended resale value, rounded to cents
    pub fair_value: Decimal,

    /// Discount from face value in percent, rounded to 2 decimals
    pub discount_pct: f64,

    /// Factors applied, in pipeline order
    pub adjustments: Vec<Adjustment>,

    /// Confidence in the quote, clamped to [0.5, 1.0]
    pub confidence: f64,

    /// Fixed recommendation text bucketed by confidence and discount
    pub recommendation: String,
}
