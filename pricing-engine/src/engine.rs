//! Fair-value pipeline
//!
//! Six multiplicative stages applied to the card's denomination:
//! brand demand, expiration proximity, card age, seller reputation, market
//! supply/demand, verification status. Each stage records an adjustment;
//! confidence drops when many factors apply or several move the price hard.

use crate::types::{Adjustment, MarketData, Quote};
use card_ledger::{Brand, Card, Reputation};
use chrono::{DateTime, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};

/// Compute the fair resale value of `card` at `now`.
///
/// Pure: identical card/reputation/market snapshots and `now` always yield an
/// identical quote.
pub fn fair_value(
    card: &Card,
    seller: &Reputation,
    market: &MarketData,
    now: DateTime<Utc>,
) -> Quote {
    let denomination = card.denomination.to_f64().unwrap_or(0.0);
    let mut price = denomination;
    let mut adjustments = Vec::with_capacity(6);

    // 1. Brand demand
    let brand = brand_multiplier(card.brand);
    price *= brand;
    adjustments.push(Adjustment {
        factor: "Brand Demand".to_string(),
        multiplier: brand,
        impact_pct: (brand - 1.0) * 100.0,
    });

    // 2. Expiration proximity
    let expiration_discount = expiration_discount(card, now);
    price *= 1.0 - expiration_discount;
    adjustments.push(Adjustment {
        factor: "Expiration Proximity".to_string(),
        multiplier: 1.0 - expiration_discount,
        impact_pct: -expiration_discount * 100.0,
    });

    // 3. Card age (newer cards are worth more)
    let age_bonus = age_bonus(card.age_in_days(now));
    price *= 1.0 + age_bonus;
    adjustments.push(Adjustment {
        factor: "Card Age".to_string(),
        multiplier: 1.0 + age_bonus,
        impact_pct: age_bonus * 100.0,
    });

    // 4. Seller reputation
    let reputation = reputation_multiplier(seller);
    price *= reputation;
    adjustments.push(Adjustment {
        factor: "Seller Reputation".to_string(),
        multiplier: reputation,
        impact_pct: (reputation - 1.0) * 100.0,
    });

    // 5. Market supply/demand
    let market_mult = market_multiplier(card.brand, market);
    price *= market_mult;
    adjustments.push(Adjustment {
        factor: "Market Conditions".to_string(),
        multiplier: market_mult,
        impact_pct: (market_mult - 1.0) * 100.0,
    });

    // 6. Verification bonus
    if card.is_verified {
        price *= 1.02;
        adjustments.push(Adjustment {
            factor: "Verification Status".to_string(),
            multiplier: 1.02,
            impact_pct: 2.0,
        });
    }

    let discount_pct = if denomination > 0.0 {
        (denomination - price) / denomination * 100.0
    } else {
        0.0
    };
    let discount_pct = round2(discount_pct);
    let confidence = confidence_score(&adjustments);

    Quote {
        base_price: card.denomination,
        fair_value: to_money(price),
        discount_pct,
        adjustments,
        confidence,
        recommendation: recommendation(discount_pct, confidence).to_string(),
    }
}

/// Brand value multipliers reflecting market demand and liquidity
fn brand_multiplier(brand: Brand) -> f64 {
    match brand {
        Brand::Amazon => 0.98,
        Brand::Apple => 0.97,
        Brand::GooglePlay => 0.96,
        Brand::Walmart => 0.95,
        Brand::Target => 0.94,
        Brand::BestBuy => 0.93,
        Brand::Starbucks => 0.92,
        Brand::Netflix => 0.91,
        Brand::Spotify => 0.90,
        Brand::Steam => 0.89,
        Brand::PlayStation => 0.88,
        Brand::Xbox => 0.87,
        Brand::Nintendo => 0.86,
        Brand::Uber => 0.85,
        Brand::DoorDash => 0.84,
        Brand::Other => 0.80,
    }
}

/// Discount for expiration proximity; an expired card prices to zero
fn expiration_discount(card: &Card, now: DateTime<Utc>) -> f64 {
    if card.is_past_expiration(now) {
        return 1.0;
    }
    let days = (card.expiration_date - now).num_days();
    if days < 30 {
        0.15
    } else if days < 90 {
        0.08
    } else if days < 180 {
        0.03
    } else {
        0.0
    }
}

/// Bonus for recently registered cards
fn age_bonus(age_in_days: i64) -> f64 {
    if age_in_days < 7 {
        0.05
    } else if age_in_days < 30 {
        0.03
    } else if age_in_days < 90 {
        0.01
    } else {
        0.0
    }
}

/// Reputation multiplier, clamped to [0.90, 1.10]. Unrated sellers price at
/// the neutral midpoint.
fn reputation_multiplier(rep: &Reputation) -> f64 {
    let rating = if rep.review_count == 0 { 3.0 } else { rep.rating };
    let mut multiplier = 0.95 + (rating / 5.0) * 0.10;

    if rep.review_count > 50 {
        multiplier += 0.02;
    } else if rep.review_count > 20 {
        multiplier += 0.01;
    }

    if rep.review_count > 0 && rep.positive_ratio() < 0.80 {
        multiplier -= 0.05;
    }

    multiplier.clamp(0.90, 1.10)
}

/// Market multiplier from the brand's supply/demand ratio
fn market_multiplier(brand: Brand, market: &MarketData) -> f64 {
    if market.supply_demand_ratio.is_empty() {
        return 1.0;
    }
    let ratio = market.supply_demand_ratio.get(&brand).copied().unwrap_or(1.0);

    if ratio < 0.5 {
        1.05
    } else if ratio < 0.8 {
        1.02
    } else if ratio > 2.0 {
        0.95
    } else if ratio > 1.5 {
        0.98
    } else {
        1.0
    }
}

/// Confidence starts at 0.85 and drops when many factors apply or several
/// move the price by more than 10%
fn confidence_score(adjustments: &[Adjustment]) -> f64 {
    let mut confidence: f64 = 0.85;

    if adjustments.len() > 5 {
        confidence -= 0.05;
    }

    let large = adjustments
        .iter()
        .filter(|a| a.impact_pct.abs() > 10.0)
        .count();
    if large > 2 {
        confidence -= 0.10;
    }

    confidence.clamp(0.5, 1.0)
}

fn recommendation(discount_pct: f64, confidence: f64) -> &'static str {
    if confidence < 0.6 {
        "Low confidence - Consider manual review"
    } else if discount_pct > 20.0 {
        "Significant discount - May indicate risk factors"
    } else if discount_pct > 10.0 {
        "Moderate discount - Fair market value"
    } else if discount_pct > 5.0 {
        "Slight discount - Good value"
    } else {
        "Premium pricing - High demand item"
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn to_money(value: f64) -> Decimal {
    Decimal::from_f64(value)
        .unwrap_or(Decimal::ZERO)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use card_ledger::{hash_card_code, CardSource, CardStatus, Currency, UserId};
    use chrono::Duration;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn card(brand: Brand, denomination: Decimal, now: DateTime<Utc>) -> Card {
        Card {
            id: Uuid::new_v4(),
            owner: UserId::new("seller"),
            brand,
            denomination,
            currency: Currency::USD,
            code_hash: hash_card_code("PRICE-TEST"),
            status: CardStatus::Active,
            is_verified: false,
            verification_method: None,
            verified_at: None,
            expiration_date: now + Duration::days(365),
            is_expired: false,
            is_listed: false,
            listing_id: None,
            conversions: vec![],
            dispute: None,
            source: CardSource::Purchased,
            notes: None,
            created_at: now - Duration::days(100),
            updated_at: now,
        }
    }

    fn unrated() -> Reputation {
        Reputation::default()
    }

    #[test]
    fn amazon_far_from_expiry_prices_near_face() {
        let now = Utc::now();
        let card = card(Brand::Amazon, dec!(100), now);
        let quote = fair_value(&card, &unrated(), &MarketData::default(), now);

        // 100 * 0.98 (brand) * 1.01 (neutral reputation) = 98.98
        assert_eq!(quote.fair_value, dec!(98.98));
        assert_eq!(quote.adjustments.len(), 5);
    }

    #[test]
    fn expired_card_prices_to_zero() {
        let now = Utc::now();
        let mut card = card(Brand::Amazon, dec!(100), now);
        card.expiration_date = now - Duration::days(1);
        let quote = fair_value(&card, &unrated(), &MarketData::default(), now);

        assert_eq!(quote.fair_value, Decimal::ZERO);
        assert_eq!(quote.discount_pct, 100.0);
    }

    #[test]
    fn expiration_tiers_apply() {
        let now = Utc::now();
        for (days, discount) in [(20, 0.15), (60, 0.08), (120, 0.03), (365, 0.0)] {
            let mut c = card(Brand::Amazon, dec!(100), now);
            c.expiration_date = now + Duration::days(days);
            assert_eq!(expiration_discount(&c, now), discount, "days = {days}");
        }
    }

    #[test]
    fn age_bonus_tiers_apply() {
        assert_eq!(age_bonus(3), 0.05);
        assert_eq!(age_bonus(15), 0.03);
        assert_eq!(age_bonus(45), 0.01);
        assert_eq!(age_bonus(200), 0.0);
    }

    #[test]
    fn reputation_boosts_and_penalizes() {
        // High rating, many reviews, strong positive ratio
        let good = Reputation {
            rating: 5.0,
            review_count: 60,
            positive_reviews: 58,
        };
        assert!((reputation_multiplier(&good) - 1.07).abs() < 1e-12);

        // Low positive ratio costs 5 points
        let shaky = Reputation {
            rating: 4.0,
            review_count: 30,
            positive_reviews: 20,
        };
        let expected = 0.95 + (4.0 / 5.0) * 0.10 + 0.01 - 0.05;
        assert!((reputation_multiplier(&shaky) - expected).abs() < 1e-12);

        // Unrated sellers get the neutral midpoint
        assert!((reputation_multiplier(&unrated()) - 1.01).abs() < 1e-12);
    }

    #[test]
    fn market_multiplier_tiers_apply() {
        let mut market = MarketData::default();
        market.supply_demand_ratio.insert(Brand::Steam, 0.4);
        assert_eq!(market_multiplier(Brand::Steam, &market), 1.05);

        market.supply_demand_ratio.insert(Brand::Steam, 2.5);
        assert_eq!(market_multiplier(Brand::Steam, &market), 0.95);

        // Brand not present in a non-empty map is balanced
        assert_eq!(market_multiplier(Brand::Xbox, &market), 1.0);

        // No market data at all is balanced
        assert_eq!(market_multiplier(Brand::Steam, &MarketData::default()), 1.0);
    }

    #[test]
    fn verification_adds_sixth_factor_and_lowers_confidence() {
        let now = Utc::now();
        let mut c = card(Brand::Amazon, dec!(100), now);
        c.is_verified = true;
        let quote = fair_value(&c, &unrated(), &MarketData::default(), now);

        assert_eq!(quote.adjustments.len(), 6);
        assert_eq!(quote.confidence, 0.80);
    }

    #[test]
    fn deterministic_for_identical_inputs() {
        let now = Utc::now();
        let c = card(Brand::Nintendo, dec!(250), now);
        let rep = Reputation {
            rating: 4.2,
            review_count: 25,
            positive_reviews: 22,
        };
        let mut market = MarketData::default();
        market.supply_demand_ratio.insert(Brand::Nintendo, 1.7);

        let a = fair_value(&c, &rep, &market, now);
        let b = fair_value(&c, &rep, &market, now);

        assert_eq!(a.fair_value, b.fair_value);
        assert_eq!(a.discount_pct, b.discount_pct);
        assert_eq!(a.confidence, b.confidence);
        assert_eq!(a.recommendation, b.recommendation);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }
}
