//! Referral, tier, and commission types

use card_ledger::UserId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Referral tier, a bracket over the referrer's referral count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// 0-10 referrals
    Bronze,
    /// 11-50 referrals
    Silver,
    /// 51-100 referrals
    Gold,
    /// 101+ referrals
    Platinum,
}

/// Per-tier commission configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TierConfig {
    /// Lower referral-count bound, inclusive
    pub min_referrals: u32,

    /// Earnings multiplier badge
    pub multiplier: f64,

    /// Commission rate in percent
    pub commission_rate: Decimal,
}

impl Tier {
    /// Tier for a referral count; the lower bound is inclusive
    pub fn from_count(total_referrals: u32) -> Self {
        if total_referrals >= 101 {
            Tier::Platinum
        } else if total_referrals >= 51 {
            Tier::Gold
        } else if total_referrals >= 11 {
            Tier::Silver
        } else {
            Tier::Bronze
        }
    }

    /// Commission configuration for this tier
    pub fn config(&self) -> TierConfig {
        match self {
            Tier::Bronze => TierConfig {
                min_referrals: 0,
                multiplier: 1.0,
                commission_rate: dec!(5),
            },
            Tier::Silver => TierConfig {
                min_referrals: 11,
                multiplier: 1.4,
                commission_rate: dec!(7),
            },
            Tier::Gold => TierConfig {
                min_referrals: 51,
                multiplier: 2.0,
                commission_rate: dec!(10),
            },
            Tier::Platinum => TierConfig {
                min_referrals: 101,
                multiplier: 2.5,
                commission_rate: dec!(12),
            },
        }
    }
}

/// Referral lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferralStatus {
    /// Signed up, bonus not yet claimed
    Pending,
    /// Earning commission
    Active,
    /// Closed out
    Completed,
    /// Cancelled
    Cancelled,
}

/// One-time signup bonus for the referred user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignupBonus {
    /// Bonus amount
    pub amount: Decimal,

    /// Whether it has been claimed
    pub claimed: bool,

    /// When it was claimed
    pub claimed_at: Option<DateTime<Utc>>,
}

/// Commission accumulator for one referral row.
///
/// Invariant: `total_earned - total_withdrawn >= 0` always; withdrawals are
/// planned against this bound before any row is touched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommissionLedger {
    /// Rate in percent at the last accrual
    pub rate: Decimal,

    /// Lifetime commission earned
    pub total_earned: Decimal,

    /// Lifetime commission withdrawn
    pub total_withdrawn: Decimal,

    /// Earned but not yet paid out
    pub pending_amount: Decimal,
}

/// One commission-bearing transaction's contribution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contribution {
    /// Source transaction
    pub transaction_id: Uuid,

    /// Transaction amount
    pub amount: Decimal,

    /// Commission accrued from it
    pub commission: Decimal,

    /// When it was applied
    pub date: DateTime<Utc>,
}

/// Withdrawal state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum WithdrawalStatus {
    Pending,
    Completed,
    Failed,
}

/// One row's share of a withdrawal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalEntry {
    /// Shared ID across every row the withdrawal touched
    pub withdrawal_id: Uuid,

    /// Amount taken from this row
    pub amount: Decimal,

    /// Payout method
    pub method: String,

    /// Payout status
    pub status: WithdrawalStatus,

    /// When the withdrawal was initiated
    pub date: DateTime<Utc>,
}

/// Referrer-wide performance metrics, denormalized onto each row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferralMetrics {
    /// The referrer's total referral count
    pub total_referrals: u32,

    /// The referrer's active referral count
    pub active_referrals: u32,

    /// Volume of commission-bearing transactions through this row
    pub total_transaction_volume: Decimal,
}

/// A referral relationship; one row per referred user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Referral {
    /// Unique referral ID
    pub id: Uuid,

    /// Referring user
    pub referrer: UserId,

    /// Referred user; a user is referred at most once
    pub referred_user: UserId,

    /// Referral code used at signup
    pub code: String,

    /// Lifecycle status
    pub status: ReferralStatus,

    /// Signup bonus state
    pub signup_bonus: SignupBonus,

    /// Commission accumulator
    pub commission: CommissionLedger,

    /// Current tier
    pub tier: Tier,

    /// Current tier multiplier
    pub tier_multiplier: f64,

    /// Commission-bearing transactions applied to this row
    pub contributions: Vec<Contribution>,

    /// Withdrawal splits taken from this row
    pub withdrawals: Vec<WithdrawalEntry>,

    /// Referrer-wide metrics
    pub metrics: ReferralMetrics,

    /// When the referred user signed up
    pub referred_at: DateTime<Utc>,

    /// When the referral was activated (bonus claim)
    pub activated_at: Option<DateTime<Utc>>,

    /// Created timestamp
    pub created_at: DateTime<Utc>,

    /// Last updated timestamp
    pub updated_at: DateTime<Utc>,
}

impl Referral {
    /// Commission earned and not yet withdrawn
    pub fn available_balance(&self) -> Decimal {
        self.commission.total_earned - self.commission.total_withdrawn
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_boundaries_are_lower_bound_inclusive() {
        assert_eq!(Tier::from_count(0), Tier::Bronze);
        assert_eq!(Tier::from_count(10), Tier::Bronze);
        assert_eq!(Tier::from_count(11), Tier::Silver);
        assert_eq!(Tier::from_count(12), Tier::Silver);
        assert_eq!(Tier::from_count(50), Tier::Silver);
        assert_eq!(Tier::from_count(51), Tier::Gold);
        assert_eq!(Tier::from_count(100), Tier::Gold);
        assert_eq!(Tier::from_count(101), Tier::Platinum);
    }

    #[test]
    fn tier_rates_match_the_bracket_table() {
        assert_eq!(Tier::Bronze.config().commission_rate, dec!(5));
        assert_eq!(Tier::Silver.config().commission_rate, dec!(7));
        assert_eq!(Tier::Gold.config().commission_rate, dec!(10));
        assert_eq!(Tier::Platinum.config().commission_rate, dec!(12));
    }
}
