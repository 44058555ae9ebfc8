//! Commission accrual and withdrawal distribution
//!
//! Consumes completed-transaction events, accrues tiered commission to the
//! transacting user's referrer, and pays referrers out by splitting a
//! withdrawal across their referral rows in creation order.

use crate::{
    error::{Error, Result},
    store::ReferralStore,
    types::{
        CommissionLedger, Contribution, Referral, ReferralMetrics, ReferralStatus, SignupBonus,
        Tier, WithdrawalEntry, WithdrawalStatus,
    },
};
use card_ledger::{
    Clock, Currency, ProfileStore, Transaction, TransactionEvent, TransactionStore, TxKind,
    TxStatus, UserId,
};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use uuid::Uuid;

/// Commission engine tuning
#[derive(Debug, Clone)]
pub struct CommissionConfig {
    /// One-time bonus credited to a referred user on claim
    pub signup_bonus: Decimal,
}

impl Default for CommissionConfig {
    fn default() -> Self {
        Self {
            signup_bonus: dec!(10),
        }
    }
}

/// One row's share of a completed withdrawal
#[derive(Debug, Clone, Serialize)]
pub struct WithdrawalSplit {
    /// Row the share was taken from
    pub referral_id: Uuid,

    /// Amount taken
    pub amount: Decimal,
}

/// Result of a withdrawal request
#[derive(Debug, Clone, Serialize)]
pub struct WithdrawalReceipt {
    /// Shared withdrawal ID across all touched rows
    pub withdrawal_id: Uuid,

    /// Total amount withdrawn (equals the request exactly)
    pub amount: Decimal,

    /// Payout method
    pub method: String,

    /// Payout status
    pub status: WithdrawalStatus,

    /// Per-row distribution, in the order it was applied
    pub splits: Vec<WithdrawalSplit>,
}

/// Aggregate referral statistics for a referrer
#[derive(Debug, Clone, Serialize)]
pub struct ReferralStats {
    /// Total referral rows
    pub total_referrals: u32,

    /// Rows currently active
    pub active_referrals: u32,

    /// Lifetime commission earned across rows
    pub total_earned: Decimal,

    /// Lifetime commission withdrawn across rows
    pub total_withdrawn: Decimal,

    /// Commission pending payout
    pub pending_amount: Decimal,

    /// Commission-bearing transaction volume
    pub total_volume: Decimal,

    /// Current tier from the referral count
    pub tier: Tier,

    /// Commission rate for the current tier, percent
    pub commission_rate: Decimal,
}

/// Per-row earnings view for a referrer
#[derive(Debug, Clone, Serialize)]
pub struct EarningsRow {
    /// Referral row
    pub referral_id: Uuid,

    /// The referred user
    pub referred_user: UserId,

    /// Row status
    pub status: ReferralStatus,

    /// Lifetime earned on this row
    pub total_earned: Decimal,

    /// Lifetime withdrawn from this row
    pub total_withdrawn: Decimal,

    /// Pending on this row
    pub pending_amount: Decimal,

    /// When the referred user signed up
    pub referred_at: chrono::DateTime<chrono::Utc>,
}

/// Referral tier computation, commission accrual, and withdrawal distribution
pub struct CommissionEngine {
    referrals: Arc<ReferralStore>,
    profiles: Arc<ProfileStore>,
    transactions: Arc<TransactionStore>,
    clock: Arc<dyn Clock>,
    config: CommissionConfig,
    // Serializes withdrawals so the plan-then-apply distribution is atomic
    // against concurrent withdrawals.
    withdraw_lock: Mutex<()>,
}

impl CommissionEngine {
    /// Create an engine over shared stores
    pub fn new(
        referrals: Arc<ReferralStore>,
        profiles: Arc<ProfileStore>,
        transactions: Arc<TransactionStore>,
        clock: Arc<dyn Clock>,
        config: CommissionConfig,
    ) -> Self {
        Self {
            referrals,
            profiles,
            transactions,
            clock,
            config,
            withdraw_lock: Mutex::new(()),
        }
    }

    /// Shared referral store
    pub fn referrals(&self) -> &Arc<ReferralStore> {
        &self.referrals
    }

    /// Register a referral: `referred_user` signed up with `referrer`'s code.
    /// A user is referred at most once.
    pub fn create_referral(
        &self,
        referrer: &UserId,
        referred_user: &UserId,
        code: &str,
    ) -> Result<Referral> {
        if referrer == referred_user {
            return Err(Error::Validation("users cannot refer themselves".into()));
        }
        if code.trim().is_empty() {
            return Err(Error::Validation("referral code is required".into()));
        }

        let now = self.clock.now();
        let referral = Referral {
            id: Uuid::new_v4(),
            referrer: referrer.clone(),
            referred_user: referred_user.clone(),
            code: code.to_string(),
            status: ReferralStatus::Pending,
            signup_bonus: SignupBonus {
                amount: self.config.signup_bonus,
                claimed: false,
                claimed_at: None,
            },
            commission: CommissionLedger {
                rate: Tier::Bronze.config().commission_rate,
                total_earned: Decimal::ZERO,
                total_withdrawn: Decimal::ZERO,
                pending_amount: Decimal::ZERO,
            },
            tier: Tier::Bronze,
            tier_multiplier: Tier::Bronze.config().multiplier,
            contributions: vec![],
            withdrawals: vec![],
            metrics: ReferralMetrics {
                total_referrals: 1,
                active_referrals: 0,
                total_transaction_volume: Decimal::ZERO,
            },
            referred_at: now,
            activated_at: None,
            created_at: now,
            updated_at: now,
        };

        if !self.referrals.insert(referral.clone()) {
            return Err(Error::Conflict("user has already been referred".into()));
        }

        // The tier formula reads the per-row count, so every row carries the
        // true referrer-wide count.
        self.refresh_referrer_metrics(referrer);

        tracing::info!(%referrer, referred = %referred_user, "referral registered");
        self.referrals
            .get(referral.id)
            .ok_or_else(|| Error::NotFound(format!("referral {}", referral.id)))
    }

    /// Accrue commission for a completed transaction of `referred_user`.
    ///
    /// A missing or inactive referral is a no-op, not an error: most users
    /// were never referred.
    pub fn process_commission(
        &self,
        referred_user: &UserId,
        amount: Decimal,
        transaction_id: Uuid,
    ) -> Result<Option<Decimal>> {
        if amount <= Decimal::ZERO {
            return Err(Error::Validation(
                "transaction amount must be positive".into(),
            ));
        }

        let Some(row_id) = self.referrals.find_by_referred(referred_user) else {
            return Ok(None);
        };

        let now = self.clock.now();
        let (referrer, commission) = {
            let Some(mut row) = self.referrals.get_mut(row_id) else {
                return Ok(None);
            };
            if row.status != ReferralStatus::Active {
                return Ok(None);
            }

            let tier = Tier::from_count(row.metrics.total_referrals);
            let config = tier.config();
            let commission = amount * config.commission_rate / Decimal::from(100);

            row.commission.rate = config.commission_rate;
            row.commission.total_earned += commission;
            row.commission.pending_amount += commission;
            row.metrics.total_transaction_volume += amount;
            row.contributions.push(Contribution {
                transaction_id,
                amount,
                commission,
                date: now,
            });
            if tier != row.tier {
                row.tier = tier;
                row.tier_multiplier = config.multiplier;
            }
            row.updated_at = now;
            (row.referrer.clone(), commission)
        };

        self.profiles.update(&referrer, |p| {
            p.referral_earnings += commission;
        });

        tracing::info!(%referrer, %commission, "commission accrued");
        Ok(Some(commission))
    }

    /// Claim the one-time signup bonus; activates the referral.
    pub fn claim_signup_bonus(&self, referred_user: &UserId) -> Result<Decimal> {
        let row_id = self
            .referrals
            .find_by_referred(referred_user)
            .ok_or_else(|| Error::NotFound("no referral found for this user".into()))?;

        let now = self.clock.now();
        let (referrer, bonus) = {
            let mut row = self
                .referrals
                .get_mut(row_id)
                .ok_or_else(|| Error::NotFound("no referral found for this user".into()))?;
            if row.signup_bonus.claimed {
                return Err(Error::Conflict("signup bonus already claimed".into()));
            }
            row.signup_bonus.claimed = true;
            row.signup_bonus.claimed_at = Some(now);
            row.status = ReferralStatus::Active;
            row.activated_at = Some(now);
            row.updated_at = now;
            (row.referrer.clone(), row.signup_bonus.amount)
        };

        self.profiles.update(referred_user, |p| {
            p.balance += bonus;
        });
        self.refresh_referrer_metrics(&referrer);

        tracing::info!(user = %referred_user, %bonus, "signup bonus claimed");
        Ok(bonus)
    }

    /// Withdraw earnings, distributed greedily across the referrer's rows in
    /// creation order.
    ///
    /// The distribution is planned and validated against a snapshot before
    /// any row is touched, then applied under the withdrawal lock: it either
    /// lands in full or not at all, and no row is ever overdrawn.
    pub fn withdraw(
        &self,
        referrer: &UserId,
        amount: Decimal,
        method: &str,
    ) -> Result<WithdrawalReceipt> {
        if amount <= Decimal::ZERO {
            return Err(Error::Validation("please provide a valid amount".into()));
        }

        let _guard = self.withdraw_lock.lock();
        let now = self.clock.now();
        let rows = self.referrals.by_referrer(referrer);

        let total_available: Decimal = rows.iter().map(|r| r.available_balance()).sum();
        if amount > total_available {
            return Err(Error::InsufficientBalance {
                requested: amount,
                available: total_available,
            });
        }

        // Plan the split over the snapshot.
        let mut splits = Vec::new();
        let mut remaining = amount;
        for row in &rows {
            if remaining == Decimal::ZERO {
                break;
            }
            let available = row.available_balance();
            if available <= Decimal::ZERO {
                continue;
            }
            let take = available.min(remaining);
            splits.push(WithdrawalSplit {
                referral_id: row.id,
                amount: take,
            });
            remaining -= take;
        }
        debug_assert_eq!(remaining, Decimal::ZERO);

        // Apply. Accruals only grow a row's balance, so the validated plan
        // cannot overdraw.
        let withdrawal_id = Uuid::new_v4();
        let method = if method.trim().is_empty() {
            "bank_transfer"
        } else {
            method
        };
        for split in &splits {
            if let Some(mut row) = self.referrals.get_mut(split.referral_id) {
                row.commission.total_withdrawn += split.amount;
                row.commission.pending_amount =
                    (row.commission.pending_amount - split.amount).max(Decimal::ZERO);
                row.withdrawals.push(WithdrawalEntry {
                    withdrawal_id,
                    amount: split.amount,
                    method: method.to_string(),
                    status: WithdrawalStatus::Pending,
                    date: now,
                });
                row.updated_at = now;
            }
        }

        self.transactions.insert(Transaction {
            id: withdrawal_id,
            kind: TxKind::Withdrawal,
            status: TxStatus::Pending,
            initiator: referrer.clone(),
            recipient: None,
            amount,
            currency: Currency::USD,
            fee: Decimal::ZERO,
            net_amount: amount,
            card_id: None,
            listing_id: None,
            conversion: None,
            chain: None,
            description: format!("Referral earnings withdrawal via {method}"),
            initiated_at: now,
            completed_at: None,
        });

        tracing::info!(%referrer, %amount, %withdrawal_id, "withdrawal initiated");
        Ok(WithdrawalReceipt {
            withdrawal_id,
            amount,
            method: method.to_string(),
            status: WithdrawalStatus::Pending,
            splits,
        })
    }

    /// Aggregate stats for a referrer
    pub fn stats(&self, referrer: &UserId) -> ReferralStats {
        let rows = self.referrals.by_referrer(referrer);
        let total_referrals = rows.len() as u32;
        let tier = Tier::from_count(total_referrals);

        ReferralStats {
            total_referrals,
            active_referrals: rows
                .iter()
                .filter(|r| r.status == ReferralStatus::Active)
                .count() as u32,
            total_earned: rows.iter().map(|r| r.commission.total_earned).sum(),
            total_withdrawn: rows.iter().map(|r| r.commission.total_withdrawn).sum(),
            pending_amount: rows.iter().map(|r| r.commission.pending_amount).sum(),
            total_volume: rows
                .iter()
                .map(|r| r.metrics.total_transaction_volume)
                .sum(),
            tier,
            commission_rate: tier.config().commission_rate,
        }
    }

    /// Per-row earnings for a referrer, newest first
    pub fn earnings(&self, referrer: &UserId) -> Vec<EarningsRow> {
        let mut rows = self.referrals.by_referrer(referrer);
        rows.reverse();
        rows.into_iter()
            .map(|r| EarningsRow {
                referral_id: r.id,
                referred_user: r.referred_user.clone(),
                status: r.status,
                total_earned: r.commission.total_earned,
                total_withdrawn: r.commission.total_withdrawn,
                pending_amount: r.commission.pending_amount,
                referred_at: r.referred_at,
            })
            .collect()
    }

    /// The referrer's rows, newest first
    pub fn referrals_of(&self, referrer: &UserId) -> Vec<Referral> {
        let mut rows = self.referrals.by_referrer(referrer);
        rows.reverse();
        rows
    }

    /// Drain completed-transaction events and accrue commission for each
    pub async fn run_event_loop(
        self: Arc<Self>,
        mut receiver: UnboundedReceiver<TransactionEvent>,
    ) {
        while let Some(event) = receiver.recv().await {
            match self.process_commission(&event.user, event.amount, event.transaction_id) {
                Ok(Some(commission)) => {
                    tracing::debug!(user = %event.user, %commission, "event applied");
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(user = %event.user, error = %e, "commission event failed");
                }
            }
        }
    }

    // Every row of a referrer carries the referrer-wide counts the tier
    // formula reads.
    fn refresh_referrer_metrics(&self, referrer: &UserId) {
        let rows = self.referrals.by_referrer(referrer);
        let total = rows.len() as u32;
        let active = rows
            .iter()
            .filter(|r| r.status == ReferralStatus::Active)
            .count() as u32;
        for row in rows {
            if let Some(mut row) = self.referrals.get_mut(row.id) {
                row.metrics.total_referrals = total;
                row.metrics.active_referrals = active;
            }
        }
    }
}
