// src/fees/performance.rs
//
// High-water-mark performance fee. Accrued value is tracked as uncrystallized
// shares outstanding until a payout locks it in, since performance can reverse
// before then.

use super::FeeContext;
use crate::errors::{FundError, Result};
use crate::events::{Event, EventLog};
use crate::math::{self, ONE};
use crate::models::{FeeHook, FeeKind, Settlement, SettlementData, SettlementType, U256};
use crate::traits::Fee;
use log::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerformanceFee {
    rate: U256,
    period: u64,
    activated: u64,
    last_paid: u64,
    high_water_mark: U256,
    last_share_price: U256,
    aggregate_value_due: U256,
}

impl PerformanceFee {
    pub fn new(rate: u64, period: u64) -> Result<Self> {
        let rate = math::rate(rate);
        if rate.is_zero() {
            return Err(FundError::invalid("addFundSettings: feeRate must be greater than 0"));
        }
        if rate > ONE {
            return Err(FundError::invalid("addFundSettings: feeRate max exceeded"));
        }
        if period == 0 {
            return Err(FundError::invalid("addFundSettings: feePeriod must be greater than 0"));
        }
        Ok(Self {
            rate,
            period,
            activated: 0,
            last_paid: 0,
            high_water_mark: U256::ZERO,
            last_share_price: U256::ZERO,
            aggregate_value_due: U256::ZERO,
        })
    }

    pub fn rate(&self) -> U256 {
        self.rate
    }

    pub fn period(&self) -> u64 {
        self.period
    }

    pub fn activated(&self) -> u64 {
        self.activated
    }

    pub fn last_paid(&self) -> u64 {
        self.last_paid
    }

    pub fn high_water_mark(&self) -> U256 {
        self.high_water_mark
    }

    pub fn last_share_price(&self) -> U256 {
        self.last_share_price
    }

    pub fn aggregate_value_due(&self) -> U256 {
        self.aggregate_value_due
    }

    /// Value due since the last settlement, signed by direction.
    ///
    /// Only movement above the high-water mark counts, measured over the
    /// diluted supply so accrued fee shares share in further gains and losses.
    fn calc_value_due_since_last_settled(
        &self,
        next_share_price: U256,
        diluted_supply: U256,
    ) -> Result<(U256, bool)> {
        let prev_above = self.high_water_mark.max(self.last_share_price);
        let next_above = self.high_water_mark.max(next_share_price);
        let (delta, is_gain) = if next_above >= prev_above {
            (next_above - prev_above, true)
        } else {
            (prev_above - next_above, false)
        };
        let value = math::mul_div(delta, diluted_supply, ONE, "performance value change")?;
        let value_due = math::mul_div(value, self.rate, ONE, "performance value due")?;
        Ok((value_due, is_gain))
    }

    /// Shares whose value equals `value_due` once minted on top of `supply`.
    /// Nothing is owed in shares while the value due is at least the GAV.
    fn calc_shares_for_value(value_due: U256, supply: U256, gav: U256) -> Result<U256> {
        if value_due.is_zero() || value_due >= gav {
            return Ok(U256::ZERO);
        }
        let remaining = math::sub(gav, value_due, "performance shares due")?;
        math::mul_div(value_due, supply, remaining, "performance shares due")
    }
}

impl Fee for PerformanceFee {
    fn kind(&self) -> FeeKind {
        FeeKind::Performance
    }

    fn settles_on_hook(&self, hook: FeeHook) -> bool {
        matches!(
            hook,
            FeeHook::Continuous | FeeHook::PreBuyShares | FeeHook::PreRedeemShares
        )
    }

    fn activate_for_fund(&mut self, ctx: &FeeContext, _events: &mut EventLog) -> Result<()> {
        let share_price = ctx.gross_share_value()?;
        self.high_water_mark = share_price;
        self.last_share_price = share_price;
        self.activated = ctx.now;
        Ok(())
    }

    fn settle(
        &mut self,
        ctx: &FeeContext,
        _data: &SettlementData,
        events: &mut EventLog,
    ) -> Result<Settlement> {
        if ctx.gav.is_zero() || ctx.total_supply.is_zero() {
            return Ok(Settlement::none());
        }
        let next_share_price = math::mul_div(ctx.gav, ONE, ctx.total_supply, "share price")?;
        if next_share_price == self.last_share_price {
            return Ok(Settlement::none());
        }

        let diluted_supply = math::add(ctx.total_supply, ctx.shares_outstanding, "diluted supply")?;
        let (value_due, is_gain) =
            self.calc_value_due_since_last_settled(next_share_price, diluted_supply)?;

        let prev_aggregate_value_due = self.aggregate_value_due;
        let next_aggregate_value_due = if is_gain {
            math::add(prev_aggregate_value_due, value_due, "aggregate value due")?
        } else {
            prev_aggregate_value_due.saturating_sub(value_due)
        };

        let next_shares_outstanding =
            Self::calc_shares_for_value(next_aggregate_value_due, ctx.total_supply, ctx.gav)?;
        let prev_shares_outstanding = ctx.shares_outstanding;

        self.last_share_price = next_share_price;
        self.aggregate_value_due = next_aggregate_value_due;

        events.emit(Event::PerformanceUpdated {
            comptroller: ctx.comptroller,
            prev_aggregate_value_due,
            next_aggregate_value_due,
            prev_shares_outstanding,
            next_shares_outstanding,
        });
        debug!(
            "[performance fee] price {} -> aggregate due {} for {}",
            next_share_price, next_aggregate_value_due, ctx.comptroller
        );

        let settlement = if next_shares_outstanding > prev_shares_outstanding {
            Settlement::new(
                SettlementType::MintSharesOutstanding,
                None,
                next_shares_outstanding - prev_shares_outstanding,
            )
        } else {
            Settlement::new(
                SettlementType::BurnSharesOutstanding,
                None,
                prev_shares_outstanding - next_shares_outstanding,
            )
        };
        Ok(settlement)
    }

    fn payout_allowed(&self, now: u64) -> bool {
        let since_activated = now.saturating_sub(self.activated);
        if since_activated < self.period {
            return false;
        }
        let period_start = now - since_activated % self.period;
        self.last_paid < period_start
    }

    fn payout(&mut self, ctx: &FeeContext, events: &mut EventLog) -> Result<bool> {
        if !self.payout_allowed(ctx.now) {
            return Ok(false);
        }
        self.last_paid = ctx.now;

        let prev_high_water_mark = self.high_water_mark;
        let next_high_water_mark = self.last_share_price;
        if next_high_water_mark <= prev_high_water_mark {
            return Ok(false);
        }

        let aggregate_value_due = self.aggregate_value_due;
        self.high_water_mark = next_high_water_mark;
        self.aggregate_value_due = U256::ZERO;
        events.emit(Event::PaidOut {
            comptroller: ctx.comptroller,
            prev_high_water_mark,
            next_high_water_mark,
            aggregate_value_due,
        });
        info!(
            "[performance fee] Paid out for {}: high-water mark {} -> {}",
            ctx.comptroller, prev_high_water_mark, next_high_water_mark
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::ether;
    use crate::models::Address;

    const PERIOD: u64 = 30 * 86_400;

    fn ctx(now: u64, gav: U256, total_supply: U256, shares_outstanding: U256) -> FeeContext {
        FeeContext {
            comptroller: Address::repeat_byte(0xc0),
            now,
            gav,
            total_supply,
            shares_outstanding,
            denomination_unit: ONE,
        }
    }

    fn activated_fee(now: u64) -> PerformanceFee {
        // 10%, 30 days
        let mut fee = PerformanceFee::new(100_000_000_000_000_000, PERIOD).unwrap();
        fee.activate_for_fund(&ctx(now, U256::ZERO, U256::ZERO, U256::ZERO), &mut EventLog::new())
            .unwrap();
        fee
    }

    #[test]
    fn test_activation_sets_bootstrap_price() {
        let fee = activated_fee(1_000);
        assert_eq!(fee.high_water_mark(), ONE);
        assert_eq!(fee.last_share_price(), ONE);
        assert_eq!(fee.activated(), 1_000);
    }

    #[test]
    fn test_gain_accrues_shares_outstanding() {
        let mut fee = activated_fee(0);
        let mut events = EventLog::new();
        // 10 shares, price 1.0 -> 1.2
        let settlement = fee
            .settle(&ctx(10, ether(12), ether(10), U256::ZERO), &SettlementData::Continuous, &mut events)
            .unwrap();

        // value due = 0.2 * 10 * 10% = 0.2; shares = 0.2 * 10 / (12 - 0.2)
        let expected_value = ether(2) / U256::from(10u8);
        assert_eq!(fee.aggregate_value_due(), expected_value);
        let expected_shares = expected_value * ether(10) / (ether(12) - expected_value);
        assert_eq!(settlement.settlement_type, SettlementType::MintSharesOutstanding);
        assert_eq!(settlement.shares_due, expected_shares);
        assert_eq!(events.named("PerformanceUpdated").len(), 1);
    }

    #[test]
    fn test_loss_below_high_water_mark_is_ignored() {
        let mut fee = activated_fee(0);
        let settlement = fee
            .settle(&ctx(10, ether(8), ether(10), U256::ZERO), &SettlementData::Continuous, &mut EventLog::new())
            .unwrap();
        assert_eq!(settlement, Settlement::none());
        assert_eq!(fee.aggregate_value_due(), U256::ZERO);
        assert_eq!(fee.last_share_price(), ether(8) / U256::from(10u8));
    }

    #[test]
    fn test_reversal_burns_shares_outstanding() {
        let mut fee = activated_fee(0);
        let mut events = EventLog::new();
        let gain = fee
            .settle(&ctx(10, ether(12), ether(10), U256::ZERO), &SettlementData::Continuous, &mut events)
            .unwrap();
        let outstanding = gain.shares_due;

        // Back to 1.0: everything accrued is given back
        let reversal = fee
            .settle(&ctx(20, ether(10), ether(10), outstanding), &SettlementData::Continuous, &mut events)
            .unwrap();
        assert_eq!(reversal.settlement_type, SettlementType::BurnSharesOutstanding);
        assert!(reversal.shares_due <= outstanding);
        assert_eq!(fee.aggregate_value_due(), U256::ZERO);
    }

    #[test]
    fn test_value_due_at_or_above_gav_owes_no_shares() {
        assert_eq!(
            PerformanceFee::calc_shares_for_value(ether(2), ether(1), ether(2)).unwrap(),
            U256::ZERO
        );
        assert_eq!(
            PerformanceFee::calc_shares_for_value(ether(3), ether(1), ether(2)).unwrap(),
            U256::ZERO
        );
        assert_eq!(
            PerformanceFee::calc_shares_for_value(ether(1), ether(1), ether(2)).unwrap(),
            ether(1)
        );
    }

    #[test]
    fn test_payout_allowed_once_per_period() {
        let start = 1_000_000;
        let mut fee = activated_fee(start);
        assert!(!fee.payout_allowed(start));
        assert!(!fee.payout_allowed(start + PERIOD - 1));
        assert!(fee.payout_allowed(start + PERIOD));

        let paid_at = start + PERIOD + 5;
        fee.payout(&ctx(paid_at, U256::ZERO, U256::ZERO, U256::ZERO), &mut EventLog::new())
            .unwrap();
        assert_eq!(fee.last_paid(), paid_at);
        assert!(!fee.payout_allowed(paid_at + 1));
        assert!(!fee.payout_allowed(start + 2 * PERIOD - 1));
        assert!(fee.payout_allowed(start + 2 * PERIOD));
    }

    #[test]
    fn test_payout_raises_high_water_mark_only_on_gain() {
        let mut fee = activated_fee(0);
        let mut events = EventLog::new();

        // No gain: high-water mark unchanged, nothing payable
        assert!(!fee.payout(&ctx(PERIOD, U256::ZERO, U256::ZERO, U256::ZERO), &mut events).unwrap());
        assert_eq!(fee.high_water_mark(), ONE);

        fee.settle(&ctx(PERIOD + 1, ether(15), ether(10), U256::ZERO), &SettlementData::Continuous, &mut events)
            .unwrap();
        let payable = fee
            .payout(&ctx(2 * PERIOD, U256::ZERO, U256::ZERO, U256::ZERO), &mut events)
            .unwrap();
        assert!(payable);
        assert_eq!(fee.high_water_mark(), ether(15) / U256::from(10u8));
        assert_eq!(fee.aggregate_value_due(), U256::ZERO);
        assert_eq!(events.named("PaidOut").len(), 1);
    }

    #[test]
    fn test_invalid_settings() {
        assert!(PerformanceFee::new(0, PERIOD).is_err());
        assert!(PerformanceFee::new(100, 0).is_err());
    }
}
