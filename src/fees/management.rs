// src/fees/management.rs

use super::FeeContext;
use crate::errors::{FundError, Result};
use crate::events::{Event, EventLog};
use crate::math::{self, ONE, SECONDS_PER_YEAR};
use crate::models::{FeeHook, FeeKind, Settlement, SettlementData, SettlementType, U256};
use crate::traits::Fee;
use log::debug;

/// Continuous, annualized fee on the total shares supply.
///
/// Accrues linearly: `rate * seconds * supply / (SECONDS_PER_YEAR * 1e18)`,
/// paid by minting new shares to the fund owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagementFee {
    rate: U256,
    last_settled: u64,
}

impl ManagementFee {
    pub fn new(rate: u64) -> Result<Self> {
        if rate == 0 {
            return Err(FundError::invalid("addFundSettings: feeRate must be greater than 0"));
        }
        Ok(Self {
            rate: math::rate(rate),
            last_settled: 0,
        })
    }

    pub fn rate(&self) -> U256 {
        self.rate
    }

    pub fn last_settled(&self) -> u64 {
        self.last_settled
    }

    /// Shares due for `seconds` of accrual over `supply`.
    pub fn calc_shares_due(&self, seconds: u64, supply: U256) -> Result<U256> {
        let rate_seconds = self
            .rate
            .checked_mul(U256::from(seconds))
            .ok_or(FundError::MathOverflow("management fee"))?;
        math::mul_div(
            rate_seconds,
            supply,
            U256::from(SECONDS_PER_YEAR) * ONE,
            "management fee",
        )
    }
}

impl Fee for ManagementFee {
    fn kind(&self) -> FeeKind {
        FeeKind::Management
    }

    fn settles_on_hook(&self, hook: FeeHook) -> bool {
        matches!(
            hook,
            FeeHook::Continuous | FeeHook::PreBuyShares | FeeHook::PreRedeemShares
        )
    }

    fn activate_for_fund(&mut self, ctx: &FeeContext, _events: &mut EventLog) -> Result<()> {
        self.last_settled = ctx.now;
        Ok(())
    }

    fn settle(
        &mut self,
        ctx: &FeeContext,
        _data: &SettlementData,
        events: &mut EventLog,
    ) -> Result<Settlement> {
        let seconds = ctx.now.saturating_sub(self.last_settled);
        let shares_due = self.calc_shares_due(seconds, ctx.total_supply)?;

        let prev_settled = self.last_settled;
        self.last_settled = ctx.now;
        debug!(
            "[management fee] {} shares due over {}s for {}",
            shares_due, seconds, ctx.comptroller
        );
        events.emit(Event::Settled {
            comptroller: ctx.comptroller,
            fee: FeeKind::Management,
            shares_quantity: shares_due,
            prev_settled: Some(prev_settled),
        });

        Ok(Settlement::new(SettlementType::Mint, None, shares_due))
    }
}
