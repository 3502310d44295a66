// src/policies/price_tolerance.rs

use super::PolicyContext;
use crate::errors::{FundError, Result};
use crate::events::{Event, EventLog};
use crate::math::{self, ONE};
use crate::models::{Address, ExecutionTime, PolicyHook, PolicyHookArgs, PolicyKind, U256};
use crate::traits::Policy;
use log::debug;

/// Blocks purchases while the canonical GAV deviates from the live
/// reference-market GAV by more than the tolerance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuySharesPriceFeedTolerance {
    tolerance: U256,
}

impl BuySharesPriceFeedTolerance {
    pub fn add_fund_settings(comptroller: Address, tolerance: u64, events: &mut EventLog) -> Result<Self> {
        let tolerance = math::rate(tolerance);
        if tolerance.is_zero() {
            return Err(FundError::invalid("addFundSettings: tolerance must be greater than 0"));
        }
        if tolerance > ONE {
            return Err(FundError::invalid("addFundSettings: tolerance cannot exceed 100%"));
        }
        events.emit(Event::ToleranceSetForFund {
            comptroller,
            tolerance,
        });
        Ok(Self { tolerance })
    }

    pub fn tolerance(&self) -> U256 {
        self.tolerance
    }

    /// `|canonical - live| * 1e18 <= tolerance * canonical`.
    pub fn within_tolerance(&self, canonical_gav: U256, live_gav: U256) -> bool {
        if canonical_gav.is_zero() {
            return true;
        }
        let deviation = math::abs_diff(canonical_gav, live_gav);
        match (deviation.checked_mul(ONE), self.tolerance.checked_mul(canonical_gav)) {
            (Some(lhs), Some(rhs)) => lhs <= rhs,
            _ => false,
        }
    }
}

impl Policy for BuySharesPriceFeedTolerance {
    fn kind(&self) -> PolicyKind {
        PolicyKind::BuySharesPriceFeedTolerance
    }

    fn implemented_hook(&self) -> (PolicyHook, ExecutionTime) {
        (PolicyHook::BuyShares, ExecutionTime::Pre)
    }

    fn update_fund_settings(
        &mut self,
        _comptroller: Address,
        _add: &[Address],
        _remove: &[Address],
        _events: &mut EventLog,
    ) -> Result<()> {
        Err(FundError::invalid(
            "updateFundSettings: Updates not allowed for this policy",
        ))
    }

    fn validate_rule(&self, ctx: &PolicyContext<'_>, args: &PolicyHookArgs) -> Result<bool> {
        let canonical_gav = match args {
            PolicyHookArgs::PreBuyShares { gav, .. } => *gav,
            _ => {
                return Err(FundError::invalid(
                    "validateRule: Unexpected hook arguments for BUY_SHARES_PRICE_FEED_TOLERANCE",
                ))
            }
        };
        if canonical_gav.is_zero() {
            return Ok(true);
        }
        let live_gav = match ctx.calc_live_gav() {
            Ok(gav) => gav,
            Err(e) => {
                debug!("[price tolerance] Live GAV lookup failed: {}", e);
                return Ok(false);
            }
        };
        Ok(self.within_tolerance(canonical_gav, live_gav))
    }
}
