// src/policies/max_concentration.rs

use super::PolicyContext;
use crate::errors::{FundError, Result};
use crate::events::{Event, EventLog};
use crate::math::{self, ONE};
use crate::models::{Address, ExecutionTime, PolicyHook, PolicyHookArgs, PolicyKind, U256};
use crate::traits::Policy;
use log::debug;

/// Caps the share of GAV any single non-denomination asset may represent
/// after a call on integration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaxConcentration {
    max_concentration: U256,
}

impl MaxConcentration {
    pub fn add_fund_settings(comptroller: Address, limit: u64, events: &mut EventLog) -> Result<Self> {
        let max_concentration = math::rate(limit);
        if max_concentration.is_zero() {
            return Err(FundError::invalid(
                "addFundSettings: maxConcentration must be greater than 0",
            ));
        }
        if max_concentration > ONE {
            return Err(FundError::invalid(
                "addFundSettings: maxConcentration cannot exceed 100%",
            ));
        }
        events.emit(Event::MaxConcentrationSet {
            comptroller,
            value: max_concentration,
        });
        Ok(Self { max_concentration })
    }

    pub fn max_concentration(&self) -> U256 {
        self.max_concentration
    }

    /// Whether every asset is within the limit. Any failed valuation denies.
    fn passes_rule(&self, ctx: &PolicyContext<'_>, assets: &[Address]) -> bool {
        let gav = match ctx.calc_gav() {
            Ok(gav) => gav,
            Err(e) => {
                debug!("[max concentration] GAV lookup failed: {}", e);
                return false;
            }
        };
        assets
            .iter()
            .filter(|asset| **asset != ctx.denomination_asset)
            .all(|asset| self.asset_within_limit(ctx, *asset, gav))
    }

    fn asset_within_limit(&self, ctx: &PolicyContext<'_>, asset: Address, gav: U256) -> bool {
        let balance = ctx.vault.asset_balance(ctx.ledger, asset);
        if balance.is_zero() {
            return true;
        }
        let value = match ctx
            .price_feed
            .calc_canonical_asset_value(asset, balance, ctx.denomination_asset)
        {
            Ok(value) => value,
            Err(e) => {
                debug!("[max concentration] Value lookup for {} failed: {}", asset, e);
                return false;
            }
        };
        // value / gav <= limit, cross-multiplied
        match (value.checked_mul(ONE), self.max_concentration.checked_mul(gav)) {
            (Some(lhs), Some(rhs)) => lhs <= rhs,
            _ => false,
        }
    }
}

impl Policy for MaxConcentration {
    fn kind(&self) -> PolicyKind {
        PolicyKind::MaxConcentration
    }

    fn implemented_hook(&self) -> (PolicyHook, ExecutionTime) {
        (PolicyHook::CallOnIntegration, ExecutionTime::Post)
    }

    fn activate_for_fund(&self, ctx: &PolicyContext<'_>) -> Result<()> {
        if !self.passes_rule(ctx, ctx.vault.tracked_assets()) {
            return Err(FundError::invalid("activateForFund: Max concentration exceeded"));
        }
        Ok(())
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
        match args {
            PolicyHookArgs::PostCallOnIntegration {
                incoming_assets, ..
            } => Ok(self.passes_rule(ctx, incoming_assets)),
            _ => Err(FundError::invalid(
                "validateRule: Unexpected hook arguments for MAX_CONCENTRATION",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::ether;
    use crate::simulation::{StaticPriceFeed, TokenLedger};
    use crate::vault::Vault;

    const COMPTROLLER: Address = Address::repeat_byte(0xc0);
    const DENOMINATION: Address = Address::repeat_byte(0xd0);
    const RISKY: Address = Address::repeat_byte(0x01);

    struct Fixture {
        vault: Vault,
        ledger: TokenLedger,
        feed: StaticPriceFeed,
    }

    // Vault holds `denomination` units of the denomination asset and `risky` of RISKY, both priced 1:1.
    fn fixture(denomination: U256, risky: U256) -> Fixture {
        let mut ledger = TokenLedger::new();
        ledger.register_token(DENOMINATION, "DEN", 18).unwrap();
        ledger.register_token(RISKY, "RSK", 18).unwrap();
        let feed = StaticPriceFeed::new();
        feed.add_asset(DENOMINATION, 18, ONE);
        feed.add_asset(RISKY, 18, ONE);

        let mut vault = Vault::new(
            Address::repeat_byte(0x7a),
            Address::repeat_byte(0x0e),
            "Concentrated",
            COMPTROLLER,
            Address::repeat_byte(0xde),
        );
        let mut events = EventLog::new();
        vault.add_tracked_asset(COMPTROLLER, DENOMINATION, &mut events).unwrap();
        vault.add_tracked_asset(COMPTROLLER, RISKY, &mut events).unwrap();
        ledger.mint(DENOMINATION, vault.address(), denomination).unwrap();
        ledger.mint(RISKY, vault.address(), risky).unwrap();
        Fixture { vault, ledger, feed }
    }

    fn post_args(incoming: Address) -> PolicyHookArgs {
        PolicyHookArgs::PostCallOnIntegration {
            caller: Address::repeat_byte(0x0e),
            adapter: Address::repeat_byte(0xad),
            selector: Default::default(),
            incoming_assets: vec![incoming],
            incoming_asset_amounts: vec![U256::from(1u8)],
            outgoing_assets: vec![],
            outgoing_asset_amounts: vec![],
        }
    }

    fn validate(f: &Fixture, policy: &MaxConcentration, incoming: Address) -> bool {
        let ctx = PolicyContext {
            comptroller: COMPTROLLER,
            denomination_asset: DENOMINATION,
            vault: &f.vault,
            ledger: &f.ledger,
            price_feed: &f.feed,
        };
        policy.validate_rule(&ctx, &post_args(incoming)).unwrap()
    }

    fn ten_percent() -> MaxConcentration {
        MaxConcentration::add_fund_settings(COMPTROLLER, 100_000_000_000_000_000, &mut EventLog::new())
            .unwrap()
    }

    #[test]
    fn test_exactly_at_limit_passes() {
        // 1 of 10 is exactly 10%
        let f = fixture(ether(9), ether(1));
        assert!(validate(&f, &ten_percent(), RISKY));
    }

    #[test]
    fn test_one_unit_above_limit_fails() {
        let f = fixture(ether(9), ether(1) + U256::from(1u8));
        assert!(!validate(&f, &ten_percent(), RISKY));
    }

    #[test]
    fn test_denomination_asset_is_exempt() {
        let f = fixture(ether(100), U256::ZERO);
        assert!(validate(&f, &ten_percent(), DENOMINATION));
    }

    #[test]
    fn test_failed_price_lookup_denies() {
        let f = fixture(ether(9), ether(1));
        f.feed.set_valid(RISKY, false).unwrap();
        assert!(!validate(&f, &ten_percent(), RISKY));
    }

    #[test]
    fn test_limit_bounds() {
        let mut events = EventLog::new();
        assert!(MaxConcentration::add_fund_settings(COMPTROLLER, 0, &mut events).is_err());
        assert!(
            MaxConcentration::add_fund_settings(COMPTROLLER, 1_000_000_000_000_000_001, &mut events)
                .is_err()
        );
    }
}
