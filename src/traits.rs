// src/traits.rs

use crate::errors::Result;
use crate::events::EventLog;
use crate::fees::FeeContext;
use crate::models::{
    Address, ExecutionTime, FeeHook, FeeKind, ParsedAssets, PolicyHook, PolicyHookArgs,
    PolicyKind, Selector, Settlement, SettlementData, U256,
};
use crate::policies::PolicyContext;
use crate::simulation::TokenLedger;
use std::sync::Arc;

/// Asset valuation capability consumed by the engine.
///
/// Values are returned in raw units of the `quote` asset. Implementations
/// return an error when they cannot produce a trustworthy value.
pub trait PriceFeed: Send + Sync {
    /// Whether the feed can value this asset at all.
    fn is_supported_asset(&self, asset: Address) -> bool;

    /// Value of `amount` of `base` in `quote`, using the canonical (internal) rate.
    fn calc_canonical_asset_value(&self, base: Address, amount: U256, quote: Address)
        -> Result<U256>;

    /// Value of `amount` of `base` in `quote`, using the live reference-market rate.
    fn calc_live_asset_value(&self, base: Address, amount: U256, quote: Address) -> Result<U256>;
}

/// Price feed shared by every fund of a protocol instance.
pub type SharedPriceFeed = Arc<dyn PriceFeed>;

/// Translation layer between a normalized trade call and one external protocol.
///
/// The integration manager never trusts what an adapter reports: only the
/// vault balance deltas measured around `execute` count.
pub trait Adapter: Send + Sync {
    /// Human readable identifier, used in registry events.
    fn identifier(&self) -> &str;

    /// The address the adapter is registered under.
    fn address(&self) -> Address;

    /// Declares what the action identified by `selector` will spend and receive.
    fn parse_assets_for_method(&self, selector: Selector, encoded_call_args: &[u8])
        -> Result<ParsedAssets>;

    /// Executes the action. Implementations must reject any `caller` other
    /// than the integration manager they were built for.
    fn execute(
        &self,
        caller: Address,
        vault: Address,
        selector: Selector,
        encoded_call_args: &[u8],
        ledger: &mut TokenLedger,
    ) -> Result<()>;
}

/// Registered adapters are shared between the registry and in-flight calls.
pub type SharedAdapter = Arc<dyn Adapter>;

/// A fee implementation holding one fund's fee info.
pub trait Fee {
    fn kind(&self) -> FeeKind;

    /// Whether this fee settles at the given hook.
    fn settles_on_hook(&self, hook: FeeHook) -> bool;

    /// Called once when the fund is activated.
    fn activate_for_fund(&mut self, _ctx: &FeeContext, _events: &mut EventLog) -> Result<()> {
        Ok(())
    }

    /// Computes what is owed at this hook and updates the fee's own state.
    fn settle(
        &mut self,
        ctx: &FeeContext,
        data: &SettlementData,
        events: &mut EventLog,
    ) -> Result<Settlement>;

    /// Whether shares outstanding may be crystallized right now.
    fn payout_allowed(&self, _now: u64) -> bool {
        false
    }

    /// Crystallizes accrued performance. Returns true when outstanding shares are payable.
    fn payout(&mut self, _ctx: &FeeContext, _events: &mut EventLog) -> Result<bool> {
        Ok(false)
    }
}

/// A policy implementation holding one fund's policy settings.
pub trait Policy {
    fn kind(&self) -> PolicyKind;

    /// The single `(hook, execution time)` pair this policy validates.
    fn implemented_hook(&self) -> (PolicyHook, ExecutionTime);

    /// Called once when the fund is activated.
    fn activate_for_fund(&self, _ctx: &PolicyContext<'_>) -> Result<()> {
        Ok(())
    }

    /// Whether `update_fund_settings` is supported after configuration.
    fn updatable(&self) -> bool {
        false
    }

    /// Adds then removes list items. Only updatable policies accept this.
    fn update_fund_settings(
        &mut self,
        comptroller: Address,
        add: &[Address],
        remove: &[Address],
        events: &mut EventLog,
    ) -> Result<()>;

    /// Returns `Ok(false)` to reject the operation being validated.
    fn validate_rule(&self, ctx: &PolicyContext<'_>, args: &PolicyHookArgs) -> Result<bool>;
}
