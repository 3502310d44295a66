// src/connectors/swap.rs

use crate::errors::{FundError, Result};
use crate::math::{self, ONE};
use crate::models::{selector, Address, ParsedAssets, Selector, SpendAssetsHandleType, U256};
use crate::simulation::TokenLedger;
use crate::traits::Adapter;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const TAKE_ORDER_SIGNATURE: &str = "takeOrder(address,bytes,bytes)";

pub fn take_order_selector() -> Selector {
    selector(TAKE_ORDER_SIGNATURE)
}

/// Arguments of a `takeOrder` call, JSON-encoded in `encoded_call_args`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TakeOrderArgs {
    pub outgoing_asset: Address,
    pub outgoing_amount: U256,
    pub incoming_asset: Address,
    pub min_incoming_amount: U256,
}

/// An over-the-counter desk quoting fixed rates out of its own inventory.
///
/// Rates are 1e18-scaled raw units of the bought asset per raw unit of the
/// sold asset. Inventory is whatever the adapter's address holds in the ledger.
#[derive(Debug, Clone)]
pub struct FixedRateSwapAdapter {
    address: Address,
    integration_manager: Address,
    handle_type: SpendAssetsHandleType,
    rates: HashMap<(Address, Address), U256>,
}

impl FixedRateSwapAdapter {
    /// # Arguments
    /// * `address` - The address the adapter is registered and holds inventory under
    /// * `integration_manager` - The only caller `execute` accepts
    pub fn new(address: Address, integration_manager: Address) -> Self {
        Self {
            address,
            integration_manager,
            handle_type: SpendAssetsHandleType::Transfer,
            rates: HashMap::new(),
        }
    }

    pub fn with_handle_type(mut self, handle_type: SpendAssetsHandleType) -> Self {
        self.handle_type = handle_type;
        self
    }

    /// Quotes `sell -> buy` at `rate`.
    pub fn with_rate(mut self, sell: Address, buy: Address, rate: U256) -> Self {
        self.rates.insert((sell, buy), rate);
        self
    }

    pub fn quote(&self, sell: Address, buy: Address, amount: U256) -> Result<U256> {
        let rate = self
            .rates
            .get(&(sell, buy))
            .ok_or_else(|| FundError::Adapter(format!("No rate for {} -> {}", sell, buy)))?;
        math::mul_div(amount, *rate, ONE, "quote")
    }

    fn decode(&self, selector: Selector, encoded_call_args: &[u8]) -> Result<TakeOrderArgs> {
        if selector != take_order_selector() {
            return Err(FundError::Adapter(format!(
                "parseAssetsForMethod: _selector invalid: {}",
                selector
            )));
        }
        serde_json::from_slice(encoded_call_args)
            .map_err(|e| FundError::Adapter(format!("Bad takeOrder args: {}", e)))
    }
}

impl Adapter for FixedRateSwapAdapter {
    fn identifier(&self) -> &str {
        "FIXED_RATE_SWAP"
    }

    fn address(&self) -> Address {
        self.address
    }

    fn parse_assets_for_method(&self, selector: Selector, encoded_call_args: &[u8]) -> Result<ParsedAssets> {
        let args = self.decode(selector, encoded_call_args)?;
        Ok(ParsedAssets {
            spend_assets_handle_type: self.handle_type,
            spend_assets: vec![args.outgoing_asset],
            spend_asset_amounts: vec![args.outgoing_amount],
            incoming_assets: vec![args.incoming_asset],
            min_incoming_asset_amounts: vec![args.min_incoming_amount],
        })
    }

    fn execute(
        &self,
        caller: Address,
        vault: Address,
        selector: Selector,
        encoded_call_args: &[u8],
        ledger: &mut TokenLedger,
    ) -> Result<()> {
        if caller != self.integration_manager {
            return Err(FundError::Adapter(
                "Only the IntegrationManager can call this function".to_string(),
            ));
        }
        let args = self.decode(selector, encoded_call_args)?;
        let incoming_amount = self.quote(args.outgoing_asset, args.incoming_asset, args.outgoing_amount)?;

        match self.handle_type {
            SpendAssetsHandleType::Approve => ledger.transfer_from(
                args.outgoing_asset,
                self.address,
                vault,
                self.address,
                args.outgoing_amount,
            )?,
            SpendAssetsHandleType::Transfer => {
                let held = ledger.balance_of(args.outgoing_asset, self.address);
                if held < args.outgoing_amount {
                    return Err(FundError::Adapter("Spend assets not received".to_string()));
                }
            }
            SpendAssetsHandleType::None => {}
        }

        ledger.transfer(args.incoming_asset, self.address, vault, incoming_amount)?;
        debug!(
            "[swap adapter] {} {} -> {} {} for {}",
            args.outgoing_amount, args.outgoing_asset, incoming_amount, args.incoming_asset, vault
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::ether;

    const ADAPTER: Address = Address::repeat_byte(0xad);
    const MANAGER: Address = Address::repeat_byte(0x1a);
    const VAULT: Address = Address::repeat_byte(0x7a);
    const TOKEN_A: Address = Address::repeat_byte(0x0a);
    const TOKEN_B: Address = Address::repeat_byte(0x0b);

    fn args() -> Vec<u8> {
        serde_json::to_vec(&TakeOrderArgs {
            outgoing_asset: TOKEN_A,
            outgoing_amount: ether(1),
            incoming_asset: TOKEN_B,
            min_incoming_amount: ether(2),
        })
        .unwrap()
    }

    fn setup() -> (FixedRateSwapAdapter, TokenLedger) {
        let adapter =
            FixedRateSwapAdapter::new(ADAPTER, MANAGER).with_rate(TOKEN_A, TOKEN_B, ether(2));
        let mut ledger = TokenLedger::new();
        ledger.register_token(TOKEN_A, "A", 18).unwrap();
        ledger.register_token(TOKEN_B, "B", 18).unwrap();
        ledger.mint(TOKEN_B, ADAPTER, ether(10)).unwrap();
        (adapter, ledger)
    }

    #[test]
    fn test_parse_declares_one_spend_and_one_incoming() {
        let (adapter, _) = setup();
        let parsed = adapter
            .parse_assets_for_method(take_order_selector(), &args())
            .unwrap();
        assert_eq!(parsed.spend_assets, vec![TOKEN_A]);
        assert_eq!(parsed.incoming_assets, vec![TOKEN_B]);
        assert_eq!(parsed.min_incoming_asset_amounts, vec![ether(2)]);
    }

    #[test]
    fn test_execute_pays_from_inventory() {
        let (adapter, mut ledger) = setup();
        ledger.mint(TOKEN_A, ADAPTER, ether(1)).unwrap();
        adapter
            .execute(MANAGER, VAULT, take_order_selector(), &args(), &mut ledger)
            .unwrap();
        assert_eq!(ledger.balance_of(TOKEN_B, VAULT), ether(2));
        assert_eq!(ledger.balance_of(TOKEN_B, ADAPTER), ether(8));
    }

    #[test]
    fn test_execute_rejects_other_callers() {
        let (adapter, mut ledger) = setup();
        ledger.mint(TOKEN_A, ADAPTER, ether(1)).unwrap();
        assert!(adapter
            .execute(VAULT, VAULT, take_order_selector(), &args(), &mut ledger)
            .is_err());
    }

    #[test]
    fn test_unknown_selector_rejected() {
        let (adapter, _) = setup();
        assert!(adapter
            .parse_assets_for_method(selector("lend(address,bytes,bytes)"), &args())
            .is_err());
    }
}
