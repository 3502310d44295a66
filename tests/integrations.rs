mod common;

use common::*;
use fund_engine::errors::{FundError, Result};
use fund_engine::events::Event;
use fund_engine::math::{ether, ONE};
use fund_engine::models::{
    Address, Extension, ExtensionCall, IntegrationManagerAction, ParsedAssets, Selector,
    SpendAssetsHandleType, U256,
};
use fund_engine::simulation::TokenLedger;
use fund_engine::traits::{Adapter, SharedAdapter};
use std::sync::Arc;

/// Declares the same spend asset twice.
struct DoubleSpendAdapter;

const DOUBLE_SPEND: Address = Address::repeat_byte(0xd3);

impl Adapter for DoubleSpendAdapter {
    fn identifier(&self) -> &str {
        "DOUBLE_SPEND"
    }

    fn address(&self) -> Address {
        DOUBLE_SPEND
    }

    fn parse_assets_for_method(&self, _selector: Selector, _args: &[u8]) -> Result<ParsedAssets> {
        Ok(ParsedAssets {
            spend_assets_handle_type: SpendAssetsHandleType::Transfer,
            spend_assets: vec![WETH, WETH],
            spend_asset_amounts: vec![ether(1), ether(1)],
            incoming_assets: vec![MLN],
            min_incoming_asset_amounts: vec![ether(1)],
        })
    }

    fn execute(
        &self,
        _caller: Address,
        _vault: Address,
        _selector: Selector,
        _args: &[u8],
        _ledger: &mut TokenLedger,
    ) -> Result<()> {
        Ok(())
    }
}

#[test]
fn test_trade_moves_balances_and_tracks_incoming_asset() {
    let mut w = world();
    let fund = w.plain_fund();
    w.buy(fund, ALICE, ether(10)).unwrap();
    assert_eq!(w.tracked_assets(fund), vec![WETH]);

    w.trade(fund, MANAGER, DESK, WETH, ether(1), MLN, ether(2)).unwrap();

    assert_eq!(w.vault_balance(fund, WETH), ether(9));
    assert_eq!(w.vault_balance(fund, MLN), ether(2));
    assert_eq!(w.tracked_assets(fund), vec![WETH, MLN]);
    // 2 MLN are worth 1 WETH
    assert_eq!(w.protocol.calc_gav(fund.comptroller).unwrap(), ether(10));

    match w.protocol.events().last_named("CallOnIntegrationExecuted") {
        Some(Event::CallOnIntegrationExecuted {
            incoming_assets,
            incoming_asset_amounts,
            outgoing_assets,
            outgoing_asset_amounts,
            ..
        }) => {
            assert_eq!(incoming_assets, &vec![MLN]);
            assert_eq!(incoming_asset_amounts, &vec![ether(2)]);
            assert_eq!(outgoing_assets, &vec![WETH]);
            assert_eq!(outgoing_asset_amounts, &vec![ether(1)]);
        }
        other => panic!("unexpected event: {:?}", other),
    }
}

#[test]
fn test_spent_asset_at_zero_balance_is_untracked() {
    let mut w = world();
    let fund = w.plain_fund();
    w.buy(fund, ALICE, ether(2)).unwrap();
    w.trade(fund, MANAGER, DESK, WETH, ether(1), MLN, ether(2)).unwrap();

    w.trade(fund, MANAGER, DESK, MLN, ether(2), WETH, ether(1)).unwrap();

    assert_eq!(w.vault_balance(fund, MLN), U256::ZERO);
    assert_eq!(w.tracked_assets(fund), vec![WETH]);
}

#[test]
fn test_denomination_asset_stays_tracked_at_zero_balance() {
    let mut w = world();
    let fund = w.plain_fund();
    w.buy(fund, ALICE, ether(1)).unwrap();

    w.trade(fund, MANAGER, DESK, WETH, ether(1), MLN, ether(2)).unwrap();

    assert_eq!(w.vault_balance(fund, WETH), U256::ZERO);
    assert_eq!(w.tracked_assets(fund), vec![WETH, MLN]);
}

#[test]
fn test_approve_custody_leaves_no_allowance_behind() {
    let mut w = world();
    let fund = w.plain_fund();
    w.buy(fund, ALICE, ether(4)).unwrap();

    w.trade(fund, MANAGER, APPROVE_DESK, WETH, ether(1), MLN, ether(2)).unwrap();

    assert_eq!(w.vault_balance(fund, MLN), ether(2));
    assert_eq!(
        w.protocol.ledger().allowance(WETH, fund.vault, APPROVE_DESK),
        U256::ZERO
    );
}

#[test]
fn test_insufficient_incoming_amount_reverts_trade() {
    let mut w = world();
    let fund = w.plain_fund();
    w.buy(fund, ALICE, ether(4)).unwrap();
    let events_before = w.protocol.events().len();

    let err = w
        .trade(fund, MANAGER, DESK, WETH, ether(1), MLN, ether(3))
        .unwrap_err();

    assert!(matches!(err, FundError::InsufficientIncomingAsset { .. }));
    assert_eq!(w.vault_balance(fund, WETH), ether(4));
    assert_eq!(w.vault_balance(fund, MLN), U256::ZERO);
    assert_eq!(w.protocol.balance_of(MLN, DESK), ether(1_000));
    assert_eq!(w.tracked_assets(fund), vec![WETH]);
    assert_eq!(w.protocol.events().len(), events_before);
}

#[test]
fn test_unpriced_incoming_asset_is_not_receivable() {
    let mut w = world();
    let fund = w.plain_fund();
    w.buy(fund, ALICE, ether(4)).unwrap();

    let err = w
        .trade(fund, MANAGER, DESK, WETH, ether(1), JUNK, ether(1))
        .unwrap_err();

    assert_eq!(err, FundError::NonReceivableAsset(JUNK));
    assert_eq!(w.vault_balance(fund, JUNK), U256::ZERO);
}

#[test]
fn test_duplicate_spend_asset_fails() {
    let mut w = world();
    let adapters: Vec<SharedAdapter> = vec![Arc::new(DoubleSpendAdapter)];
    w.protocol.register_adapters(OWNER, adapters).unwrap();
    let fund = w.plain_fund();
    w.buy(fund, ALICE, ether(4)).unwrap();

    let err = w
        .trade(fund, MANAGER, DOUBLE_SPEND, WETH, ether(1), MLN, ether(1))
        .unwrap_err();
    assert_eq!(err, FundError::DuplicateAsset("spend"));
}

#[test]
fn test_unregistered_adapter_is_rejected() {
    let mut w = world();
    let fund = w.plain_fund();
    w.buy(fund, ALICE, ether(4)).unwrap();
    w.protocol.deregister_adapters(OWNER, &[DESK]).unwrap();

    assert!(w
        .trade(fund, MANAGER, DESK, WETH, ether(1), MLN, ether(2))
        .is_err());
}

#[test]
fn test_tracked_assets_limit_blocks_new_asset() {
    let mut w = world();
    w.protocol.set_tracked_assets_limit(OWNER, 1).unwrap();
    let fund = w.plain_fund();
    w.buy(fund, ALICE, ether(4)).unwrap();

    let err = w
        .trade(fund, MANAGER, DESK, WETH, ether(1), MLN, ether(2))
        .unwrap_err();

    assert_eq!(err, FundError::TrackedAssetsLimitExceeded { limit: 1 });
    assert_eq!(w.tracked_assets(fund), vec![WETH]);
}

#[test]
fn test_auth_users_may_trade_once_added() {
    let mut w = world();
    let fund = w.plain_fund();
    w.buy(fund, ALICE, ether(4)).unwrap();

    let err = w
        .trade(fund, BOB, DESK, WETH, ether(1), MLN, ether(2))
        .unwrap_err();
    assert!(matches!(err, FundError::Unauthorized { .. }));

    // Routed through the opaque (extension, selector, args) entry point
    let (extension, selector, args) =
        ExtensionCall::Integrations(IntegrationManagerAction::AddAuthUsers(vec![BOB]))
            .encode()
            .unwrap();
    assert_eq!(extension, Extension::IntegrationManager);
    w.protocol
        .call_on_extension_encoded(fund.comptroller, MANAGER, extension, selector, &args)
        .unwrap();
    assert!(w
        .protocol
        .integration_manager()
        .is_auth_user_for_fund(fund.comptroller, BOB));

    w.trade(fund, BOB, DESK, WETH, ether(1), MLN, ether(2)).unwrap();
    assert_eq!(w.vault_balance(fund, MLN), ether(2));
}

#[test]
fn test_only_owner_manages_auth_users() {
    let mut w = world();
    let fund = w.plain_fund();
    let err = w
        .protocol
        .call_on_extension(
            fund.comptroller,
            BOB,
            &ExtensionCall::Integrations(IntegrationManagerAction::AddAuthUsers(vec![BOB])),
        )
        .unwrap_err();
    assert!(matches!(err, FundError::Unauthorized { .. }));
}

#[test]
fn test_zero_balance_tracked_assets_round_trip() {
    let mut w = world();
    let fund = w.plain_fund();

    w.protocol
        .call_on_extension(
            fund.comptroller,
            MANAGER,
            &ExtensionCall::Integrations(IntegrationManagerAction::AddZeroBalanceTrackedAssets(
                vec![USDC],
            )),
        )
        .unwrap();
    assert_eq!(w.tracked_assets(fund), vec![WETH, USDC]);

    // The denomination asset can never be dropped
    assert!(w
        .protocol
        .call_on_extension(
            fund.comptroller,
            MANAGER,
            &ExtensionCall::Integrations(
                IntegrationManagerAction::RemoveZeroBalanceTrackedAssets(vec![WETH])
            ),
        )
        .is_err());

    w.protocol
        .call_on_extension(
            fund.comptroller,
            MANAGER,
            &ExtensionCall::Integrations(
                IntegrationManagerAction::RemoveZeroBalanceTrackedAssets(vec![USDC]),
            ),
        )
        .unwrap();
    assert_eq!(w.tracked_assets(fund), vec![WETH]);
}

#[test]
fn test_trade_into_asset_with_other_decimals() {
    let mut w = world();
    let fund = w.plain_fund();
    w.buy(fund, ALICE, ether(3)).unwrap();

    w.trade(fund, MANAGER, DESK, WETH, ether(2), USDC, U256::from(2_000_000u64))
        .unwrap();

    assert_eq!(w.vault_balance(fund, USDC), U256::from(2_000_000u64));
    assert_eq!(w.protocol.calc_gav(fund.comptroller).unwrap(), ether(3));
    assert_eq!(w.protocol.calc_gross_share_value(fund.comptroller).unwrap(), ONE);
}
