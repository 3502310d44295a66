mod common;

use common::*;
use fund_engine::comptroller::RedemptionRequest;
use fund_engine::errors::FundError;
use fund_engine::events::Event;
use fund_engine::math::{ether, ONE};
use fund_engine::models::{EntranceSettlement, FeeSettings, NewFundParams, U256};

#[test]
fn test_first_buy_is_priced_at_one_unit() {
    let mut w = world();
    let fund = w.plain_fund();

    let received = w.buy(fund, ALICE, ether(2)).unwrap();

    assert_eq!(received, ether(2));
    assert_eq!(w.protocol.shares_balance(fund.comptroller, ALICE).unwrap(), ether(2));
    assert_eq!(w.protocol.calc_gav(fund.comptroller).unwrap(), ether(2));
    assert_eq!(w.protocol.calc_gross_share_value(fund.comptroller).unwrap(), ONE);
    assert_eq!(w.vault_balance(fund, WETH), ether(2));
    assert_eq!(w.protocol.balance_of(WETH, ALICE), ether(98));
}

#[test]
fn test_entrance_fee_is_taken_from_bought_shares() {
    let mut w = world();
    let fund = w.deploy(
        NewFundParams::new(MANAGER, "Entrance", WETH).with_fee(FeeSettings::EntranceRate {
            rate: 100_000_000_000_000_000,
            settlement: EntranceSettlement::Direct,
        }),
    );

    let received = w.buy(fund, ALICE, ether(2)).unwrap();

    let net = ether(18) / U256::from(10u8);
    assert_eq!(received, net);
    assert_eq!(w.protocol.shares_balance(fund.comptroller, ALICE).unwrap(), net);
    assert_eq!(
        w.protocol.shares_balance(fund.comptroller, MANAGER).unwrap(),
        ether(2) - net
    );
    assert_eq!(w.protocol.total_supply(fund.comptroller).unwrap(), ether(2));
}

#[test]
fn test_burned_entrance_fee_accrues_to_remaining_holders() {
    let mut w = world();
    let fund = w.deploy(
        NewFundParams::new(MANAGER, "Burn", WETH).with_fee(FeeSettings::EntranceRate {
            rate: 100_000_000_000_000_000,
            settlement: EntranceSettlement::Burn,
        }),
    );

    w.buy(fund, ALICE, ether(10)).unwrap();

    assert_eq!(w.protocol.total_supply(fund.comptroller).unwrap(), ether(9));
    assert_eq!(w.protocol.calc_gav(fund.comptroller).unwrap(), ether(10));
    assert!(w.protocol.calc_gross_share_value(fund.comptroller).unwrap() > ONE);
}

#[test]
fn test_min_shares_not_met_reverts_everything() {
    let mut w = world();
    let fund = w.plain_fund();
    let events_before = w.protocol.events().len();

    let err = w
        .protocol
        .buy_shares(fund.comptroller, ALICE, ALICE, ether(1), ether(1) + U256::from(1u8))
        .unwrap_err();

    assert!(matches!(err, FundError::InsufficientSharesReceived { .. }));
    assert_eq!(w.protocol.events().len(), events_before);
    assert_eq!(w.protocol.balance_of(WETH, ALICE), ether(100));
    assert_eq!(w.protocol.total_supply(fund.comptroller).unwrap(), U256::ZERO);
}

#[test]
fn test_redemption_pays_out_pro_rata() {
    let mut w = world();
    let fund = w.plain_fund();
    w.buy(fund, ALICE, ether(3)).unwrap();
    w.buy(fund, BOB, ether(1)).unwrap();
    w.trade(fund, MANAGER, DESK, WETH, ether(2), MLN, ether(4)).unwrap();

    let redemption = w.protocol.redeem_shares(fund.comptroller, BOB).unwrap();

    assert_eq!(redemption.shares_quantity, ether(1));
    // Vault held 2 WETH and 4 MLN against 4 shares
    assert_eq!(redemption.payout_assets, vec![WETH, MLN]);
    assert_eq!(
        redemption.payout_amounts,
        vec![ether(1) / U256::from(2u8), ether(1)]
    );
    assert_eq!(w.protocol.balance_of(MLN, BOB), ether(1));
    assert_eq!(w.protocol.total_supply(fund.comptroller).unwrap(), ether(3));
    assert_eq!(w.sum_of_share_balances(fund), ether(3));
}

#[test]
fn test_redeem_more_than_balance_fails() {
    let mut w = world();
    let fund = w.plain_fund();
    w.buy(fund, ALICE, ether(1)).unwrap();

    let err = w
        .protocol
        .redeem_shares_quantity(fund.comptroller, ALICE, ether(2))
        .unwrap_err();
    assert!(matches!(err, FundError::InsufficientBalance { .. }));
}

#[test]
fn test_detailed_redemption_skips_requested_assets() {
    let mut w = world();
    let fund = w.plain_fund();
    w.buy(fund, ALICE, ether(4)).unwrap();
    w.trade(fund, MANAGER, DESK, WETH, ether(2), MLN, ether(4)).unwrap();

    let request = RedemptionRequest {
        shares_quantity: Some(ether(2)),
        additional_assets: Vec::new(),
        assets_to_skip: vec![MLN],
    };
    let redemption = w
        .protocol
        .redeem_shares_detailed(fund.comptroller, ALICE, request)
        .unwrap();

    assert_eq!(redemption.payout_assets, vec![WETH]);
    assert_eq!(redemption.payout_amounts, vec![ether(1)]);
    assert_eq!(w.vault_balance(fund, MLN), ether(4));
}

#[test]
fn test_timelock_blocks_redemption_until_elapsed() {
    let mut w = world();
    let fund = w.deploy(NewFundParams::new(MANAGER, "Locked", WETH).with_timelock(DAY));
    w.buy(fund, ALICE, ether(1)).unwrap();

    assert_eq!(
        w.protocol.redeem_shares(fund.comptroller, ALICE).unwrap_err(),
        FundError::SharesActionTimelocked
    );

    w.protocol.warp(DAY);
    assert!(w.protocol.redeem_shares(fund.comptroller, ALICE).is_ok());
}

#[test]
fn test_emergency_redemption_skips_frozen_asset() {
    let mut w = world();
    let fund = w.plain_fund();
    w.buy(fund, ALICE, ether(2)).unwrap();
    w.trade(fund, MANAGER, DESK, WETH, ether(1), MLN, ether(2)).unwrap();
    w.protocol.set_token_transferable(MLN, false).unwrap();

    assert_eq!(
        w.protocol.redeem_shares(fund.comptroller, ALICE).unwrap_err(),
        FundError::NotTransferable(MLN)
    );

    let redemption = w
        .protocol
        .redeem_shares_emergency(fund.comptroller, ALICE)
        .unwrap();
    assert_eq!(redemption.shares_quantity, ether(2));
    assert_eq!(redemption.payout_assets, vec![WETH]);
    assert_eq!(w.protocol.balance_of(WETH, ALICE), ether(99));
    assert_eq!(w.vault_balance(fund, MLN), ether(2));

    let skipped = w.protocol.events().last_named("RedeemSharesAssetSkipped");
    assert!(matches!(
        skipped,
        Some(Event::RedeemSharesAssetSkipped { asset, .. }) if *asset == MLN
    ));
}

#[test]
fn test_supply_always_equals_sum_of_balances() {
    let mut w = world();
    let fund = w.deploy(
        NewFundParams::new(MANAGER, "Busy", WETH)
            .with_fee(FeeSettings::Management {
                rate: 20_000_000_000_000_000,
            })
            .with_fee(FeeSettings::EntranceRate {
                rate: 50_000_000_000_000_000,
                settlement: EntranceSettlement::Direct,
            }),
    );

    w.buy(fund, ALICE, ether(5)).unwrap();
    w.protocol.warp(30 * DAY);
    w.buy(fund, BOB, ether(3)).unwrap();
    w.protocol.warp(30 * DAY);
    w.protocol
        .redeem_shares_quantity(fund.comptroller, ALICE, ether(1))
        .unwrap();
    w.protocol.redeem_shares(fund.comptroller, BOB).unwrap();

    assert_eq!(
        w.sum_of_share_balances(fund),
        w.protocol.total_supply(fund.comptroller).unwrap()
    );
    assert!(w.protocol.shares_balance(fund.comptroller, MANAGER).unwrap() > U256::ZERO);
}
