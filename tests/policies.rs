mod common;

use common::*;
use fund_engine::errors::FundError;
use fund_engine::math::{ether, ONE};
use fund_engine::models::{
    Address, ExtensionCall, FundHandle, IntegrationManagerAction, NewFundParams,
    PolicyKind, PolicyManagerAction, PolicySettings, U256,
};

fn violation(identifier: &str) -> FundError {
    FundError::PolicyViolation {
        identifier: identifier.to_string(),
    }
}

fn update_policy(
    w: &mut World,
    fund: FundHandle,
    caller: Address,
    policy: PolicyKind,
    add: Vec<Address>,
) -> fund_engine::errors::Result<()> {
    w.protocol.call_on_extension(
        fund.comptroller,
        caller,
        &ExtensionCall::Policies(PolicyManagerAction::UpdatePolicySettings {
            policy,
            add,
            remove: Vec::new(),
        }),
    )
}

#[test]
fn test_max_concentration_allows_exact_limit_then_blocks() {
    let mut w = world();
    // 10%
    let fund = w.deploy(
        NewFundParams::new(MANAGER, "Concentrated", WETH).with_policy(
            PolicySettings::MaxConcentration {
                limit: 100_000_000_000_000_000,
            },
        ),
    );
    w.buy(fund, ALICE, ether(10)).unwrap();

    // 2 MLN are worth 1 WETH: exactly 10% of GAV
    w.trade(fund, MANAGER, DESK, WETH, ether(1), MLN, ether(2)).unwrap();

    let err = w
        .trade(fund, MANAGER, DESK, WETH, ether(1), MLN, ether(2))
        .unwrap_err();
    assert_eq!(err, violation("MAX_CONCENTRATION"));
    assert_eq!(w.vault_balance(fund, MLN), ether(2));
}

#[test]
fn test_max_concentration_ignores_denomination_asset() {
    let mut w = world();
    let fund = w.deploy(
        NewFundParams::new(MANAGER, "Concentrated", WETH).with_policy(
            PolicySettings::MaxConcentration {
                limit: 100_000_000_000_000_000,
            },
        ),
    );
    w.buy(fund, ALICE, ether(10)).unwrap();
    w.trade(fund, MANAGER, DESK, WETH, ether(1), MLN, ether(2)).unwrap();

    // Buying back WETH only ever touches the denomination asset
    w.trade(fund, MANAGER, DESK, MLN, ether(2), WETH, ether(1)).unwrap();
    assert_eq!(w.vault_balance(fund, WETH), ether(10));
}

#[test]
fn test_asset_whitelist_must_include_denomination_asset() {
    let mut w = world();
    let result = w.protocol.create_new_fund(
        MANAGER,
        NewFundParams::new(MANAGER, "Listed", WETH).with_policy(PolicySettings::AssetWhitelist {
            addresses: vec![MLN],
        }),
    );
    assert!(matches!(result, Err(FundError::InvalidInput(_))));
    assert!(w.protocol.funds().is_empty());
}

#[test]
fn test_asset_whitelist_blocks_unlisted_incoming_asset() {
    let mut w = world();
    let fund = w.deploy(
        NewFundParams::new(MANAGER, "Listed", WETH).with_policy(PolicySettings::AssetWhitelist {
            addresses: vec![WETH, MLN],
        }),
    );
    w.buy(fund, ALICE, ether(4)).unwrap();

    w.trade(fund, MANAGER, DESK, WETH, ether(1), MLN, ether(2)).unwrap();
    let err = w
        .trade(fund, MANAGER, DESK, WETH, ether(1), USDC, U256::from(1_000_000u64))
        .unwrap_err();

    assert_eq!(err, violation("ASSET_WHITELIST"));
    assert_eq!(w.vault_balance(fund, USDC), U256::ZERO);
    assert_eq!(w.vault_balance(fund, WETH), ether(3));
}

#[test]
fn test_investor_whitelist_is_updatable_by_owner() {
    let mut w = world();
    let fund = w.deploy(
        NewFundParams::new(MANAGER, "Private", WETH).with_policy(
            PolicySettings::InvestorWhitelist {
                addresses: vec![ALICE],
            },
        ),
    );

    w.buy(fund, ALICE, ether(1)).unwrap();
    assert_eq!(
        w.buy(fund, BOB, ether(1)).unwrap_err(),
        violation("INVESTOR_WHITELIST")
    );

    assert!(matches!(
        update_policy(&mut w, fund, BOB, PolicyKind::InvestorWhitelist, vec![BOB]),
        Err(FundError::Unauthorized { .. })
    ));
    update_policy(&mut w, fund, MANAGER, PolicyKind::InvestorWhitelist, vec![BOB]).unwrap();

    assert_eq!(w.buy(fund, BOB, ether(1)).unwrap(), ether(1));
}

#[test]
fn test_user_whitelist_gates_auth_users() {
    let mut w = world();
    let fund = w.deploy(
        NewFundParams::new(MANAGER, "Users", WETH).with_policy(PolicySettings::UserWhitelist {
            addresses: vec![MANAGER],
        }),
    );
    w.buy(fund, ALICE, ether(4)).unwrap();
    w.protocol
        .call_on_extension(
            fund.comptroller,
            MANAGER,
            &ExtensionCall::Integrations(IntegrationManagerAction::AddAuthUsers(vec![BOB])),
        )
        .unwrap();

    assert_eq!(
        w.trade(fund, BOB, DESK, WETH, ether(1), MLN, ether(2))
            .unwrap_err(),
        violation("USER_WHITELIST")
    );

    update_policy(&mut w, fund, MANAGER, PolicyKind::UserWhitelist, vec![BOB]).unwrap();
    w.trade(fund, BOB, DESK, WETH, ether(1), MLN, ether(2)).unwrap();
}

#[test]
fn test_adapter_blacklist_blocks_listed_adapter_only() {
    let mut w = world();
    let fund = w.deploy(
        NewFundParams::new(MANAGER, "Picky", WETH).with_policy(PolicySettings::AdapterBlacklist {
            addresses: vec![APPROVE_DESK],
        }),
    );
    w.buy(fund, ALICE, ether(4)).unwrap();

    w.trade(fund, MANAGER, DESK, WETH, ether(1), MLN, ether(2)).unwrap();
    assert_eq!(
        w.trade(fund, MANAGER, APPROVE_DESK, WETH, ether(1), MLN, ether(2))
            .unwrap_err(),
        violation("ADAPTER_BLACKLIST")
    );
}

#[test]
fn test_blacklists_cannot_be_updated() {
    let mut w = world();
    let fund = w.deploy(
        NewFundParams::new(MANAGER, "Picky", WETH).with_policy(PolicySettings::AdapterBlacklist {
            addresses: vec![APPROVE_DESK],
        }),
    );
    assert!(update_policy(&mut w, fund, MANAGER, PolicyKind::AdapterBlacklist, vec![DESK]).is_err());
}

#[test]
fn test_price_feed_tolerance_compares_live_and_canonical_gav() {
    let mut w = world();
    // 5%
    let fund = w.deploy(
        NewFundParams::new(MANAGER, "Tolerant", WETH).with_policy(
            PolicySettings::BuySharesPriceFeedTolerance {
                tolerance: 50_000_000_000_000_000,
            },
        ),
    );
    // Zero GAV always passes
    w.buy(fund, ALICE, ether(10)).unwrap();
    w.trade(fund, MANAGER, DESK, WETH, ether(1), MLN, ether(2)).unwrap();

    // Live GAV 9.5 against canonical 10: exactly 5%
    w.feed.set_live_rate(MLN, ONE / U256::from(4u8)).unwrap();
    w.buy(fund, BOB, ether(1)).unwrap();

    // Live GAV now 10.4 against canonical 11: above 5%
    w.feed.set_live_rate(MLN, ONE / U256::from(5u8)).unwrap();
    assert_eq!(
        w.buy(fund, BOB, ether(1)).unwrap_err(),
        violation("BUY_SHARES_PRICE_FEED_TOLERANCE")
    );
}
