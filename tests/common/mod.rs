// tests/common/mod.rs
//
// Shared protocol fixture: three priced tokens, funded investors and a
// registered swap desk quoting WETH against MLN and USDC.

#![allow(dead_code)]

use fund_engine::connectors::{take_order_selector, FixedRateSwapAdapter, TakeOrderArgs};
use fund_engine::engine::Protocol;
use fund_engine::errors::Result;
use fund_engine::math::{ether, ONE};
use fund_engine::models::{
    Address, ExtensionCall, FundHandle, IntegrationCall, IntegrationManagerAction, NewFundParams,
    SpendAssetsHandleType, U256,
};
use fund_engine::simulation::StaticPriceFeed;
use fund_engine::traits::SharedAdapter;
use std::sync::Arc;

pub const OWNER: Address = Address::repeat_byte(0x01);
pub const MANAGER: Address = Address::repeat_byte(0x02);
pub const ALICE: Address = Address::repeat_byte(0xa1);
pub const BOB: Address = Address::repeat_byte(0xb0);

pub const WETH: Address = Address::repeat_byte(0xe1);
pub const MLN: Address = Address::repeat_byte(0xe2);
pub const USDC: Address = Address::repeat_byte(0xe3);
/// Registered in the ledger but unknown to the price feed.
pub const JUNK: Address = Address::repeat_byte(0xe4);

pub const DESK: Address = Address::repeat_byte(0xd1);
pub const APPROVE_DESK: Address = Address::repeat_byte(0xd2);

pub const START: u64 = 1_700_000_000;
pub const DAY: u64 = 86_400;

pub struct World {
    pub protocol: Protocol,
    pub feed: Arc<StaticPriceFeed>,
}

/// 1 WETH = 2 MLN = 1 USDC. Alice and Bob hold 100 WETH each.
pub fn world() -> World {
    let feed = Arc::new(StaticPriceFeed::new());
    feed.add_asset(WETH, 18, ONE);
    feed.add_asset(MLN, 18, ONE / U256::from(2u8));
    feed.add_asset(USDC, 6, ONE);

    let mut protocol = Protocol::new(OWNER, feed.clone());
    protocol.set_time(START).unwrap();
    protocol.register_token(WETH, "WETH", 18).unwrap();
    protocol.register_token(MLN, "MLN", 18).unwrap();
    protocol.register_token(USDC, "USDC", 6).unwrap();
    protocol.register_token(JUNK, "JUNK", 18).unwrap();

    for investor in [ALICE, BOB] {
        protocol.mint_tokens(WETH, investor, ether(100)).unwrap();
    }

    let im = protocol.integration_manager().address();
    let desk = swap_desk(DESK, im);
    let approve_desk = swap_desk(APPROVE_DESK, im).with_handle_type(SpendAssetsHandleType::Approve);
    for address in [DESK, APPROVE_DESK] {
        protocol.mint_tokens(WETH, address, ether(1_000)).unwrap();
        protocol.mint_tokens(MLN, address, ether(1_000)).unwrap();
        protocol
            .mint_tokens(USDC, address, U256::from(1_000_000_000u64))
            .unwrap();
        protocol.mint_tokens(JUNK, address, ether(1_000)).unwrap();
    }
    let adapters: Vec<SharedAdapter> = vec![Arc::new(desk), Arc::new(approve_desk)];
    protocol.register_adapters(OWNER, adapters).unwrap();

    World { protocol, feed }
}

fn swap_desk(address: Address, integration_manager: Address) -> FixedRateSwapAdapter {
    FixedRateSwapAdapter::new(address, integration_manager)
        .with_rate(WETH, MLN, ether(2))
        .with_rate(MLN, WETH, ONE / U256::from(2u8))
        // 1e18 raw WETH -> 1e6 raw USDC
        .with_rate(WETH, USDC, U256::from(1_000_000u64))
        .with_rate(WETH, JUNK, ONE)
}

impl World {
    pub fn deploy(&mut self, params: NewFundParams) -> FundHandle {
        self.protocol.create_new_fund(MANAGER, params).unwrap()
    }

    /// A WETH fund with no fees or policies.
    pub fn plain_fund(&mut self) -> FundHandle {
        self.deploy(NewFundParams::new(MANAGER, "Plain Fund", WETH))
    }

    pub fn buy(&mut self, fund: FundHandle, investor: Address, amount: U256) -> Result<U256> {
        self.protocol
            .buy_shares(fund.comptroller, investor, investor, amount, U256::from(1u8))
    }

    /// Sells `sell_amount` of `sell` on `desk` for at least `min_buy` of `buy`.
    pub fn trade(
        &mut self,
        fund: FundHandle,
        caller: Address,
        desk: Address,
        sell: Address,
        sell_amount: U256,
        buy: Address,
        min_buy: U256,
    ) -> Result<()> {
        let call = take_order(desk, sell, sell_amount, buy, min_buy);
        self.protocol.call_on_extension(
            fund.comptroller,
            caller,
            &ExtensionCall::Integrations(IntegrationManagerAction::CallOnIntegration(call)),
        )
    }

    pub fn vault_balance(&self, fund: FundHandle, asset: Address) -> U256 {
        self.protocol.balance_of(asset, fund.vault)
    }

    pub fn tracked_assets(&self, fund: FundHandle) -> Vec<Address> {
        self.protocol.vault(fund.vault).unwrap().tracked_assets().to_vec()
    }

    /// Σ holder balances, checked against the vault's own bookkeeping.
    pub fn sum_of_share_balances(&self, fund: FundHandle) -> U256 {
        let vault = self.protocol.vault(fund.vault).unwrap();
        assert!(vault.shares_supply_consistent());
        vault
            .holders()
            .fold(U256::ZERO, |acc, (_, balance)| acc + *balance)
    }
}

pub fn take_order(
    desk: Address,
    sell: Address,
    sell_amount: U256,
    buy: Address,
    min_buy: U256,
) -> IntegrationCall {
    IntegrationCall::new(
        desk,
        take_order_selector(),
        &TakeOrderArgs {
            outgoing_asset: sell,
            outgoing_amount: sell_amount,
            incoming_asset: buy,
            min_incoming_amount: min_buy,
        },
    )
    .unwrap()
}
