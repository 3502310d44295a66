// src/scenario/runner.rs

use super::format_units;
use crate::config::{parse_units, ActionConfig, AdapterConfig, Config, FixedRateSwapConfig};
use crate::connectors::{take_order_selector, FixedRateSwapAdapter, TakeOrderArgs};
use crate::engine::Protocol;
use crate::errors::{FundError, Result};
use crate::math;
use crate::models::{
    Address, ExtensionCall, FeeManagerAction, FundHandle, IntegrationCall,
    IntegrationManagerAction, NewFundParams, PolicyManagerAction, U256,
};
use crate::simulation::StaticPriceFeed;
use crate::traits::SharedAdapter;
use log::{info, warn};
use serde::Serialize;
use std::sync::Arc;

const SHARE_DECIMALS: u8 = 18;

/// Result of one scripted action.
#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    pub index: usize,
    pub action: String,
    pub timestamp: u64,
    pub ok: bool,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HolderSummary {
    pub holder: Address,
    pub shares: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssetSummary {
    pub asset: Address,
    pub symbol: String,
    pub balance: String,
}

/// End state of a scenario.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResult {
    pub fund_name: String,
    pub comptroller: Address,
    pub vault: Address,
    pub status: String,
    pub final_timestamp: u64,
    pub denomination_symbol: String,
    pub gav: String,
    pub gross_share_value: String,
    pub total_supply: String,
    pub holders: Vec<HolderSummary>,
    pub tracked_assets: Vec<AssetSummary>,
    pub steps: Vec<StepOutcome>,
    pub event_count: usize,
}

impl ScenarioResult {
    pub fn failed_steps(&self) -> usize {
        self.steps.iter().filter(|s| !s.ok).count()
    }
}

/// Deploys the configured protocol and fund, then plays the action script.
///
/// A failing action is recorded and the script continues: every call is
/// atomic, so a revert leaves the fund exactly as it was.
pub struct ScenarioRunner {
    config: Config,
    protocol: Protocol,
    price_feed: Arc<StaticPriceFeed>,
    fund: FundHandle,
}

impl ScenarioRunner {
    /// Builds the protocol: tokens, prices, balances, adapters and the fund.
    pub fn new(config: Config) -> Result<Self> {
        let price_feed = Arc::new(StaticPriceFeed::new());
        let mut protocol = Protocol::new(config.protocol.owner, price_feed.clone());
        protocol.set_time(config.protocol.start_time)?;

        for token in &config.tokens {
            protocol.register_token(token.address, &token.symbol, token.decimals)?;
            price_feed.add_asset(token.address, token.decimals, parse_price(&token.price)?);
            if let Some(live) = &token.live_price {
                price_feed.set_live_rate(token.address, parse_price(live)?)?;
            }
        }

        for balance in &config.balances {
            let token = config.token(&balance.token).map_err(FundError::invalid)?;
            let amount = parse_units(&balance.amount, token.decimals).map_err(FundError::invalid)?;
            protocol.mint_tokens(token.address, balance.holder, amount)?;
        }

        let owner = protocol.owner();
        if let Some(limit) = config.protocol.tracked_assets_limit {
            protocol.set_tracked_assets_limit(owner, limit)?;
        }

        let integration_manager = protocol.integration_manager().address();
        let mut adapters: Vec<SharedAdapter> = Vec::new();
        for adapter in &config.adapters {
            match adapter {
                AdapterConfig::FixedRateSwap(cfg) => {
                    adapters.push(Arc::new(build_swap_adapter(&config, cfg, integration_manager)?));
                }
            }
        }
        if !adapters.is_empty() {
            protocol.register_adapters(owner, adapters)?;
        }

        let denomination = config
            .token(&config.fund.denomination_asset)
            .map_err(FundError::invalid)?
            .address;
        let mut params = NewFundParams::new(config.fund.owner, config.fund.name.clone(), denomination)
            .with_timelock(config.fund.shares_action_timelock);
        params.fees = config.fees.clone();
        params.policies = config.policies.clone();
        let fund = protocol.create_new_fund(config.fund.owner, params)?;

        info!(
            "[scenario] Fund '{}' deployed at {} with {} actions queued",
            config.fund.name,
            fund.comptroller,
            config.actions.len()
        );

        Ok(Self {
            config,
            protocol,
            price_feed,
            fund,
        })
    }

    pub fn protocol(&self) -> &Protocol {
        &self.protocol
    }

    pub fn fund(&self) -> FundHandle {
        self.fund
    }

    /// Plays every action and summarizes the final state.
    pub fn run(&mut self) -> Result<ScenarioResult> {
        let actions = self.config.actions.clone();
        let mut steps = Vec::with_capacity(actions.len());

        for (index, action) in actions.iter().enumerate() {
            let name = action_name(action);
            let outcome = self.apply(action);
            let (ok, detail) = match outcome {
                Ok(detail) => {
                    info!("[scenario] #{} {}: {}", index, name, detail);
                    (true, detail)
                }
                Err(e) => {
                    warn!("[scenario] #{} {} failed: {}", index, name, e);
                    (false, e.to_string())
                }
            };
            steps.push(StepOutcome {
                index,
                action: name.to_string(),
                timestamp: self.protocol.now(),
                ok,
                detail,
            });
        }

        self.summarize(steps)
    }

    fn apply(&mut self, action: &ActionConfig) -> Result<String> {
        let comptroller = self.fund.comptroller;
        let fund_owner = self.config.fund.owner;

        match action {
            ActionConfig::Warp { seconds } => {
                self.protocol.warp(*seconds);
                Ok(format!("now {}", self.protocol.now()))
            }
            ActionConfig::SetPrice {
                token,
                price,
                live_price,
            } => {
                let asset = self.token_address(token)?;
                self.price_feed.set_rate(asset, parse_price(price)?)?;
                if let Some(live) = live_price {
                    self.price_feed.set_live_rate(asset, parse_price(live)?)?;
                }
                Ok(format!("{} = {}", token, price))
            }
            ActionConfig::Mint { token, to, amount } => {
                let asset = self.token_address(token)?;
                let raw = self.amount(token, amount)?;
                self.protocol.mint_tokens(asset, *to, raw)?;
                Ok(format!("{} {} to {}", amount, token, to))
            }
            ActionConfig::BuyShares {
                investor,
                amount,
                min_shares,
            } => {
                let denomination = self.config.fund.denomination_asset.clone();
                let investment = self.amount(&denomination, amount)?;
                let min = match min_shares {
                    Some(min) => parse_units(min, SHARE_DECIMALS).map_err(FundError::invalid)?,
                    None => U256::from(1u8),
                };
                let received = self
                    .protocol
                    .buy_shares(comptroller, *investor, *investor, investment, min)?;
                Ok(format!(
                    "{} received {} shares for {} {}",
                    investor,
                    format_units(received, SHARE_DECIMALS),
                    amount,
                    denomination
                ))
            }
            ActionConfig::RedeemShares { investor, quantity } => {
                let redemption = match quantity {
                    Some(q) => {
                        let shares = parse_units(q, SHARE_DECIMALS).map_err(FundError::invalid)?;
                        self.protocol
                            .redeem_shares_quantity(comptroller, *investor, shares)?
                    }
                    None => self.protocol.redeem_shares(comptroller, *investor)?,
                };
                Ok(format!(
                    "{} redeemed {} shares for {}",
                    investor,
                    format_units(redemption.shares_quantity, SHARE_DECIMALS),
                    self.describe_amounts(&redemption.payout_assets, &redemption.payout_amounts)
                ))
            }
            ActionConfig::RedeemSharesEmergency { investor } => {
                let redemption = self
                    .protocol
                    .redeem_shares_emergency(comptroller, *investor)?;
                Ok(format!(
                    "{} redeemed {} shares for {}",
                    investor,
                    format_units(redemption.shares_quantity, SHARE_DECIMALS),
                    self.describe_amounts(&redemption.payout_assets, &redemption.payout_amounts)
                ))
            }
            ActionConfig::Trade {
                caller,
                adapter,
                sell,
                sell_amount,
                buy,
                min_buy_amount,
            } => {
                let args = TakeOrderArgs {
                    outgoing_asset: self.token_address(sell)?,
                    outgoing_amount: self.amount(sell, sell_amount)?,
                    incoming_asset: self.token_address(buy)?,
                    min_incoming_amount: match min_buy_amount {
                        Some(min) => self.amount(buy, min)?,
                        None => U256::from(1u8),
                    },
                };
                let vault = self.fund.vault;
                let buy_before = self.protocol.balance_of(args.incoming_asset, vault);
                let call = IntegrationCall::new(*adapter, take_order_selector(), &args)?;
                self.protocol.call_on_extension(
                    comptroller,
                    caller.unwrap_or(fund_owner),
                    &ExtensionCall::Integrations(IntegrationManagerAction::CallOnIntegration(call)),
                )?;
                let received = self
                    .protocol
                    .balance_of(args.incoming_asset, vault)
                    .saturating_sub(buy_before);
                Ok(format!(
                    "sold {} {} for {} {}",
                    sell_amount,
                    sell,
                    self.describe_amount(args.incoming_asset, received),
                    buy
                ))
            }
            ActionConfig::InvokeContinuousHook { caller } => {
                let supply_before = self.protocol.total_supply(comptroller)?;
                self.protocol.call_on_extension(
                    comptroller,
                    caller.unwrap_or(fund_owner),
                    &ExtensionCall::Fees(FeeManagerAction::InvokeContinuousHook),
                )?;
                let supply_after = self.protocol.total_supply(comptroller)?;
                Ok(format!(
                    "supply {} -> {}",
                    format_units(supply_before, SHARE_DECIMALS),
                    format_units(supply_after, SHARE_DECIMALS)
                ))
            }
            ActionConfig::PayoutSharesOutstanding { caller, fees } => {
                self.protocol.call_on_extension(
                    comptroller,
                    caller.unwrap_or(fund_owner),
                    &ExtensionCall::Fees(FeeManagerAction::PayoutSharesOutstanding {
                        fees: fees.clone(),
                    }),
                )?;
                Ok(format!(
                    "owner holds {} shares",
                    format_units(
                        self.protocol.shares_balance(comptroller, fund_owner)?,
                        SHARE_DECIMALS
                    )
                ))
            }
            ActionConfig::AddAuthUsers { users } => {
                self.protocol.call_on_extension(
                    comptroller,
                    fund_owner,
                    &ExtensionCall::Integrations(IntegrationManagerAction::AddAuthUsers(
                        users.clone(),
                    )),
                )?;
                Ok(format!("{} auth users added", users.len()))
            }
            ActionConfig::UpdatePolicy {
                policy,
                add,
                remove,
            } => {
                self.protocol.call_on_extension(
                    comptroller,
                    fund_owner,
                    &ExtensionCall::Policies(PolicyManagerAction::UpdatePolicySettings {
                        policy: *policy,
                        add: add.clone(),
                        remove: remove.clone(),
                    }),
                )?;
                Ok(format!("{}: +{} -{}", policy, add.len(), remove.len()))
            }
            ActionConfig::Shutdown => {
                self.protocol.shutdown(comptroller, fund_owner)?;
                Ok("fund shut down".to_string())
            }
        }
    }

    fn summarize(&self, steps: Vec<StepOutcome>) -> Result<ScenarioResult> {
        let comptroller = self.protocol.comptroller(self.fund.comptroller)?;
        let vault = self.protocol.vault(self.fund.vault)?;
        let ledger = self.protocol.ledger();
        let denomination = comptroller.denomination_asset();
        let denomination_decimals = ledger.decimals(denomination)?;

        let holders = vault
            .holders()
            .map(|(holder, shares)| HolderSummary {
                holder: *holder,
                shares: format_units(*shares, SHARE_DECIMALS),
            })
            .collect();

        let mut tracked_assets = Vec::new();
        for asset in vault.tracked_assets() {
            let info = ledger.token(*asset)?;
            tracked_assets.push(AssetSummary {
                asset: *asset,
                symbol: info.symbol.clone(),
                balance: format_units(vault.asset_balance(ledger, *asset), info.decimals),
            });
        }

        let gav = self.protocol.calc_gav(self.fund.comptroller)?;
        let share_value = self.protocol.calc_gross_share_value(self.fund.comptroller)?;

        Ok(ScenarioResult {
            fund_name: vault.name().to_string(),
            comptroller: self.fund.comptroller,
            vault: self.fund.vault,
            status: comptroller.status().to_string(),
            final_timestamp: self.protocol.now(),
            denomination_symbol: ledger.token(denomination)?.symbol.clone(),
            gav: format_units(gav, denomination_decimals),
            gross_share_value: format_units(share_value, denomination_decimals),
            total_supply: format_units(vault.total_supply(), SHARE_DECIMALS),
            holders,
            tracked_assets,
            steps,
            event_count: self.protocol.events().len(),
        })
    }

    fn token_address(&self, reference: &str) -> Result<Address> {
        self.config
            .token(reference)
            .map(|t| t.address)
            .map_err(FundError::invalid)
    }

    fn amount(&self, reference: &str, amount: &str) -> Result<U256> {
        self.config
            .token_amount(reference, amount)
            .map_err(FundError::invalid)
    }

    fn describe_amount(&self, asset: Address, amount: U256) -> String {
        match self.protocol.ledger().token(asset) {
            Ok(info) => format_units(amount, info.decimals),
            Err(_) => amount.to_string(),
        }
    }

    fn describe_amounts(&self, assets: &[Address], amounts: &[U256]) -> String {
        if assets.is_empty() {
            return "nothing".to_string();
        }
        assets
            .iter()
            .zip(amounts)
            .map(|(asset, amount)| {
                let symbol = self
                    .protocol
                    .ledger()
                    .token(*asset)
                    .map(|t| t.symbol.clone())
                    .unwrap_or_else(|_| asset.to_string());
                format!("{} {}", self.describe_amount(*asset, *amount), symbol)
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// A whole-unit price as a 1e18-scaled reference rate.
fn parse_price(price: &str) -> Result<U256> {
    parse_units(price, 18).map_err(FundError::invalid)
}

/// Human rates ("2000 USDC per WETH") become raw-per-raw 1e18-scaled rates.
fn build_swap_adapter(
    config: &Config,
    cfg: &FixedRateSwapConfig,
    integration_manager: Address,
) -> Result<FixedRateSwapAdapter> {
    let mut adapter =
        FixedRateSwapAdapter::new(cfg.address, integration_manager).with_handle_type(cfg.handle_type);
    for rate in &cfg.rates {
        let sell = config.token(&rate.sell).map_err(FundError::invalid)?;
        let buy = config.token(&rate.buy).map_err(FundError::invalid)?;
        let raw_rate = math::mul_div(
            parse_price(&rate.rate)?,
            math::unit(buy.decimals),
            math::unit(sell.decimals),
            "adapter rate",
        )?;
        adapter = adapter.with_rate(sell.address, buy.address, raw_rate);
    }
    Ok(adapter)
}

fn action_name(action: &ActionConfig) -> &'static str {
    match action {
        ActionConfig::Warp { .. } => "warp",
        ActionConfig::SetPrice { .. } => "set_price",
        ActionConfig::Mint { .. } => "mint",
        ActionConfig::BuyShares { .. } => "buy_shares",
        ActionConfig::RedeemShares { .. } => "redeem_shares",
        ActionConfig::RedeemSharesEmergency { .. } => "redeem_shares_emergency",
        ActionConfig::Trade { .. } => "trade",
        ActionConfig::InvokeContinuousHook { .. } => "invoke_continuous_hook",
        ActionConfig::PayoutSharesOutstanding { .. } => "payout_shares_outstanding",
        ActionConfig::AddAuthUsers { .. } => "add_auth_users",
        ActionConfig::UpdatePolicy { .. } => "update_policy",
        ActionConfig::Shutdown => "shutdown",
    }
}
