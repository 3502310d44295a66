// src/comptroller/mod.rs
//
// The fund router. A comptroller owns no assets; it drives its vault's share
// ledger, values the vault through the price feed and calls into the three
// extensions at the lifecycle points they hook.

pub mod permissioned;
pub mod valuation;

pub use permissioned::{is_allowed_vault_action, PermissionedVault, VaultAction};

use crate::errors::{FundError, Result};
use crate::events::{Event, EventLog};
use crate::fees::{FeeInputs, FeeManager};
use crate::integrations::{IntegrationContext, IntegrationManager};
use crate::math::{self, ONE};
use crate::models::{
    Address, Extension, ExtensionCall, FeeHook, FeeManagerAction, FeeSettings, FundStatus,
    IntegrationManagerAction, PolicyHookArgs, PolicyManagerAction, PolicySettings, SettlementData,
    U256,
};
use crate::policies::{PolicyContext, PolicyManager};
use crate::simulation::TokenLedger;
use crate::traits::PriceFeed;
use crate::vault::Vault;
use log::{debug, info, warn};
use std::collections::{BTreeSet, HashMap};

/// Everything a comptroller call may touch besides the comptroller and its vault.
pub struct Env<'a> {
    pub now: u64,
    pub ledger: &'a mut TokenLedger,
    pub price_feed: &'a dyn PriceFeed,
    pub fee_manager: &'a mut FeeManager,
    pub policy_manager: &'a mut PolicyManager,
    pub integration_manager: &'a mut IntegrationManager,
    pub events: &'a mut EventLog,
}

/// Outcome of a redemption.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Redemption {
    pub shares_quantity: U256,
    pub payout_assets: Vec<Address>,
    pub payout_amounts: Vec<U256>,
}

/// Which assets a redemption pays out, beyond the default of every tracked asset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RedemptionRequest {
    /// `None` redeems the redeemer's whole balance.
    pub shares_quantity: Option<U256>,
    pub additional_assets: Vec<Address>,
    pub assets_to_skip: Vec<Address>,
}

impl RedemptionRequest {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn quantity(shares_quantity: U256) -> Self {
        Self {
            shares_quantity: Some(shares_quantity),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct Comptroller {
    address: Address,
    /// The only principal allowed to init, activate and destruct.
    fund_deployer: Address,
    status: FundStatus,
    denomination_asset: Address,
    denomination_unit: U256,
    shares_action_timelock: u64,
    vault: Option<Address>,
    last_shares_actions: HashMap<Address, u64>,
}

impl Comptroller {
    pub fn new(address: Address, fund_deployer: Address) -> Self {
        Self {
            address,
            fund_deployer,
            status: FundStatus::Uninitialized,
            denomination_asset: Address::ZERO,
            denomination_unit: U256::ZERO,
            shares_action_timelock: 0,
            vault: None,
            last_shares_actions: HashMap::new(),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn status(&self) -> FundStatus {
        self.status
    }

    pub fn denomination_asset(&self) -> Address {
        self.denomination_asset
    }

    pub fn denomination_unit(&self) -> U256 {
        self.denomination_unit
    }

    pub fn shares_action_timelock(&self) -> u64 {
        self.shares_action_timelock
    }

    pub fn vault(&self) -> Option<Address> {
        self.vault
    }

    pub fn last_shares_action(&self, account: Address) -> Option<u64> {
        self.last_shares_actions.get(&account).copied()
    }

    // =========================================================================
    // Guards
    // =========================================================================

    fn assert_fund_deployer(&self, caller: Address) -> Result<()> {
        if caller != self.fund_deployer {
            return Err(FundError::Unauthorized {
                role: "FundDeployer",
            });
        }
        Ok(())
    }

    fn assert_status(&self, operation: &'static str, allowed: &[FundStatus]) -> Result<()> {
        if self.status == FundStatus::Destructed {
            return Err(FundError::Destructed);
        }
        if !allowed.contains(&self.status) {
            return Err(FundError::InvalidStatus {
                operation,
                status: self.status.as_str(),
            });
        }
        Ok(())
    }

    fn assert_vault(&self, vault: &Vault) -> Result<()> {
        if self.vault != Some(vault.address()) {
            return Err(FundError::invalid("Vault is not bound to this comptroller"));
        }
        Ok(())
    }

    fn policy_context<'b>(
        &self,
        vault: &'b Vault,
        ledger: &'b TokenLedger,
        price_feed: &'b dyn PriceFeed,
    ) -> PolicyContext<'b> {
        PolicyContext {
            comptroller: self.address,
            denomination_asset: self.denomination_asset,
            vault,
            ledger,
            price_feed,
        }
    }

    fn fee_inputs(&self, now: u64, gav: U256) -> FeeInputs {
        FeeInputs {
            now,
            gav,
            denomination_unit: self.denomination_unit,
        }
    }

    fn gav(&self, vault: &Vault, env: &Env<'_>) -> Result<U256> {
        valuation::calc_gav(vault, env.ledger, env.price_feed, self.denomination_asset)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Sets the denomination asset and hands fee and policy configuration to
    /// their managers.
    ///
    /// # Arguments
    /// * `caller` - Must be the fund deployer
    /// * `denomination_asset` - Must be supported by the price feed
    /// * `shares_action_timelock` - Minimum seconds between an account's last shares action and a redemption
    pub fn init(
        &mut self,
        caller: Address,
        denomination_asset: Address,
        shares_action_timelock: u64,
        fees: &[FeeSettings],
        policies: &[PolicySettings],
        env: &mut Env<'_>,
    ) -> Result<()> {
        self.assert_fund_deployer(caller)?;
        if self.status != FundStatus::Uninitialized {
            return Err(FundError::AlreadyInitialized);
        }
        if !env.price_feed.is_supported_asset(denomination_asset) {
            return Err(FundError::UnsupportedAsset(denomination_asset));
        }
        let decimals = env.ledger.decimals(denomination_asset)?;

        env.fee_manager
            .set_config_for_fund(self.address, fees, env.events)?;
        env.policy_manager.set_config_for_fund(
            self.address,
            denomination_asset,
            policies,
            env.events,
        )?;

        self.denomination_asset = denomination_asset;
        self.denomination_unit = math::unit(decimals);
        self.shares_action_timelock = shares_action_timelock;
        self.status = FundStatus::Initialized;

        env.events.emit(Event::FundConfigSet {
            comptroller: self.address,
            denomination_asset,
            shares_action_timelock,
            fees: fees.iter().map(FeeSettings::kind).collect(),
            policies: policies.iter().map(PolicySettings::kind).collect(),
        });
        debug!("[comptroller {}] Initialized", self.address);
        Ok(())
    }

    /// Binds the vault and activates every extension for the fund.
    ///
    /// On migration, shares the vault holds of itself are burned before
    /// policies see the fund.
    pub fn activate(
        &mut self,
        caller: Address,
        vault: &mut Vault,
        is_migration: bool,
        env: &mut Env<'_>,
    ) -> Result<()> {
        self.assert_fund_deployer(caller)?;
        match self.status {
            FundStatus::Initialized => {}
            FundStatus::Uninitialized => {
                return Err(FundError::InvalidStatus {
                    operation: "activate",
                    status: self.status.as_str(),
                })
            }
            FundStatus::Destructed => return Err(FundError::Destructed),
            FundStatus::Active | FundStatus::Shutdown => return Err(FundError::AlreadyActivated),
        }
        if vault.accessor() != self.address {
            return Err(FundError::NotAccessor);
        }
        self.vault = Some(vault.address());

        vault.add_tracked_asset(self.address, self.denomination_asset, env.events)?;

        let gav = self.gav(vault, env)?;
        let inputs = self.fee_inputs(env.now, gav);
        env.fee_manager.activate_for_fund(
            &PermissionedVault::new(self.address, Extension::FeeManager, vault),
            inputs,
            env.events,
        )?;

        if is_migration {
            let shares_due = vault.balance_of(vault.address());
            if !shares_due.is_zero() {
                vault.burn_shares(self.address, vault.address(), shares_due)?;
                env.events.emit(Event::MigratedSharesDueBurned {
                    comptroller: self.address,
                    shares_due,
                });
            }
        }

        env.policy_manager
            .activate_for_fund(&self.policy_context(vault, env.ledger, env.price_feed))?;
        env.integration_manager
            .activate_for_fund(self.address, vault)?;

        self.status = FundStatus::Active;
        env.events.emit(Event::VaultProxySet {
            comptroller: self.address,
            vault: vault.address(),
        });
        env.events.emit(Event::StatusUpdated {
            comptroller: self.address,
            status: self.status,
        });
        info!(
            "[comptroller {}] Activated with vault {}{}",
            self.address,
            vault.address(),
            if is_migration { " (migration)" } else { "" }
        );
        Ok(())
    }

    /// Stops new investment and trading. Redemptions stay open.
    pub fn shutdown(&mut self, caller: Address, vault: &mut Vault, env: &mut Env<'_>) -> Result<()> {
        self.assert_status("shutdown", &[FundStatus::Active])?;
        self.assert_vault(vault)?;
        if caller != vault.owner() {
            return Err(FundError::Unauthorized { role: "fund owner" });
        }
        env.fee_manager.deactivate_for_fund(
            &mut PermissionedVault::new(self.address, Extension::FeeManager, vault),
            env.now,
            env.events,
        )?;
        self.status = FundStatus::Shutdown;
        env.events.emit(Event::StatusUpdated {
            comptroller: self.address,
            status: self.status,
        });
        info!("[comptroller {}] Shut down", self.address);
        Ok(())
    }

    /// Terminal. Settles and removes fees, then wipes all per-fund extension storage.
    pub fn destruct(&mut self, caller: Address, vault: &mut Vault, env: &mut Env<'_>) -> Result<()> {
        self.assert_fund_deployer(caller)?;
        self.assert_status("destruct", &[FundStatus::Active, FundStatus::Shutdown])?;
        self.assert_vault(vault)?;

        env.fee_manager.deactivate_for_fund(
            &mut PermissionedVault::new(self.address, Extension::FeeManager, vault),
            env.now,
            env.events,
        )?;
        env.fee_manager.remove_fund(self.address);
        env.policy_manager.remove_fund(self.address);
        env.integration_manager.remove_fund(self.address);

        self.status = FundStatus::Destructed;
        self.last_shares_actions.clear();
        env.events.emit(Event::FundDestructed {
            comptroller: self.address,
        });
        env.events.emit(Event::StatusUpdated {
            comptroller: self.address,
            status: self.status,
        });
        info!("[comptroller {}] Destructed", self.address);
        Ok(())
    }

    // =========================================================================
    // Valuation
    // =========================================================================

    pub fn calc_gav(
        &self,
        vault: &Vault,
        ledger: &TokenLedger,
        price_feed: &dyn PriceFeed,
    ) -> Result<U256> {
        self.assert_status("calcGav", &[FundStatus::Active, FundStatus::Shutdown])?;
        self.assert_vault(vault)?;
        valuation::calc_gav(vault, ledger, price_feed, self.denomination_asset)
    }

    /// Value of one share in denomination units.
    pub fn calc_gross_share_value(
        &self,
        vault: &Vault,
        ledger: &TokenLedger,
        price_feed: &dyn PriceFeed,
    ) -> Result<U256> {
        let gav = self.calc_gav(vault, ledger, price_feed)?;
        valuation::calc_gross_share_value(gav, vault.total_supply(), self.denomination_unit)
    }

    // =========================================================================
    // Shares
    // =========================================================================

    /// Buys shares for `buyer` with `investment_amount` of the denomination
    /// asset taken from `caller`. Returns the shares the buyer ended up with.
    pub fn buy_shares(
        &mut self,
        caller: Address,
        buyer: Address,
        investment_amount: U256,
        min_shares_quantity: U256,
        vault: &mut Vault,
        env: &mut Env<'_>,
    ) -> Result<U256> {
        self.assert_status("buyShares", &[FundStatus::Active])?;
        self.assert_vault(vault)?;
        if investment_amount.is_zero() {
            return Err(FundError::invalid("buyShares: Empty _investmentAmount"));
        }
        if buyer.is_zero() {
            return Err(FundError::invalid("buyShares: Empty _buyer"));
        }

        let gav = self.gav(vault, env)?;
        env.fee_manager.invoke_hook(
            &mut PermissionedVault::new(self.address, Extension::FeeManager, vault),
            &SettlementData::PreBuyShares {
                buyer,
                investment_amount,
                min_shares_quantity,
            },
            self.fee_inputs(env.now, gav),
            env.events,
        )?;

        env.policy_manager.validate_policies(
            &self.policy_context(vault, env.ledger, env.price_feed),
            &PolicyHookArgs::PreBuyShares {
                buyer,
                investment_amount,
                min_shares_quantity,
                gav,
            },
        )?;

        let share_price =
            valuation::calc_gross_share_value(gav, vault.total_supply(), self.denomination_unit)?;
        if share_price.is_zero() {
            return Err(FundError::invalid("buyShares: Share price is zero"));
        }
        let shares_bought = math::mul_div(investment_amount, ONE, share_price, "sharesBought")?;
        if shares_bought.is_zero() {
            return Err(FundError::invalid("buyShares: No shares bought"));
        }

        env.ledger
            .transfer(self.denomination_asset, caller, vault.address(), investment_amount)?;
        let balance_before = vault.balance_of(buyer);
        vault.mint_shares(self.address, buyer, shares_bought)?;

        let gav_after = math::add(gav, investment_amount, "gav")?;
        env.fee_manager.invoke_hook(
            &mut PermissionedVault::new(self.address, Extension::FeeManager, vault),
            &SettlementData::PostBuyShares {
                buyer,
                investment_amount,
                shares_bought,
            },
            self.fee_inputs(env.now, gav_after),
            env.events,
        )?;

        env.policy_manager.validate_policies(
            &self.policy_context(vault, env.ledger, env.price_feed),
            &PolicyHookArgs::PostBuyShares {
                buyer,
                investment_amount,
                shares_issued: shares_bought,
                gav: gav_after,
            },
        )?;

        let shares_received = vault.balance_of(buyer).saturating_sub(balance_before);
        if shares_received < min_shares_quantity {
            return Err(FundError::InsufficientSharesReceived {
                received: shares_received,
                minimum: min_shares_quantity,
            });
        }

        self.last_shares_actions.insert(buyer, env.now);
        env.events.emit(Event::SharesBought {
            comptroller: self.address,
            caller,
            buyer,
            investment_amount,
            shares_bought,
            shares_received,
        });
        debug!(
            "[comptroller {}] {} bought {} shares for {}",
            self.address, buyer, shares_received, investment_amount
        );
        Ok(shares_received)
    }

    /// Redeems all of the redeemer's shares for a slice of every tracked asset.
    pub fn redeem_shares(
        &mut self,
        redeemer: Address,
        vault: &mut Vault,
        env: &mut Env<'_>,
    ) -> Result<Redemption> {
        self.redeem_shares_detailed(redeemer, &RedemptionRequest::all(), vault, env)
    }

    pub fn redeem_shares_quantity(
        &mut self,
        redeemer: Address,
        shares_quantity: U256,
        vault: &mut Vault,
        env: &mut Env<'_>,
    ) -> Result<Redemption> {
        self.redeem_shares_detailed(
            redeemer,
            &RedemptionRequest::quantity(shares_quantity),
            vault,
            env,
        )
    }

    pub fn redeem_shares_detailed(
        &mut self,
        redeemer: Address,
        request: &RedemptionRequest,
        vault: &mut Vault,
        env: &mut Env<'_>,
    ) -> Result<Redemption> {
        self.redeem(redeemer, request, false, vault, env)
    }

    /// Redeems everything without settling fees. Assets that fail to transfer
    /// are skipped and recorded rather than failing the redemption.
    pub fn redeem_shares_emergency(
        &mut self,
        redeemer: Address,
        vault: &mut Vault,
        env: &mut Env<'_>,
    ) -> Result<Redemption> {
        self.redeem(redeemer, &RedemptionRequest::all(), true, vault, env)
    }

    fn redeem(
        &mut self,
        redeemer: Address,
        request: &RedemptionRequest,
        emergency: bool,
        vault: &mut Vault,
        env: &mut Env<'_>,
    ) -> Result<Redemption> {
        self.assert_status("redeemShares", &[FundStatus::Active, FundStatus::Shutdown])?;
        self.assert_vault(vault)?;
        if let Some(last) = self.last_shares_actions.get(&redeemer) {
            if env.now.saturating_sub(*last) < self.shares_action_timelock {
                return Err(FundError::SharesActionTimelocked);
            }
        }

        if !emergency && env.fee_manager.settles_on_hook(self.address, FeeHook::PreRedeemShares) {
            let gav = self.gav(vault, env)?;
            let shares_quantity = request
                .shares_quantity
                .unwrap_or_else(|| vault.balance_of(redeemer));
            env.fee_manager.invoke_hook(
                &mut PermissionedVault::new(self.address, Extension::FeeManager, vault),
                &SettlementData::PreRedeemShares {
                    redeemer,
                    shares_quantity,
                },
                self.fee_inputs(env.now, gav),
                env.events,
            )?;
        }

        let balance = vault.balance_of(redeemer);
        let shares_quantity = request.shares_quantity.unwrap_or(balance);
        if shares_quantity.is_zero() {
            return Err(FundError::invalid("redeemShares: No shares to redeem"));
        }
        if shares_quantity > balance {
            return Err(FundError::InsufficientBalance {
                what: "shares",
                available: balance,
                required: shares_quantity,
            });
        }

        let payout_assets = payout_assets(
            vault.tracked_assets(),
            &request.additional_assets,
            &request.assets_to_skip,
        )?;

        // Burn before anything leaves the vault.
        let supply_before = vault.total_supply();
        vault.burn_shares(self.address, redeemer, shares_quantity)?;

        let mut redemption = Redemption {
            shares_quantity,
            ..Redemption::default()
        };
        for asset in payout_assets {
            let holding = vault.asset_balance(env.ledger, asset);
            let amount = math::mul_div(holding, shares_quantity, supply_before, "redeemShares")?;
            if amount.is_zero() {
                continue;
            }
            match vault.withdraw_asset_to(self.address, env.ledger, asset, redeemer, amount) {
                Ok(()) => {
                    redemption.payout_assets.push(asset);
                    redemption.payout_amounts.push(amount);
                }
                Err(e) if emergency => {
                    warn!(
                        "[comptroller {}] Skipping {} of {} for {}: {}",
                        self.address, amount, asset, redeemer, e
                    );
                    env.events.emit(Event::RedeemSharesAssetSkipped {
                        comptroller: self.address,
                        redeemer,
                        asset,
                        amount,
                        reason: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        self.last_shares_actions.insert(redeemer, env.now);
        env.events.emit(Event::SharesRedeemed {
            comptroller: self.address,
            redeemer,
            shares_quantity,
            received_assets: redemption.payout_assets.clone(),
            received_asset_amounts: redemption.payout_amounts.clone(),
        });
        debug!(
            "[comptroller {}] {} redeemed {} shares",
            self.address, redeemer, shares_quantity
        );
        Ok(redemption)
    }

    // =========================================================================
    // Extensions
    // =========================================================================

    /// Routes an extension action for an active fund. Each action checks its
    /// own caller.
    pub fn call_on_extension(
        &mut self,
        caller: Address,
        call: &ExtensionCall,
        vault: &mut Vault,
        env: &mut Env<'_>,
    ) -> Result<()> {
        self.assert_status("callOnExtension", &[FundStatus::Active])?;
        self.assert_vault(vault)?;
        let owner = vault.owner();

        match call {
            ExtensionCall::Fees(action) => {
                if caller != owner
                    && !env
                        .integration_manager
                        .is_auth_user_for_fund(self.address, caller)
                {
                    return Err(FundError::Unauthorized {
                        role: "fund owner or an authorized user",
                    });
                }
                let gav = self.gav(vault, env)?;
                let inputs = self.fee_inputs(env.now, gav);
                let mut permissioned =
                    PermissionedVault::new(self.address, Extension::FeeManager, vault);
                env.fee_manager.invoke_hook(
                    &mut permissioned,
                    &SettlementData::Continuous,
                    inputs,
                    env.events,
                )?;
                if let FeeManagerAction::PayoutSharesOutstanding { fees } = action {
                    env.fee_manager.payout_shares_outstanding_for_fees(
                        &mut permissioned,
                        fees,
                        inputs,
                        env.events,
                    )?;
                }
            }
            ExtensionCall::Policies(PolicyManagerAction::UpdatePolicySettings {
                policy,
                add,
                remove,
            }) => {
                if caller != owner {
                    return Err(FundError::Unauthorized { role: "fund owner" });
                }
                env.policy_manager.update_policy_settings(
                    self.address,
                    *policy,
                    add,
                    remove,
                    env.events,
                )?;
            }
            ExtensionCall::Integrations(action) => {
                self.call_integration_manager(caller, owner, action, vault, env)?;
            }
        }

        env.events.emit(Event::ExtensionCalled {
            comptroller: self.address,
            caller,
            extension: call.extension(),
            selector: call.selector(),
        });
        Ok(())
    }

    fn call_integration_manager(
        &self,
        caller: Address,
        owner: Address,
        action: &IntegrationManagerAction,
        vault: &mut Vault,
        env: &mut Env<'_>,
    ) -> Result<()> {
        match action {
            IntegrationManagerAction::AddAuthUsers(users) => env
                .integration_manager
                .add_auth_users_for_fund(self.address, owner, caller, users, env.events),
            IntegrationManagerAction::RemoveAuthUsers(users) => env
                .integration_manager
                .remove_auth_users_for_fund(self.address, owner, caller, users, env.events),
            IntegrationManagerAction::CallOnIntegration(call) => {
                let mut ctx = self.integration_context(
                    owner,
                    env.ledger,
                    env.price_feed,
                    env.policy_manager,
                    env.events,
                );
                let mut permissioned =
                    PermissionedVault::new(self.address, Extension::IntegrationManager, vault);
                env.integration_manager
                    .call_on_integration(&mut ctx, &mut permissioned, caller, call)
            }
            IntegrationManagerAction::AddZeroBalanceTrackedAssets(assets) => {
                let mut ctx = self.integration_context(
                    owner,
                    env.ledger,
                    env.price_feed,
                    env.policy_manager,
                    env.events,
                );
                let mut permissioned =
                    PermissionedVault::new(self.address, Extension::IntegrationManager, vault);
                env.integration_manager.add_zero_balance_tracked_assets(
                    &mut ctx,
                    &mut permissioned,
                    caller,
                    assets,
                )
            }
            IntegrationManagerAction::RemoveZeroBalanceTrackedAssets(assets) => {
                let mut ctx = self.integration_context(
                    owner,
                    env.ledger,
                    env.price_feed,
                    env.policy_manager,
                    env.events,
                );
                let mut permissioned =
                    PermissionedVault::new(self.address, Extension::IntegrationManager, vault);
                env.integration_manager.remove_zero_balance_tracked_assets(
                    &mut ctx,
                    &mut permissioned,
                    caller,
                    assets,
                )
            }
        }
    }

    fn integration_context<'b>(
        &self,
        owner: Address,
        ledger: &'b mut TokenLedger,
        price_feed: &'b dyn PriceFeed,
        policy_manager: &'b PolicyManager,
        events: &'b mut EventLog,
    ) -> IntegrationContext<'b> {
        IntegrationContext {
            comptroller: self.address,
            owner,
            denomination_asset: self.denomination_asset,
            ledger,
            price_feed,
            policy_manager,
            events,
        }
    }
}

/// Tracked assets minus `skip`, followed by `additional`. Both inputs must be unique.
fn payout_assets(tracked: &[Address], additional: &[Address], skip: &[Address]) -> Result<Vec<Address>> {
    let additional_set: BTreeSet<Address> = additional.iter().copied().collect();
    if additional_set.len() != additional.len() {
        return Err(FundError::invalid(
            "redeemSharesDetailed: _additionalAssets contains duplicates",
        ));
    }
    let skip_set: BTreeSet<Address> = skip.iter().copied().collect();
    if skip_set.len() != skip.len() {
        return Err(FundError::invalid(
            "redeemSharesDetailed: _assetsToSkip contains duplicates",
        ));
    }
    let mut assets: Vec<Address> = tracked
        .iter()
        .filter(|a| !skip_set.contains(*a))
        .copied()
        .collect();
    for asset in additional {
        if !assets.contains(asset) {
            assets.push(*asset);
        }
    }
    Ok(assets)
}
