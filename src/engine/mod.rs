// src/engine/mod.rs
//
// The protocol instance: plays the fund deployer, owns every fund's state and
// the three extension managers, and runs each top-level call as one atomic
// transaction.

use crate::comptroller::{Comptroller, Env, Redemption, RedemptionRequest};
use crate::errors::{FundError, Result};
use crate::events::{Event, EventLog};
use crate::fees::FeeManager;
use crate::integrations::IntegrationManager;
use crate::models::{
    Address, Extension, ExtensionCall, FeeKind, FeeSettings, FundHandle, FundStatus,
    NewFundParams, PolicySettings, Selector, U256,
};
use crate::policies::PolicyManager;
use crate::simulation::TokenLedger;
use crate::traits::{PriceFeed, SharedAdapter, SharedPriceFeed};
use crate::vault::Vault;
use log::{info, warn};
use std::collections::BTreeMap;

/// Everything a transaction may change. Cloned per call, committed on success.
#[derive(Debug, Clone)]
pub struct ProtocolState {
    now: u64,
    ledger: TokenLedger,
    fee_manager: FeeManager,
    policy_manager: PolicyManager,
    integration_manager: IntegrationManager,
    comptrollers: BTreeMap<Address, Comptroller>,
    vaults: BTreeMap<Address, Vault>,
    events: EventLog,
    /// Next deployment nonce of the fund deployer.
    nonce: u64,
}

impl ProtocolState {
    /// Splits the state into the fund registries and an extension environment.
    fn split<'a>(
        &'a mut self,
        price_feed: &'a dyn PriceFeed,
    ) -> (
        &'a mut BTreeMap<Address, Comptroller>,
        &'a mut BTreeMap<Address, Vault>,
        Env<'a>,
    ) {
        let ProtocolState {
            now,
            ledger,
            fee_manager,
            policy_manager,
            integration_manager,
            comptrollers,
            vaults,
            events,
            ..
        } = self;
        let env = Env {
            now: *now,
            ledger,
            price_feed,
            fee_manager,
            policy_manager,
            integration_manager,
            events,
        };
        (comptrollers, vaults, env)
    }

    /// Runs `f` against an existing fund's comptroller and vault.
    fn with_fund<T>(
        &mut self,
        comptroller: Address,
        price_feed: &dyn PriceFeed,
        f: impl FnOnce(&mut Comptroller, &mut Vault, &mut Env<'_>) -> Result<T>,
    ) -> Result<T> {
        let (comptrollers, vaults, mut env) = self.split(price_feed);
        let comptroller = comptrollers.get_mut(&comptroller).ok_or(FundError::Unknown {
            kind: "comptroller",
            address: comptroller,
        })?;
        let vault_address = comptroller.vault().ok_or(FundError::InvalidStatus {
            operation: "fund",
            status: comptroller.status().as_str(),
        })?;
        let vault = vaults.get_mut(&vault_address).ok_or(FundError::Unknown {
            kind: "vault",
            address: vault_address,
        })?;
        f(comptroller, vault, &mut env)
    }

    fn next_address(&mut self, deployer: Address) -> Address {
        let address = deployer.create(self.nonce);
        self.nonce += 1;
        address
    }
}

/// A deployed protocol: fund deployer, extension managers and every fund.
pub struct Protocol {
    /// Owner of the deployer, curates adapters and protocol limits.
    owner: Address,
    fund_deployer: Address,
    price_feed: SharedPriceFeed,
    state: ProtocolState,
}

impl Protocol {
    /// Deploys the fund deployer and the three extension managers.
    ///
    /// Addresses are derived from `owner` the way contract creation derives them,
    /// so the same owner always yields the same protocol addresses.
    pub fn new(owner: Address, price_feed: SharedPriceFeed) -> Self {
        let fund_deployer = owner.create(0);
        let fee_manager = FeeManager::new(fund_deployer.create(1));
        let policy_manager = PolicyManager::new(fund_deployer.create(2));
        let integration_manager = IntegrationManager::new(fund_deployer.create(3), owner);
        info!(
            "[protocol] Deployed: fund deployer {}, fee manager {}, policy manager {}, integration manager {}",
            fund_deployer,
            fee_manager.address(),
            policy_manager.address(),
            integration_manager.address()
        );
        Self {
            owner,
            fund_deployer,
            price_feed,
            state: ProtocolState {
                now: 0,
                ledger: TokenLedger::new(),
                fee_manager,
                policy_manager,
                integration_manager,
                comptrollers: BTreeMap::new(),
                vaults: BTreeMap::new(),
                events: EventLog::new(),
                nonce: 4,
            },
        }
    }

    /// Runs `f` on a draft of the state. The draft replaces the state only if
    /// `f` succeeds, so a failed call leaves no trace, events included.
    ///
    /// The event log is moved into the draft rather than cloned; on failure
    /// it is cut back to its length before the call.
    fn transact<T>(
        &mut self,
        label: &str,
        f: impl FnOnce(&mut ProtocolState, &dyn PriceFeed) -> Result<T>,
    ) -> Result<T> {
        let mark = self.state.events.len();
        let events = std::mem::take(&mut self.state.events);
        let mut draft = self.state.clone();
        draft.events = events;
        match f(&mut draft, self.price_feed.as_ref()) {
            Ok(value) => {
                self.state = draft;
                Ok(value)
            }
            Err(e) => {
                let mut events = std::mem::take(&mut draft.events);
                events.truncate(mark);
                self.state.events = events;
                warn!("[protocol] {} reverted: {}", label, e);
                Err(e)
            }
        }
    }

    // =========================================================================
    // Clock & Tokens
    // =========================================================================

    pub fn now(&self) -> u64 {
        self.state.now
    }

    /// Advances the clock. Time never goes backwards.
    pub fn warp(&mut self, seconds: u64) {
        self.state.now = self.state.now.saturating_add(seconds);
    }

    pub fn set_time(&mut self, timestamp: u64) -> Result<()> {
        if timestamp < self.state.now {
            return Err(FundError::invalid(format!(
                "Cannot move time backwards from {} to {}",
                self.state.now, timestamp
            )));
        }
        self.state.now = timestamp;
        Ok(())
    }

    pub fn register_token(&mut self, asset: Address, symbol: &str, decimals: u8) -> Result<()> {
        self.state.ledger.register_token(asset, symbol, decimals)
    }

    pub fn mint_tokens(&mut self, asset: Address, to: Address, amount: U256) -> Result<()> {
        self.state.ledger.mint(asset, to, amount)
    }

    pub fn set_token_transferable(&mut self, asset: Address, transferable: bool) -> Result<()> {
        self.state.ledger.set_transferable(asset, transferable)
    }

    pub fn approve_tokens(
        &mut self,
        asset: Address,
        owner: Address,
        spender: Address,
        amount: U256,
    ) -> Result<()> {
        self.state.ledger.approve(asset, owner, spender, amount)
    }

    // =========================================================================
    // Protocol Administration
    // =========================================================================

    pub fn register_adapters(&mut self, caller: Address, adapters: Vec<SharedAdapter>) -> Result<()> {
        self.transact("registerAdapters", |state, _| {
            state
                .integration_manager
                .register_adapters(caller, adapters, &mut state.events)
        })
    }

    pub fn deregister_adapters(&mut self, caller: Address, adapters: &[Address]) -> Result<()> {
        self.transact("deregisterAdapters", |state, _| {
            state
                .integration_manager
                .deregister_adapters(caller, adapters, &mut state.events)
        })
    }

    pub fn set_tracked_assets_limit(&mut self, caller: Address, limit: usize) -> Result<()> {
        self.transact("setTrackedAssetsLimit", |state, _| {
            state
                .integration_manager
                .set_tracked_assets_limit(caller, limit, &mut state.events)
        })
    }

    // =========================================================================
    // Fund Deployment
    // =========================================================================

    /// Deploys, initializes and activates a new fund.
    ///
    /// # Arguments
    /// * `creator` - Whoever submits the deployment
    /// * `params` - Owner, name, denomination asset and extension configuration
    pub fn create_new_fund(&mut self, creator: Address, params: NewFundParams) -> Result<FundHandle> {
        let deployer = self.fund_deployer;
        self.transact("createNewFund", |state, price_feed| {
            if params.owner.is_zero() {
                return Err(FundError::invalid("createNewFund: _fundOwner cannot be empty"));
            }
            let comptroller_address = state.next_address(deployer);
            let vault_address = state.next_address(deployer);

            let (comptrollers, vaults, mut env) = state.split(price_feed);
            let mut comptroller = Comptroller::new(comptroller_address, deployer);
            env.events.emit(Event::ComptrollerProxyDeployed {
                creator,
                comptroller: comptroller_address,
                denomination_asset: params.denomination_asset,
            });
            comptroller.init(
                deployer,
                params.denomination_asset,
                params.shares_action_timelock,
                &params.fees,
                &params.policies,
                &mut env,
            )?;

            let mut vault = Vault::new(
                vault_address,
                params.owner,
                params.name.clone(),
                comptroller_address,
                deployer,
            );
            comptroller.activate(deployer, &mut vault, false, &mut env)?;

            env.events.emit(Event::NewFundDeployed {
                creator,
                comptroller: comptroller_address,
                vault: vault_address,
                fund_owner: params.owner,
                fund_name: params.name.clone(),
            });
            comptrollers.insert(comptroller_address, comptroller);
            vaults.insert(vault_address, vault);
            info!(
                "[protocol] Deployed fund '{}' (comptroller {}, vault {})",
                params.name, comptroller_address, vault_address
            );
            Ok(FundHandle {
                comptroller: comptroller_address,
                vault: vault_address,
            })
        })
    }

    /// Moves a vault to a freshly configured comptroller. The previous
    /// comptroller settles its fees and is destructed.
    pub fn migrate_fund(
        &mut self,
        caller: Address,
        vault_address: Address,
        shares_action_timelock: u64,
        fees: Vec<FeeSettings>,
        policies: Vec<PolicySettings>,
    ) -> Result<FundHandle> {
        let deployer = self.fund_deployer;
        self.transact("migrateFund", |state, price_feed| {
            let next_address = state.next_address(deployer);
            let (comptrollers, vaults, mut env) = state.split(price_feed);
            let vault = vaults.get_mut(&vault_address).ok_or(FundError::Unknown {
                kind: "vault",
                address: vault_address,
            })?;
            if caller != vault.owner() {
                return Err(FundError::Unauthorized { role: "vault owner" });
            }
            let prev_address = vault.accessor();
            let prev = comptrollers.get_mut(&prev_address).ok_or(FundError::Unknown {
                kind: "comptroller",
                address: prev_address,
            })?;
            let denomination_asset = prev.denomination_asset();

            let mut next = Comptroller::new(next_address, deployer);
            env.events.emit(Event::ComptrollerProxyDeployed {
                creator: caller,
                comptroller: next_address,
                denomination_asset,
            });
            next.init(
                deployer,
                denomination_asset,
                shares_action_timelock,
                &fees,
                &policies,
                &mut env,
            )?;

            prev.destruct(deployer, vault, &mut env)?;
            vault.set_accessor(deployer, next_address, env.events)?;
            next.activate(deployer, vault, true, &mut env)?;

            env.events.emit(Event::VaultMigrated {
                vault: vault_address,
                prev_comptroller: prev_address,
                next_comptroller: next_address,
            });
            comptrollers.insert(next_address, next);
            info!(
                "[protocol] Migrated vault {} from {} to {}",
                vault_address, prev_address, next_address
            );
            Ok(FundHandle {
                comptroller: next_address,
                vault: vault_address,
            })
        })
    }

    /// Destructs a fund's comptroller. Only the protocol owner may request it.
    pub fn destruct_fund(&mut self, caller: Address, comptroller: Address) -> Result<()> {
        if caller != self.owner {
            return Err(FundError::Unauthorized {
                role: "FundDeployer owner",
            });
        }
        let deployer = self.fund_deployer;
        self.transact("destruct", |state, price_feed| {
            state.with_fund(comptroller, price_feed, |c, vault, env| {
                c.destruct(deployer, vault, env)
            })
        })
    }

    pub fn shutdown(&mut self, comptroller: Address, caller: Address) -> Result<()> {
        self.transact("shutdown", |state, price_feed| {
            state.with_fund(comptroller, price_feed, |c, vault, env| c.shutdown(caller, vault, env))
        })
    }

    // =========================================================================
    // Shares
    // =========================================================================

    /// Returns the shares the buyer received, net of entrance fees.
    pub fn buy_shares(
        &mut self,
        comptroller: Address,
        caller: Address,
        buyer: Address,
        investment_amount: U256,
        min_shares_quantity: U256,
    ) -> Result<U256> {
        self.transact("buyShares", |state, price_feed| {
            state.with_fund(comptroller, price_feed, |c, vault, env| {
                c.buy_shares(caller, buyer, investment_amount, min_shares_quantity, vault, env)
            })
        })
    }

    pub fn redeem_shares(&mut self, comptroller: Address, redeemer: Address) -> Result<Redemption> {
        self.redeem_shares_detailed(comptroller, redeemer, RedemptionRequest::all())
    }

    pub fn redeem_shares_quantity(
        &mut self,
        comptroller: Address,
        redeemer: Address,
        shares_quantity: U256,
    ) -> Result<Redemption> {
        self.redeem_shares_detailed(
            comptroller,
            redeemer,
            RedemptionRequest::quantity(shares_quantity),
        )
    }

    pub fn redeem_shares_detailed(
        &mut self,
        comptroller: Address,
        redeemer: Address,
        request: RedemptionRequest,
    ) -> Result<Redemption> {
        self.transact("redeemShares", |state, price_feed| {
            state.with_fund(comptroller, price_feed, |c, vault, env| {
                c.redeem_shares_detailed(redeemer, &request, vault, env)
            })
        })
    }

    pub fn redeem_shares_emergency(&mut self, comptroller: Address, redeemer: Address) -> Result<Redemption> {
        self.transact("redeemSharesEmergency", |state, price_feed| {
            state.with_fund(comptroller, price_feed, |c, vault, env| {
                c.redeem_shares_emergency(redeemer, vault, env)
            })
        })
    }

    // =========================================================================
    // Extensions
    // =========================================================================

    pub fn call_on_extension(
        &mut self,
        comptroller: Address,
        caller: Address,
        call: &ExtensionCall,
    ) -> Result<()> {
        self.transact("callOnExtension", |state, price_feed| {
            state.with_fund(comptroller, price_feed, |c, vault, env| {
                c.call_on_extension(caller, call, vault, env)
            })
        })
    }

    /// Same as [`Protocol::call_on_extension`], for an opaque
    /// `(extension, selector, call_args)` triple.
    pub fn call_on_extension_encoded(
        &mut self,
        comptroller: Address,
        caller: Address,
        extension: Extension,
        selector: Selector,
        call_args: &[u8],
    ) -> Result<()> {
        let call = ExtensionCall::decode(extension, selector, call_args)?;
        self.call_on_extension(comptroller, caller, &call)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn fund_deployer(&self) -> Address {
        self.fund_deployer
    }

    pub fn price_feed(&self) -> &SharedPriceFeed {
        &self.price_feed
    }

    pub fn ledger(&self) -> &TokenLedger {
        &self.state.ledger
    }

    pub fn events(&self) -> &EventLog {
        &self.state.events
    }

    pub fn fee_manager(&self) -> &FeeManager {
        &self.state.fee_manager
    }

    pub fn policy_manager(&self) -> &PolicyManager {
        &self.state.policy_manager
    }

    pub fn integration_manager(&self) -> &IntegrationManager {
        &self.state.integration_manager
    }

    pub fn funds(&self) -> Vec<FundHandle> {
        self.state
            .comptrollers
            .values()
            .filter(|c| c.status() != FundStatus::Destructed)
            .filter_map(|c| {
                c.vault().map(|vault| FundHandle {
                    comptroller: c.address(),
                    vault,
                })
            })
            .collect()
    }

    /// Fails once the comptroller has been destructed.
    pub fn comptroller(&self, address: Address) -> Result<&Comptroller> {
        let comptroller = self.state.comptrollers.get(&address).ok_or(FundError::Unknown {
            kind: "comptroller",
            address,
        })?;
        if comptroller.status() == FundStatus::Destructed {
            return Err(FundError::Destructed);
        }
        Ok(comptroller)
    }

    pub fn vault(&self, address: Address) -> Result<&Vault> {
        self.state.vaults.get(&address).ok_or(FundError::Unknown {
            kind: "vault",
            address,
        })
    }

    fn fund(&self, comptroller: Address) -> Result<(&Comptroller, &Vault)> {
        let c = self.comptroller(comptroller)?;
        let vault_address = c.vault().ok_or(FundError::InvalidStatus {
            operation: "fund",
            status: c.status().as_str(),
        })?;
        Ok((c, self.vault(vault_address)?))
    }

    pub fn calc_gav(&self, comptroller: Address) -> Result<U256> {
        let (c, vault) = self.fund(comptroller)?;
        c.calc_gav(vault, &self.state.ledger, self.price_feed.as_ref())
    }

    pub fn calc_gross_share_value(&self, comptroller: Address) -> Result<U256> {
        let (c, vault) = self.fund(comptroller)?;
        c.calc_gross_share_value(vault, &self.state.ledger, self.price_feed.as_ref())
    }

    pub fn shares_balance(&self, comptroller: Address, holder: Address) -> Result<U256> {
        Ok(self.fund(comptroller)?.1.balance_of(holder))
    }

    pub fn total_supply(&self, comptroller: Address) -> Result<U256> {
        Ok(self.fund(comptroller)?.1.total_supply())
    }

    pub fn shares_outstanding(&self, comptroller: Address, fee: FeeKind) -> U256 {
        self.state.fee_manager.shares_outstanding(comptroller, fee)
    }

    pub fn balance_of(&self, asset: Address, holder: Address) -> U256 {
        self.state.ledger.balance_of(asset, holder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{ether, ONE};
    use crate::simulation::StaticPriceFeed;
    use std::sync::Arc;

    const OWNER: Address = Address::repeat_byte(0x0a);
    const MANAGER: Address = Address::repeat_byte(0x0b);
    const ALICE: Address = Address::repeat_byte(0xa1);
    const WETH: Address = Address::repeat_byte(0xee);

    fn protocol() -> Protocol {
        let feed = StaticPriceFeed::new();
        feed.add_asset(WETH, 18, ONE);
        let mut protocol = Protocol::new(OWNER, Arc::new(feed));
        protocol.register_token(WETH, "WETH", 18).unwrap();
        protocol
    }

    #[test]
    fn test_addresses_are_deterministic() {
        let a = protocol();
        let b = protocol();
        assert_eq!(a.fund_deployer(), b.fund_deployer());
        assert_ne!(a.fee_manager().address(), a.policy_manager().address());
    }

    #[test]
    fn test_failed_call_rolls_back_state_and_events() {
        let mut protocol = protocol();
        let fund = protocol
            .create_new_fund(MANAGER, NewFundParams::new(MANAGER, "Rollback", WETH))
            .unwrap();
        protocol.mint_tokens(WETH, ALICE, ether(1)).unwrap();
        let events_before = protocol.events().len();

        // Minimum can never be met, so the buy reverts after minting.
        assert!(protocol
            .buy_shares(fund.comptroller, ALICE, ALICE, ether(1), ether(2))
            .is_err());
        assert_eq!(protocol.events().len(), events_before);
        assert_eq!(protocol.total_supply(fund.comptroller).unwrap(), U256::ZERO);
        assert_eq!(protocol.balance_of(WETH, ALICE), ether(1));
    }

    #[test]
    fn test_revert_keeps_earlier_events_and_later_calls_append() {
        let mut protocol = protocol();
        let fund = protocol
            .create_new_fund(MANAGER, NewFundParams::new(MANAGER, "Log", WETH))
            .unwrap();
        protocol.mint_tokens(WETH, ALICE, ether(2)).unwrap();
        let before: Vec<Event> = protocol.events().all().to_vec();

        assert!(protocol
            .buy_shares(fund.comptroller, ALICE, ALICE, ether(1), ether(2))
            .is_err());
        assert_eq!(protocol.events().all(), before.as_slice());

        protocol
            .buy_shares(fund.comptroller, ALICE, ALICE, ether(1), U256::from(1u8))
            .unwrap();
        assert_eq!(&protocol.events().all()[..before.len()], before.as_slice());
        assert!(protocol.events().since(before.len())
            .iter()
            .any(|e| e.name() == "SharesBought"));
    }

    #[test]
    fn test_create_fund_with_zero_owner_fails_without_consuming_nonce() {
        let mut protocol = protocol();
        assert!(protocol
            .create_new_fund(MANAGER, NewFundParams::new(Address::ZERO, "Nobody", WETH))
            .is_err());
        let fund = protocol
            .create_new_fund(MANAGER, NewFundParams::new(MANAGER, "Somebody", WETH))
            .unwrap();
        assert_eq!(fund.comptroller, protocol.fund_deployer().create(4));
    }

    #[test]
    fn test_only_owner_administers_adapters() {
        let mut protocol = protocol();
        assert!(protocol.set_tracked_assets_limit(ALICE, 5).is_err());
        protocol.set_tracked_assets_limit(OWNER, 5).unwrap();
        assert_eq!(protocol.integration_manager().tracked_assets_limit(), 5);
    }
}
