// src/integrations/mod.rs
//
// Adapter registry and the call-on-integration protocol. What an adapter says
// it will do is only used for policy checks and custody grants; what it did is
// measured from the vault's balances before and after the call.

use crate::comptroller::PermissionedVault;
use crate::errors::{FundError, Result};
use crate::events::{Event, EventLog};
use crate::models::{Address, IntegrationCall, ParsedAssets, PolicyHookArgs, SpendAssetsHandleType, U256};
use crate::policies::{PolicyContext, PolicyManager};
use crate::simulation::TokenLedger;
use crate::traits::{PriceFeed, SharedAdapter};
use log::{debug, info};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

/// Default bound on the number of tracked assets per vault.
pub const DEFAULT_TRACKED_ASSETS_LIMIT: usize = 20;

/// Fund-level collaborators of an integration manager call.
pub struct IntegrationContext<'a> {
    pub comptroller: Address,
    pub owner: Address,
    pub denomination_asset: Address,
    pub ledger: &'a mut TokenLedger,
    pub price_feed: &'a dyn PriceFeed,
    pub policy_manager: &'a PolicyManager,
    pub events: &'a mut EventLog,
}

#[derive(Debug, Clone)]
struct IntegrationFund {
    vault: Address,
    auth_users: BTreeSet<Address>,
}

/// Balance deltas measured around an adapter call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Reconciliation {
    incoming_assets: Vec<Address>,
    incoming_asset_amounts: Vec<U256>,
    outgoing_assets: Vec<Address>,
    outgoing_asset_amounts: Vec<U256>,
}

#[derive(Clone)]
pub struct IntegrationManager {
    address: Address,
    /// The protocol owner, who curates adapters and the tracked assets limit.
    owner: Address,
    adapters: BTreeMap<Address, SharedAdapter>,
    tracked_assets_limit: usize,
    funds: HashMap<Address, IntegrationFund>,
}

impl fmt::Debug for IntegrationManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntegrationManager")
            .field("address", &self.address)
            .field("owner", &self.owner)
            .field("adapters", &self.adapters.keys().collect::<Vec<_>>())
            .field("tracked_assets_limit", &self.tracked_assets_limit)
            .field("funds", &self.funds)
            .finish()
    }
}

impl IntegrationManager {
    pub fn new(address: Address, owner: Address) -> Self {
        Self {
            address,
            owner,
            adapters: BTreeMap::new(),
            tracked_assets_limit: DEFAULT_TRACKED_ASSETS_LIMIT,
            funds: HashMap::new(),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn tracked_assets_limit(&self) -> usize {
        self.tracked_assets_limit
    }

    pub fn is_registered_adapter(&self, adapter: Address) -> bool {
        self.adapters.contains_key(&adapter)
    }

    pub fn registered_adapters(&self) -> Vec<Address> {
        self.adapters.keys().copied().collect()
    }

    /// The vault bound to a comptroller, if activated.
    pub fn vault_for_fund(&self, comptroller: Address) -> Option<Address> {
        self.funds.get(&comptroller).map(|f| f.vault)
    }

    pub fn is_auth_user_for_fund(&self, comptroller: Address, account: Address) -> bool {
        self.funds
            .get(&comptroller)
            .map(|f| f.auth_users.contains(&account))
            .unwrap_or(false)
    }

    // =========================================================================
    // Protocol owner
    // =========================================================================

    fn assert_owner(&self, caller: Address) -> Result<()> {
        if caller != self.owner {
            return Err(FundError::Unauthorized {
                role: "FundDeployer owner",
            });
        }
        Ok(())
    }

    pub fn register_adapters(
        &mut self,
        caller: Address,
        adapters: Vec<SharedAdapter>,
        events: &mut EventLog,
    ) -> Result<()> {
        self.assert_owner(caller)?;
        if adapters.is_empty() {
            return Err(FundError::invalid("registerAdapters: _adapters cannot be empty"));
        }
        for adapter in adapters {
            let address = adapter.address();
            if address.is_zero() {
                return Err(FundError::invalid("registerAdapters: Adapter cannot be empty"));
            }
            if self.adapters.contains_key(&address) {
                return Err(FundError::invalid("registerAdapters: Adapter already registered"));
            }
            let identifier = adapter.identifier().to_string();
            info!("[integration manager] Registered adapter {} at {}", identifier, address);
            self.adapters.insert(address, adapter);
            events.emit(Event::AdapterRegistered {
                adapter: address,
                identifier,
            });
        }
        Ok(())
    }

    pub fn deregister_adapters(
        &mut self,
        caller: Address,
        adapters: &[Address],
        events: &mut EventLog,
    ) -> Result<()> {
        self.assert_owner(caller)?;
        if adapters.is_empty() {
            return Err(FundError::invalid("deregisterAdapters: _adapters cannot be empty"));
        }
        for address in adapters {
            let adapter = self.adapters.remove(address).ok_or_else(|| {
                FundError::invalid("deregisterAdapters: Adapter is not registered")
            })?;
            events.emit(Event::AdapterDeregistered {
                adapter: *address,
                identifier: adapter.identifier().to_string(),
            });
        }
        Ok(())
    }

    pub fn set_tracked_assets_limit(
        &mut self,
        caller: Address,
        limit: usize,
        events: &mut EventLog,
    ) -> Result<()> {
        self.assert_owner(caller)?;
        self.tracked_assets_limit = limit;
        events.emit(Event::TrackedAssetsLimitSet { limit });
        Ok(())
    }

    // =========================================================================
    // Fund binding
    // =========================================================================

    /// Binds a vault to the calling comptroller. The comptroller must already be
    /// the vault's accessor.
    pub fn activate_for_fund(&mut self, caller: Address, vault: &crate::vault::Vault) -> Result<()> {
        if self.funds.contains_key(&caller) {
            return Err(FundError::ExtensionAlreadyActive {
                extension: "IntegrationManager",
            });
        }
        if vault.address().is_zero() {
            return Err(FundError::invalid("activateForFund: Fund vault cannot be empty"));
        }
        if vault.accessor() != caller {
            return Err(FundError::NotAccessor);
        }
        self.funds.insert(
            caller,
            IntegrationFund {
                vault: vault.address(),
                auth_users: BTreeSet::new(),
            },
        );
        Ok(())
    }

    pub fn remove_fund(&mut self, comptroller: Address) {
        self.funds.remove(&comptroller);
    }

    fn fund(&self, comptroller: Address) -> Result<&IntegrationFund> {
        self.funds
            .get(&comptroller)
            .ok_or_else(|| FundError::invalid("Fund is not active on the IntegrationManager"))
    }

    fn assert_authorized(&self, comptroller: Address, owner: Address, caller: Address) -> Result<()> {
        if caller == owner || self.fund(comptroller)?.auth_users.contains(&caller) {
            return Ok(());
        }
        Err(FundError::Unauthorized {
            role: "fund owner or an authorized user",
        })
    }

    // =========================================================================
    // Authorized users
    // =========================================================================

    pub fn add_auth_users_for_fund(
        &mut self,
        comptroller: Address,
        owner: Address,
        caller: Address,
        users: &[Address],
        events: &mut EventLog,
    ) -> Result<()> {
        if caller != owner {
            return Err(FundError::Unauthorized { role: "fund owner" });
        }
        let fund = self
            .funds
            .get_mut(&comptroller)
            .ok_or_else(|| FundError::invalid("Fund is not active on the IntegrationManager"))?;
        for user in users {
            if user.is_zero() {
                return Err(FundError::invalid("addAuthUsersForFund: Empty account"));
            }
            if *user == owner {
                return Err(FundError::invalid("addAuthUsersForFund: Cannot add fund owner"));
            }
            if !fund.auth_users.insert(*user) {
                return Err(FundError::invalid(
                    "addAuthUsersForFund: Account is already an authorized user",
                ));
            }
            events.emit(Event::AuthUserAddedForFund {
                comptroller,
                account: *user,
            });
        }
        Ok(())
    }

    pub fn remove_auth_users_for_fund(
        &mut self,
        comptroller: Address,
        owner: Address,
        caller: Address,
        users: &[Address],
        events: &mut EventLog,
    ) -> Result<()> {
        if caller != owner {
            return Err(FundError::Unauthorized { role: "fund owner" });
        }
        let fund = self
            .funds
            .get_mut(&comptroller)
            .ok_or_else(|| FundError::invalid("Fund is not active on the IntegrationManager"))?;
        for user in users {
            if !fund.auth_users.remove(user) {
                return Err(FundError::invalid(
                    "removeAuthUsersForFund: Account is not an authorized user",
                ));
            }
            events.emit(Event::AuthUserRemovedForFund {
                comptroller,
                account: *user,
            });
        }
        Ok(())
    }

    // =========================================================================
    // Tracked assets
    // =========================================================================

    fn track_asset(&self, vault: &mut PermissionedVault<'_>, asset: Address, events: &mut EventLog) -> Result<()> {
        if vault.vault().is_tracked_asset(asset) {
            return Ok(());
        }
        if vault.vault().tracked_assets().len() >= self.tracked_assets_limit {
            return Err(FundError::TrackedAssetsLimitExceeded {
                limit: self.tracked_assets_limit,
            });
        }
        vault.add_tracked_asset(asset, events)
    }

    /// Starts tracking assets the vault does not hold yet.
    pub fn add_zero_balance_tracked_assets(
        &self,
        ctx: &mut IntegrationContext<'_>,
        vault: &mut PermissionedVault<'_>,
        caller: Address,
        assets: &[Address],
    ) -> Result<()> {
        self.assert_authorized(ctx.comptroller, ctx.owner, caller)?;
        for asset in assets {
            if !ctx.price_feed.is_supported_asset(*asset) {
                return Err(FundError::UnsupportedAsset(*asset));
            }
            if !vault.vault().asset_balance(ctx.ledger, *asset).is_zero() {
                return Err(FundError::invalid("addZeroBalanceTrackedAssets: Balance is not zero"));
            }
            self.track_asset(vault, *asset, ctx.events)?;
        }
        Ok(())
    }

    /// Stops tracking assets the vault no longer holds.
    pub fn remove_zero_balance_tracked_assets(
        &self,
        ctx: &mut IntegrationContext<'_>,
        vault: &mut PermissionedVault<'_>,
        caller: Address,
        assets: &[Address],
    ) -> Result<()> {
        self.assert_authorized(ctx.comptroller, ctx.owner, caller)?;
        for asset in assets {
            if *asset == ctx.denomination_asset {
                return Err(FundError::invalid(
                    "removeZeroBalanceTrackedAssets: Cannot remove denomination asset",
                ));
            }
            if !vault.vault().asset_balance(ctx.ledger, *asset).is_zero() {
                return Err(FundError::invalid(
                    "removeZeroBalanceTrackedAssets: Balance is not zero",
                ));
            }
            vault.remove_tracked_asset(*asset, ctx.events)?;
        }
        Ok(())
    }

    // =========================================================================
    // Call on integration
    // =========================================================================

    /// Executes one adapter action on behalf of a fund.
    ///
    /// # Arguments
    /// * `ctx` - Fund-level collaborators
    /// * `vault` - The fund's vault, lent with integration permissions
    /// * `caller` - Must be the fund owner or an authorized user
    /// * `call` - Adapter, selector and adapter-specific arguments
    pub fn call_on_integration(
        &self,
        ctx: &mut IntegrationContext<'_>,
        vault: &mut PermissionedVault<'_>,
        caller: Address,
        call: &IntegrationCall,
    ) -> Result<()> {
        self.assert_authorized(ctx.comptroller, ctx.owner, caller)?;
        let fund = self.fund(ctx.comptroller)?;
        let vault_address = vault.vault().address();
        if fund.vault != vault_address {
            return Err(FundError::invalid("callOnIntegration: Vault mismatch"));
        }
        let adapter = self
            .adapters
            .get(&call.adapter)
            .cloned()
            .ok_or_else(|| FundError::invalid("callOnIntegration: Adapter is not registered"))?;

        let parsed = adapter.parse_assets_for_method(call.selector, &call.encoded_call_args)?;
        validate_parsed_assets(&parsed)?;

        {
            let policy_ctx = PolicyContext {
                comptroller: ctx.comptroller,
                denomination_asset: ctx.denomination_asset,
                vault: vault.vault(),
                ledger: ctx.ledger,
                price_feed: ctx.price_feed,
            };
            ctx.policy_manager.validate_policies(
                &policy_ctx,
                &PolicyHookArgs::PreCallOnIntegration {
                    caller,
                    adapter: call.adapter,
                    selector: call.selector,
                    incoming_assets: parsed.incoming_assets.clone(),
                    min_incoming_asset_amounts: parsed.min_incoming_asset_amounts.clone(),
                    spend_assets: parsed.spend_assets.clone(),
                    spend_asset_amounts: parsed.spend_asset_amounts.clone(),
                },
            )?;
        }

        let pre_incoming = balances(ctx.ledger, vault_address, &parsed.incoming_assets);
        let pre_spend = balances(ctx.ledger, vault_address, &parsed.spend_assets);

        grant_custody(ctx.ledger, vault, &parsed, call.adapter)?;
        debug!(
            "[integration manager] {} executing {} on {}",
            ctx.comptroller,
            call.selector,
            adapter.identifier()
        );
        adapter.execute(
            self.address,
            vault_address,
            call.selector,
            &call.encoded_call_args,
            ctx.ledger,
        )?;
        if parsed.spend_assets_handle_type == SpendAssetsHandleType::Approve {
            for asset in &parsed.spend_assets {
                vault.approve_asset_spender(ctx.ledger, *asset, call.adapter, U256::ZERO)?;
            }
        }

        let reconciliation = reconcile(
            ctx.ledger,
            vault_address,
            &parsed,
            &pre_incoming,
            &pre_spend,
        );

        for asset in &reconciliation.incoming_assets {
            let is_new = !vault.vault().is_tracked_asset(*asset);
            if is_new
                && (!ctx.price_feed.is_supported_asset(*asset) || !ctx.ledger.is_transferable(*asset))
            {
                return Err(FundError::NonReceivableAsset(*asset));
            }
        }
        for (i, asset) in parsed.incoming_assets.iter().enumerate() {
            let received = amount_received(&reconciliation, *asset);
            let minimum = parsed.min_incoming_asset_amounts[i];
            if received < minimum {
                return Err(FundError::InsufficientIncomingAsset {
                    asset: *asset,
                    received,
                    minimum,
                });
            }
        }

        for asset in &reconciliation.incoming_assets {
            self.track_asset(vault, *asset, ctx.events)?;
        }
        for asset in &parsed.spend_assets {
            if *asset != ctx.denomination_asset
                && vault.vault().is_tracked_asset(*asset)
                && vault.vault().asset_balance(ctx.ledger, *asset).is_zero()
            {
                vault.remove_tracked_asset(*asset, ctx.events)?;
            }
        }

        {
            let policy_ctx = PolicyContext {
                comptroller: ctx.comptroller,
                denomination_asset: ctx.denomination_asset,
                vault: vault.vault(),
                ledger: ctx.ledger,
                price_feed: ctx.price_feed,
            };
            ctx.policy_manager.validate_policies(
                &policy_ctx,
                &PolicyHookArgs::PostCallOnIntegration {
                    caller,
                    adapter: call.adapter,
                    selector: call.selector,
                    incoming_assets: reconciliation.incoming_assets.clone(),
                    incoming_asset_amounts: reconciliation.incoming_asset_amounts.clone(),
                    outgoing_assets: reconciliation.outgoing_assets.clone(),
                    outgoing_asset_amounts: reconciliation.outgoing_asset_amounts.clone(),
                },
            )?;
        }

        info!(
            "[integration manager] {} via {}: in {:?} out {:?}",
            ctx.comptroller,
            adapter.identifier(),
            reconciliation.incoming_asset_amounts,
            reconciliation.outgoing_asset_amounts
        );
        ctx.events.emit(Event::CallOnIntegrationExecuted {
            comptroller: ctx.comptroller,
            vault: vault_address,
            caller,
            adapter: call.adapter,
            selector: call.selector,
            incoming_assets: reconciliation.incoming_assets,
            incoming_asset_amounts: reconciliation.incoming_asset_amounts,
            outgoing_assets: reconciliation.outgoing_assets,
            outgoing_asset_amounts: reconciliation.outgoing_asset_amounts,
        });
        Ok(())
    }
}

/// Equal-length pairs, no duplicates, no empty assets or amounts.
pub fn validate_parsed_assets(parsed: &ParsedAssets) -> Result<()> {
    if parsed.spend_assets.len() != parsed.spend_asset_amounts.len() {
        return Err(FundError::invalid(
            "parseAssetsForMethod: Spend assets arrays unequal",
        ));
    }
    if parsed.incoming_assets.len() != parsed.min_incoming_asset_amounts.len() {
        return Err(FundError::invalid(
            "parseAssetsForMethod: Incoming assets arrays unequal",
        ));
    }
    check_asset_list(&parsed.spend_assets, &parsed.spend_asset_amounts, "spend")?;
    check_asset_list(
        &parsed.incoming_assets,
        &parsed.min_incoming_asset_amounts,
        "incoming",
    )
}

fn check_asset_list(assets: &[Address], amounts: &[U256], side: &'static str) -> Result<()> {
    let mut seen = BTreeSet::new();
    for (asset, amount) in assets.iter().zip(amounts) {
        if !seen.insert(*asset) {
            return Err(FundError::DuplicateAsset(side));
        }
        if asset.is_zero() {
            return Err(FundError::invalid(format!("Empty {} asset", side)));
        }
        if amount.is_zero() {
            return Err(FundError::invalid(format!("Empty {} asset amount", side)));
        }
    }
    Ok(())
}

fn balances(ledger: &TokenLedger, holder: Address, assets: &[Address]) -> Vec<U256> {
    assets.iter().map(|a| ledger.balance_of(*a, holder)).collect()
}

fn grant_custody(
    ledger: &mut TokenLedger,
    vault: &mut PermissionedVault<'_>,
    parsed: &ParsedAssets,
    adapter: Address,
) -> Result<()> {
    let pairs = parsed.spend_assets.iter().zip(&parsed.spend_asset_amounts);
    match parsed.spend_assets_handle_type {
        SpendAssetsHandleType::None => Ok(()),
        SpendAssetsHandleType::Approve => {
            for (asset, amount) in pairs {
                vault.approve_asset_spender(ledger, *asset, adapter, *amount)?;
            }
            Ok(())
        }
        SpendAssetsHandleType::Transfer => {
            for (asset, amount) in pairs {
                vault.withdraw_asset_to(ledger, *asset, adapter, *amount)?;
            }
            Ok(())
        }
    }
}

/// Measures what actually moved. A spend asset whose balance rose is incoming.
fn reconcile(
    ledger: &TokenLedger,
    vault: Address,
    parsed: &ParsedAssets,
    pre_incoming: &[U256],
    pre_spend: &[U256],
) -> Reconciliation {
    let mut out = Reconciliation::default();
    for (asset, pre) in parsed.incoming_assets.iter().zip(pre_incoming) {
        let post = ledger.balance_of(*asset, vault);
        out.incoming_assets.push(*asset);
        out.incoming_asset_amounts.push(post.saturating_sub(*pre));
    }
    for (asset, pre) in parsed.spend_assets.iter().zip(pre_spend) {
        let post = ledger.balance_of(*asset, vault);
        if post > *pre {
            if !out.incoming_assets.contains(asset) {
                out.incoming_assets.push(*asset);
                out.incoming_asset_amounts.push(post - *pre);
            }
        } else if post < *pre {
            out.outgoing_assets.push(*asset);
            out.outgoing_asset_amounts.push(*pre - post);
        }
    }
    out
}

fn amount_received(reconciliation: &Reconciliation, asset: Address) -> U256 {
    reconciliation
        .incoming_assets
        .iter()
        .position(|a| *a == asset)
        .map(|i| reconciliation.incoming_asset_amounts[i])
        .unwrap_or(U256::ZERO)
}
