// src/policies/mod.rs
//
// Policy validation engine. Every registered policy whose hook matches runs;
// the first `false` aborts the enclosing operation.

pub mod address_list;
pub mod max_concentration;
pub mod price_tolerance;

pub use address_list::{AddressListPolicy, ListMode, ListSubject};
pub use max_concentration::MaxConcentration;
pub use price_tolerance::BuySharesPriceFeedTolerance;

use crate::comptroller::valuation;
use crate::errors::{FundError, Result};
use crate::events::{Event, EventLog};
use crate::models::{Address, PolicyHookArgs, PolicyKind, PolicySettings, U256};
use crate::simulation::TokenLedger;
use crate::traits::{Policy, PriceFeed};
use crate::vault::Vault;
use log::{debug, warn};
use std::collections::HashMap;

// =============================================================================
// Validation Context
// =============================================================================

/// Read-only fund state available to policies.
pub struct PolicyContext<'a> {
    pub comptroller: Address,
    pub denomination_asset: Address,
    pub vault: &'a Vault,
    pub ledger: &'a TokenLedger,
    pub price_feed: &'a dyn PriceFeed,
}

impl<'a> PolicyContext<'a> {
    pub fn calc_gav(&self) -> Result<U256> {
        valuation::calc_gav(self.vault, self.ledger, self.price_feed, self.denomination_asset)
    }

    pub fn calc_live_gav(&self) -> Result<U256> {
        valuation::calc_live_gav(self.vault, self.ledger, self.price_feed, self.denomination_asset)
    }
}

// =============================================================================
// Policy Instances
// =============================================================================

/// One enabled policy of a fund.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyInstance {
    AddressList(AddressListPolicy),
    MaxConcentration(MaxConcentration),
    BuySharesPriceFeedTolerance(BuySharesPriceFeedTolerance),
}

impl PolicyInstance {
    /// Validates settings, builds the policy and records its configuration events.
    pub fn add_fund_settings(
        comptroller: Address,
        denomination_asset: Address,
        settings: &PolicySettings,
        events: &mut EventLog,
    ) -> Result<Self> {
        let instance = match settings {
            PolicySettings::MaxConcentration { limit } => PolicyInstance::MaxConcentration(
                MaxConcentration::add_fund_settings(comptroller, *limit, events)?,
            ),
            PolicySettings::BuySharesPriceFeedTolerance { tolerance } => {
                PolicyInstance::BuySharesPriceFeedTolerance(
                    BuySharesPriceFeedTolerance::add_fund_settings(comptroller, *tolerance, events)?,
                )
            }
            PolicySettings::AdapterBlacklist { addresses }
            | PolicySettings::AdapterWhitelist { addresses }
            | PolicySettings::AssetBlacklist { addresses }
            | PolicySettings::AssetWhitelist { addresses }
            | PolicySettings::InvestorBlacklist { addresses }
            | PolicySettings::InvestorWhitelist { addresses }
            | PolicySettings::UserBlacklist { addresses }
            | PolicySettings::UserWhitelist { addresses } => {
                PolicyInstance::AddressList(AddressListPolicy::add_fund_settings(
                    settings.kind(),
                    comptroller,
                    addresses,
                    denomination_asset,
                    events,
                )?)
            }
        };
        Ok(instance)
    }

    fn inner(&self) -> &dyn Policy {
        match self {
            PolicyInstance::AddressList(p) => p,
            PolicyInstance::MaxConcentration(p) => p,
            PolicyInstance::BuySharesPriceFeedTolerance(p) => p,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Policy {
        match self {
            PolicyInstance::AddressList(p) => p,
            PolicyInstance::MaxConcentration(p) => p,
            PolicyInstance::BuySharesPriceFeedTolerance(p) => p,
        }
    }

    pub fn kind(&self) -> PolicyKind {
        self.inner().kind()
    }
}

// =============================================================================
// Policy Manager
// =============================================================================

/// Per-fund policy configuration.
#[derive(Debug, Clone)]
pub struct PolicyManager {
    address: Address,
    funds: HashMap<Address, Vec<PolicyInstance>>,
}

impl PolicyManager {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            funds: HashMap::new(),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn is_configured(&self, comptroller: Address) -> bool {
        self.funds.contains_key(&comptroller)
    }

    pub fn enabled_policies(&self, comptroller: Address) -> Vec<PolicyKind> {
        self.funds
            .get(&comptroller)
            .map(|p| p.iter().map(PolicyInstance::kind).collect())
            .unwrap_or_default()
    }

    pub fn policy(&self, comptroller: Address, kind: PolicyKind) -> Option<&PolicyInstance> {
        self.funds.get(&comptroller)?.iter().find(|p| p.kind() == kind)
    }

    /// Stores a fund's policy configuration. Runs once per fund, at `init`.
    pub fn set_config_for_fund(
        &mut self,
        comptroller: Address,
        denomination_asset: Address,
        settings: &[PolicySettings],
        events: &mut EventLog,
    ) -> Result<()> {
        if self.funds.contains_key(&comptroller) {
            return Err(FundError::ExtensionAlreadyConfigured {
                extension: "PolicyManager",
            });
        }
        let mut policies: Vec<PolicyInstance> = Vec::with_capacity(settings.len());
        for setting in settings {
            if policies.iter().any(|p| p.kind() == setting.kind()) {
                return Err(FundError::invalid(
                    "setConfigForFund: policies cannot include duplicates",
                ));
            }
            let policy =
                PolicyInstance::add_fund_settings(comptroller, denomination_asset, setting, events)?;
            events.emit(Event::PolicyEnabledForFund {
                comptroller,
                policy: policy.kind(),
            });
            policies.push(policy);
        }
        debug!("[policy manager] Configured {} policies for {}", policies.len(), comptroller);
        self.funds.insert(comptroller, policies);
        Ok(())
    }

    /// Lets every policy check the fund's starting state.
    pub fn activate_for_fund(&self, ctx: &PolicyContext<'_>) -> Result<()> {
        if let Some(policies) = self.funds.get(&ctx.comptroller) {
            for policy in policies {
                policy.inner().activate_for_fund(ctx)?;
            }
        }
        Ok(())
    }

    /// Runs every policy registered for `args`' hook. Any `false` fails the call.
    pub fn validate_policies(&self, ctx: &PolicyContext<'_>, args: &PolicyHookArgs) -> Result<()> {
        let Some(policies) = self.funds.get(&ctx.comptroller) else {
            return Ok(());
        };
        let hook = args.hook();
        for policy in policies.iter().filter(|p| p.inner().implemented_hook() == hook) {
            if !policy.inner().validate_rule(ctx, args)? {
                let identifier = policy.kind().identifier();
                warn!("[policy manager] {} rejected {:?} for {}", identifier, hook, ctx.comptroller);
                return Err(FundError::PolicyViolation {
                    identifier: identifier.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Applies an owner's list update to one of the fund's policies.
    pub fn update_policy_settings(
        &mut self,
        comptroller: Address,
        kind: PolicyKind,
        add: &[Address],
        remove: &[Address],
        events: &mut EventLog,
    ) -> Result<()> {
        let policy = self
            .funds
            .get_mut(&comptroller)
            .and_then(|p| p.iter_mut().find(|p| p.kind() == kind))
            .ok_or_else(|| {
                FundError::invalid(format!("updatePolicySettings: {} is not enabled", kind))
            })?;
        policy
            .inner_mut()
            .update_fund_settings(comptroller, add, remove, events)
    }

    pub fn remove_fund(&mut self, comptroller: Address) {
        self.funds.remove(&comptroller);
    }
}
