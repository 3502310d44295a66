// src/policies/address_list.rs
//
// Membership policies. One implementation covers every allow/deny list; the
// policy kind decides which address of the hook arguments is checked.

use super::PolicyContext;
use crate::errors::{FundError, Result};
use crate::events::{Event, EventLog};
use crate::models::{Address, ExecutionTime, PolicyHook, PolicyHookArgs, PolicyKind};
use crate::traits::Policy;
use std::collections::BTreeSet;

/// What the list is checked against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListSubject {
    /// The adapter of a call on integration.
    Adapter,
    /// Every incoming asset of a call on integration.
    Asset,
    /// The buyer of shares.
    Investor,
    /// The caller of a call on integration.
    User,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListMode {
    Whitelist,
    Blacklist,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressListPolicy {
    kind: PolicyKind,
    subject: ListSubject,
    mode: ListMode,
    list: BTreeSet<Address>,
}

impl AddressListPolicy {
    /// Returns `None` for policy kinds that are not address lists.
    pub fn subject_and_mode(kind: PolicyKind) -> Option<(ListSubject, ListMode)> {
        let pair = match kind {
            PolicyKind::AdapterBlacklist => (ListSubject::Adapter, ListMode::Blacklist),
            PolicyKind::AdapterWhitelist => (ListSubject::Adapter, ListMode::Whitelist),
            PolicyKind::AssetBlacklist => (ListSubject::Asset, ListMode::Blacklist),
            PolicyKind::AssetWhitelist => (ListSubject::Asset, ListMode::Whitelist),
            PolicyKind::InvestorBlacklist => (ListSubject::Investor, ListMode::Blacklist),
            PolicyKind::InvestorWhitelist => (ListSubject::Investor, ListMode::Whitelist),
            PolicyKind::UserBlacklist => (ListSubject::User, ListMode::Blacklist),
            PolicyKind::UserWhitelist => (ListSubject::User, ListMode::Whitelist),
            PolicyKind::MaxConcentration | PolicyKind::BuySharesPriceFeedTolerance => return None,
        };
        Some(pair)
    }

    /// Validates and stores a fund's initial list.
    ///
    /// # Arguments
    /// * `kind` - Which list policy this is
    /// * `items` - The initial list, must be non-empty and free of duplicates
    /// * `denomination_asset` - Asset whitelists must contain it, asset blacklists must not
    pub fn add_fund_settings(
        kind: PolicyKind,
        comptroller: Address,
        items: &[Address],
        denomination_asset: Address,
        events: &mut EventLog,
    ) -> Result<Self> {
        let (subject, mode) = Self::subject_and_mode(kind)
            .ok_or_else(|| FundError::invalid(format!("{} is not an address list", kind)))?;
        if subject == ListSubject::Asset {
            let includes_denomination = items.contains(&denomination_asset);
            match mode {
                ListMode::Whitelist if !includes_denomination => {
                    return Err(FundError::invalid(
                        "addFundSettings: Must whitelist denominationAsset",
                    ));
                }
                ListMode::Blacklist if includes_denomination => {
                    return Err(FundError::invalid(
                        "addFundSettings: Cannot blacklist denominationAsset",
                    ));
                }
                _ => {}
            }
        }

        let mut policy = Self {
            kind,
            subject,
            mode,
            list: BTreeSet::new(),
        };
        policy.add_to_list(comptroller, items, events)?;
        Ok(policy)
    }

    pub fn subject(&self) -> ListSubject {
        self.subject
    }

    pub fn mode(&self) -> ListMode {
        self.mode
    }

    pub fn is_in_list(&self, address: Address) -> bool {
        self.list.contains(&address)
    }

    pub fn list(&self) -> Vec<Address> {
        self.list.iter().copied().collect()
    }

    fn passes(&self, address: Address) -> bool {
        match self.mode {
            ListMode::Whitelist => self.is_in_list(address),
            ListMode::Blacklist => !self.is_in_list(address),
        }
    }

    fn add_to_list(&mut self, comptroller: Address, items: &[Address], events: &mut EventLog) -> Result<()> {
        if items.is_empty() {
            return Err(FundError::invalid("__addToList: No addresses provided"));
        }
        for item in items {
            if item.is_zero() {
                return Err(FundError::invalid("__addToList: Empty address"));
            }
            if !self.list.insert(*item) {
                return Err(FundError::invalid(
                    "__addToList: Address already exists in list",
                ));
            }
        }
        events.emit(Event::AddressesAdded {
            comptroller,
            policy: self.kind,
            items: items.to_vec(),
        });
        Ok(())
    }

    fn remove_from_list(
        &mut self,
        comptroller: Address,
        items: &[Address],
        events: &mut EventLog,
    ) -> Result<()> {
        for item in items {
            if !self.list.remove(item) {
                return Err(FundError::invalid(
                    "__removeFromList: Address does not exist in list",
                ));
            }
        }
        events.emit(Event::AddressesRemoved {
            comptroller,
            policy: self.kind,
            items: items.to_vec(),
        });
        Ok(())
    }
}

impl Policy for AddressListPolicy {
    fn kind(&self) -> PolicyKind {
        self.kind
    }

    fn implemented_hook(&self) -> (PolicyHook, ExecutionTime) {
        match self.subject {
            ListSubject::Adapter | ListSubject::User => {
                (PolicyHook::CallOnIntegration, ExecutionTime::Pre)
            }
            ListSubject::Asset => (PolicyHook::CallOnIntegration, ExecutionTime::Post),
            ListSubject::Investor => (PolicyHook::BuyShares, ExecutionTime::Pre),
        }
    }

    fn activate_for_fund(&self, ctx: &PolicyContext<'_>) -> Result<()> {
        if self.subject != ListSubject::Asset {
            return Ok(());
        }
        if !ctx.vault.tracked_assets().iter().all(|a| self.passes(*a)) {
            let reason = match self.mode {
                ListMode::Whitelist => "activateForFund: Non-whitelisted asset detected",
                ListMode::Blacklist => "activateForFund: Blacklisted asset detected",
            };
            return Err(FundError::invalid(reason));
        }
        Ok(())
    }

    fn updatable(&self) -> bool {
        self.mode == ListMode::Whitelist
            && matches!(self.subject, ListSubject::Investor | ListSubject::User)
    }

    fn update_fund_settings(
        &mut self,
        comptroller: Address,
        add: &[Address],
        remove: &[Address],
        events: &mut EventLog,
    ) -> Result<()> {
        if !self.updatable() {
            return Err(FundError::invalid(format!(
                "updateFundSettings: Updates not allowed for {}",
                self.kind
            )));
        }
        if add.is_empty() && remove.is_empty() {
            return Err(FundError::invalid("updateFundSettings: No updates"));
        }
        if !add.is_empty() {
            self.add_to_list(comptroller, add, events)?;
        }
        if !remove.is_empty() {
            self.remove_from_list(comptroller, remove, events)?;
        }
        Ok(())
    }

    fn validate_rule(&self, _ctx: &PolicyContext<'_>, args: &PolicyHookArgs) -> Result<bool> {
        let passes = match (self.subject, args) {
            (ListSubject::Adapter, PolicyHookArgs::PreCallOnIntegration { adapter, .. }) => {
                self.passes(*adapter)
            }
            (ListSubject::User, PolicyHookArgs::PreCallOnIntegration { caller, .. }) => {
                self.passes(*caller)
            }
            (ListSubject::Asset, PolicyHookArgs::PostCallOnIntegration { incoming_assets, .. }) => {
                incoming_assets.iter().all(|a| self.passes(*a))
            }
            (ListSubject::Investor, PolicyHookArgs::PreBuyShares { buyer, .. }) => {
                self.passes(*buyer)
            }
            _ => {
                return Err(FundError::invalid(format!(
                    "validateRule: Unexpected hook arguments for {}",
                    self.kind
                )))
            }
        };
        Ok(passes)
    }
}
