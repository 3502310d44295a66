// src/events.rs
//
// Public audit log. Every state change a fund goes through is recorded here
// with enough before/after data to reconstruct it.

use crate::models::{
    Address, Extension, FeeKind, FundStatus, PolicyKind, Selector, SettlementType, U256,
};
use log::debug;
use serde::{Deserialize, Serialize};

/// An entry of the audit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum Event {
    // --- FundDeployer ---
    ComptrollerProxyDeployed {
        creator: Address,
        comptroller: Address,
        denomination_asset: Address,
    },
    NewFundDeployed {
        creator: Address,
        comptroller: Address,
        vault: Address,
        fund_owner: Address,
        fund_name: String,
    },
    VaultMigrated {
        vault: Address,
        prev_comptroller: Address,
        next_comptroller: Address,
    },

    // --- Comptroller ---
    FundConfigSet {
        comptroller: Address,
        denomination_asset: Address,
        shares_action_timelock: u64,
        fees: Vec<FeeKind>,
        policies: Vec<PolicyKind>,
    },
    VaultProxySet {
        comptroller: Address,
        vault: Address,
    },
    StatusUpdated {
        comptroller: Address,
        status: FundStatus,
    },
    MigratedSharesDueBurned {
        comptroller: Address,
        shares_due: U256,
    },
    SharesBought {
        comptroller: Address,
        caller: Address,
        buyer: Address,
        investment_amount: U256,
        shares_bought: U256,
        shares_received: U256,
    },
    SharesRedeemed {
        comptroller: Address,
        redeemer: Address,
        shares_quantity: U256,
        received_assets: Vec<Address>,
        received_asset_amounts: Vec<U256>,
    },
    RedeemSharesAssetSkipped {
        comptroller: Address,
        redeemer: Address,
        asset: Address,
        amount: U256,
        reason: String,
    },
    FundDestructed {
        comptroller: Address,
    },

    // --- Vault ---
    AccessorSet {
        vault: Address,
        prev_accessor: Address,
        next_accessor: Address,
    },
    TrackedAssetAdded {
        vault: Address,
        asset: Address,
    },
    TrackedAssetRemoved {
        vault: Address,
        asset: Address,
    },

    // --- FeeManager and fees ---
    FundSettingsAdded {
        comptroller: Address,
        fee: FeeKind,
        rate: U256,
        period: Option<u64>,
    },
    FeeSettledForFund {
        comptroller: Address,
        fee: FeeKind,
        settlement_type: SettlementType,
        payer: Option<Address>,
        payee: Option<Address>,
        shares_due: U256,
    },
    Settled {
        comptroller: Address,
        fee: FeeKind,
        shares_quantity: U256,
        prev_settled: Option<u64>,
    },
    PerformanceUpdated {
        comptroller: Address,
        prev_aggregate_value_due: U256,
        next_aggregate_value_due: U256,
        prev_shares_outstanding: U256,
        next_shares_outstanding: U256,
    },
    PaidOut {
        comptroller: Address,
        prev_high_water_mark: U256,
        next_high_water_mark: U256,
        aggregate_value_due: U256,
    },
    SharesOutstandingPaidForFund {
        comptroller: Address,
        fee: FeeKind,
        shares_due: U256,
    },

    // --- PolicyManager and policies ---
    PolicyEnabledForFund {
        comptroller: Address,
        policy: PolicyKind,
    },
    AddressesAdded {
        comptroller: Address,
        policy: PolicyKind,
        items: Vec<Address>,
    },
    AddressesRemoved {
        comptroller: Address,
        policy: PolicyKind,
        items: Vec<Address>,
    },
    MaxConcentrationSet {
        comptroller: Address,
        value: U256,
    },
    ToleranceSetForFund {
        comptroller: Address,
        tolerance: U256,
    },

    // --- IntegrationManager ---
    AdapterRegistered {
        adapter: Address,
        identifier: String,
    },
    AdapterDeregistered {
        adapter: Address,
        identifier: String,
    },
    AuthUserAddedForFund {
        comptroller: Address,
        account: Address,
    },
    AuthUserRemovedForFund {
        comptroller: Address,
        account: Address,
    },
    TrackedAssetsLimitSet {
        limit: usize,
    },
    CallOnIntegrationExecuted {
        comptroller: Address,
        vault: Address,
        caller: Address,
        adapter: Address,
        selector: Selector,
        incoming_assets: Vec<Address>,
        incoming_asset_amounts: Vec<U256>,
        outgoing_assets: Vec<Address>,
        outgoing_asset_amounts: Vec<U256>,
    },
    ExtensionCalled {
        comptroller: Address,
        caller: Address,
        extension: Extension,
        selector: Selector,
    },
}

impl Event {
    /// The event's variant name, as it appears in the serialized `event` tag.
    pub fn name(&self) -> &'static str {
        match self {
            Event::ComptrollerProxyDeployed { .. } => "ComptrollerProxyDeployed",
            Event::NewFundDeployed { .. } => "NewFundDeployed",
            Event::VaultMigrated { .. } => "VaultMigrated",
            Event::FundConfigSet { .. } => "FundConfigSet",
            Event::VaultProxySet { .. } => "VaultProxySet",
            Event::StatusUpdated { .. } => "StatusUpdated",
            Event::MigratedSharesDueBurned { .. } => "MigratedSharesDueBurned",
            Event::SharesBought { .. } => "SharesBought",
            Event::SharesRedeemed { .. } => "SharesRedeemed",
            Event::RedeemSharesAssetSkipped { .. } => "RedeemSharesAssetSkipped",
            Event::FundDestructed { .. } => "FundDestructed",
            Event::AccessorSet { .. } => "AccessorSet",
            Event::TrackedAssetAdded { .. } => "TrackedAssetAdded",
            Event::TrackedAssetRemoved { .. } => "TrackedAssetRemoved",
            Event::FundSettingsAdded { .. } => "FundSettingsAdded",
            Event::FeeSettledForFund { .. } => "FeeSettledForFund",
            Event::Settled { .. } => "Settled",
            Event::PerformanceUpdated { .. } => "PerformanceUpdated",
            Event::PaidOut { .. } => "PaidOut",
            Event::SharesOutstandingPaidForFund { .. } => "SharesOutstandingPaidForFund",
            Event::PolicyEnabledForFund { .. } => "PolicyEnabledForFund",
            Event::AddressesAdded { .. } => "AddressesAdded",
            Event::AddressesRemoved { .. } => "AddressesRemoved",
            Event::MaxConcentrationSet { .. } => "MaxConcentrationSet",
            Event::ToleranceSetForFund { .. } => "ToleranceSetForFund",
            Event::AdapterRegistered { .. } => "AdapterRegistered",
            Event::AdapterDeregistered { .. } => "AdapterDeregistered",
            Event::AuthUserAddedForFund { .. } => "AuthUserAddedForFund",
            Event::AuthUserRemovedForFund { .. } => "AuthUserRemovedForFund",
            Event::TrackedAssetsLimitSet { .. } => "TrackedAssetsLimitSet",
            Event::CallOnIntegrationExecuted { .. } => "CallOnIntegrationExecuted",
            Event::ExtensionCalled { .. } => "ExtensionCalled",
        }
    }
}

/// Append-only event log.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<Event>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, event: Event) {
        debug!("[events] {}", event.name());
        self.events.push(event);
    }

    pub fn all(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Returns every event with the given name, oldest first.
    pub fn named(&self, name: &str) -> Vec<&Event> {
        self.events.iter().filter(|e| e.name() == name).collect()
    }

    /// Returns the most recent event with the given name.
    pub fn last_named(&self, name: &str) -> Option<&Event> {
        self.events.iter().rev().find(|e| e.name() == name)
    }

    /// Drops every event after the first `len`.
    pub fn truncate(&mut self, len: usize) {
        self.events.truncate(len);
    }

    /// Events emitted after the first `from` entries.
    pub fn since(&self, from: usize) -> &[Event] {
        &self.events[from.min(self.events.len())..]
    }
}
