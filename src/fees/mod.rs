// src/fees/mod.rs
//
// Fee settlement engine. Holds every fund's enabled fees and applies the
// settlements they return to the vault's share ledger.

pub mod entrance;
pub mod management;
pub mod performance;

pub use entrance::EntranceRateFee;
pub use management::ManagementFee;
pub use performance::PerformanceFee;

use crate::comptroller::PermissionedVault;
use crate::errors::{FundError, Result};
use crate::events::{Event, EventLog};
use crate::math::{self, ONE};
use crate::models::{
    Address, FeeHook, FeeKind, FeeSettings, Settlement, SettlementData, SettlementType, U256,
};
use crate::traits::Fee;
use log::{debug, info};
use std::collections::{BTreeMap, HashMap};

// =============================================================================
// Settlement Context
// =============================================================================

/// Fund state a fee sees when it activates, settles or pays out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeContext {
    pub comptroller: Address,
    pub now: u64,
    pub gav: U256,
    pub total_supply: U256,
    /// Uncrystallized shares accrued by the fee being invoked.
    pub shares_outstanding: U256,
    /// One whole unit of the denomination asset.
    pub denomination_unit: U256,
}

impl FeeContext {
    /// `gav * 1e18 / total_supply`, or one denomination unit before any shares exist.
    pub fn gross_share_value(&self) -> Result<U256> {
        if self.total_supply.is_zero() {
            return Ok(self.denomination_unit);
        }
        math::mul_div(self.gav, ONE, self.total_supply, "gross share value")
    }
}

/// Valuation inputs supplied by the comptroller for one fee manager call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeInputs {
    pub now: u64,
    pub gav: U256,
    pub denomination_unit: U256,
}

// =============================================================================
// Fee Instances
// =============================================================================

/// One enabled fee of a fund.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeeInstance {
    Management(ManagementFee),
    Performance(PerformanceFee),
    EntranceRate(EntranceRateFee),
}

impl FeeInstance {
    /// Validates settings and builds the fee.
    pub fn from_settings(settings: &FeeSettings) -> Result<Self> {
        Ok(match settings {
            FeeSettings::Management { rate } => FeeInstance::Management(ManagementFee::new(*rate)?),
            FeeSettings::Performance { rate, period } => {
                FeeInstance::Performance(PerformanceFee::new(*rate, *period)?)
            }
            FeeSettings::EntranceRate { rate, settlement } => {
                FeeInstance::EntranceRate(EntranceRateFee::new(*rate, *settlement)?)
            }
        })
    }

    fn inner(&self) -> &dyn Fee {
        match self {
            FeeInstance::Management(f) => f,
            FeeInstance::Performance(f) => f,
            FeeInstance::EntranceRate(f) => f,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Fee {
        match self {
            FeeInstance::Management(f) => f,
            FeeInstance::Performance(f) => f,
            FeeInstance::EntranceRate(f) => f,
        }
    }

    pub fn kind(&self) -> FeeKind {
        self.inner().kind()
    }

    fn settings_added_event(&self, comptroller: Address) -> Event {
        let (rate, period) = match self {
            FeeInstance::Management(f) => (f.rate(), None),
            FeeInstance::Performance(f) => (f.rate(), Some(f.period())),
            FeeInstance::EntranceRate(f) => (f.rate(), None),
        };
        Event::FundSettingsAdded {
            comptroller,
            fee: self.kind(),
            rate,
            period,
        }
    }
}

// =============================================================================
// Fee Manager
// =============================================================================

#[derive(Debug, Clone, Default)]
struct FundFees {
    fees: Vec<FeeInstance>,
    shares_outstanding: BTreeMap<FeeKind, U256>,
}

impl FundFees {
    fn outstanding(&self, kind: FeeKind) -> U256 {
        self.shares_outstanding.get(&kind).copied().unwrap_or(U256::ZERO)
    }
}

/// Per-fund fee configuration, fee state and shares outstanding.
#[derive(Debug, Clone)]
pub struct FeeManager {
    address: Address,
    funds: HashMap<Address, FundFees>,
}

impl FeeManager {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            funds: HashMap::new(),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Whether the fund still has fee storage.
    pub fn is_configured(&self, comptroller: Address) -> bool {
        self.funds.contains_key(&comptroller)
    }

    /// Enabled fees of a fund, in configuration order.
    pub fn enabled_fees(&self, comptroller: Address) -> Vec<FeeKind> {
        self.funds
            .get(&comptroller)
            .map(|f| f.fees.iter().map(FeeInstance::kind).collect())
            .unwrap_or_default()
    }

    pub fn fee_info(&self, comptroller: Address, kind: FeeKind) -> Option<&FeeInstance> {
        self.funds
            .get(&comptroller)?
            .fees
            .iter()
            .find(|f| f.kind() == kind)
    }

    pub fn shares_outstanding(&self, comptroller: Address, kind: FeeKind) -> U256 {
        self.funds
            .get(&comptroller)
            .map(|f| f.outstanding(kind))
            .unwrap_or(U256::ZERO)
    }

    /// Whether any enabled fee settles on `hook`.
    pub fn settles_on_hook(&self, comptroller: Address, hook: FeeHook) -> bool {
        self.funds
            .get(&comptroller)
            .map(|f| f.fees.iter().any(|fee| fee.inner().settles_on_hook(hook)))
            .unwrap_or(false)
    }

    /// Stores a fund's fee configuration. Runs once per fund, at `init`.
    pub fn set_config_for_fund(
        &mut self,
        comptroller: Address,
        settings: &[FeeSettings],
        events: &mut EventLog,
    ) -> Result<()> {
        if self.funds.contains_key(&comptroller) {
            return Err(FundError::ExtensionAlreadyConfigured {
                extension: "FeeManager",
            });
        }
        let mut fees: Vec<FeeInstance> = Vec::with_capacity(settings.len());
        for setting in settings {
            if fees.iter().any(|f| f.kind() == setting.kind()) {
                return Err(FundError::invalid("setConfigForFund: fees cannot include duplicates"));
            }
            fees.push(FeeInstance::from_settings(setting)?);
        }
        for fee in &fees {
            events.emit(fee.settings_added_event(comptroller));
        }
        debug!("[fee manager] Configured {} fees for {}", fees.len(), comptroller);
        self.funds.insert(
            comptroller,
            FundFees {
                fees,
                shares_outstanding: BTreeMap::new(),
            },
        );
        Ok(())
    }

    /// Lets every fee initialize its state against the freshly bound vault.
    pub fn activate_for_fund(
        &mut self,
        vault: &PermissionedVault<'_>,
        inputs: FeeInputs,
        events: &mut EventLog,
    ) -> Result<()> {
        let comptroller = vault.comptroller();
        let total_supply = vault.vault().total_supply();
        let Some(fund) = self.funds.get_mut(&comptroller) else {
            return Ok(());
        };
        for fee in fund.fees.iter_mut() {
            let ctx = FeeContext {
                comptroller,
                now: inputs.now,
                gav: inputs.gav,
                total_supply,
                shares_outstanding: U256::ZERO,
                denomination_unit: inputs.denomination_unit,
            };
            fee.inner_mut().activate_for_fund(&ctx, events)?;
        }
        Ok(())
    }

    /// Settles every fee registered for `data`'s hook, in configuration order.
    pub fn invoke_hook(
        &mut self,
        vault: &mut PermissionedVault<'_>,
        data: &SettlementData,
        inputs: FeeInputs,
        events: &mut EventLog,
    ) -> Result<()> {
        let comptroller = vault.comptroller();
        let hook = data.hook();
        let Some(fund) = self.funds.get_mut(&comptroller) else {
            return Ok(());
        };
        let FundFees {
            fees,
            shares_outstanding,
        } = fund;

        for fee in fees.iter_mut() {
            if !fee.inner().settles_on_hook(hook) {
                continue;
            }
            let kind = fee.kind();
            let outstanding = shares_outstanding.get(&kind).copied().unwrap_or(U256::ZERO);
            let ctx = FeeContext {
                comptroller,
                now: inputs.now,
                gav: inputs.gav,
                total_supply: vault.vault().total_supply(),
                shares_outstanding: outstanding,
                denomination_unit: inputs.denomination_unit,
            };
            let settlement = fee.inner_mut().settle(&ctx, data, events)?;
            apply_settlement(vault, kind, settlement, shares_outstanding, events)?;
        }
        Ok(())
    }

    /// Crystallizes shares outstanding of the given fees where their payout rules allow.
    pub fn payout_shares_outstanding_for_fees(
        &mut self,
        vault: &mut PermissionedVault<'_>,
        kinds: &[FeeKind],
        inputs: FeeInputs,
        events: &mut EventLog,
    ) -> Result<()> {
        let comptroller = vault.comptroller();
        let fund = self.funds.get_mut(&comptroller).ok_or_else(|| {
            FundError::invalid("payoutSharesOutstandingForFees: Fund has no fees")
        })?;
        let FundFees {
            fees,
            shares_outstanding,
        } = fund;

        for kind in kinds {
            let fee = fees
                .iter_mut()
                .find(|f| f.kind() == *kind)
                .ok_or_else(|| {
                    FundError::invalid(format!(
                        "payoutSharesOutstandingForFees: {} is not enabled",
                        kind
                    ))
                })?;
            if !fee.inner().payout_allowed(inputs.now) {
                continue;
            }
            let outstanding = shares_outstanding.get(kind).copied().unwrap_or(U256::ZERO);
            let ctx = FeeContext {
                comptroller,
                now: inputs.now,
                gav: inputs.gav,
                total_supply: vault.vault().total_supply(),
                shares_outstanding: outstanding,
                denomination_unit: inputs.denomination_unit,
            };
            if fee.inner_mut().payout(&ctx, events)? {
                pay_out_outstanding(vault, *kind, shares_outstanding, events)?;
            }
        }
        Ok(())
    }

    /// Final continuous settlement, forced payout of every fee's shares
    /// outstanding, then removal of the fund's fee storage.
    pub fn deactivate_for_fund(
        &mut self,
        vault: &mut PermissionedVault<'_>,
        now: u64,
        events: &mut EventLog,
    ) -> Result<()> {
        let comptroller = vault.comptroller();
        if !self.funds.contains_key(&comptroller) {
            return Ok(());
        }
        // A zero GAV leaves price-based fees untouched.
        let inputs = FeeInputs {
            now,
            gav: U256::ZERO,
            denomination_unit: U256::ZERO,
        };
        self.invoke_hook(vault, &SettlementData::Continuous, inputs, events)?;

        if let Some(mut fund) = self.funds.remove(&comptroller) {
            let kinds: Vec<FeeKind> = fund.fees.iter().map(FeeInstance::kind).collect();
            for kind in kinds {
                pay_out_outstanding(vault, kind, &mut fund.shares_outstanding, events)?;
            }
        }
        info!("[fee manager] Deactivated fees for {}", comptroller);
        Ok(())
    }

    /// Drops any remaining fee storage of a fund.
    pub fn remove_fund(&mut self, comptroller: Address) {
        self.funds.remove(&comptroller);
    }
}

fn apply_settlement(
    vault: &mut PermissionedVault<'_>,
    kind: FeeKind,
    settlement: Settlement,
    shares_outstanding: &mut BTreeMap<FeeKind, U256>,
    events: &mut EventLog,
) -> Result<()> {
    let Settlement {
        settlement_type,
        payer,
        shares_due,
    } = settlement;
    if settlement_type == SettlementType::None || shares_due.is_zero() {
        return Ok(());
    }

    let owner = vault.vault().owner();
    let missing_payer = || FundError::invalid(format!("{} settlement requires a payer", kind));
    let payee = match settlement_type {
        SettlementType::Direct => {
            let payer = payer.ok_or_else(missing_payer)?;
            vault.transfer_shares(payer, owner, shares_due)?;
            Some(owner)
        }
        SettlementType::Mint => {
            vault.mint_shares(owner, shares_due)?;
            Some(owner)
        }
        SettlementType::Burn => {
            let payer = payer.ok_or_else(missing_payer)?;
            vault.burn_shares(payer, shares_due)?;
            None
        }
        SettlementType::MintSharesOutstanding => {
            let current = shares_outstanding.get(&kind).copied().unwrap_or(U256::ZERO);
            shares_outstanding.insert(kind, math::add(current, shares_due, "shares outstanding")?);
            None
        }
        SettlementType::BurnSharesOutstanding => {
            let current = shares_outstanding.get(&kind).copied().unwrap_or(U256::ZERO);
            shares_outstanding.insert(kind, current.saturating_sub(shares_due));
            None
        }
        SettlementType::None => None,
    };

    events.emit(Event::FeeSettledForFund {
        comptroller: vault.comptroller(),
        fee: kind,
        settlement_type,
        payer,
        payee,
        shares_due,
    });
    Ok(())
}

fn pay_out_outstanding(
    vault: &mut PermissionedVault<'_>,
    kind: FeeKind,
    shares_outstanding: &mut BTreeMap<FeeKind, U256>,
    events: &mut EventLog,
) -> Result<()> {
    let shares_due = shares_outstanding.remove(&kind).unwrap_or(U256::ZERO);
    if shares_due.is_zero() {
        return Ok(());
    }
    let owner = vault.vault().owner();
    vault.mint_shares(owner, shares_due)?;
    events.emit(Event::SharesOutstandingPaidForFund {
        comptroller: vault.comptroller(),
        fee: kind,
        shares_due,
    });
    Ok(())
}
