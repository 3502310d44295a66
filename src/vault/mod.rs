// src/vault/mod.rs
//
// Asset custodian and share ledger of a single fund. Every mutation is gated
// to the vault's current accessor (its comptroller).

use crate::errors::{FundError, Result};
use crate::events::{Event, EventLog};
use crate::math;
use crate::models::{Address, U256};
use crate::simulation::TokenLedger;
use log::debug;
use std::collections::BTreeMap;

/// A fund's vault: custodies assets in the token ledger and owns the share ledger.
#[derive(Debug, Clone)]
pub struct Vault {
    address: Address,
    owner: Address,
    name: String,
    /// The only principal allowed to mutate the vault.
    accessor: Address,
    /// The principal allowed to swap the accessor (the fund deployer).
    migrator: Address,
    shares: BTreeMap<Address, U256>,
    total_supply: U256,
    /// Ordered, de-duplicated.
    tracked_assets: Vec<Address>,
}

impl Vault {
    pub fn new(
        address: Address,
        owner: Address,
        name: impl Into<String>,
        accessor: Address,
        migrator: Address,
    ) -> Self {
        Self {
            address,
            owner,
            name: name.into(),
            accessor,
            migrator,
            shares: BTreeMap::new(),
            total_supply: U256::ZERO,
            tracked_assets: Vec::new(),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn accessor(&self) -> Address {
        self.accessor
    }

    pub fn total_supply(&self) -> U256 {
        self.total_supply
    }

    pub fn balance_of(&self, holder: Address) -> U256 {
        self.shares.get(&holder).copied().unwrap_or(U256::ZERO)
    }

    /// Every holder with a non-zero share balance.
    pub fn holders(&self) -> impl Iterator<Item = (&Address, &U256)> {
        self.shares.iter()
    }

    pub fn tracked_assets(&self) -> &[Address] {
        &self.tracked_assets
    }

    pub fn is_tracked_asset(&self, asset: Address) -> bool {
        self.tracked_assets.contains(&asset)
    }

    /// Balance of `asset` custodied by this vault.
    pub fn asset_balance(&self, ledger: &TokenLedger, asset: Address) -> U256 {
        ledger.balance_of(asset, self.address)
    }

    /// `total_supply == Σ balances`.
    pub fn shares_supply_consistent(&self) -> bool {
        let sum = self
            .shares
            .values()
            .try_fold(U256::ZERO, |acc, b| acc.checked_add(*b));
        sum == Some(self.total_supply)
    }

    // =========================================================================
    // Accessor management
    // =========================================================================

    /// Hands mutation rights to a new accessor. Only the migrator may call this.
    pub fn set_accessor(&mut self, caller: Address, next: Address, events: &mut EventLog) -> Result<()> {
        if caller != self.migrator {
            return Err(FundError::Unauthorized {
                role: "FundDeployer",
            });
        }
        if next.is_zero() {
            return Err(FundError::invalid("setAccessor: Empty accessor"));
        }
        let prev = self.accessor;
        self.accessor = next;
        events.emit(Event::AccessorSet {
            vault: self.address,
            prev_accessor: prev,
            next_accessor: next,
        });
        Ok(())
    }

    fn assert_accessor(&self, caller: Address) -> Result<()> {
        if caller != self.accessor {
            return Err(FundError::NotAccessor);
        }
        Ok(())
    }

    // =========================================================================
    // Shares
    // =========================================================================

    pub fn mint_shares(&mut self, caller: Address, to: Address, amount: U256) -> Result<()> {
        self.assert_accessor(caller)?;
        if to.is_zero() {
            return Err(FundError::invalid("mintShares: Mint to the zero address"));
        }
        self.total_supply = math::add(self.total_supply, amount, "mintShares")?;
        let balance = self.balance_of(to);
        self.set_share_balance(to, balance + amount);
        debug!("[vault {}] Minted {} shares to {}", self.address, amount, to);
        Ok(())
    }

    pub fn burn_shares(&mut self, caller: Address, from: Address, amount: U256) -> Result<()> {
        self.assert_accessor(caller)?;
        let balance = self.balance_of(from);
        if balance < amount {
            return Err(FundError::InsufficientBalance {
                what: "shares",
                available: balance,
                required: amount,
            });
        }
        self.set_share_balance(from, balance - amount);
        self.total_supply -= amount;
        debug!("[vault {}] Burned {} shares from {}", self.address, amount, from);
        Ok(())
    }

    pub fn transfer_shares(
        &mut self,
        caller: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<()> {
        self.assert_accessor(caller)?;
        if to.is_zero() {
            return Err(FundError::invalid("transferShares: Transfer to the zero address"));
        }
        let from_balance = self.balance_of(from);
        if from_balance < amount {
            return Err(FundError::InsufficientBalance {
                what: "shares",
                available: from_balance,
                required: amount,
            });
        }
        self.set_share_balance(from, from_balance - amount);
        let to_balance = self.balance_of(to);
        self.set_share_balance(to, to_balance + amount);
        Ok(())
    }

    fn set_share_balance(&mut self, holder: Address, amount: U256) {
        if amount.is_zero() {
            self.shares.remove(&holder);
        } else {
            self.shares.insert(holder, amount);
        }
    }

    // =========================================================================
    // Assets
    // =========================================================================

    /// Adds an asset to the tracked set. Already-tracked assets are left as is.
    pub fn add_tracked_asset(&mut self, caller: Address, asset: Address, events: &mut EventLog) -> Result<()> {
        self.assert_accessor(caller)?;
        if asset.is_zero() {
            return Err(FundError::invalid("addTrackedAsset: Empty asset"));
        }
        if !self.is_tracked_asset(asset) {
            self.tracked_assets.push(asset);
            events.emit(Event::TrackedAssetAdded {
                vault: self.address,
                asset,
            });
        }
        Ok(())
    }

    /// Removes an asset from the tracked set, preserving the order of the rest.
    pub fn remove_tracked_asset(
        &mut self,
        caller: Address,
        asset: Address,
        events: &mut EventLog,
    ) -> Result<()> {
        self.assert_accessor(caller)?;
        if let Some(idx) = self.tracked_assets.iter().position(|a| *a == asset) {
            self.tracked_assets.remove(idx);
            events.emit(Event::TrackedAssetRemoved {
                vault: self.address,
                asset,
            });
        }
        Ok(())
    }

    pub fn withdraw_asset_to(
        &mut self,
        caller: Address,
        ledger: &mut TokenLedger,
        asset: Address,
        to: Address,
        amount: U256,
    ) -> Result<()> {
        self.assert_accessor(caller)?;
        ledger.transfer(asset, self.address, to, amount)
    }

    pub fn approve_asset_spender(
        &mut self,
        caller: Address,
        ledger: &mut TokenLedger,
        asset: Address,
        spender: Address,
        amount: U256,
    ) -> Result<()> {
        self.assert_accessor(caller)?;
        ledger.approve(asset, self.address, spender, amount)
    }
}
