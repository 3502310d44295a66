// src/simulation/token_ledger.rs
//
// In-memory ERC20-style ledger: balances, allowances and per-token metadata.
// Vaults, investors and adapters all hold assets here.

use crate::errors::{FundError, Result};
use crate::math;
use crate::models::{Address, U256};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Metadata of a registered token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub symbol: String,
    pub decimals: u8,
    /// A frozen token rejects every transfer.
    pub transferable: bool,
}

/// Balances and allowances of every registered token.
#[derive(Debug, Clone, Default)]
pub struct TokenLedger {
    tokens: HashMap<Address, TokenInfo>,
    /// (asset, holder) -> balance
    balances: HashMap<(Address, Address), U256>,
    /// (asset, owner, spender) -> allowance
    allowances: HashMap<(Address, Address, Address), U256>,
}

impl TokenLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new token.
    pub fn register_token(
        &mut self,
        asset: Address,
        symbol: impl Into<String>,
        decimals: u8,
    ) -> Result<()> {
        if asset.is_zero() {
            return Err(FundError::invalid("registerToken: Empty token address"));
        }
        if self.tokens.contains_key(&asset) {
            return Err(FundError::invalid(format!(
                "registerToken: Token already registered: {}",
                asset
            )));
        }
        let symbol = symbol.into();
        debug!("[ledger] Registered token {} ({} decimals) at {}", symbol, decimals, asset);
        self.tokens.insert(
            asset,
            TokenInfo {
                symbol,
                decimals,
                transferable: true,
            },
        );
        Ok(())
    }

    pub fn token(&self, asset: Address) -> Result<&TokenInfo> {
        self.tokens.get(&asset).ok_or(FundError::Unknown {
            kind: "token",
            address: asset,
        })
    }

    pub fn is_registered(&self, asset: Address) -> bool {
        self.tokens.contains_key(&asset)
    }

    pub fn decimals(&self, asset: Address) -> Result<u8> {
        Ok(self.token(asset)?.decimals)
    }

    /// Unknown tokens are never transferable.
    pub fn is_transferable(&self, asset: Address) -> bool {
        self.tokens.get(&asset).map(|t| t.transferable).unwrap_or(false)
    }

    /// Freezes or unfreezes a token.
    pub fn set_transferable(&mut self, asset: Address, transferable: bool) -> Result<()> {
        let token = self.tokens.get_mut(&asset).ok_or(FundError::Unknown {
            kind: "token",
            address: asset,
        })?;
        token.transferable = transferable;
        Ok(())
    }

    pub fn balance_of(&self, asset: Address, holder: Address) -> U256 {
        self.balances
            .get(&(asset, holder))
            .copied()
            .unwrap_or(U256::ZERO)
    }

    pub fn allowance(&self, asset: Address, owner: Address, spender: Address) -> U256 {
        self.allowances
            .get(&(asset, owner, spender))
            .copied()
            .unwrap_or(U256::ZERO)
    }

    /// Creates `amount` new units of `asset` held by `to`.
    pub fn mint(&mut self, asset: Address, to: Address, amount: U256) -> Result<()> {
        self.token(asset)?;
        let balance = self.balance_of(asset, to);
        self.set_balance(asset, to, math::add(balance, amount, "mint")?);
        Ok(())
    }

    /// Destroys `amount` units of `asset` held by `from`.
    pub fn burn(&mut self, asset: Address, from: Address, amount: U256) -> Result<()> {
        self.token(asset)?;
        let balance = self.balance_of(asset, from);
        if balance < amount {
            return Err(FundError::InsufficientBalance {
                what: "token balance",
                available: balance,
                required: amount,
            });
        }
        self.set_balance(asset, from, balance - amount);
        Ok(())
    }

    pub fn transfer(&mut self, asset: Address, from: Address, to: Address, amount: U256) -> Result<()> {
        if !self.token(asset)?.transferable {
            return Err(FundError::NotTransferable(asset));
        }
        let from_balance = self.balance_of(asset, from);
        if from_balance < amount {
            return Err(FundError::InsufficientBalance {
                what: "token balance",
                available: from_balance,
                required: amount,
            });
        }
        self.set_balance(asset, from, from_balance - amount);
        let to_balance = self.balance_of(asset, to);
        self.set_balance(asset, to, math::add(to_balance, amount, "transfer")?);
        Ok(())
    }

    pub fn approve(&mut self, asset: Address, owner: Address, spender: Address, amount: U256) -> Result<()> {
        self.token(asset)?;
        if amount.is_zero() {
            self.allowances.remove(&(asset, owner, spender));
        } else {
            self.allowances.insert((asset, owner, spender), amount);
        }
        Ok(())
    }

    /// Moves `amount` from `from` to `to` on behalf of `spender`, consuming allowance.
    pub fn transfer_from(
        &mut self,
        asset: Address,
        spender: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<()> {
        let allowance = self.allowance(asset, from, spender);
        if allowance < amount {
            return Err(FundError::InsufficientBalance {
                what: "allowance",
                available: allowance,
                required: amount,
            });
        }
        self.transfer(asset, from, to, amount)?;
        self.approve(asset, from, spender, allowance - amount)
    }

    fn set_balance(&mut self, asset: Address, holder: Address, amount: U256) {
        if amount.is_zero() {
            self.balances.remove(&(asset, holder));
        } else {
            self.balances.insert((asset, holder), amount);
        }
    }
}
