// src/simulation/price_feed.rs

use crate::errors::{FundError, Result};
use crate::math;
use crate::models::{Address, U256};
use crate::traits::PriceFeed;
use std::collections::HashMap;
use std::sync::RwLock;

/// Price data for one asset.
#[derive(Debug, Clone)]
struct FeedAsset {
    decimals: u8,
    /// Value of one whole unit in reference units, 1e18-scaled.
    canonical_rate: U256,
    /// Reference-market rate, used by live valuations.
    live_rate: U256,
    /// When false, every valuation involving the asset fails.
    valid: bool,
}

/// A price feed with manually set rates.
///
/// Rates express the value of one whole unit of an asset in a common reference
/// unit (1e18 == 1.0). Cross rates are derived from the two reference rates.
/// Rates can be updated through a shared handle while the engine holds it.
#[derive(Debug, Default)]
pub struct StaticPriceFeed {
    assets: RwLock<HashMap<Address, FeedAsset>>,
}

impl StaticPriceFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) an asset with the same canonical and live rate.
    pub fn add_asset(&self, asset: Address, decimals: u8, rate: U256) {
        let mut assets = self.assets.write().unwrap_or_else(|e| e.into_inner());
        assets.insert(
            asset,
            FeedAsset {
                decimals,
                canonical_rate: rate,
                live_rate: rate,
                valid: true,
            },
        );
    }

    /// Updates both the canonical and the live rate.
    pub fn set_rate(&self, asset: Address, rate: U256) -> Result<()> {
        self.update(asset, |a| {
            a.canonical_rate = rate;
            a.live_rate = rate;
        })
    }

    /// Updates only the live (reference-market) rate.
    pub fn set_live_rate(&self, asset: Address, rate: U256) -> Result<()> {
        self.update(asset, |a| a.live_rate = rate)
    }

    /// Marks an asset's price as (in)valid, e.g. to simulate a stale oracle.
    pub fn set_valid(&self, asset: Address, valid: bool) -> Result<()> {
        self.update(asset, |a| a.valid = valid)
    }

    pub fn remove_asset(&self, asset: Address) {
        let mut assets = self.assets.write().unwrap_or_else(|e| e.into_inner());
        assets.remove(&asset);
    }

    fn update(&self, asset: Address, f: impl FnOnce(&mut FeedAsset)) -> Result<()> {
        let mut assets = self.assets.write().unwrap_or_else(|e| e.into_inner());
        let entry = assets.get_mut(&asset).ok_or(FundError::UnsupportedAsset(asset))?;
        f(entry);
        Ok(())
    }

    fn value(&self, base: Address, amount: U256, quote: Address, live: bool) -> Result<U256> {
        let assets = self.assets.read().unwrap_or_else(|e| e.into_inner());
        let b = assets.get(&base).ok_or(FundError::UnsupportedAsset(base))?;
        let q = assets.get(&quote).ok_or(FundError::UnsupportedAsset(quote))?;
        if !b.valid {
            return Err(FundError::InvalidAssetValue(base));
        }
        if !q.valid {
            return Err(FundError::InvalidAssetValue(quote));
        }
        if base == quote {
            return Ok(amount);
        }

        let (base_rate, quote_rate) = if live {
            (b.live_rate, q.live_rate)
        } else {
            (b.canonical_rate, q.canonical_rate)
        };
        if quote_rate.is_zero() {
            return Err(FundError::InvalidAssetValue(quote));
        }

        // amount * base_rate * 10^quote_decimals / (10^base_decimals * quote_rate)
        let numerator = amount
            .checked_mul(base_rate)
            .and_then(|v| v.checked_mul(math::unit(q.decimals)))
            .ok_or(FundError::MathOverflow("asset value"))?;
        let denominator = math::unit(b.decimals)
            .checked_mul(quote_rate)
            .ok_or(FundError::MathOverflow("asset value"))?;
        Ok(numerator / denominator)
    }
}

impl PriceFeed for StaticPriceFeed {
    fn is_supported_asset(&self, asset: Address) -> bool {
        let assets = self.assets.read().unwrap_or_else(|e| e.into_inner());
        assets.contains_key(&asset)
    }

    fn calc_canonical_asset_value(
        &self,
        base: Address,
        amount: U256,
        quote: Address,
    ) -> Result<U256> {
        self.value(base, amount, quote, false)
    }

    fn calc_live_asset_value(&self, base: Address, amount: U256, quote: Address) -> Result<U256> {
        self.value(base, amount, quote, true)
    }
}
