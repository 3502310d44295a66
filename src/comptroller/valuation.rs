// src/comptroller/valuation.rs

use crate::errors::Result;
use crate::math::{self, ONE};
use crate::models::{Address, U256};
use crate::simulation::TokenLedger;
use crate::traits::PriceFeed;
use crate::vault::Vault;

/// Gross asset value: canonical value of every tracked asset the vault holds,
/// in raw units of the denomination asset.
pub fn calc_gav(
    vault: &Vault,
    ledger: &TokenLedger,
    price_feed: &dyn PriceFeed,
    denomination_asset: Address,
) -> Result<U256> {
    sum_values(vault, ledger, denomination_asset, |asset, balance| {
        price_feed.calc_canonical_asset_value(asset, balance, denomination_asset)
    })
}

/// Same as [`calc_gav`], but priced at the live reference-market rates.
pub fn calc_live_gav(
    vault: &Vault,
    ledger: &TokenLedger,
    price_feed: &dyn PriceFeed,
    denomination_asset: Address,
) -> Result<U256> {
    sum_values(vault, ledger, denomination_asset, |asset, balance| {
        price_feed.calc_live_asset_value(asset, balance, denomination_asset)
    })
}

fn sum_values(
    vault: &Vault,
    ledger: &TokenLedger,
    denomination_asset: Address,
    value_of: impl Fn(Address, U256) -> Result<U256>,
) -> Result<U256> {
    let mut gav = U256::ZERO;
    for asset in vault.tracked_assets() {
        let balance = vault.asset_balance(ledger, *asset);
        if balance.is_zero() {
            continue;
        }
        let value = if *asset == denomination_asset {
            balance
        } else {
            value_of(*asset, balance)?
        };
        gav = math::add(gav, value, "gav")?;
    }
    Ok(gav)
}

/// `gav * 1e18 / total_supply`, or one denomination unit before any shares exist.
pub fn calc_gross_share_value(gav: U256, total_supply: U256, denomination_unit: U256) -> Result<U256> {
    if total_supply.is_zero() {
        return Ok(denomination_unit);
    }
    math::mul_div(gav, ONE, total_supply, "gross share value")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventLog;
    use crate::math::ether;
    use crate::simulation::StaticPriceFeed;

    #[test]
    fn test_gav_sums_tracked_assets_in_denomination_terms() {
        let comptroller = Address::repeat_byte(0xc0);
        let usdc = Address::repeat_byte(0x01);
        let weth = Address::repeat_byte(0x02);
        let untracked = Address::repeat_byte(0x03);

        let mut ledger = TokenLedger::new();
        ledger.register_token(usdc, "USDC", 6).unwrap();
        ledger.register_token(weth, "WETH", 18).unwrap();
        ledger.register_token(untracked, "DAI", 18).unwrap();
        let feed = StaticPriceFeed::new();
        feed.add_asset(usdc, 6, ONE);
        feed.add_asset(weth, 18, ether(2000));
        feed.add_asset(untracked, 18, ONE);

        let mut vault = Vault::new(
            Address::repeat_byte(0x7a),
            Address::repeat_byte(0x0e),
            "GAV Fund",
            comptroller,
            Address::repeat_byte(0xde),
        );
        let mut events = EventLog::new();
        vault.add_tracked_asset(comptroller, usdc, &mut events).unwrap();
        vault.add_tracked_asset(comptroller, weth, &mut events).unwrap();
        ledger.mint(usdc, vault.address(), U256::from(500_000_000u64)).unwrap();
        ledger.mint(weth, vault.address(), ether(1)).unwrap();
        ledger.mint(untracked, vault.address(), ether(1)).unwrap();

        // 500 USDC + 1 WETH @ 2000
        let gav = calc_gav(&vault, &ledger, &feed, usdc).unwrap();
        assert_eq!(gav, U256::from(2_500_000_000u64));
    }

    #[test]
    fn test_bootstrap_share_value_is_one_unit() {
        let unit = U256::from(1_000_000u64);
        assert_eq!(calc_gross_share_value(U256::ZERO, U256::ZERO, unit).unwrap(), unit);
        assert_eq!(calc_gross_share_value(ether(2), ether(2), unit).unwrap(), ONE);
    }
}
