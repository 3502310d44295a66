// src/scenario/mod.rs
//
// Scripted runs of a single fund, driven by a TOML config.

pub mod runner;

pub use runner::{AssetSummary, HolderSummary, ScenarioResult, ScenarioRunner, StepOutcome};

use crate::math;
use crate::models::U256;

/// Renders raw units as a decimal string with trailing zeros trimmed.
///
/// # Examples
/// ```
/// use fund_engine::models::U256;
/// use fund_engine::scenario::format_units;
///
/// assert_eq!(format_units(U256::from(1_500_000u64), 6), "1.5");
/// assert_eq!(format_units(U256::from(7u64), 0), "7");
/// ```
pub fn format_units(amount: U256, decimals: u8) -> String {
    if decimals == 0 {
        return amount.to_string();
    }
    let unit = math::unit(decimals);
    let whole = amount / unit;
    let fraction = amount % unit;
    if fraction.is_zero() {
        return whole.to_string();
    }
    let padded = format!("{:0>width$}", fraction.to_string(), width = decimals as usize);
    format!("{}.{}", whole, padded.trim_end_matches('0'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_units_small_fraction() {
        assert_eq!(format_units(U256::from(1u8), 18), "0.000000000000000001");
        assert_eq!(format_units(math::ether(3), 18), "3");
    }
}
