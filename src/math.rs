// src/math.rs
//
// Fixed-point helpers. Rates and share prices are scaled by 1e18; asset
// amounts are raw integer units of the asset.

use crate::errors::{FundError, Result};
use alloy_primitives::U256;

/// 1e18: the scale of rates (1e18 == 100%) and of one share.
pub const ONE: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

/// One whole share.
pub const SHARE_UNIT: U256 = ONE;

/// 365 days, used to annualize the management fee.
pub const SECONDS_PER_YEAR: u64 = 31_536_000;

/// `a * b / denominator`, rounding down. Fails on overflow or a zero denominator.
pub fn mul_div(a: U256, b: U256, denominator: U256, context: &'static str) -> Result<U256> {
    if denominator.is_zero() {
        return Err(FundError::MathOverflow(context));
    }
    a.checked_mul(b)
        .map(|product| product / denominator)
        .ok_or(FundError::MathOverflow(context))
}

/// Checked addition with a context label for the error.
pub fn add(a: U256, b: U256, context: &'static str) -> Result<U256> {
    a.checked_add(b).ok_or(FundError::MathOverflow(context))
}

/// Checked subtraction with a context label for the error.
pub fn sub(a: U256, b: U256, context: &'static str) -> Result<U256> {
    a.checked_sub(b).ok_or(FundError::MathOverflow(context))
}

/// `10^decimals` as a `U256`.
pub fn unit(decimals: u8) -> U256 {
    let mut value = U256::from(1u8);
    let ten = U256::from(10u8);
    for _ in 0..decimals {
        value *= ten;
    }
    value
}

/// Converts a rate expressed in `u64` config units into a `U256`.
pub fn rate(value: u64) -> U256 {
    U256::from(value)
}

/// `value` whole units of an 18-decimal quantity (e.g. `ether(2)` == 2e18).
pub fn ether(value: u64) -> U256 {
    U256::from(value) * ONE
}

/// Absolute difference between two values.
pub fn abs_diff(a: U256, b: U256) -> U256 {
    if a >= b {
        a - b
    } else {
        b - a
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_is_1e18() {
        assert_eq!(ONE, U256::from(10u64).pow(U256::from(18u64)));
        assert_eq!(unit(18), ONE);
        assert_eq!(unit(0), U256::from(1u8));
        assert_eq!(unit(6), U256::from(1_000_000u64));
    }

    #[test]
    fn test_mul_div_rounds_down() {
        let r = mul_div(U256::from(10u8), U256::from(10u8), U256::from(3u8), "test").unwrap();
        assert_eq!(r, U256::from(33u8));
    }

    #[test]
    fn test_mul_div_zero_denominator_fails() {
        let err = mul_div(U256::from(1u8), U256::from(1u8), U256::ZERO, "test").unwrap_err();
        assert_eq!(err, FundError::MathOverflow("test"));
    }

    #[test]
    fn test_mul_div_overflow_fails() {
        assert!(mul_div(U256::MAX, U256::from(2u8), U256::from(1u8), "test").is_err());
    }

    #[test]
    fn test_abs_diff() {
        assert_eq!(abs_diff(U256::from(3u8), U256::from(5u8)), U256::from(2u8));
        assert_eq!(abs_diff(U256::from(5u8), U256::from(3u8)), U256::from(2u8));
    }
}
