//! Bin price helpers
//!
//! `price(id) = (1 + bin_step / 10_000) ^ (id - 2^23)` in Q128.128, computed
//! with the same square-and-multiply sequence as the pair's `Math128x128.power`
//! so every bit of rounding matches the contract.

use alloy::primitives::U256;

use crate::constants::{BASIS_POINT_MAX, MAX_POW_EXPONENT, REAL_ID_SHIFT, SCALE, SCALE_OFFSET};
use crate::error::{Error, Result};
use crate::math::uint256x256::{mul_wide, narrow, sqrt_wide, widen};

/// Largest value that fits in 128 bits
const U128_MAX: U256 = U256::from_limbs([u64::MAX, u64::MAX, 0, 0]);

/// `SCALE + (bin_step << 128) / 10_000`
pub fn get_base(bin_step: u16) -> U256 {
    SCALE + (U256::from(bin_step) << SCALE_OFFSET) / U256::from(BASIS_POINT_MAX)
}

pub fn get_exponent(id: u32) -> i64 {
    i64::from(id) - REAL_ID_SHIFT
}

pub fn get_price_from_id(id: u32, bin_step: u16) -> Result<U256> {
    pow(get_base(bin_step), get_exponent(id))
}

/// `x ^ y` for a Q128.128 `x` and a signed integer `y`.
pub fn pow(x: U256, y: i64) -> Result<U256> {
    if y == 0 {
        return Ok(SCALE);
    }

    let mut invert = y < 0;
    let abs_y = y.unsigned_abs();

    let mut result = U256::ZERO;
    if abs_y < MAX_POW_EXPONENT {
        result = SCALE;

        // Keep the running square below 2^128 so every product fits in 256 bits
        let mut squared = x;
        if x > U128_MAX {
            squared = U256::MAX / squared;
            invert = !invert;
        }

        for bit in 0..20 {
            if bit > 0 {
                squared = squared.wrapping_mul(squared) >> SCALE_OFFSET;
            }
            if abs_y & (1 << bit) != 0 {
                result = result.wrapping_mul(squared) >> SCALE_OFFSET;
            }
        }
    }

    if result.is_zero() {
        return Err(Error::PowUnderflow { base: x, exponent: y });
    }

    Ok(if invert { U256::MAX / result } else { result })
}

/// Square root of a Q128.128 price, still in Q128.
pub fn sqrt_price_x128(price: U256) -> U256 {
    let root = sqrt_wide(widen(price) << SCALE_OFFSET);
    narrow(root).unwrap_or(U256::MAX)
}

/// Constant-product equivalent liquidity `sqrt(x * y)` of a reserve pair.
pub fn virtual_liquidity(reserve_x: U256, reserve_y: U256) -> U256 {
    narrow(sqrt_wide(mul_wide(reserve_x, reserve_y))).unwrap_or(U256::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_at_real_id_shift_is_scale() {
        for bin_step in [1u16, 5, 10, 25, 100] {
            assert_eq!(get_price_from_id(REAL_ID_SHIFT as u32, bin_step).unwrap(), SCALE);
        }
    }

    #[test]
    fn test_price_is_strictly_increasing() {
        for bin_step in [1u16, 10, 100] {
            let ids = [8_388_000u32, 8_388_607, 8_388_608, 8_388_609, 8_388_610, 8_389_000];
            let prices: Vec<U256> = ids
                .iter()
                .map(|&id| get_price_from_id(id, bin_step).unwrap())
                .collect();
            for pair in prices.windows(2) {
                assert!(pair[0] < pair[1], "bin_step {}: {} !< {}", bin_step, pair[0], pair[1]);
            }
        }
    }

    #[test]
    fn test_price_one_bin_above_shift() {
        // One step up from 1.0 is close to the base itself (1.0025 for step 25)
        let price = get_price_from_id(REAL_ID_SHIFT as u32 + 1, 25).unwrap();
        let base = get_base(25);
        let diff = if price > base { price - base } else { base - price };
        assert!(diff < U256::from(1_000_000u64), "diff {}", diff);
    }

    #[test]
    fn test_price_inverse_symmetry() {
        // p(+n) * p(-n) ~= 1.0 in Q128
        let up = get_price_from_id(REAL_ID_SHIFT as u32 + 500, 20).unwrap();
        let down = get_price_from_id(REAL_ID_SHIFT as u32 - 500, 20).unwrap();
        let product = crate::math::mul_shift_round_down(up, down, SCALE_OFFSET).unwrap();
        let diff = if product > SCALE { product - SCALE } else { SCALE - product };
        assert!(diff < (SCALE >> 90), "diff {}", diff);
    }

    #[test]
    fn test_pow_underflow_for_huge_exponent() {
        let err = pow(get_base(100), i64::from(MAX_POW_EXPONENT as u32)).unwrap_err();
        assert!(matches!(err, Error::PowUnderflow { .. }));
    }

    #[test]
    fn test_sqrt_price_and_liquidity() {
        assert_eq!(sqrt_price_x128(SCALE), SCALE);
        assert_eq!(sqrt_price_x128(SCALE * U256::from(4u8)), SCALE * U256::from(2u8));
        assert_eq!(virtual_liquidity(U256::from(100u8), U256::from(400u16)), U256::from(200u16));
        assert_eq!(virtual_liquidity(U256::ZERO, U256::from(400u16)), U256::ZERO);
    }
}
