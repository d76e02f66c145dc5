//! 256x256-bit multiply/shift/divide helpers
//!
//! Emulates the pair contract's `Uint256x256Math` library: the full 512-bit
//! product is split into a low word (`prod0`) and a high word (`prod1`), and
//! any result that would not fit in 256 bits is an error rather than a
//! truncation.

use alloy::primitives::{U256, U512};

use crate::error::{Error, Result};

/// Low and high words of `x * y` (mulmod trick, same as the Solidity code).
pub fn get_mul_prods(x: U256, y: U256) -> (U256, U256) {
    let mm = x.mul_mod(y, U256::MAX);
    let prod0 = x.wrapping_mul(y);
    let (mut prod1, borrow) = mm.overflowing_sub(prod0);
    if borrow {
        prod1 = prod1.wrapping_sub(U256::ONE);
    }
    (prod0, prod1)
}

/// `floor(x * y / 2^offset)`
pub fn mul_shift_round_down(x: U256, y: U256, offset: usize) -> Result<U256> {
    debug_assert!(offset < 256, "offset {} out of range", offset);

    let (prod0, prod1) = get_mul_prods(x, y);

    let mut result = U256::ZERO;
    if !prod0.is_zero() {
        result = prod0 >> offset;
    }
    if !prod1.is_zero() {
        if prod1 >= U256::ONE << offset {
            return Err(Error::MulShiftOverflow { prod1, offset });
        }
        result = result.wrapping_add(prod1 << (256 - offset));
    }

    Ok(result)
}

/// `ceil(x * y / 2^offset)`
pub fn mul_shift_round_up(x: U256, y: U256, offset: usize) -> Result<U256> {
    let result = mul_shift_round_down(x, y, offset)?;
    if x.mul_mod(y, U256::ONE << offset).is_zero() {
        return Ok(result);
    }
    result.checked_add(U256::ONE).ok_or(Error::MulShiftOverflow {
        prod1: U256::ZERO,
        offset,
    })
}

/// `floor(x * 2^offset / denominator)`
pub fn shift_div_round_down(x: U256, offset: usize, denominator: U256) -> Result<U256> {
    debug_assert!(offset < 256, "offset {} out of range", offset);

    let prod0 = x << offset;
    let prod1 = if offset == 0 { U256::ZERO } else { x >> (256 - offset) };

    end_of_div_round_down(prod0, prod1, denominator)
}

/// `ceil(x * 2^offset / denominator)`
pub fn shift_div_round_up(x: U256, offset: usize, denominator: U256) -> Result<U256> {
    let result = shift_div_round_down(x, offset, denominator)?;
    if x.mul_mod(U256::ONE << offset, denominator).is_zero() {
        return Ok(result);
    }
    result.checked_add(U256::ONE).ok_or(Error::MulDivOverflow {
        prod1: U256::ZERO,
        denominator,
    })
}

fn end_of_div_round_down(prod0: U256, prod1: U256, denominator: U256) -> Result<U256> {
    if denominator.is_zero() {
        return Err(Error::MulDivOverflow { prod1, denominator });
    }
    if prod1.is_zero() {
        return Ok(prod0 / denominator);
    }
    // Quotient must fit in 256 bits
    if prod1 >= denominator {
        return Err(Error::MulDivOverflow { prod1, denominator });
    }

    let quotient = join_words(prod0, prod1) / widen(denominator);
    Ok(low_word(quotient))
}

/// Exact 512-bit product.
pub fn mul_wide(x: U256, y: U256) -> U512 {
    let (prod0, prod1) = get_mul_prods(x, y);
    join_words(prod0, prod1)
}

pub fn widen(x: U256) -> U512 {
    join_words(x, U256::ZERO)
}

/// Narrow a 512-bit value, `None` when the high word is set.
pub fn narrow(x: U512) -> Option<U256> {
    let limbs = x.as_limbs();
    if limbs[4..].iter().any(|&l| l != 0) {
        return None;
    }
    Some(low_word(x))
}

/// Integer square root (Newton), floor.
pub fn sqrt_wide(n: U512) -> U512 {
    if n.is_zero() {
        return U512::ZERO;
    }
    let mut x = n;
    let mut y = (x >> 1) + U512::ONE;
    while y < x {
        x = y;
        y = (x + n / x) >> 1;
    }
    x
}

fn join_words(lo: U256, hi: U256) -> U512 {
    let lo = lo.as_limbs();
    let hi = hi.as_limbs();
    U512::from_limbs([lo[0], lo[1], lo[2], lo[3], hi[0], hi[1], hi[2], hi[3]])
}

fn low_word(x: U512) -> U256 {
    let l = x.as_limbs();
    U256::from_limbs([l[0], l[1], l[2], l[3]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{SCALE, SCALE_OFFSET};

    #[test]
    fn test_get_mul_prods_carries_into_high_word() {
        let (prod0, prod1) = get_mul_prods(U256::MAX, U256::from(2u8));
        assert_eq!(prod0, U256::MAX - U256::ONE);
        assert_eq!(prod1, U256::ONE);
    }

    #[test]
    fn test_mul_shift_rounding() {
        let half = U256::ONE << 127;
        assert_eq!(mul_shift_round_down(U256::from(3u8), half, SCALE_OFFSET).unwrap(), U256::ONE);
        assert_eq!(mul_shift_round_up(U256::from(3u8), half, SCALE_OFFSET).unwrap(), U256::from(2u8));

        // Exact result: no rounding up
        assert_eq!(mul_shift_round_up(SCALE, U256::from(5u8), SCALE_OFFSET).unwrap(), U256::from(5u8));
    }

    #[test]
    fn test_mul_shift_uses_high_word() {
        // 2^200 * 2^100 >> 128 = 2^172, product spills past 256 bits
        let x = U256::ONE << 200;
        let y = U256::ONE << 100;
        assert_eq!(mul_shift_round_down(x, y, SCALE_OFFSET).unwrap(), U256::ONE << 172);
    }

    #[test]
    fn test_mul_shift_overflow() {
        let err = mul_shift_round_down(U256::MAX, U256::MAX, SCALE_OFFSET).unwrap_err();
        assert!(matches!(err, Error::MulShiftOverflow { offset: 128, .. }));
    }

    #[test]
    fn test_shift_div_rounding() {
        let three = U256::from(3u8);
        let down = shift_div_round_down(U256::ONE, SCALE_OFFSET, three).unwrap();
        let up = shift_div_round_up(U256::ONE, SCALE_OFFSET, three).unwrap();
        assert_eq!(down, SCALE / three);
        assert_eq!(up, down + U256::ONE);

        let exact = shift_div_round_up(three, SCALE_OFFSET, SCALE).unwrap();
        assert_eq!(exact, three);
    }

    #[test]
    fn test_shift_div_full_width() {
        // 2^200 << 128 / 2^100 = 2^228, numerator needs 512 bits
        let result = shift_div_round_down(U256::ONE << 200, SCALE_OFFSET, U256::ONE << 100).unwrap();
        assert_eq!(result, U256::ONE << 228);
    }

    #[test]
    fn test_shift_div_overflow() {
        let err = shift_div_round_down(U256::MAX, SCALE_OFFSET, U256::ONE).unwrap_err();
        assert!(matches!(err, Error::MulDivOverflow { .. }));

        let err = shift_div_round_down(U256::ONE, SCALE_OFFSET, U256::ZERO).unwrap_err();
        assert!(matches!(err, Error::MulDivOverflow { .. }));
    }

    #[test]
    fn test_sqrt_wide() {
        assert_eq!(sqrt_wide(U512::from(0u8)), U512::ZERO);
        assert_eq!(sqrt_wide(U512::from(1u8)), U512::ONE);
        assert_eq!(sqrt_wide(U512::from(99u8)), U512::from(9u8));
        assert_eq!(sqrt_wide(mul_wide(U256::MAX, U256::MAX)), widen(U256::MAX));
    }

    #[test]
    fn test_narrow() {
        assert_eq!(narrow(widen(U256::MAX)), Some(U256::MAX));
        assert_eq!(narrow(mul_wide(U256::MAX, U256::from(2u8))), None);
    }
}
