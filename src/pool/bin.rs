//! Single-bin liquidity and per-bin swap math

use alloy::primitives::U256;
use serde::{Deserialize, Serialize};

use crate::constants::SCALE_OFFSET;
use crate::error::Result;
use crate::math::{
    get_price_from_id, mul_shift_round_down, mul_shift_round_up, shift_div_round_down,
    shift_div_round_up,
};
use crate::pool::fee::{FeeParameters, FeesDistribution};

/// A price bucket. `reserve_x` sits at or above the active id, `reserve_y`
/// at or below it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bin {
    pub id: u32,
    pub reserve_x: U256,
    pub reserve_y: U256,
    #[serde(default)]
    pub total_supply: U256,
}

/// Result of swapping through one bin
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BinAmounts {
    /// Input that ends up in the bin's reserve, fees excluded
    pub amount_in_to_bin: U256,
    pub amount_out_of_bin: U256,
    pub fees: FeesDistribution,
}

impl Bin {
    pub fn new(id: u32, reserve_x: U256, reserve_y: U256) -> Self {
        Self {
            id,
            reserve_x,
            reserve_y,
            total_supply: U256::ZERO,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.reserve_x.is_zero() && self.reserve_y.is_zero()
    }

    /// True when the bin has nothing to give in this direction.
    pub fn is_empty_for_swap(&self, swap_for_y: bool) -> bool {
        self.reserve_out(swap_for_y).is_zero()
    }

    pub fn reserve_out(&self, swap_for_y: bool) -> U256 {
        if swap_for_y {
            self.reserve_y
        } else {
            self.reserve_x
        }
    }

    /// How much of `amount_in` this bin absorbs and what it pays out.
    ///
    /// The volatility accumulator in `fp` is refreshed for `active_id`
    /// before the fee is taken, so the caller's copy of the parameters
    /// carries the state forward to the next bin.
    pub fn get_amounts(
        &self,
        fp: &mut FeeParameters,
        active_id: u32,
        swap_for_y: bool,
        amount_in: U256,
    ) -> Result<BinAmounts> {
        let price = get_price_from_id(active_id, fp.bin_step)?;

        let reserve = self.reserve_out(swap_for_y);
        let max_amount_in = if swap_for_y {
            shift_div_round_up(reserve, SCALE_OFFSET, price)?
        } else {
            mul_shift_round_up(price, reserve, SCALE_OFFSET)?
        };

        fp.update_volatility_accumulated(active_id);
        let fees = fp.get_fee_amount_distribution(fp.get_fee_amount(max_amount_in)?);

        if max_amount_in.saturating_add(fees.total) <= amount_in {
            return Ok(BinAmounts {
                amount_in_to_bin: max_amount_in,
                amount_out_of_bin: reserve,
                fees,
            });
        }

        let fees = fp.get_fee_amount_distribution(fp.get_fee_amount_from(amount_in)?);
        let amount_in_to_bin = amount_in.saturating_sub(fees.total);
        let amount_out = if swap_for_y {
            mul_shift_round_down(price, amount_in_to_bin, SCALE_OFFSET)?
        } else {
            shift_div_round_down(amount_in_to_bin, SCALE_OFFSET, price)?
        };

        Ok(BinAmounts {
            amount_in_to_bin,
            amount_out_of_bin: amount_out.min(reserve),
            fees,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::REAL_ID_SHIFT;

    const ID_ONE: u32 = REAL_ID_SHIFT as u32;

    fn fp() -> FeeParameters {
        FeeParameters {
            bin_step: 10,
            base_factor: 10_000,
            filter_period: 30,
            decay_period: 600,
            reduction_factor: 5_000,
            variable_fee_control: 0,
            protocol_share: 0,
            max_volatility_accumulated: 350_000,
            index_ref: ID_ONE,
            time: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_checks() {
        let bin = Bin::new(ID_ONE, U256::from(5u8), U256::ZERO);
        assert!(!bin.is_empty());
        assert!(bin.is_empty_for_swap(true));
        assert!(!bin.is_empty_for_swap(false));
        assert!(Bin::new(ID_ONE, U256::ZERO, U256::ZERO).is_empty());
    }

    #[test]
    fn test_partial_fill_at_price_one() {
        // base fee = 10_000 * 10 * 1e10 = 1e15 -> 0.1%
        let bin = Bin::new(ID_ONE, U256::ZERO, U256::from(10u64.pow(18)));
        let mut params = fp();
        let amounts = bin
            .get_amounts(&mut params, ID_ONE, true, U256::from(1_000_000u64))
            .unwrap();

        assert_eq!(amounts.fees.total, U256::from(1_000u64));
        assert_eq!(amounts.amount_in_to_bin, U256::from(999_000u64));
        assert_eq!(amounts.amount_out_of_bin, U256::from(999_000u64));
    }

    #[test]
    fn test_full_fill_takes_whole_reserve() {
        let bin = Bin::new(ID_ONE, U256::from(1_000_000u64), U256::ZERO);
        let mut params = fp();
        let amounts = bin
            .get_amounts(&mut params, ID_ONE, false, U256::from(10u64.pow(12)))
            .unwrap();

        assert_eq!(amounts.amount_in_to_bin, U256::from(1_000_000u64));
        assert_eq!(amounts.amount_out_of_bin, U256::from(1_000_000u64));
        // ceil(1e6 * 1e15 / (1e18 - 1e15)) = ceil(1001.001) = 1002
        assert_eq!(amounts.fees.total, U256::from(1_002u64));
    }

    #[test]
    fn test_output_never_exceeds_reserve() {
        let bin = Bin::new(ID_ONE + 3, U256::ZERO, U256::from(777u64));
        let mut params = fp();
        let amounts = bin
            .get_amounts(&mut params, ID_ONE + 3, true, U256::from(780u64))
            .unwrap();
        assert!(amounts.amount_out_of_bin <= U256::from(777u64));
    }

    #[test]
    fn test_accumulator_tracks_active_id() {
        let bin = Bin::new(ID_ONE + 4, U256::from(1_000u64), U256::ZERO);
        let mut params = fp();
        bin.get_amounts(&mut params, ID_ONE + 4, false, U256::from(10u64))
            .unwrap();
        assert_eq!(params.volatility_accumulated, 40_000);
    }
}
