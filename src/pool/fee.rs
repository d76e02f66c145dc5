//! Dynamic fee parameters
//!
//! The swap fee is `base_fee + variable_fee`. The variable part grows with
//! the square of the volatility accumulator, which tracks how many bins the
//! active id has moved away from `index_ref` and decays over time.
//!
//! A simulation works on a copy of these parameters: decay is applied once per
//! swap, the accumulator is refreshed for every bin crossed, and the copy is
//! handed back in `SwapInfo` for the commit step.

use alloy::primitives::U256;
use serde::{Deserialize, Serialize};

use crate::constants::{BASIS_POINT_MAX, PRECISION};
use crate::error::{Error, Result};

/// Fee rates are 1e18-scaled; this turns `base_factor * bin_step` into that scale.
const BASE_FEE_MULTIPLIER: u64 = 10_000_000_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeParameters {
    pub bin_step: u16,
    pub base_factor: u16,
    pub filter_period: u16,
    pub decay_period: u16,
    pub reduction_factor: u16,
    pub variable_fee_control: u32,
    pub protocol_share: u16,
    pub max_volatility_accumulated: u32,
    pub volatility_accumulated: u32,
    pub volatility_reference: u32,
    pub index_ref: u32,
    pub time: u64,
}

/// Total fee charged in a bin and the protocol's cut of it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeesDistribution {
    pub total: U256,
    pub protocol: U256,
}

impl FeeParameters {
    /// Decay the volatility reference and move `index_ref`, then refresh the
    /// accumulator for `active_id`. Called once per swap.
    pub fn update_variable_fee_parameters(&mut self, now: u64, active_id: u32) {
        let delta_t = now.saturating_sub(self.time);

        if delta_t >= u64::from(self.filter_period) || self.time == 0 {
            self.index_ref = active_id;
            if delta_t < u64::from(self.decay_period) {
                self.volatility_reference = (u64::from(self.reduction_factor)
                    * u64::from(self.volatility_accumulated)
                    / BASIS_POINT_MAX) as u32;
            } else {
                self.volatility_reference = 0;
            }
        }

        // Same as `time = now` unless the snapshot's block timestamp predates `time`
        self.time = self.time.max(now);

        self.update_volatility_accumulated(active_id);
    }

    pub fn update_volatility_accumulated(&mut self, active_id: u32) {
        let delta_id = u64::from(active_id.abs_diff(self.index_ref));
        let accumulated = delta_id * BASIS_POINT_MAX + u64::from(self.volatility_reference);
        self.volatility_accumulated =
            accumulated.min(u64::from(self.max_volatility_accumulated)) as u32;
    }

    pub fn base_fee(&self) -> U256 {
        U256::from(self.base_factor) * U256::from(self.bin_step) * U256::from(BASE_FEE_MULTIPLIER)
    }

    pub fn variable_fee(&self) -> U256 {
        if self.variable_fee_control == 0 {
            return U256::ZERO;
        }
        let prod = U256::from(self.volatility_accumulated) * U256::from(self.bin_step);
        (prod * prod * U256::from(self.variable_fee_control) + U256::from(99u8)) / U256::from(100u8)
    }

    pub fn total_fee(&self) -> U256 {
        self.base_fee() + self.variable_fee()
    }

    /// Fee to add on top of `amount` so that `amount` reaches the bin:
    /// `ceil(amount * fee / (1e18 - fee))`.
    pub fn get_fee_amount(&self, amount: U256) -> Result<U256> {
        let fee = self.total_fee();
        let denominator = PRECISION.checked_sub(fee).filter(|d| !d.is_zero()).ok_or(
            Error::MulDivOverflow {
                prod1: fee,
                denominator: PRECISION,
            },
        )?;
        let numerator = amount
            .checked_mul(fee)
            .and_then(|n| n.checked_add(denominator - U256::ONE))
            .ok_or(Error::MulDivOverflow {
                prod1: amount,
                denominator,
            })?;
        Ok(numerator / denominator)
    }

    /// Fee contained in `amount_with_fees`: `ceil(amount_with_fees * fee / 1e18)`.
    pub fn get_fee_amount_from(&self, amount_with_fees: U256) -> Result<U256> {
        let fee = self.total_fee();
        let numerator = amount_with_fees
            .checked_mul(fee)
            .and_then(|n| n.checked_add(PRECISION - U256::ONE))
            .ok_or(Error::MulDivOverflow {
                prod1: amount_with_fees,
                denominator: PRECISION,
            })?;
        Ok(numerator / PRECISION)
    }

    pub fn get_fee_amount_distribution(&self, fees: U256) -> FeesDistribution {
        FeesDistribution {
            total: fees,
            protocol: fees * U256::from(self.protocol_share) / U256::from(BASIS_POINT_MAX),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Parameters of a typical 0.25% bin-step pair
    fn params() -> FeeParameters {
        FeeParameters {
            bin_step: 25,
            base_factor: 5000,
            filter_period: 30,
            decay_period: 600,
            reduction_factor: 5000,
            variable_fee_control: 40000,
            protocol_share: 1000,
            max_volatility_accumulated: 350_000,
            volatility_accumulated: 0,
            volatility_reference: 0,
            index_ref: 8_388_608,
            time: 1_700_000_000,
        }
    }

    #[test]
    fn test_base_fee() {
        // 5000 * 25 * 1e10 = 1.25e15 -> 0.125%
        assert_eq!(params().base_fee(), U256::from(1_250_000_000_000_000u64));
        assert_eq!(params().variable_fee(), U256::ZERO);
    }

    #[test]
    fn test_first_update_resets_index_ref() {
        let mut fp = FeeParameters { time: 0, ..params() };
        fp.update_variable_fee_parameters(1_700_000_100, 8_388_700);
        assert_eq!(fp.index_ref, 8_388_700);
        assert_eq!(fp.volatility_accumulated, 0);
        assert_eq!(fp.time, 1_700_000_100);
    }

    #[test]
    fn test_within_filter_period_keeps_reference() {
        let mut fp = FeeParameters {
            volatility_accumulated: 20_000,
            volatility_reference: 7_000,
            ..params()
        };
        fp.update_variable_fee_parameters(fp.time + 10, 8_388_610);
        assert_eq!(fp.index_ref, 8_388_608);
        assert_eq!(fp.volatility_reference, 7_000);
        // 2 bins away: 2 * 10_000 + 7_000
        assert_eq!(fp.volatility_accumulated, 27_000);
    }

    #[test]
    fn test_decay_between_filter_and_decay_period() {
        let mut fp = FeeParameters {
            volatility_accumulated: 20_000,
            ..params()
        };
        fp.update_variable_fee_parameters(fp.time + 100, 8_388_608);
        assert_eq!(fp.volatility_reference, 10_000);
        assert_eq!(fp.volatility_accumulated, 10_000);
    }

    #[test]
    fn test_reference_resets_after_decay_period() {
        let mut fp = FeeParameters {
            volatility_accumulated: 20_000,
            ..params()
        };
        fp.update_variable_fee_parameters(fp.time + 601, 8_388_608);
        assert_eq!(fp.volatility_reference, 0);
        assert_eq!(fp.volatility_accumulated, 0);
    }

    #[test]
    fn test_accumulator_is_capped() {
        let mut fp = params();
        fp.update_volatility_accumulated(8_388_608 + 1_000);
        assert_eq!(fp.volatility_accumulated, fp.max_volatility_accumulated);
    }

    #[test]
    fn test_time_never_goes_backwards() {
        let mut fp = params();
        let before = fp.time;
        fp.update_variable_fee_parameters(before - 50, 8_388_608);
        assert_eq!(fp.time, before);
    }

    #[test]
    fn test_fee_amount_rounds_up() {
        let fp = params();
        // 1e6 * 1.25e15 / (1e18 - 1.25e15) = 1251.56... -> 1252
        assert_eq!(fp.get_fee_amount(U256::from(1_000_000u64)).unwrap(), U256::from(1252u64));
        // 1e6 * 1.25e15 / 1e18 = 1250 exactly
        assert_eq!(fp.get_fee_amount_from(U256::from(1_000_000u64)).unwrap(), U256::from(1250u64));
        assert_eq!(fp.get_fee_amount(U256::ZERO).unwrap(), U256::ZERO);
    }

    #[test]
    fn test_fee_amount_monotonic_in_amount() {
        let fp = params();
        let mut last = U256::ZERO;
        for amount in [1u64, 7, 800, 801, 10_000, 123_456_789, 10u64.pow(18)] {
            let fee = fp.get_fee_amount(U256::from(amount)).unwrap();
            assert!(fee >= last);
            last = fee;
        }
    }

    #[test]
    fn test_fee_amount_monotonic_in_volatility() {
        let amount = U256::from(10u64.pow(18));
        let mut last = U256::ZERO;
        for va in [0u32, 1, 10_000, 50_000, 200_000, 350_000] {
            let fp = FeeParameters {
                volatility_accumulated: va,
                ..params()
            };
            let fee = fp.get_fee_amount(amount).unwrap();
            assert!(fee >= last, "va {}: {} < {}", va, fee, last);
            last = fee;
        }
    }

    #[test]
    fn test_fee_distribution() {
        let dist = params().get_fee_amount_distribution(U256::from(12_345u64));
        assert_eq!(dist.total, U256::from(12_345u64));
        assert_eq!(dist.protocol, U256::from(1_234u64));
    }

    #[test]
    fn test_serde_camel_case() {
        let json = serde_json::to_value(params()).unwrap();
        assert_eq!(json["binStep"], 25);
        assert_eq!(json["maxVolatilityAccumulated"], 350_000);
        let back: FeeParameters = serde_json::from_value(json).unwrap();
        assert_eq!(back, params());
    }
}
