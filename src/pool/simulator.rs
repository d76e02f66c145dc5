//! Swap simulation over a pool snapshot
//!
//! `calc_amount_out` is a pure function of the snapshot: it walks bins from
//! the active id in the swap direction and returns a `SwapResult` whose
//! `SwapInfo` describes the state change. Nothing is mutated until the caller
//! hands that `SwapInfo` to `update_balance`, so many candidate swaps can be
//! evaluated against the same snapshot and exactly one committed.

use std::collections::BTreeMap;

use alloy::primitives::{Address, U256};
use tracing::debug;

use crate::error::{Error, Result};
use crate::pool::bin::Bin;
use crate::pool::state::{normalize_bins, BinReserveChange, PoolState, SwapInfo, SwapResult};
use crate::types::PoolRecord;

#[derive(Debug, Clone)]
pub struct PoolSimulator {
    state: PoolState,
}

/// Summed per-bin movement: `[add_x, add_y, sub_x, sub_y]`
type BinDelta = [U256; 4];

impl PoolSimulator {
    pub fn new(mut state: PoolState) -> Self {
        state.extra.bins = normalize_bins(std::mem::take(&mut state.extra.bins));
        Self { state }
    }

    pub fn from_record(record: &PoolRecord) -> Result<Self> {
        Ok(Self::new(PoolState::from_record(record)?))
    }

    pub fn tokens(&self) -> [Address; 2] {
        self.state.tokens
    }

    pub fn state(&self) -> &PoolState {
        &self.state
    }

    pub fn active_bin_id(&self) -> u32 {
        self.state.extra.active_bin_id
    }

    pub fn calc_amount_out(
        &self,
        token_in: Address,
        amount_in: U256,
        token_out: Address,
    ) -> Result<SwapResult> {
        let [token_x, token_y] = self.state.tokens;
        if token_in != token_x && token_in != token_y {
            return Err(Error::InvalidToken(token_in));
        }
        if token_out == token_in || (token_out != token_x && token_out != token_y) {
            return Err(Error::InvalidToken(token_out));
        }
        let swap_for_y = token_in == token_x;

        let extra = &self.state.extra;
        let bins = &extra.bins;
        let mut fee_parameters = extra.fee_parameters;
        let mut active_id = extra.active_bin_id;
        fee_parameters.update_variable_fee_parameters(extra.rpc_block_timestamp, active_id);

        let mut amount_in_left = amount_in;
        let mut amount_out = U256::ZERO;
        let mut fee = U256::ZERO;
        let mut protocol_fee = U256::ZERO;
        let mut changes = Vec::new();

        loop {
            if let Ok(idx) = bins.binary_search_by_key(&active_id, |bin| bin.id) {
                let bin = &bins[idx];
                if !bin.is_empty_for_swap(swap_for_y) {
                    let amounts =
                        bin.get_amounts(&mut fee_parameters, active_id, swap_for_y, amount_in_left)?;

                    amount_in_left = amount_in_left
                        .saturating_sub(amounts.amount_in_to_bin.saturating_add(amounts.fees.total));
                    amount_out += amounts.amount_out_of_bin;
                    fee += amounts.fees.total;
                    protocol_fee += amounts.fees.protocol;

                    changes.push(BinReserveChange {
                        bin_id: active_id,
                        swap_for_y,
                        amount_in: amounts.amount_in_to_bin,
                        amount_out: amounts.amount_out_of_bin,
                    });
                }
            }

            if amount_in_left.is_zero() {
                break;
            }
            active_id = find_next_bin_id(bins, active_id, swap_for_y)?;
        }

        Ok(SwapResult {
            amount_out,
            fee,
            protocol_fee,
            swap_info: SwapInfo {
                bins_reserve_changes: changes,
                new_fee_parameters: fee_parameters,
                new_active_id: active_id,
            },
        })
    }

    /// Commit a simulated swap. On error the snapshot is left untouched.
    pub fn update_balance(&mut self, swap_info: &SwapInfo) -> Result<()> {
        let mut deltas: BTreeMap<u32, BinDelta> = BTreeMap::new();
        for change in &swap_info.bins_reserve_changes {
            let delta = deltas.entry(change.bin_id).or_default();
            let (add, sub) = if change.swap_for_y { (0, 3) } else { (1, 2) };
            delta[add] += change.amount_in;
            delta[sub] += change.amount_out;
        }

        let mut next = self.state.clone();
        for (bin_id, [add_x, add_y, sub_x, sub_y]) in deltas {
            let idx = next
                .extra
                .bins
                .binary_search_by_key(&bin_id, |bin| bin.id)
                .map_err(|_| Error::InvalidReserve(format!("bin {} not in pool", bin_id)))?;
            let bin = &mut next.extra.bins[idx];
            bin.reserve_x = apply(bin.reserve_x, add_x, sub_x, bin_id)?;
            bin.reserve_y = apply(bin.reserve_y, add_y, sub_y, bin_id)?;
            next.reserves[0] = apply(next.reserves[0], add_x, sub_x, bin_id)?;
            next.reserves[1] = apply(next.reserves[1], add_y, sub_y, bin_id)?;
        }

        next.extra.fee_parameters = swap_info.new_fee_parameters;
        next.extra.active_bin_id = swap_info.new_active_id;
        next.extra.bins = normalize_bins(next.extra.bins);
        next.extra.refresh_derived(next.reserves)?;

        debug!(
            "Committed swap on {}: {} bins touched, active id {}",
            next.address,
            swap_info.bins_reserve_changes.len(),
            next.extra.active_bin_id
        );
        self.state = next;
        Ok(())
    }
}

fn apply(reserve: U256, add: U256, sub: U256, bin_id: u32) -> Result<U256> {
    reserve
        .checked_add(add)
        .and_then(|r| r.checked_sub(sub))
        .ok_or_else(|| Error::InvalidReserve(format!("bin {} reserve underflow", bin_id)))
}

/// Nearest bin past `id` that still holds the output token.
/// `swap_for_y` walks down, otherwise up.
pub fn find_next_bin_id(bins: &[Bin], id: u32, swap_for_y: bool) -> Result<u32> {
    let next = if swap_for_y {
        let end = bins.partition_point(|bin| bin.id < id);
        bins[..end].iter().rev().find(|bin| !bin.reserve_y.is_zero())
    } else {
        let start = bins.partition_point(|bin| bin.id <= id);
        bins[start..].iter().find(|bin| !bin.reserve_x.is_zero())
    };
    next.map(|bin| bin.id).ok_or(Error::NotFoundBinId)
}
