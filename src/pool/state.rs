//! Pool state snapshot
//!
//! `PoolState` is the in-memory form of a pool record: parsed addresses and
//! reserves plus the decoded `extra` blob. It is rebuilt whole on every sync
//! and only ever mutated through `PoolSimulator::update_balance`.

use std::collections::BTreeMap;

use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::math::{get_price_from_id, sqrt_price_x128, virtual_liquidity};
use crate::pool::bin::Bin;
use crate::pool::fee::FeeParameters;
use crate::types::{PoolRecord, PoolToken};

/// The private `extra` blob stored alongside a pool record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolExtra {
    pub rpc_block_timestamp: u64,
    pub subgraph_block_timestamp: u64,
    pub fee_parameters: FeeParameters,
    pub active_bin_id: u32,
    pub bins: Vec<Bin>,
    pub liquidity: U256,
    pub price_x128: U256,
}

impl PoolExtra {
    pub fn from_json(extra: &str) -> Result<Self> {
        if extra.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(extra)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Recompute `price_x128` and `liquidity` from the active id and reserves.
    pub fn refresh_derived(&mut self, reserves: [U256; 2]) -> Result<()> {
        let price = get_price_from_id(self.active_bin_id, self.fee_parameters.bin_step)?;
        self.price_x128 = sqrt_price_x128(price);
        self.liquidity = virtual_liquidity(reserves[0], reserves[1]);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolState {
    pub address: Address,
    /// `[token_x, token_y]`
    pub tokens: [Address; 2],
    pub reserves: [U256; 2],
    pub extra: PoolExtra,
}

impl PoolState {
    pub fn from_record(record: &PoolRecord) -> Result<Self> {
        Ok(Self {
            address: record.address,
            tokens: [record.tokens[0].address, record.tokens[1].address],
            reserves: parse_reserves(&record.reserves)?,
            extra: PoolExtra::from_json(&record.extra)?,
        })
    }

    /// Write this state back into a copy of `base`, keeping its exchange
    /// name, type and token flags.
    pub fn to_record(&self, base: &PoolRecord, timestamp: i64) -> Result<PoolRecord> {
        Ok(PoolRecord {
            address: self.address,
            exchange: base.exchange.clone(),
            pool_type: base.pool_type.clone(),
            tokens: [
                PoolToken {
                    address: self.tokens[0],
                    swappable: base.tokens[0].swappable,
                },
                PoolToken {
                    address: self.tokens[1],
                    swappable: base.tokens[1].swappable,
                },
            ],
            reserves: [self.reserves[0].to_string(), self.reserves[1].to_string()],
            extra: self.extra.to_json()?,
            timestamp,
        })
    }
}

/// Per-bin delta produced by one bin step of a simulated swap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinReserveChange {
    pub bin_id: u32,
    pub swap_for_y: bool,
    /// Added to the input side, fees excluded
    pub amount_in: U256,
    /// Removed from the output side
    pub amount_out: U256,
}

/// Everything `update_balance` needs to commit one simulated swap
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapInfo {
    pub bins_reserve_changes: Vec<BinReserveChange>,
    pub new_fee_parameters: FeeParameters,
    pub new_active_id: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapResult {
    pub amount_out: U256,
    /// Total fee, in the input token
    pub fee: U256,
    pub protocol_fee: U256,
    pub swap_info: SwapInfo,
}

/// Parse a decimal reserve string. Empty means zero.
pub fn parse_reserve(raw: &str) -> Result<U256> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(U256::ZERO);
    }
    raw.parse::<U256>()
        .map_err(|e| Error::InvalidReserve(format!("{:?}: {}", raw, e)))
}

pub fn parse_reserves(raw: &[String; 2]) -> Result<[U256; 2]> {
    Ok([parse_reserve(&raw[0])?, parse_reserve(&raw[1])?])
}

pub fn sum_reserves(bins: &[Bin]) -> [U256; 2] {
    bins.iter().fold([U256::ZERO; 2], |acc, bin| {
        [
            acc[0].saturating_add(bin.reserve_x),
            acc[1].saturating_add(bin.reserve_y),
        ]
    })
}

/// Check that the bins add up to the recorded pool reserves.
pub fn validate_bins(bins: &[Bin], reserves: &[String; 2]) -> Result<()> {
    check_bin_sums(bins, parse_reserves(reserves)?)
}

pub fn check_bin_sums(bins: &[Bin], reserves: [U256; 2]) -> Result<()> {
    let [sum_x, sum_y] = sum_reserves(bins);
    if sum_x != reserves[0] || sum_y != reserves[1] {
        return Err(Error::InvalidReserve(format!(
            "bins sum to ({}, {}), pool holds ({}, {})",
            sum_x, sum_y, reserves[0], reserves[1]
        )));
    }
    Ok(())
}

/// Drop empty bins, sort by id and keep the last entry for a duplicated id.
pub fn normalize_bins(bins: Vec<Bin>) -> Vec<Bin> {
    let by_id: BTreeMap<u32, Bin> = bins.into_iter().map(|bin| (bin.id, bin)).collect();
    by_id.into_values().filter(|bin| !bin.is_empty()).collect()
}

/// Overlay `fetched` on `existing`. Untouched ids keep their old reserves.
pub fn merge_bins(existing: &[Bin], fetched: Vec<Bin>) -> Vec<Bin> {
    let mut by_id: BTreeMap<u32, Bin> = existing.iter().map(|bin| (bin.id, bin.clone())).collect();
    for bin in fetched {
        by_id.insert(bin.id, bin);
    }
    normalize_bins(by_id.into_values().collect())
}
