//! Direct chain reads
//!
//! `ChainReader` is the seam between the tracker/discovery logic and the
//! node. The production implementation batches everything through
//! Multicall3; tests plug in an in-memory fake.

pub mod multicall;

use alloy::primitives::{Address, U256};
use async_trait::async_trait;

use crate::error::ChainError;
use crate::pool::{Bin, FeeParameters};

pub use multicall::MulticallReader;

pub type ChainResult<T> = std::result::Result<T, ChainError>;

/// Aggregate pool state as read from the pair contract
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcPoolState {
    pub block_timestamp: u64,
    pub reserves: [U256; 2],
    pub active_bin_id: u32,
    pub fee_parameters: FeeParameters,
}

#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Reserves, active id, fee parameters and block timestamp in one batch.
    /// `block = None` reads at the latest block.
    async fn pool_state(&self, pool: Address, block: Option<u64>) -> ChainResult<RpcPoolState>;

    /// Reserves and supply of `ids`, issued as a single batch.
    async fn bins(&self, pool: Address, ids: &[u32], block: Option<u64>) -> ChainResult<Vec<Bin>>;

    async fn pair_count(&self, factory: Address) -> ChainResult<u64>;

    /// Pair addresses for registry indices `start..end`. Each index
    /// succeeds or fails on its own.
    async fn pair_addresses(
        &self,
        factory: Address,
        start: u64,
        end: u64,
    ) -> ChainResult<Vec<Option<Address>>>;

    /// `(token_x, token_y)` per pair, best effort.
    async fn pair_tokens(&self, pairs: &[Address]) -> ChainResult<Vec<Option<(Address, Address)>>>;
}

/// Node error messages that mean the requested historical state is gone
const PRUNED_STATE_MARKERS: [&str; 5] = [
    "missing trie node",
    "header not found",
    "not available",
    "pruned",
    "historical state",
];

/// Map a raw node error onto `ChainError`, picking out pruned-state failures.
pub fn classify_rpc_error(message: String, block: Option<u64>) -> ChainError {
    let lower = message.to_lowercase();
    match block {
        Some(block) if PRUNED_STATE_MARKERS.iter().any(|m| lower.contains(m)) => {
            ChainError::StateUnavailable { block, message }
        }
        _ => ChainError::Rpc(message),
    }
}
