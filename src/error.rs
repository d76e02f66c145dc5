//! Error taxonomy
//!
//! Arithmetic and swap errors abort a simulation with no partial commit.
//! Chain and indexer errors are wrapped so callers can tell which half of a
//! sync failed.

use alloy::primitives::{Address, U256};
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid token {0} for this pool")]
    InvalidToken(Address),

    #[error("no bin with liquidity left in swap direction")]
    NotFoundBinId,

    #[error("invalid reserve: {0}")]
    InvalidReserve(String),

    #[error("power underflow: base {base}, exponent {exponent}")]
    PowUnderflow { base: U256, exponent: i64 },

    #[error("mul-div overflow: prod1 {prod1} >= denominator {denominator}")]
    MulDivOverflow { prod1: U256, denominator: U256 },

    #[error("mul-shift overflow: prod1 {prod1}, offset {offset}")]
    MulShiftOverflow { prod1: U256, offset: usize },

    #[error("failed to sync chain state: {0}")]
    SyncChainStateFailed(#[source] ChainError),

    #[error("failed to sync bins: {0}")]
    SyncBinsFailed(#[source] ChainError),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Subgraph(#[from] SubgraphError),

    #[error("invalid pool extra: {0}")]
    InvalidExtra(#[from] serde_json::Error),

    #[error("invalid pools-list metadata: {0}")]
    InvalidMetadata(String),
}

/// Direct-chain read failures
#[derive(Debug, Error)]
pub enum ChainError {
    /// Historical state at `block` is no longer served by the node
    #[error("state unavailable at block {block}: {message}")]
    StateUnavailable { block: u64, message: String },

    #[error("rpc error: {0}")]
    Rpc(String),

    #[error("call {method} on {target} failed")]
    CallFailed { target: Address, method: &'static str },

    #[error("failed to decode {method}: {reason}")]
    Decode { method: &'static str, reason: String },

    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

/// Indexer (subgraph) failures
#[derive(Debug, Error)]
pub enum SubgraphError {
    #[error("subgraph http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("subgraph returned errors: {0}")]
    Graphql(String),

    #[error("failed to decode subgraph response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("subgraph request timed out after {0:?}")]
    Timeout(Duration),
}
