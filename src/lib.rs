//! Liquidity Book v2.0 engine
//!
//! Exact swap simulation for Liquidity Book pools and the synchronization
//! logic that keeps pool snapshots consistent with the chain: direct reads
//! through Multicall3, bulk bin reads from the subgraph, and incremental
//! updates driven by pair events.

pub mod chain;
pub mod config;
pub mod constants;
pub mod contracts;
pub mod error;
pub mod math;
pub mod pool;
pub mod subgraph;
pub mod types;

// Re-export commonly used types
pub use config::EngineConfig;
pub use error::{ChainError, Error, Result, SubgraphError};
pub use pool::{PoolSimulator, PoolStore, PoolTracker, PoolsListUpdater};
pub use types::{PoolRecord, PoolToken};
