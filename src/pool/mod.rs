//! Liquidity Book pool module
//!
//! Swap simulation over a pool snapshot, plus the tracker and discovery
//! logic that keep snapshots in line with the chain.

pub mod bin;
pub mod events;
pub mod fee;
pub mod list_updater;
pub mod simulator;
pub mod state;
pub mod store;
pub mod tracker;

pub use bin::{Bin, BinAmounts};
pub use fee::{FeeParameters, FeesDistribution};
pub use list_updater::{NewPoolsBatch, PoolsListMetadata, PoolsListUpdater, SkipReason, SkippedPool};
pub use simulator::PoolSimulator;
pub use state::{BinReserveChange, PoolExtra, PoolState, SwapInfo, SwapResult};
pub use store::PoolStore;
pub use tracker::PoolTracker;
