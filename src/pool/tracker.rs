//! Pool state synchronization
//!
//! Keeps a pool record consistent with the chain. Three entry points:
//!
//! - `get_new_pool_state`: full refresh. Chain aggregates and the indexer's
//!   bin list are read concurrently and merged. Indexer bins that do not add
//!   up to the chain reserves are re-read from chain.
//! - `get_new_state`: incremental refresh driven by a batch of pair logs.
//!   Only the touched bins are re-read, the result is checked against the
//!   chain's aggregate reserves, and a full bin resync runs if the check fails.
//! - `fetch_pool_ticks`: re-read every known bin from chain.
//!
//! Every chain and indexer call runs under the configured timeout. A new
//! record is only returned on full success; the caller's record is never
//! touched.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use alloy::rpc::types::Log;
use tracing::{debug, error, info, warn};

use crate::chain::{ChainReader, ChainResult, RpcPoolState};
use crate::config::TrackerConfig;
use crate::error::{ChainError, Error, Result, SubgraphError};
use crate::pool::bin::Bin;
use crate::pool::events::{bin_ids_from_logs, latest_block_number};
use crate::pool::state::{check_bin_sums, merge_bins, normalize_bins, PoolExtra, PoolState};
use crate::subgraph::{fetch_bins_page, parse_decimal_units, SubgraphClient};
use crate::types::PoolRecord;

/// Bins and indexing time read from the subgraph
#[derive(Debug, Clone, Default)]
struct SubgraphSnapshot {
    bins: Vec<Bin>,
    block_timestamp: u64,
}

pub struct PoolTracker<C, S> {
    config: TrackerConfig,
    chain: Arc<C>,
    subgraph: Arc<S>,
}

impl<C: ChainReader, S: SubgraphClient> PoolTracker<C, S> {
    pub fn new(config: TrackerConfig, chain: Arc<C>, subgraph: Arc<S>) -> Self {
        Self {
            config,
            chain,
            subgraph,
        }
    }

    fn timeout(&self) -> Duration {
        self.config.request_timeout()
    }

    /// Full refresh from chain aggregates and the indexer's bin list.
    pub async fn get_new_pool_state(&self, record: &PoolRecord) -> Result<PoolRecord> {
        let pool = record.address;
        info!("Start getting new state of pool {}", pool);

        let previous = PoolState::from_record(record)?;

        let rpc_read = async {
            self.rpc_state(pool, None)
                .await
                .map_err(Error::SyncChainStateFailed)
        };
        let subgraph_read = async {
            match self.subgraph_bins(pool).await {
                Ok(snapshot) => Ok(Some(snapshot)),
                Err(e) if self.config.allow_subgraph_error => {
                    warn!("Subgraph read for {} failed, using chain bins: {}", pool, e);
                    Ok(None)
                }
                Err(e) => Err(e),
            }
        };
        let (rpc, snapshot) = tokio::try_join!(rpc_read, subgraph_read)?;

        let snapshot = match snapshot {
            Some(snapshot) => snapshot,
            None => {
                let known: Vec<u32> = previous.extra.bins.iter().map(|b| b.id).collect();
                let bins = self
                    .fetch_bins(pool, &known, None)
                    .await
                    .map_err(Error::SyncBinsFailed)?;
                SubgraphSnapshot {
                    bins,
                    block_timestamp: previous.extra.subgraph_block_timestamp,
                }
            }
        };

        let lag = rpc.block_timestamp.saturating_sub(snapshot.block_timestamp);
        if snapshot.block_timestamp > 0 && lag > self.config.subgraph_lag_warn_secs {
            warn!(
                "Subgraph for {} lags chain by {}s (limit {}s)",
                pool, lag, self.config.subgraph_lag_warn_secs
            );
        }

        let bins = normalize_bins(snapshot.bins);
        let bins = match check_bin_sums(&bins, rpc.reserves) {
            Ok(()) => bins,
            Err(e) => {
                warn!("Indexer bins of {} disagree with chain, resyncing: {}", pool, e);
                let mut ids: BTreeSet<u32> = previous.extra.bins.iter().map(|b| b.id).collect();
                ids.extend(bins.iter().map(|b| b.id));
                self.resync_bins(pool, &ids.into_iter().collect::<Vec<_>>(), None, &rpc)
                    .await?
            }
        };

        let state = build_state(&previous, &rpc, bins, snapshot.block_timestamp)?;
        info!(
            "Finished getting new state of pool {}: {} bins, active id {}",
            pool,
            state.extra.bins.len(),
            state.extra.active_bin_id
        );
        state.to_record(record, chrono::Utc::now().timestamp())
    }

    /// Incremental refresh for a batch of logs of this pool.
    pub async fn get_new_state(&self, record: &PoolRecord, logs: &[Log]) -> Result<PoolRecord> {
        if logs.is_empty() {
            return self.get_new_pool_state(record).await;
        }

        let pool = record.address;
        let previous = PoolState::from_record(record)?;

        let block = latest_block_number(logs);
        let (rpc, block) = self
            .rpc_state_with_retry(pool, block)
            .await
            .map_err(Error::SyncChainStateFailed)?;

        let pool_logs: Vec<Log> = logs
            .iter()
            .filter(|log| log.inner.address == pool)
            .cloned()
            .collect();
        let touched = bin_ids_from_logs(&pool_logs);
        let touched_ids: Vec<u32> = touched.iter().copied().collect();
        debug!(
            "Pool {}: {} logs touched {} bins at block {:?}",
            pool,
            pool_logs.len(),
            touched_ids.len(),
            block
        );

        let merged = match self.fetch_bins(pool, &touched_ids, block).await {
            Ok(fetched) => {
                let merged = merge_bins(&previous.extra.bins, fetched);
                match check_bin_sums(&merged, rpc.reserves) {
                    Ok(()) => Some(merged),
                    Err(e) => {
                        warn!("Incremental bins of {} failed validation: {}", pool, e);
                        None
                    }
                }
            }
            Err(e) => {
                warn!("Failed to fetch touched bins of {}: {}", pool, e);
                None
            }
        };

        let bins = match merged {
            Some(bins) => bins,
            None => {
                let mut ids: BTreeSet<u32> = previous.extra.bins.iter().map(|b| b.id).collect();
                ids.extend(touched);
                self.resync_bins(pool, &ids.into_iter().collect::<Vec<_>>(), block, &rpc)
                    .await?
            }
        };

        let state = build_state(
            &previous,
            &rpc,
            bins,
            previous.extra.subgraph_block_timestamp,
        )?;
        state.to_record(record, chrono::Utc::now().timestamp())
    }

    /// Re-read every known bin from chain.
    pub async fn fetch_pool_ticks(&self, record: &PoolRecord) -> Result<PoolRecord> {
        let mut state = PoolState::from_record(record)?;
        let ids: Vec<u32> = state.extra.bins.iter().map(|b| b.id).collect();

        let bins = self
            .fetch_bins(state.address, &ids, None)
            .await
            .map_err(Error::SyncBinsFailed)?;
        state.extra.bins = normalize_bins(bins);
        state.extra.refresh_derived(state.reserves)?;

        debug!(
            "Refetched {} bins of {}, {} non-empty",
            ids.len(),
            state.address,
            state.extra.bins.len()
        );
        state.to_record(record, chrono::Utc::now().timestamp())
    }

    async fn rpc_state(&self, pool: Address, block: Option<u64>) -> ChainResult<RpcPoolState> {
        let timeout = self.timeout();
        tokio::time::timeout(timeout, self.chain.pool_state(pool, block))
            .await
            .map_err(|_| ChainError::Timeout(timeout))?
    }

    /// Read at `block`; if that state is pruned, read once more at latest.
    /// Returns the block the state was actually read at.
    async fn rpc_state_with_retry(
        &self,
        pool: Address,
        block: Option<u64>,
    ) -> ChainResult<(RpcPoolState, Option<u64>)> {
        match self.rpc_state(pool, block).await {
            Err(ChainError::StateUnavailable { block, message }) => {
                warn!(
                    "State of {} at block {} unavailable ({}), retrying at latest",
                    pool, block, message
                );
                let state = self.rpc_state(pool, None).await?;
                Ok((state, None))
            }
            other => other.map(|state| (state, block)),
        }
    }

    /// Read `ids` from chain in sequential chunks.
    async fn fetch_bins(&self, pool: Address, ids: &[u32], block: Option<u64>) -> ChainResult<Vec<Bin>> {
        let timeout = self.timeout();
        let mut bins = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(self.config.bin_chunk_size.max(1)) {
            let fetched = tokio::time::timeout(timeout, self.chain.bins(pool, chunk, block))
                .await
                .map_err(|_| ChainError::Timeout(timeout))??;
            bins.extend(fetched);
        }
        Ok(bins)
    }

    /// Full bin resync after a failed incremental update.
    ///
    /// Each result is checked against the aggregate reserves. When the
    /// attempts run out the last result is accepted anyway and an alert is
    /// logged.
    async fn resync_bins(
        &self,
        pool: Address,
        ids: &[u32],
        block: Option<u64>,
        rpc: &RpcPoolState,
    ) -> Result<Vec<Bin>> {
        let attempts = self.config.max_resync_attempts.max(1);
        let mut attempt = 1;
        loop {
            info!("Resyncing {} bins of {} (attempt {}/{})", ids.len(), pool, attempt, attempts);
            let fetched = self
                .fetch_bins(pool, ids, block)
                .await
                .map_err(Error::SyncBinsFailed)?;
            let bins = normalize_bins(fetched);

            match check_bin_sums(&bins, rpc.reserves) {
                Ok(()) => return Ok(bins),
                Err(e) if attempt < attempts => {
                    warn!("Resync of {} still inconsistent: {}", pool, e);
                    attempt += 1;
                }
                Err(e) => {
                    error!(
                        "Accepting unvalidated bins for {} after {} resync attempts: {}",
                        pool, attempts, e
                    );
                    return Ok(bins);
                }
            }
        }
    }

    /// Page through the indexer's bins for `pool`.
    async fn subgraph_bins(&self, pool: Address) -> Result<SubgraphSnapshot> {
        let timeout = self.timeout();
        let page_size = self.config.subgraph_page_size.max(1);
        let mut snapshot = SubgraphSnapshot::default();
        let mut after = None;

        loop {
            let page = tokio::time::timeout(
                timeout,
                fetch_bins_page(self.subgraph.as_ref(), pool, after, page_size),
            )
            .await
            .map_err(|_| SubgraphError::Timeout(timeout))??;

            if let Some(timestamp) = page.block_timestamp() {
                snapshot.block_timestamp = timestamp;
            }
            let Some(pair) = page.lbpair else {
                debug!("Pool {} not indexed by subgraph", pool);
                break;
            };

            let decimals_x = token_decimals(pair.token_x.decimals)?;
            let decimals_y = token_decimals(pair.token_y.decimals)?;
            let count = pair.bins.len();

            for raw in pair.bins {
                let id = u32::try_from(raw.bin_id)
                    .map_err(|_| Error::InvalidReserve(format!("bin id {} out of range", raw.bin_id)))?;
                snapshot.bins.push(Bin {
                    id,
                    reserve_x: parse_decimal_units(&raw.reserve_x, decimals_x)?,
                    reserve_y: parse_decimal_units(&raw.reserve_y, decimals_y)?,
                    total_supply: parse_decimal_units(&raw.total_supply, 0)?,
                });
                after = Some(id);
            }

            if count < page_size as usize {
                break;
            }
        }

        Ok(snapshot)
    }
}

fn token_decimals(decimals: u64) -> Result<u8> {
    u8::try_from(decimals).map_err(|_| Error::InvalidReserve(format!("token decimals {}", decimals)))
}

/// New snapshot from chain aggregates and a bin list.
fn build_state(
    previous: &PoolState,
    rpc: &RpcPoolState,
    bins: Vec<Bin>,
    subgraph_block_timestamp: u64,
) -> Result<PoolState> {
    let mut extra = PoolExtra {
        rpc_block_timestamp: rpc.block_timestamp,
        subgraph_block_timestamp,
        fee_parameters: rpc.fee_parameters,
        active_bin_id: rpc.active_bin_id,
        bins,
        ..Default::default()
    };
    extra.refresh_derived(rpc.reserves)?;

    Ok(PoolState {
        address: previous.address,
        tokens: previous.tokens,
        reserves: rpc.reserves,
        extra,
    })
}
