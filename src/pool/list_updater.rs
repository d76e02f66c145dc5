//! Pool discovery
//!
//! Pages through the factory's pair registry with a persisted offset cursor.
//! Each call covers at most `limit` registry indices. The cursor moves past
//! the whole window even when some indices fail; those are listed in
//! `NewPoolsBatch::skipped` instead of being retried.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::chain::ChainReader;
use crate::error::{ChainError, Error, Result};
use crate::types::PoolRecord;

/// Persisted discovery cursor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolsListMetadata {
    pub offset: u64,
}

impl PoolsListMetadata {
    pub fn from_bytes(raw: &[u8]) -> Result<Self> {
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(raw).map_err(|e| Error::InvalidMetadata(e.to_string()))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// `allLBPairs(index)` failed
    AddressLookupFailed,
    /// `tokenX()` or `tokenY()` failed on the pair
    TokenLookupFailed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedPool {
    pub index: u64,
    pub address: Option<Address>,
    pub reason: SkipReason,
}

#[derive(Debug, Clone)]
pub struct NewPoolsBatch {
    pub pools: Vec<PoolRecord>,
    pub skipped: Vec<SkippedPool>,
    /// Cursor to pass to the next call
    pub metadata: Vec<u8>,
}

pub struct PoolsListUpdater<C> {
    chain: Arc<C>,
    factory: Address,
    dex_id: String,
    limit: u64,
    timeout: Duration,
}

impl<C: ChainReader> PoolsListUpdater<C> {
    pub fn new(chain: Arc<C>, factory: Address, dex_id: String, limit: u64, timeout: Duration) -> Self {
        Self {
            chain,
            factory,
            dex_id,
            limit: limit.max(1),
            timeout,
        }
    }

    async fn with_timeout<T>(
        &self,
        fut: impl std::future::Future<Output = std::result::Result<T, ChainError>>,
    ) -> Result<T> {
        Ok(tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| ChainError::Timeout(self.timeout))??)
    }

    pub async fn get_new_pools(&self, metadata: &[u8]) -> Result<NewPoolsBatch> {
        let cursor = PoolsListMetadata::from_bytes(metadata)?;
        let total = self.with_timeout(self.chain.pair_count(self.factory)).await?;

        let start = cursor.offset.min(total);
        let end = start.saturating_add(self.limit).min(total);
        if start == end {
            debug!("No new pairs on {} (total {})", self.factory, total);
            return Ok(NewPoolsBatch {
                pools: Vec::new(),
                skipped: Vec::new(),
                metadata: PoolsListMetadata { offset: start }.to_bytes()?,
            });
        }

        let addresses = self
            .with_timeout(self.chain.pair_addresses(self.factory, start, end))
            .await?;
        if addresses.len() as u64 != end - start {
            return Err(Error::Chain(ChainError::Decode {
                method: "allLBPairs",
                reason: format!("{} results for {} indices", addresses.len(), end - start),
            }));
        }

        let mut skipped = Vec::new();
        let mut resolved = Vec::new();
        for (index, address) in (start..end).zip(addresses) {
            match address {
                Some(address) => resolved.push((index, address)),
                None => skipped.push(SkippedPool {
                    index,
                    address: None,
                    reason: SkipReason::AddressLookupFailed,
                }),
            }
        }

        let pairs: Vec<Address> = resolved.iter().map(|(_, address)| *address).collect();
        let tokens = self.with_timeout(self.chain.pair_tokens(&pairs)).await?;

        let mut pools = Vec::with_capacity(resolved.len());
        for ((index, address), tokens) in resolved.into_iter().zip(tokens) {
            match tokens {
                Some((token_x, token_y)) => {
                    pools.push(PoolRecord::new_unsynced(address, &self.dex_id, token_x, token_y))
                }
                None => skipped.push(SkippedPool {
                    index,
                    address: Some(address),
                    reason: SkipReason::TokenLookupFailed,
                }),
            }
        }

        if !skipped.is_empty() {
            warn!(
                "Skipped {} of {} pairs in [{}, {}) on {}",
                skipped.len(),
                end - start,
                start,
                end,
                self.factory
            );
        }
        info!(
            "Discovered {} new pairs on {} ([{}, {}) of {})",
            pools.len(),
            self.factory,
            start,
            end,
            total
        );

        Ok(NewPoolsBatch {
            pools,
            skipped,
            metadata: PoolsListMetadata { offset: end }.to_bytes()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{ChainResult, RpcPoolState};
    use crate::pool::Bin;
    use async_trait::async_trait;
    use std::collections::HashSet;

    /// Registry with `total` pairs; pair `i` lives at address `i + 1`
    struct FakeRegistry {
        total: u64,
        broken_indices: HashSet<u64>,
        broken_pairs: HashSet<Address>,
    }

    fn pair_address(index: u64) -> Address {
        let mut bytes = [0u8; 20];
        bytes[12..].copy_from_slice(&(index + 1).to_be_bytes());
        Address::from(bytes)
    }

    #[async_trait]
    impl ChainReader for FakeRegistry {
        async fn pool_state(&self, _pool: Address, _block: Option<u64>) -> ChainResult<RpcPoolState> {
            Err(ChainError::Rpc("unused".to_string()))
        }

        async fn bins(&self, _pool: Address, _ids: &[u32], _block: Option<u64>) -> ChainResult<Vec<Bin>> {
            Err(ChainError::Rpc("unused".to_string()))
        }

        async fn pair_count(&self, _factory: Address) -> ChainResult<u64> {
            Ok(self.total)
        }

        async fn pair_addresses(&self, _factory: Address, start: u64, end: u64) -> ChainResult<Vec<Option<Address>>> {
            Ok((start..end)
                .map(|i| (!self.broken_indices.contains(&i)).then(|| pair_address(i)))
                .collect())
        }

        async fn pair_tokens(&self, pairs: &[Address]) -> ChainResult<Vec<Option<(Address, Address)>>> {
            Ok(pairs
                .iter()
                .map(|p| {
                    (!self.broken_pairs.contains(p))
                        .then(|| (Address::repeat_byte(0x01), Address::repeat_byte(0x02)))
                })
                .collect())
        }
    }

    fn updater(registry: FakeRegistry) -> PoolsListUpdater<FakeRegistry> {
        PoolsListUpdater::new(
            Arc::new(registry),
            Address::repeat_byte(0xfa),
            "traderjoe-v20".to_string(),
            100,
            Duration::from_secs(5),
        )
    }

    fn offset(metadata: &[u8]) -> u64 {
        PoolsListMetadata::from_bytes(metadata).unwrap().offset
    }

    #[tokio::test]
    async fn test_pagination_advances_cursor() {
        let updater = updater(FakeRegistry {
            total: 205,
            broken_indices: HashSet::new(),
            broken_pairs: HashSet::new(),
        });

        let first = updater.get_new_pools(&[]).await.unwrap();
        assert_eq!(first.pools.len(), 100);
        assert_eq!(offset(&first.metadata), 100);
        assert_eq!(first.pools[0].address, pair_address(0));

        let second = updater.get_new_pools(&first.metadata).await.unwrap();
        assert_eq!(second.pools.len(), 100);
        assert_eq!(offset(&second.metadata), 200);

        let third = updater.get_new_pools(&second.metadata).await.unwrap();
        assert_eq!(third.pools.len(), 5);
        assert_eq!(offset(&third.metadata), 205);
        assert_eq!(third.pools[4].address, pair_address(204));

        let fourth = updater.get_new_pools(&third.metadata).await.unwrap();
        assert!(fourth.pools.is_empty());
        assert_eq!(offset(&fourth.metadata), 205);
    }

    #[tokio::test]
    async fn test_failures_are_skipped_not_retried() {
        let updater = updater(FakeRegistry {
            total: 10,
            broken_indices: HashSet::from([3]),
            broken_pairs: HashSet::from([pair_address(7)]),
        });

        let batch = updater.get_new_pools(b"{\"offset\":0}").await.unwrap();
        assert_eq!(batch.pools.len(), 8);
        assert_eq!(offset(&batch.metadata), 10);
        assert_eq!(
            batch.skipped,
            vec![
                SkippedPool {
                    index: 3,
                    address: None,
                    reason: SkipReason::AddressLookupFailed,
                },
                SkippedPool {
                    index: 7,
                    address: Some(pair_address(7)),
                    reason: SkipReason::TokenLookupFailed,
                },
            ]
        );

        let pool = &batch.pools[0];
        assert_eq!(pool.reserves, ["0".to_string(), "0".to_string()]);
        assert_eq!(pool.exchange, "traderjoe-v20");
        assert!(pool.extra.is_empty());
    }

    #[tokio::test]
    async fn test_bad_metadata() {
        let updater = updater(FakeRegistry {
            total: 1,
            broken_indices: HashSet::new(),
            broken_pairs: HashSet::new(),
        });
        let err = updater.get_new_pools(b"offset=3").await.unwrap_err();
        assert!(matches!(err, Error::InvalidMetadata(_)));
    }
}
