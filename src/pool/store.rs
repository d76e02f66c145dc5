//! Pool Record Store
//!
//! Thread-safe storage for pool records using DashMap. Records are replaced
//! whole, so a reader holding an `Arc<PoolRecord>` never sees a half-applied
//! sync.

use std::sync::Arc;

use alloy::primitives::Address;
use dashmap::DashMap;
use tracing::debug;

use crate::types::PoolRecord;

/// Concurrent pool record store keyed by pool address
#[derive(Debug)]
pub struct PoolStore {
    pools: Arc<DashMap<Address, Arc<PoolRecord>>>,
}

impl PoolStore {
    pub fn new() -> Self {
        Self {
            pools: Arc::new(DashMap::new()),
        }
    }

    /// Insert or replace a record
    pub fn upsert(&self, record: PoolRecord) {
        debug!(
            "Storing pool {}: reserves ({}, {})",
            record.address, record.reserves[0], record.reserves[1]
        );
        self.pools.insert(record.address, Arc::new(record));
    }

    pub fn get(&self, address: &Address) -> Option<Arc<PoolRecord>> {
        self.pools.get(address).map(|entry| Arc::clone(entry.value()))
    }

    pub fn all(&self) -> Vec<Arc<PoolRecord>> {
        self.pools.iter().map(|entry| Arc::clone(entry.value())).collect()
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }
}

impl Default for PoolStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for PoolStore {
    fn clone(&self) -> Self {
        Self {
            pools: Arc::clone(&self.pools),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pool: u8, token_x: u8, token_y: u8, timestamp: i64) -> PoolRecord {
        let mut record = PoolRecord::new_unsynced(
            Address::repeat_byte(pool),
            "traderjoe-v20",
            Address::repeat_byte(token_x),
            Address::repeat_byte(token_y),
        );
        record.timestamp = timestamp;
        record
    }

    #[test]
    fn test_upsert_replaces_whole_record() {
        let store = PoolStore::new();
        store.upsert(record(0xa1, 1, 2, 100));

        let before = store.get(&Address::repeat_byte(0xa1)).unwrap();
        let mut updated = record(0xa1, 1, 2, 200);
        updated.reserves = ["5".to_string(), "6".to_string()];
        store.upsert(updated);

        // Old handle still sees the old snapshot
        assert_eq!(before.reserves[0], "0");
        assert_eq!(store.get(&Address::repeat_byte(0xa1)).unwrap().reserves[0], "5");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_clones_share_records() {
        let store = PoolStore::new();
        assert!(store.is_empty());

        let shared = store.clone();
        shared.upsert(record(0xa1, 1, 2, 100));
        shared.upsert(record(0xa2, 2, 3, 100));

        assert_eq!(store.len(), 2);
        let mut addresses: Vec<Address> = store.all().iter().map(|r| r.address).collect();
        addresses.sort();
        assert_eq!(addresses, vec![Address::repeat_byte(0xa1), Address::repeat_byte(0xa2)]);
    }
}
