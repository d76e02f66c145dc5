// Shared records exchanged with the pool store and the router

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::DEX_TYPE_LIQUIDITY_BOOK_V20;

/// One side of a pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolToken {
    pub address: Address,
    pub swappable: bool,
}

impl PoolToken {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            swappable: true,
        }
    }
}

/// Persisted pool record
///
/// `reserves` are decimal strings in raw token units. `extra` is an opaque
/// JSON blob owned by the tracker (see `pool::state::PoolExtra`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolRecord {
    pub address: Address,
    pub exchange: String,
    #[serde(rename = "type")]
    pub pool_type: String,
    pub tokens: [PoolToken; 2],
    pub reserves: [String; 2],
    #[serde(default)]
    pub extra: String,
    #[serde(default)]
    pub timestamp: i64,
}

impl PoolRecord {
    /// A freshly discovered pool: zero reserves, no extra yet.
    pub fn new_unsynced(address: Address, exchange: &str, token_x: Address, token_y: Address) -> Self {
        Self {
            address,
            exchange: exchange.to_string(),
            pool_type: DEX_TYPE_LIQUIDITY_BOOK_V20.to_string(),
            tokens: [PoolToken::new(token_x), PoolToken::new(token_y)],
            reserves: ["0".to_string(), "0".to_string()],
            extra: String::new(),
            timestamp: chrono::Utc::now().timestamp(),
        }
    }

    pub fn token_x(&self) -> Address {
        self.tokens[0].address
    }

    pub fn token_y(&self) -> Address {
        self.tokens[1].address
    }
}

impl fmt::Display for PoolRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} {} ({}/{})",
            self.exchange,
            self.address,
            self.token_x(),
            self.token_y()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    #[test]
    fn test_record_json_shape() {
        let record = PoolRecord::new_unsynced(
            address!("0x1111111111111111111111111111111111111111"),
            "traderjoe-v20",
            address!("0x2222222222222222222222222222222222222222"),
            address!("0x3333333333333333333333333333333333333333"),
        );
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], DEX_TYPE_LIQUIDITY_BOOK_V20);
        assert_eq!(json["reserves"][0], "0");
        assert_eq!(json["tokens"][1]["swappable"], true);

        let back: PoolRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }
}
