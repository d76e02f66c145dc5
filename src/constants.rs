//! Liquidity Book v2.0 constants
//!
//! Values mirror the pair contract's `Constants` library so the fixed-point
//! math reproduces on-chain rounding bit for bit.

use alloy::primitives::{address, Address, U256};

/// Number of fractional bits of a Q128.128 price
pub const SCALE_OFFSET: usize = 128;

/// 2^128, the fixed-point unit of every price
pub const SCALE: U256 = U256::from_limbs([0, 0, 1, 0]);

/// 1e18, denominator of every fee rate
pub const PRECISION: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

pub const BASIS_POINT_MAX: u64 = 10_000;

/// Bin id whose price is exactly 1.0 (2^23)
pub const REAL_ID_SHIFT: i64 = 1 << 23;

/// Largest exponent magnitude accepted by the on-chain `power` routine
pub const MAX_POW_EXPONENT: u64 = 0x100000;

/// Pool type tag written into every pool record
pub const DEX_TYPE_LIQUIDITY_BOOK_V20: &str = "liquiditybook-v20";

/// Multicall3 deployed address (same on all EVM chains)
pub const MULTICALL3_ADDRESS: Address = address!("0xcA11bde05977b3631167028862bE2a173976CA11");

pub const DEFAULT_BIN_CHUNK_SIZE: usize = 100;
pub const DEFAULT_SUBGRAPH_PAGE_SIZE: u32 = 1000;
pub const DEFAULT_NEW_POOL_LIMIT: u64 = 100;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_SUBGRAPH_LAG_WARN_SECS: u64 = 600;
pub const DEFAULT_MAX_RESYNC_ATTEMPTS: u32 = 1;
