//! Fixed-point math for Liquidity Book pools
//!
//! Everything here is integer arithmetic on 256-bit words with explicit
//! rounding direction. Overflow is reported, never wrapped.

pub mod price;
pub mod uint256x256;

pub use price::{get_price_from_id, pow, sqrt_price_x128, virtual_liquidity};
pub use uint256x256::{
    mul_shift_round_down, mul_shift_round_up, shift_div_round_down, shift_div_round_up,
};
