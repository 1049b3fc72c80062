//! Miscellaneous helper utilities.

use crate::errors::{Result, SwapError};
use bigdecimal::BigDecimal;
use ethers::types::U256;
use num_bigint::BigInt;
use std::str::FromStr;
use tracing_subscriber::{EnvFilter, fmt};

/// Initialize `tracing` subscriber with env-based filter.
///
/// If `RUST_LOG` is not set, defaults to `info` level.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();
}

/// Convert an ethers `U256` into the alloy representation used by `uniswap_v3_math`.
/// Both store four little-endian u64 limbs, so this is exact.
pub fn to_alloy_u256(value: U256) -> alloy_primitives::U256 {
    alloy_primitives::U256::from_limbs(value.0)
}

pub fn from_alloy_u256(value: alloy_primitives::U256) -> U256 {
    U256(value.into_limbs())
}

/// Parse a human decimal amount (e.g. "1.5") into base units for `decimals`.
pub fn parse_token_amount(human: &str, decimals: u8) -> Result<U256> {
    let units = ethers::utils::parse_units(human.trim(), decimals as u32)
        .map_err(|e| SwapError::Config(format!("invalid amount {human:?}: {e}")))?;
    Ok(units.into())
}

/// Render base units as a decimal token amount.
pub fn format_token_amount(amount: U256, decimals: u8) -> BigDecimal {
    // U256 always renders as a valid decimal integer
    let int = BigInt::from_str(&amount.to_string()).unwrap_or_default();
    BigDecimal::new(int, decimals as i64).normalized()
}
