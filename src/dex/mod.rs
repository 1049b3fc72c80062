//! Uniswap V3 pool discovery and snapshots.

use crate::errors::{Result, SwapError};
use crate::ledger::Ledger;
use crate::models::Asset;
use ethers::{
    abi::{Token, encode},
    types::{Address, H256, U256},
    utils::{get_create2_address_from_hash, keccak256},
};
use std::sync::Arc;
use tracing::info;

pub mod calc;
pub mod state;

pub use calc::{SwapQuote, quote_swap};
pub use state::{FeeTier, PoolState, TickBoundary, nearest_usable_tick};

/// `keccak256` of the UniswapV3Pool creation code.
pub const POOL_INIT_CODE_HASH: H256 = H256([
    0xe3, 0x4f, 0x19, 0x9b, 0x19, 0xb2, 0xb4, 0xf4, 0x7f, 0x68, 0x44, 0x26, 0x19, 0xd5, 0x55, 0x52,
    0x7d, 0x24, 0x4f, 0x78, 0xa3, 0x29, 0x7e, 0xa8, 0x93, 0x25, 0xf8, 0x43, 0xf8, 0x7b, 0x8b, 0x54,
]);

/// Deterministic pool address for a token pair and fee tier, independent of
/// the order the tokens are given in.
pub fn compute_pool_address(
    factory: Address,
    token_a: Address,
    token_b: Address,
    fee: FeeTier,
) -> Address {
    let (token0, token1) = if token_a < token_b {
        (token_a, token_b)
    } else {
        (token_b, token_a)
    };
    let salt = keccak256(encode(&[
        Token::Address(token0),
        Token::Address(token1),
        Token::Uint(U256::from(fee.pips())),
    ]));
    get_create2_address_from_hash(factory, salt, POOL_INIT_CODE_HASH)
}

/// Reads pool state from the ledger into immutable [`PoolState`] snapshots.
#[derive(Clone)]
pub struct PoolSnapshot {
    ledger: Arc<dyn Ledger>,
    factory: Address,
}

impl PoolSnapshot {
    pub fn new(ledger: Arc<dyn Ledger>, factory: Address) -> Self {
        Self { ledger, factory }
    }

    pub async fn fetch(&self, asset_a: &Asset, asset_b: &Asset, fee: FeeTier) -> Result<PoolState> {
        if asset_a == asset_b {
            return Err(SwapError::UnsupportedTradeShape(format!(
                "cannot pair {} with itself",
                asset_a.symbol
            )));
        }
        let pool = compute_pool_address(self.factory, asset_a.address, asset_b.address, fee);
        let raw = self
            .ledger
            .get_pool_contract_state(pool)
            .await
            .map_err(|e| SwapError::PoolNotFound {
                pool,
                reason: e.to_string(),
            })?;
        if raw.sqrt_price_x96.is_zero() {
            return Err(SwapError::PoolNotFound {
                pool,
                reason: "pool is not initialized".into(),
            });
        }
        let state = PoolState::new(pool, asset_a.clone(), asset_b.clone(), fee, raw);
        info!(
            ?pool,
            token0 = %state.token0.symbol,
            token1 = %state.token1.symbol,
            fee = fee.pips(),
            tick = state.tick,
            liquidity = state.liquidity,
            "[POOL] snapshot taken"
        );
        Ok(state)
    }
}
