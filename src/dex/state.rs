use crate::ledger::PoolContractState;
use crate::models::Asset;
use ethers::types::{Address, U256};
use serde::Serialize;
use uniswap_v3_math::tick_math::{MAX_TICK, MIN_TICK};

/// Uniswap V3 fee tiers, in hundredths of a basis point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FeeTier {
    Lowest,
    Low,
    Medium,
    High,
}

impl FeeTier {
    pub fn pips(self) -> u32 {
        match self {
            FeeTier::Lowest => 100,
            FeeTier::Low => 500,
            FeeTier::Medium => 3000,
            FeeTier::High => 10_000,
        }
    }

    pub fn tick_spacing(self) -> i32 {
        match self {
            FeeTier::Lowest => 1,
            FeeTier::Low => 10,
            FeeTier::Medium => 60,
            FeeTier::High => 200,
        }
    }

    pub fn from_pips(pips: u32) -> Option<Self> {
        match pips {
            100 => Some(FeeTier::Lowest),
            500 => Some(FeeTier::Low),
            3000 => Some(FeeTier::Medium),
            10_000 => Some(FeeTier::High),
            _ => None,
        }
    }
}

/// Round `tick` to the nearest multiple of `tick_spacing` (half rounds up),
/// staying within the usable tick range.
pub fn nearest_usable_tick(tick: i32, tick_spacing: i32) -> i32 {
    let rounded = (tick + tick_spacing / 2).div_euclid(tick_spacing) * tick_spacing;
    if rounded < MIN_TICK {
        rounded + tick_spacing
    } else if rounded > MAX_TICK {
        rounded - tick_spacing
    } else {
        rounded
    }
}

/// Initialized tick with its liquidity delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TickBoundary {
    pub index: i32,
    pub liquidity_net: i128,
    pub liquidity_gross: u128,
}

/// Immutable snapshot of a Uniswap V3 pool.
///
/// Liquidity is modelled as one full-range position: `boundary_ticks` holds
/// the minimum and maximum usable ticks with `+liquidity` and `-liquidity`.
/// Pools with several positions have a real tick bitmap that this does not
/// capture, so quotes are only exact while the swap stays inside the active
/// range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolState {
    pub address: Address,
    /// Lower-address token.
    pub token0: Asset,
    pub token1: Asset,
    pub fee: FeeTier,
    /// Current sqrt(token1/token0) in Q96.
    pub sqrt_price_x96: U256,
    pub liquidity: u128,
    pub tick: i32,
    pub boundary_ticks: [TickBoundary; 2],
}

impl PoolState {
    /// Build a snapshot; the two assets may be given in either order.
    pub fn new(
        address: Address,
        asset_a: Asset,
        asset_b: Asset,
        fee: FeeTier,
        raw: PoolContractState,
    ) -> Self {
        let (token0, token1) = if asset_a.sorts_before(&asset_b) {
            (asset_a, asset_b)
        } else {
            (asset_b, asset_a)
        };
        let spacing = fee.tick_spacing();
        let net = i128::try_from(raw.liquidity).unwrap_or(i128::MAX);
        let boundary_ticks = [
            TickBoundary {
                index: nearest_usable_tick(MIN_TICK, spacing),
                liquidity_net: net,
                liquidity_gross: raw.liquidity,
            },
            TickBoundary {
                index: nearest_usable_tick(MAX_TICK, spacing),
                liquidity_net: -net,
                liquidity_gross: raw.liquidity,
            },
        ];
        Self {
            address,
            token0,
            token1,
            fee,
            sqrt_price_x96: raw.sqrt_price_x96,
            liquidity: raw.liquidity,
            tick: raw.tick,
            boundary_ticks,
        }
    }

    /// The counterpart of `asset` in this pool.
    pub fn other(&self, asset: &Asset) -> Option<&Asset> {
        if &self.token0 == asset {
            Some(&self.token1)
        } else if &self.token1 == asset {
            Some(&self.token0)
        } else {
            None
        }
    }

    /// `Some(true)` when selling token0, `None` if `token_in` is not in the pool.
    pub fn zero_for_one(&self, token_in: &Asset) -> Option<bool> {
        if &self.token0 == token_in {
            Some(true)
        } else if &self.token1 == token_in {
            Some(false)
        } else {
            None
        }
    }

    pub fn lower_tick(&self) -> i32 {
        self.boundary_ticks[0].index
    }

    pub fn upper_tick(&self) -> i32 {
        self.boundary_ticks[1].index
    }
}
