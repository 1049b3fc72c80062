use crate::dex::state::PoolState;
use crate::errors::{Result, SwapError};
use crate::models::{Asset, TradeDirection};
use crate::utils::{from_alloy_u256, to_alloy_u256};
use alloy_primitives::{I256, Sign};
use ethers::types::U256;
use uniswap_v3_math::{swap_math::compute_swap_step, tick_math::get_sqrt_ratio_at_tick};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapQuote {
    /// Input including the LP fee.
    pub amount_in: U256,
    pub amount_out: U256,
    pub sqrt_price_after_x96: U256,
}

/// Quote a swap against a single pool with V3 math.
///
/// With the two-boundary liquidity model the whole swap is a single
/// `compute_swap_step` towards the boundary tick in the swap direction. If
/// the boundary is reached before the amount is filled the pool cannot
/// serve the trade.
pub fn quote_swap(
    pool: &PoolState,
    token_in: &Asset,
    amount: U256,
    direction: TradeDirection,
) -> Result<SwapQuote> {
    if amount.is_zero() {
        return Err(SwapError::UnsupportedTradeShape("zero trade amount".into()));
    }
    let zero_for_one = pool.zero_for_one(token_in).ok_or_else(|| {
        SwapError::UnsupportedTradeShape(format!(
            "{} is not traded by pool {:?}",
            token_in.symbol, pool.address
        ))
    })?;
    if pool.liquidity == 0 {
        return Err(SwapError::InsufficientLiquidity(format!(
            "pool {:?} has no active liquidity",
            pool.address
        )));
    }

    let boundary_tick = if zero_for_one {
        pool.lower_tick()
    } else {
        pool.upper_tick()
    };
    let sqrt_target = get_sqrt_ratio_at_tick(boundary_tick)?;
    let sqrt_current = to_alloy_u256(pool.sqrt_price_x96);
    let room_left = if zero_for_one {
        sqrt_current > sqrt_target
    } else {
        sqrt_current < sqrt_target
    };
    if !room_left {
        return Err(SwapError::InsufficientLiquidity(format!(
            "pool {:?} price already at range boundary",
            pool.address
        )));
    }

    let wanted = to_alloy_u256(amount);
    let sign = match direction {
        TradeDirection::ExactInput => Sign::Positive,
        TradeDirection::ExactOutput => Sign::Negative,
    };
    let amount_remaining = I256::checked_from_sign_and_abs(sign, wanted)
        .ok_or_else(|| SwapError::UnsupportedTradeShape("amount exceeds int256".into()))?;

    let (sqrt_next, step_in, step_out, fee_amount) = compute_swap_step(
        sqrt_current,
        sqrt_target,
        pool.liquidity,
        amount_remaining,
        pool.fee.pips(),
    )?;
    let total_in = step_in + fee_amount;

    let filled = match direction {
        TradeDirection::ExactInput => total_in >= wanted,
        TradeDirection::ExactOutput => step_out >= wanted,
    };
    if !filled {
        return Err(SwapError::InsufficientLiquidity(format!(
            "pool {:?} range exhausted before filling {amount}",
            pool.address
        )));
    }

    Ok(SwapQuote {
        amount_in: from_alloy_u256(total_in),
        amount_out: from_alloy_u256(step_out),
        sqrt_price_after_x96: from_alloy_u256(sqrt_next),
    })
}

impl PoolState {
    /// `(amount_in, amount_out)` for `amount` of `token_in` through this pool.
    pub fn quote(
        &self,
        token_in: &Asset,
        amount: U256,
        direction: TradeDirection,
    ) -> Result<(U256, U256)> {
        let q = quote_swap(self, token_in, amount, direction)?;
        Ok((q.amount_in, q.amount_out))
    }
}
