//! Turning a built trade into the parameters of the settlement call.

use crate::errors::{Result, SwapError};
use crate::route::UnifiedTrade;
use ethers::types::{Address, Bytes, U256};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

pub mod encoder;

pub use encoder::{EncodedSettlement, SettlementEncoder, SwapRouter02Encoder};

const BPS_DENOMINATOR: u64 = 10_000;

/// Maximum accepted price deviation, in basis points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SlippageTolerance(u32);

impl SlippageTolerance {
    /// 0.5%
    pub const DEFAULT: SlippageTolerance = SlippageTolerance(50);

    pub fn from_bps(bps: u32) -> Result<Self> {
        if u64::from(bps) > BPS_DENOMINATOR {
            return Err(SwapError::InvalidSettlementOptions(format!(
                "slippage of {bps} bps exceeds 100%"
            )));
        }
        Ok(Self(bps))
    }

    pub fn bps(self) -> u32 {
        self.0
    }

    /// `amount / (1 + slippage)`, rounded down.
    pub fn min_amount_out(self, amount: U256) -> U256 {
        amount.saturating_mul(U256::from(BPS_DENOMINATOR))
            / U256::from(BPS_DENOMINATOR + u64::from(self.0))
    }

    /// `amount * (1 + slippage)`, rounded down.
    pub fn max_amount_in(self, amount: U256) -> U256 {
        amount.saturating_mul(U256::from(BPS_DENOMINATOR + u64::from(self.0)))
            / U256::from(BPS_DENOMINATOR)
    }
}

impl Default for SlippageTolerance {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Caller overrides; unset fields fall back to defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettlementOptions {
    pub slippage_tolerance: Option<SlippageTolerance>,
    /// No default; settlement fails without one.
    pub recipient: Option<Address>,
    /// Unix timestamp after which the router refuses the call.
    pub deadline: Option<U256>,
}

impl SettlementOptions {
    pub fn with_recipient(recipient: Address) -> Self {
        Self {
            recipient: Some(recipient),
            ..Self::default()
        }
    }

    pub fn resolve(&self) -> Result<ResolvedOptions> {
        let recipient = self.recipient.ok_or_else(|| {
            SwapError::InvalidSettlementOptions("a recipient must be supplied".into())
        })?;
        if recipient.is_zero() {
            return Err(SwapError::InvalidSettlementOptions(
                "recipient cannot be the zero address".into(),
            ));
        }
        Ok(ResolvedOptions {
            slippage_tolerance: self.slippage_tolerance.unwrap_or_default(),
            recipient,
            deadline: self.deadline,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedOptions {
    pub slippage_tolerance: SlippageTolerance,
    pub recipient: Address,
    pub deadline: Option<U256>,
}

/// Everything needed to submit the settlement transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettlementParameters {
    pub calldata: Bytes,
    pub target_contract: Address,
    pub native_value: U256,
    pub slippage_tolerance: SlippageTolerance,
    pub recipient: Address,
}

#[derive(Clone)]
pub struct SettlementPlanner {
    encoder: Arc<dyn SettlementEncoder>,
}

impl SettlementPlanner {
    pub fn new(encoder: Arc<dyn SettlementEncoder>) -> Self {
        Self { encoder }
    }

    pub fn compute_settlement(
        &self,
        trade: &UnifiedTrade,
        options: &SettlementOptions,
    ) -> Result<SettlementParameters> {
        if trade.is_empty() {
            return Err(SwapError::UnsupportedTradeShape("trade has no legs".into()));
        }
        if trade.legs().any(|l| l.direction() != trade.direction()) {
            return Err(SwapError::UnsupportedTradeShape(
                "trade mixes exact-input and exact-output legs".into(),
            ));
        }
        let resolved = options.resolve()?;
        let encoded = self.encoder.encode(trade, &resolved)?;
        info!(
            target = ?self.encoder.target(),
            value = %encoded.value,
            calldata_len = encoded.calldata.len(),
            slippage_bps = resolved.slippage_tolerance.bps(),
            "[SETTLE] settlement planned"
        );
        Ok(SettlementParameters {
            calldata: encoded.calldata,
            target_contract: self.encoder.target(),
            native_value: encoded.value,
            slippage_tolerance: resolved.slippage_tolerance,
            recipient: resolved.recipient,
        })
    }
}
