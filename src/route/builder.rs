use super::types::{TradeLeg, UnifiedTrade};
use crate::errors::{Result, SwapError};
use tracing::debug;

/// Assembles quoted legs into a single [`UnifiedTrade`].
#[derive(Debug, Default, Clone, Copy)]
pub struct RouteBuilder;

impl RouteBuilder {
    /// Partition `legs` by route kind. Every leg must share the first leg's
    /// direction, its input/output assets and its native-input flag.
    pub fn build(legs: Vec<TradeLeg>) -> Result<UnifiedTrade> {
        let first = legs
            .first()
            .ok_or_else(|| SwapError::UnsupportedTradeShape("no trade legs".into()))?;
        let direction = first.direction();
        let input = first.leg().route.input().clone();
        let output = first.leg().route.output().clone();
        let native_input = first.leg().route.native_input();

        if legs.iter().any(|l| l.direction() != direction) {
            return Err(SwapError::InconsistentTradeDirection);
        }
        if legs
            .iter()
            .any(|l| l.leg().route.input() != &input || l.leg().route.output() != &output)
        {
            return Err(SwapError::UnsupportedTradeShape(format!(
                "all legs must trade {} for {}",
                input.symbol, output.symbol
            )));
        }

        if legs
            .iter()
            .any(|l| l.leg().route.native_input() != native_input)
        {
            return Err(SwapError::UnsupportedTradeShape(
                "legs disagree on paying with the native currency".into(),
            ));
        }

        let mut trade = UnifiedTrade {
            direct: Vec::new(),
            multi_hop: Vec::new(),
            mixed: Vec::new(),
            direction,
        };
        for leg in legs {
            match leg {
                TradeLeg::Direct(l) => trade.direct.push(l),
                TradeLeg::MultiHop(l) => trade.multi_hop.push(l),
                TradeLeg::Mixed(l) => trade.mixed.push(l),
            }
        }
        debug!(
            direct = trade.direct.len(),
            multi_hop = trade.multi_hop.len(),
            mixed = trade.mixed.len(),
            ?direction,
            "[ROUTE] trade built"
        );
        Ok(trade)
    }
}
