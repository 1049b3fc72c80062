use crate::dex::PoolState;
use crate::errors::{Result, SwapError};
use crate::models::{Asset, TradeDirection};
use ethers::types::U256;
use serde::Serialize;

/// Ordered chain of pools from an input asset to an output asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Route {
    pools: Vec<PoolState>,
    path: Vec<Asset>,
    native_input: bool,
}

impl Route {
    pub fn new(pools: Vec<PoolState>, input: Asset, output: Asset) -> Result<Self> {
        if pools.is_empty() {
            return Err(SwapError::UnsupportedTradeShape("route has no pools".into()));
        }
        let mut path = vec![input];
        for pool in &pools {
            let current = &path[path.len() - 1];
            let next = pool.other(current).cloned().ok_or_else(|| {
                SwapError::UnsupportedTradeShape(format!(
                    "pool {:?} does not trade {}",
                    pool.address, current.symbol
                ))
            })?;
            path.push(next);
        }
        if path[path.len() - 1] != output {
            return Err(SwapError::UnsupportedTradeShape(format!(
                "route ends in {} instead of {}",
                path[path.len() - 1].symbol,
                output.symbol
            )));
        }
        Ok(Self {
            pools,
            path,
            native_input: false,
        })
    }

    /// Pay with the native currency. The router wraps it into the input
    /// asset, so this only settles when that asset is the wrapped native token.
    pub fn with_native_input(mut self) -> Self {
        self.native_input = true;
        self
    }

    pub fn pools(&self) -> &[PoolState] {
        &self.pools
    }

    pub fn path(&self) -> &[Asset] {
        &self.path
    }

    pub fn input(&self) -> &Asset {
        &self.path[0]
    }

    pub fn output(&self) -> &Asset {
        &self.path[self.path.len() - 1]
    }

    pub fn native_input(&self) -> bool {
        self.native_input
    }

    /// Chain per-pool quotes. Returns `(amount_in, amount_out)`.
    pub fn quote(&self, amount: U256, direction: TradeDirection) -> Result<(U256, U256)> {
        match direction {
            TradeDirection::ExactInput => {
                let mut running = amount;
                for (pool, token_in) in self.pools.iter().zip(&self.path) {
                    running = pool.quote(token_in, running, direction)?.1;
                }
                Ok((amount, running))
            }
            TradeDirection::ExactOutput => {
                let mut running = amount;
                for (pool, token_in) in self.pools.iter().zip(&self.path).rev() {
                    running = pool.quote(token_in, running, direction)?.0;
                }
                Ok((running, amount))
            }
        }
    }
}

/// A quoted route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteLeg {
    pub route: Route,
    pub input_amount: U256,
    pub output_amount: U256,
    pub direction: TradeDirection,
}

impl RouteLeg {
    fn quoted(route: Route, amount: U256, direction: TradeDirection) -> Result<Self> {
        let (input_amount, output_amount) = route.quote(amount, direction)?;
        Ok(Self {
            route,
            input_amount,
            output_amount,
            direction,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "leg", rename_all = "snake_case")]
pub enum TradeLeg {
    /// One pool.
    Direct(RouteLeg),
    /// Several pools of the same protocol, encoded as a packed path.
    MultiHop(RouteLeg),
    /// Pools assembled by an external router across protocols; exact-input only.
    Mixed(RouteLeg),
}

impl TradeLeg {
    pub fn direct(route: Route, amount: U256, direction: TradeDirection) -> Result<Self> {
        if route.pools().len() != 1 {
            return Err(SwapError::UnsupportedTradeShape(format!(
                "direct route needs exactly one pool, got {}",
                route.pools().len()
            )));
        }
        Ok(TradeLeg::Direct(RouteLeg::quoted(route, amount, direction)?))
    }

    pub fn multi_hop(route: Route, amount: U256, direction: TradeDirection) -> Result<Self> {
        if route.pools().len() < 2 {
            return Err(SwapError::UnsupportedTradeShape(
                "multi-hop route needs at least two pools".into(),
            ));
        }
        Ok(TradeLeg::MultiHop(RouteLeg::quoted(route, amount, direction)?))
    }

    pub fn mixed(route: Route, amount: U256, direction: TradeDirection) -> Result<Self> {
        if direction != TradeDirection::ExactInput {
            return Err(SwapError::UnsupportedTradeShape(
                "mixed routes only support exact input".into(),
            ));
        }
        Ok(TradeLeg::Mixed(RouteLeg::quoted(route, amount, direction)?))
    }

    pub fn leg(&self) -> &RouteLeg {
        match self {
            TradeLeg::Direct(leg) | TradeLeg::MultiHop(leg) | TradeLeg::Mixed(leg) => leg,
        }
    }

    pub fn direction(&self) -> TradeDirection {
        self.leg().direction
    }
}

/// One or more legs between the same two assets, all in one direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnifiedTrade {
    pub(crate) direct: Vec<RouteLeg>,
    pub(crate) multi_hop: Vec<RouteLeg>,
    pub(crate) mixed: Vec<RouteLeg>,
    pub(crate) direction: TradeDirection,
}

impl UnifiedTrade {
    pub fn direction(&self) -> TradeDirection {
        self.direction
    }

    pub fn direct_routes(&self) -> &[RouteLeg] {
        &self.direct
    }

    pub fn multi_hop_routes(&self) -> &[RouteLeg] {
        &self.multi_hop
    }

    pub fn mixed_routes(&self) -> &[RouteLeg] {
        &self.mixed
    }

    /// Every leg paired with its variant, direct legs first.
    pub fn legs(&self) -> impl Iterator<Item = TradeLeg> + '_ {
        self.direct
            .iter()
            .cloned()
            .map(TradeLeg::Direct)
            .chain(self.multi_hop.iter().cloned().map(TradeLeg::MultiHop))
            .chain(self.mixed.iter().cloned().map(TradeLeg::Mixed))
    }

    pub fn leg_count(&self) -> usize {
        self.direct.len() + self.multi_hop.len() + self.mixed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leg_count() == 0
    }

    fn route_legs(&self) -> impl Iterator<Item = &RouteLeg> {
        self.direct.iter().chain(&self.multi_hop).chain(&self.mixed)
    }

    pub fn input_asset(&self) -> Option<&Asset> {
        self.route_legs().next().map(|l| l.route.input())
    }

    pub fn output_asset(&self) -> Option<&Asset> {
        self.route_legs().next().map(|l| l.route.output())
    }

    pub fn input_amount(&self) -> U256 {
        self.route_legs()
            .fold(U256::zero(), |acc, l| acc.saturating_add(l.input_amount))
    }

    pub fn output_amount(&self) -> U256 {
        self.route_legs()
            .fold(U256::zero(), |acc, l| acc.saturating_add(l.output_amount))
    }
}
