//! Token metadata resolution.

use crate::errors::{Result, SwapError};
use crate::ledger::Ledger;
use crate::models::Asset;
use ethers::types::Address;
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct AssetRegistry {
    ledger: Arc<dyn Ledger>,
}

impl AssetRegistry {
    pub fn new(ledger: Arc<dyn Ledger>) -> Self {
        Self { ledger }
    }

    /// Resolve `address` into full metadata. Any failing call fails the
    /// whole resolution; partial metadata is never returned.
    pub async fn resolve(&self, address: Address) -> Result<Asset> {
        let ledger = self.ledger.as_ref();
        let (chain_id, decimals, symbol, name) = futures::try_join!(
            ledger.chain_id(),
            ledger.token_decimals(address),
            ledger.token_symbol(address),
            ledger.token_name(address),
        )
        .map_err(|e| SwapError::AssetResolutionFailed {
            address,
            reason: e.to_string(),
        })?;
        debug!(?address, %symbol, decimals, chain_id, "[REGISTRY] asset resolved");
        Ok(Asset::new(chain_id, address, decimals, symbol, name))
    }
}
