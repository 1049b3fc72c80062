//! Shared data structures used throughout the application.

use crate::utils::format_token_amount;
use bigdecimal::BigDecimal;
use ethers::types::{Address, U256};
use serde::Serialize;
use tokio::sync::watch;

/// Canonical token metadata. Identity is `(chain_id, address)`.
#[derive(Debug, Clone, Serialize)]
pub struct Asset {
    pub chain_id: u64,
    pub address: Address,
    pub decimals: u8,
    pub symbol: String,
    pub name: String,
}

impl Asset {
    pub fn new(
        chain_id: u64,
        address: Address,
        decimals: u8,
        symbol: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            chain_id,
            address,
            decimals,
            symbol: symbol.into(),
            name: name.into(),
        }
    }

    /// Canonical ordering used by pools: the lower address sorts first.
    pub fn sorts_before(&self, other: &Asset) -> bool {
        self.address < other.address
    }

    pub fn format_amount(&self, amount: U256) -> BigDecimal {
        format_token_amount(amount, self.decimals)
    }
}

impl PartialEq for Asset {
    fn eq(&self, other: &Self) -> bool {
        self.chain_id == other.chain_id && self.address == other.address
    }
}

impl Eq for Asset {}

impl std::hash::Hash for Asset {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.chain_id.hash(state);
        self.address.hash(state);
    }
}

/// Whether the caller fixes the input amount or the output amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TradeDirection {
    ExactInput,
    ExactOutput,
}

/// UI-facing connection state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionState {
    pub connected_address: Option<Address>,
    pub chain_id: Option<u64>,
    pub loading: bool,
}

/// Explicit session context handed to the orchestrator. Observers
/// subscribe to changes instead of reading ambient globals.
#[derive(Debug)]
pub struct Session {
    state: watch::Sender<SessionState>,
}

impl Session {
    pub fn new() -> Self {
        let (state, _rx) = watch::channel(SessionState::default());
        Self { state }
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn set_connected(&self, address: Address, chain_id: u64) {
        self.state.send_modify(|s| {
            s.connected_address = Some(address);
            s.chain_id = Some(chain_id);
        });
    }

    pub fn set_loading(&self, loading: bool) {
        self.state.send_modify(|s| s.loading = loading);
    }

    /// Wallet disconnect.
    pub fn clear(&self) {
        self.state.send_replace(SessionState::default());
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
