//! Access to the external ledger node and the injected wallet provider.

use crate::errors::{Result, SwapError};
use async_trait::async_trait;
use ethers::types::{Address, Bytes, H256, U256};
use serde::Serialize;
use std::time::Duration;

pub mod client;
#[cfg(test)]
pub(crate) mod mock;

pub use client::EthLedger;

/// Result of a successful wallet connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connection {
    pub address: Address,
    pub chain_id: u64,
}

/// Raw pool contract reads (`slot0` + `liquidity`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolContractState {
    pub sqrt_price_x96: U256,
    pub liquidity: u128,
    pub tick: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRequest {
    pub from: Address,
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
}

/// Handle to a broadcast transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TxHandle {
    pub hash: H256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TxReceipt {
    pub tx_hash: H256,
    pub success: bool,
    pub block_number: Option<u64>,
    pub gas_used: Option<U256>,
}

#[async_trait]
pub trait Ledger: Send + Sync {
    /// Ask the wallet provider for authorized accounts.
    /// Fails with `WalletUnavailable` when no provider is injected.
    async fn request_accounts(&self) -> Result<Vec<Address>>;

    async fn chain_id(&self) -> Result<u64>;

    async fn connect(&self) -> Result<Connection> {
        let accounts = self.request_accounts().await?;
        let address = first_account(&accounts)?;
        let chain_id = self.chain_id().await?;
        Ok(Connection { address, chain_id })
    }

    async fn get_balance(&self, address: Address) -> Result<U256>;

    /// ERC-20 `balanceOf(owner)`.
    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256>;

    async fn token_decimals(&self, token: Address) -> Result<u8>;

    async fn token_symbol(&self, token: Address) -> Result<String>;

    async fn token_name(&self, token: Address) -> Result<String>;

    async fn get_pool_contract_state(&self, pool: Address) -> Result<PoolContractState>;

    async fn submit_transaction(&self, tx: TransactionRequest) -> Result<TxHandle>;

    /// Wait for the transaction to be mined, giving up after `timeout` with
    /// `ConfirmationTimeout`.
    async fn await_confirmation(&self, handle: TxHandle, timeout: Duration) -> Result<TxReceipt>;
}

fn first_account(accounts: &[Address]) -> Result<Address> {
    accounts
        .first()
        .copied()
        .ok_or(SwapError::NoAccountsAuthorized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_account_is_used() {
        let a = Address::repeat_byte(1);
        let b = Address::repeat_byte(2);
        assert_eq!(first_account(&[a, b]).unwrap(), a);
        assert!(matches!(
            first_account(&[]),
            Err(SwapError::NoAccountsAuthorized)
        ));
    }
}
