//! Scripted in-memory ledger for tests.

use super::{Ledger, PoolContractState, TransactionRequest, TxHandle, TxReceipt};
use crate::errors::{Result, SwapError};
use async_trait::async_trait;
use ethers::types::{Address, H256, U256};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Notify;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitBehavior {
    Accept,
    Reject,
    Underfunded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmBehavior {
    Mined,
    Reverted,
    Timeout,
    /// Block until [`MockLedger::release`] is called, then mine.
    Gated,
}

#[derive(Debug, Clone)]
struct TokenMeta {
    decimals: u8,
    symbol: String,
    name: String,
}

pub struct MockLedger {
    pub accounts: Option<Vec<Address>>,
    pub chain_id: u64,
    /// Balance reads fail with `LedgerUnreachable`.
    pub balances_unreadable: bool,
    tokens: HashMap<Address, TokenMeta>,
    pools: HashMap<Address, PoolContractState>,
    balances: Mutex<HashMap<Address, U256>>,
    token_balances: HashMap<(Address, Address), U256>,
    submit: Mutex<SubmitBehavior>,
    confirm: Mutex<ConfirmBehavior>,
    submitted: Mutex<Vec<TransactionRequest>>,
    gate: Notify,
}

impl MockLedger {
    pub fn new(account: Address) -> Self {
        Self {
            accounts: Some(vec![account]),
            chain_id: 1,
            balances_unreadable: false,
            tokens: HashMap::new(),
            pools: HashMap::new(),
            balances: Mutex::new(HashMap::new()),
            token_balances: HashMap::new(),
            submit: Mutex::new(SubmitBehavior::Accept),
            confirm: Mutex::new(ConfirmBehavior::Mined),
            submitted: Mutex::new(Vec::new()),
            gate: Notify::new(),
        }
    }

    pub fn without_wallet() -> Self {
        let mut ledger = Self::new(Address::zero());
        ledger.accounts = None;
        ledger
    }

    pub fn with_token(mut self, address: Address, decimals: u8, symbol: &str, name: &str) -> Self {
        self.tokens.insert(
            address,
            TokenMeta {
                decimals,
                symbol: symbol.to_string(),
                name: name.to_string(),
            },
        );
        self
    }

    pub fn with_pool(mut self, address: Address, state: PoolContractState) -> Self {
        self.pools.insert(address, state);
        self
    }

    pub fn with_balance(self, address: Address, balance: U256) -> Self {
        self.balances.lock().unwrap().insert(address, balance);
        self
    }

    pub fn with_token_balance(mut self, token: Address, owner: Address, balance: U256) -> Self {
        self.token_balances.insert((token, owner), balance);
        self
    }

    pub fn set_submit(&self, behavior: SubmitBehavior) {
        *self.submit.lock().unwrap() = behavior;
    }

    pub fn set_confirm(&self, behavior: ConfirmBehavior) {
        *self.confirm.lock().unwrap() = behavior;
    }

    pub fn submitted(&self) -> Vec<TransactionRequest> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn release(&self) {
        self.gate.notify_one();
    }

    fn token(&self, token: Address) -> Result<TokenMeta> {
        self.tokens
            .get(&token)
            .cloned()
            .ok_or_else(|| SwapError::ContractCallFailed(format!("no code at {token:?}")))
    }
}

#[async_trait]
impl Ledger for MockLedger {
    async fn request_accounts(&self) -> Result<Vec<Address>> {
        self.accounts.clone().ok_or(SwapError::WalletUnavailable)
    }

    async fn chain_id(&self) -> Result<u64> {
        Ok(self.chain_id)
    }

    async fn get_balance(&self, address: Address) -> Result<U256> {
        if self.balances_unreadable {
            return Err(SwapError::LedgerUnreachable("connection refused".into()));
        }
        Ok(self
            .balances
            .lock()
            .unwrap()
            .get(&address)
            .copied()
            .unwrap_or_default())
    }

    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256> {
        if self.balances_unreadable {
            return Err(SwapError::LedgerUnreachable("connection refused".into()));
        }
        self.token(token)?;
        Ok(self
            .token_balances
            .get(&(token, owner))
            .copied()
            .unwrap_or_default())
    }

    async fn token_decimals(&self, token: Address) -> Result<u8> {
        Ok(self.token(token)?.decimals)
    }

    async fn token_symbol(&self, token: Address) -> Result<String> {
        Ok(self.token(token)?.symbol)
    }

    async fn token_name(&self, token: Address) -> Result<String> {
        Ok(self.token(token)?.name)
    }

    async fn get_pool_contract_state(&self, pool: Address) -> Result<PoolContractState> {
        self.pools
            .get(&pool)
            .copied()
            .ok_or_else(|| SwapError::ContractCallFailed("execution reverted".into()))
    }

    async fn submit_transaction(&self, tx: TransactionRequest) -> Result<TxHandle> {
        let behavior = *self.submit.lock().unwrap();
        match behavior {
            SubmitBehavior::Reject => Err(SwapError::SubmissionRejected("user denied".into())),
            SubmitBehavior::Underfunded => Err(SwapError::InsufficientFunds(
                "insufficient funds for gas * price + value".into(),
            )),
            SubmitBehavior::Accept => {
                let mut submitted = self.submitted.lock().unwrap();
                submitted.push(tx);
                Ok(TxHandle {
                    hash: H256::from_low_u64_be(submitted.len() as u64),
                })
            }
        }
    }

    async fn await_confirmation(&self, handle: TxHandle, timeout: Duration) -> Result<TxReceipt> {
        let behavior = *self.confirm.lock().unwrap();
        let success = match behavior {
            ConfirmBehavior::Mined => true,
            ConfirmBehavior::Reverted => false,
            ConfirmBehavior::Timeout => {
                return Err(SwapError::ConfirmationTimeout {
                    tx_hash: handle.hash,
                    timeout_secs: timeout.as_secs(),
                });
            }
            ConfirmBehavior::Gated => {
                self.gate.notified().await;
                true
            }
        };
        Ok(TxReceipt {
            tx_hash: handle.hash,
            success,
            block_number: Some(100),
            gas_used: Some(U256::from(120_000u64)),
        })
    }
}
