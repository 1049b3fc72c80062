use super::{Ledger, PoolContractState, TransactionRequest, TxHandle, TxReceipt};
use crate::errors::{Result, SwapError};
use async_trait::async_trait;
use ethers::{
    contract::abigen,
    middleware::SignerMiddleware,
    providers::{Http, Middleware, Provider},
    signers::{LocalWallet, Signer},
    types::{Address, TransactionReceipt, U256},
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

abigen!(
    UniswapV3Pool,
    r"[
        function slot0() view returns (uint160 sqrtPriceX96, int24 tick, uint16 observationIndex, uint16 observationCardinality, uint16 observationCardinalityNext, uint8 feeProtocol, bool unlocked)
        function liquidity() view returns (uint128)
    ]",
);

abigen!(
    Erc20,
    r"[
        function balanceOf(address owner) view returns (uint256)
        function name() view returns (string)
        function symbol() view returns (string)
        function decimals() view returns (uint8)
    ]",
);

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// JSON-RPC ledger backed by an HTTP node. The optional local wallet plays
/// the role of the injected wallet provider.
#[derive(Clone)]
pub struct EthLedger {
    provider: Arc<Provider<Http>>,
    wallet: Option<LocalWallet>,
    poll_interval: Duration,
}

impl EthLedger {
    pub fn new(rpc_url: &str, wallet: Option<LocalWallet>) -> Result<Self> {
        let provider = Arc::new(Provider::<Http>::try_from(rpc_url)?);
        Ok(Self {
            provider,
            wallet,
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    fn erc20(&self, token: Address) -> Erc20<Provider<Http>> {
        Erc20::new(token, self.provider.clone())
    }
}

#[async_trait]
impl Ledger for EthLedger {
    async fn request_accounts(&self) -> Result<Vec<Address>> {
        let wallet = self.wallet.as_ref().ok_or(SwapError::WalletUnavailable)?;
        Ok(vec![wallet.address()])
    }

    async fn chain_id(&self) -> Result<u64> {
        let id = self
            .provider
            .get_chainid()
            .await
            .map_err(|e| SwapError::LedgerUnreachable(e.to_string()))?;
        Ok(id.as_u64())
    }

    async fn get_balance(&self, address: Address) -> Result<U256> {
        self.provider
            .get_balance(address, None)
            .await
            .map_err(|e| SwapError::LedgerUnreachable(e.to_string()))
    }

    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256> {
        self.erc20(token)
            .balance_of(owner)
            .call()
            .await
            .map_err(|e| SwapError::ContractCallFailed(e.to_string()))
    }

    async fn token_decimals(&self, token: Address) -> Result<u8> {
        self.erc20(token)
            .decimals()
            .call()
            .await
            .map_err(|e| SwapError::ContractCallFailed(e.to_string()))
    }

    async fn token_symbol(&self, token: Address) -> Result<String> {
        self.erc20(token)
            .symbol()
            .call()
            .await
            .map_err(|e| SwapError::ContractCallFailed(e.to_string()))
    }

    async fn token_name(&self, token: Address) -> Result<String> {
        self.erc20(token)
            .name()
            .call()
            .await
            .map_err(|e| SwapError::ContractCallFailed(e.to_string()))
    }

    async fn get_pool_contract_state(&self, pool: Address) -> Result<PoolContractState> {
        let contract = UniswapV3Pool::new(pool, self.provider.clone());
        let (sqrt_price_x96, tick, _, _, _, _fee_protocol, _unlocked) = contract
            .slot_0()
            .call()
            .await
            .map_err(|e| SwapError::ContractCallFailed(e.to_string()))?;
        let liquidity = contract
            .liquidity()
            .call()
            .await
            .map_err(|e| SwapError::ContractCallFailed(e.to_string()))?;
        debug!(?pool, %sqrt_price_x96, tick, liquidity, "[LEDGER] pool state read");
        Ok(PoolContractState {
            sqrt_price_x96,
            liquidity,
            tick,
        })
    }

    async fn submit_transaction(&self, tx: TransactionRequest) -> Result<TxHandle> {
        let wallet = self.wallet.clone().ok_or(SwapError::WalletUnavailable)?;
        if wallet.address() != tx.from {
            return Err(SwapError::SubmissionRejected(format!(
                "wallet does not control {:?}",
                tx.from
            )));
        }
        let chain_id = self.chain_id().await?;
        let client = SignerMiddleware::new((*self.provider).clone(), wallet.with_chain_id(chain_id));
        let request = ethers::types::TransactionRequest::new()
            .from(tx.from)
            .to(tx.to)
            .data(tx.data)
            .value(tx.value);
        let pending = client
            .send_transaction(request, None)
            .await
            .map_err(|e| classify_submission_error(&e.to_string()))?;
        let hash = pending.tx_hash();
        info!(tx = ?hash, to = ?tx.to, value = %tx.value, "[LEDGER] transaction broadcast");
        Ok(TxHandle { hash })
    }

    async fn await_confirmation(&self, handle: TxHandle, timeout: Duration) -> Result<TxReceipt> {
        let provider = self.provider.clone();
        let poll_interval = self.poll_interval;
        let wait = async move {
            loop {
                match provider.get_transaction_receipt(handle.hash).await {
                    Ok(Some(receipt)) => return receipt,
                    Ok(None) => {}
                    Err(e) => warn!(error = %e, tx = ?handle.hash, "[LEDGER] receipt poll failed"),
                }
                tokio::time::sleep(poll_interval).await;
            }
        };
        match tokio::time::timeout(timeout, wait).await {
            Ok(receipt) => Ok(to_receipt(receipt)),
            Err(_) => Err(SwapError::ConfirmationTimeout {
                tx_hash: handle.hash,
                timeout_secs: timeout.as_secs(),
            }),
        }
    }
}

fn to_receipt(receipt: TransactionReceipt) -> TxReceipt {
    TxReceipt {
        tx_hash: receipt.transaction_hash,
        success: receipt.status.map(|s| s.as_u64() == 1).unwrap_or(false),
        block_number: receipt.block_number.map(|b| b.as_u64()),
        gas_used: receipt.gas_used,
    }
}

/// Node and signer errors arrive as free text; funding failures are the
/// only ones worth telling apart from a plain rejection.
fn classify_submission_error(message: &str) -> SwapError {
    if message.to_lowercase().contains("insufficient funds") {
        SwapError::InsufficientFunds(message.to_string())
    } else {
        SwapError::SubmissionRejected(message.to_string())
    }
}
