use ethers::types::{Address, H256};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SwapError>;

#[derive(Debug, Error)]
pub enum SwapError {
    #[error("No wallet provider available. Install or configure a wallet")]
    WalletUnavailable,

    #[error("Wallet returned no authorized accounts")]
    NoAccountsAuthorized,

    #[error("Ledger unreachable: {0}")]
    LedgerUnreachable(String),

    #[error("Contract call failed: {0}")]
    ContractCallFailed(String),

    #[error("Pool not found at {pool:?}: {reason}")]
    PoolNotFound { pool: Address, reason: String },

    #[error("Could not resolve asset {address:?}: {reason}")]
    AssetResolutionFailed { address: Address, reason: String },

    #[error("Trade legs disagree on trade direction")]
    InconsistentTradeDirection,

    #[error("Unsupported trade shape: {0}")]
    UnsupportedTradeShape(String),

    #[error("Transaction rejected: {0}")]
    SubmissionRejected(String),

    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    /// The transaction may still be mined; only its confirmation was not observed.
    #[error(
        "Transaction {tx_hash:?} not confirmed within {timeout_secs}s; it may still be mined"
    )]
    ConfirmationTimeout { tx_hash: H256, timeout_secs: u64 },

    #[error("A swap is already in progress")]
    OperationInProgress,

    #[error("Insufficient pool liquidity: {0}")]
    InsufficientLiquidity(String),

    #[error("Invalid settlement options: {0}")]
    InvalidSettlementOptions(String),

    #[error("Transaction {0:?} reverted")]
    TransactionReverted(H256),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Field-less discriminant of [`SwapError`], carried by a failed pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    WalletUnavailable,
    NoAccountsAuthorized,
    LedgerUnreachable,
    ContractCallFailed,
    PoolNotFound,
    AssetResolutionFailed,
    InconsistentTradeDirection,
    UnsupportedTradeShape,
    SubmissionRejected,
    InsufficientFunds,
    ConfirmationTimeout,
    OperationInProgress,
    InsufficientLiquidity,
    InvalidSettlementOptions,
    TransactionReverted,
    Cancelled,
    Config,
}

impl SwapError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SwapError::WalletUnavailable => ErrorKind::WalletUnavailable,
            SwapError::NoAccountsAuthorized => ErrorKind::NoAccountsAuthorized,
            SwapError::LedgerUnreachable(_) => ErrorKind::LedgerUnreachable,
            SwapError::ContractCallFailed(_) => ErrorKind::ContractCallFailed,
            SwapError::PoolNotFound { .. } => ErrorKind::PoolNotFound,
            SwapError::AssetResolutionFailed { .. } => ErrorKind::AssetResolutionFailed,
            SwapError::InconsistentTradeDirection => ErrorKind::InconsistentTradeDirection,
            SwapError::UnsupportedTradeShape(_) => ErrorKind::UnsupportedTradeShape,
            SwapError::SubmissionRejected(_) => ErrorKind::SubmissionRejected,
            SwapError::InsufficientFunds(_) => ErrorKind::InsufficientFunds,
            SwapError::ConfirmationTimeout { .. } => ErrorKind::ConfirmationTimeout,
            SwapError::OperationInProgress => ErrorKind::OperationInProgress,
            SwapError::InsufficientLiquidity(_) => ErrorKind::InsufficientLiquidity,
            SwapError::InvalidSettlementOptions(_) => ErrorKind::InvalidSettlementOptions,
            SwapError::TransactionReverted(_) => ErrorKind::TransactionReverted,
            SwapError::Cancelled => ErrorKind::Cancelled,
            SwapError::Config(_) => ErrorKind::Config,
        }
    }
}

impl From<url::ParseError> for SwapError {
    fn from(e: url::ParseError) -> Self {
        SwapError::Config(format!("invalid url: {e}"))
    }
}

impl From<uniswap_v3_math::error::UniswapV3MathError> for SwapError {
    fn from(e: uniswap_v3_math::error::UniswapV3MathError) -> Self {
        SwapError::InsufficientLiquidity(e.to_string())
    }
}
