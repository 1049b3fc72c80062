//! Configuration loader and application settings.

use crate::dex::FeeTier;
use crate::errors::{Result, SwapError};
use crate::settlement::SlippageTolerance;
use ethers::signers::LocalWallet;
use ethers::types::Address;
use std::time::Duration;
use url::Url;

pub const MAINNET_SWAP_ROUTER_02: &str = "0x68b3465833fb72A70ecDF485E0e4C7bD8665Fc45";
pub const MAINNET_V3_FACTORY: &str = "0x1F98431c8aD98523631AE4a59f267346ea31F984";
pub const MAINNET_WETH: &str = "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2";
pub const MAINNET_USDC: &str = "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48";

/// Consolidated application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// HTTP endpoint of the Ethereum node.
    pub rpc_url: String,
    /// Signing wallet; `None` means no wallet provider is available.
    pub wallet: Option<LocalWallet>,
    pub router: Address,
    pub factory: Address,
    pub token_in: Address,
    pub token_out: Address,
    pub fee_tier: FeeTier,
    /// Human decimal amount of `token_in`, e.g. "1.5".
    pub amount_in: String,
    pub native_input: bool,
    /// Defaults to the connected account when unset.
    pub recipient: Option<Address>,
    pub slippage: SlippageTolerance,
    pub confirmation_timeout: Duration,
    pub confirmation_poll: Duration,
}

impl AppConfig {
    /// Load configuration from `.env` and the process environment.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`AppConfig::load`] but reading values through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let rpc_url = get("RPC_URL").ok_or_else(|| {
            SwapError::Config("Set RPC_URL to your Ethereum node HTTP endpoint".into())
        })?;
        Url::parse(&rpc_url)?;

        let wallet = match get("PRIVATE_KEY") {
            Some(key) => Some(
                key.parse::<LocalWallet>()
                    // never echo the key itself
                    .map_err(|_| SwapError::Config("PRIVATE_KEY is not a valid secp256k1 key".into()))?,
            ),
            None => None,
        };

        let address = |key: &str, default: &str| -> Result<Address> {
            let raw = get(key).unwrap_or_else(|| default.to_string());
            raw.parse()
                .map_err(|_| SwapError::Config(format!("{key} is not an address: {raw:?}")))
        };

        let number = |key: &str, default: u64| -> Result<u64> {
            match get(key) {
                Some(raw) => raw
                    .parse()
                    .map_err(|_| SwapError::Config(format!("{key} must be an integer, got {raw:?}"))),
                None => Ok(default),
            }
        };

        let fee_pips = number("FEE_TIER", 3000)?;
        let fee_tier = u32::try_from(fee_pips)
            .ok()
            .and_then(FeeTier::from_pips)
            .ok_or_else(|| SwapError::Config(format!("unsupported FEE_TIER {fee_pips}")))?;

        let native_input = match get("NATIVE_INPUT").as_deref() {
            None => true,
            Some(raw) => parse_bool(raw)
                .ok_or_else(|| SwapError::Config(format!("NATIVE_INPUT must be a boolean, got {raw:?}")))?,
        };

        let recipient = match get("RECIPIENT") {
            Some(raw) => Some(
                raw.parse()
                    .map_err(|_| SwapError::Config(format!("RECIPIENT is not an address: {raw:?}")))?,
            ),
            None => None,
        };

        let slippage_bps = number("SLIPPAGE_BPS", u64::from(SlippageTolerance::DEFAULT.bps()))?;
        let slippage = u32::try_from(slippage_bps)
            .map_err(|_| SwapError::Config(format!("SLIPPAGE_BPS out of range: {slippage_bps}")))
            .and_then(|bps| {
                SlippageTolerance::from_bps(bps).map_err(|e| SwapError::Config(e.to_string()))
            })?;

        Ok(Self {
            rpc_url,
            wallet,
            router: address("ROUTER_ADDRESS", MAINNET_SWAP_ROUTER_02)?,
            factory: address("FACTORY_ADDRESS", MAINNET_V3_FACTORY)?,
            token_in: address("TOKEN_IN", MAINNET_WETH)?,
            token_out: address("TOKEN_OUT", MAINNET_USDC)?,
            fee_tier,
            amount_in: get("AMOUNT_IN").unwrap_or_else(|| "1".into()),
            native_input,
            recipient,
            slippage,
            confirmation_timeout: Duration::from_secs(number("CONFIRMATION_TIMEOUT_SECS", 90)?),
            confirmation_poll: Duration::from_millis(number("CONFIRMATION_POLL_MS", 1000)?),
        })
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}
