use anyhow::Result;
use std::sync::Arc;
use swap_pipeline::{
    config::AppConfig,
    ledger::{EthLedger, Ledger},
    models::{Session, TradeDirection},
    notify::TracingNotifier,
    orchestrator::{SwapOrchestrator, SwapRequest},
    registry::AssetRegistry,
    settlement::{SettlementOptions, SwapRouter02Encoder},
    utils,
};

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load()?;
    utils::init_logging();

    tracing::info!(
        rpc_url = %config.rpc_url,
        router = ?config.router,
        fee = config.fee_tier.pips(),
        amount_in = %config.amount_in,
        native_input = config.native_input,
        "[INIT] swap-pipeline starting"
    );

    let ledger: Arc<dyn Ledger> = Arc::new(
        EthLedger::new(&config.rpc_url, config.wallet.clone())?
            .with_poll_interval(config.confirmation_poll),
    );
    let session = Arc::new(Session::new());
    let orchestrator = Arc::new(
        SwapOrchestrator::new(
            ledger.clone(),
            Arc::new(SwapRouter02Encoder::new(config.router)),
            config.factory,
            session,
            Arc::new(TracingNotifier),
        )
        .with_confirmation_timeout(config.confirmation_timeout),
    );

    let connection = orchestrator.connect().await?;

    let token_in = AssetRegistry::new(ledger).resolve(config.token_in).await?;
    let amount = utils::parse_token_amount(&config.amount_in, token_in.decimals)?;

    let request = SwapRequest {
        token_in: config.token_in,
        token_out: config.token_out,
        fee_tier: config.fee_tier,
        amount,
        direction: TradeDirection::ExactInput,
        native_input: config.native_input,
        options: SettlementOptions {
            slippage_tolerance: Some(config.slippage),
            recipient: Some(config.recipient.unwrap_or(connection.address)),
            deadline: None,
        },
    };

    // Ctrl-C aborts whatever stage the swap is waiting in
    let canceller = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("[SWAP] interrupt received, cancelling");
                orchestrator.cancel();
            }
        })
    };

    let result = orchestrator.swap(request).await;
    canceller.abort();

    let receipt = result?;
    tracing::info!(
        receipt = %serde_json::to_string_pretty(&receipt)?,
        "[SWAP] receipt"
    );
    Ok(())
}
