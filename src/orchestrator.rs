//! The quote-and-settle pipeline.
//!
//! `swap()` walks `Connecting -> ResolvingAssets -> SnapshottingPool ->
//! BuildingRoute -> PlanningSettlement -> Submitting -> Confirming ->
//! Settled`, stopping in `Failed(kind)` at the first error. Only one swap
//! may be in flight per orchestrator; a concurrent call is rejected rather
//! than queued, since its settlement would be planned against a pool
//! snapshot that the in-flight swap is about to change.

use crate::dex::{FeeTier, PoolSnapshot};
use crate::errors::{ErrorKind, Result, SwapError};
use crate::ledger::{Connection, Ledger, TransactionRequest};
use crate::models::{Asset, Session, TradeDirection};
use crate::notify::{Notification, NotificationSink};
use crate::registry::AssetRegistry;
use crate::route::{Route, RouteBuilder, TradeLeg};
use crate::settlement::{
    SettlementEncoder, SettlementOptions, SettlementParameters, SettlementPlanner,
};
use ethers::types::{Address, H256, U256};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Notify, watch};
use tracing::{info, warn};

pub const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(90);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapStage {
    Idle,
    Connecting,
    ResolvingAssets,
    SnapshottingPool,
    BuildingRoute,
    PlanningSettlement,
    Submitting,
    Confirming,
    Settled,
    Failed(ErrorKind),
}

#[derive(Debug, Clone)]
pub struct SwapRequest {
    pub token_in: Address,
    pub token_out: Address,
    pub fee_tier: FeeTier,
    /// Base units of the input token (exact input) or output token (exact output).
    pub amount: U256,
    pub direction: TradeDirection,
    /// Pay with the native currency instead of the wrapped `token_in`.
    pub native_input: bool,
    pub options: SettlementOptions,
}

#[derive(Debug, Clone, Serialize)]
pub struct SwapReceipt {
    pub tx_hash: H256,
    pub block_number: Option<u64>,
    pub gas_used: Option<U256>,
    pub input_amount: U256,
    pub quoted_output: U256,
    pub settlement: SettlementParameters,
    /// Recipient balances around the swap.
    pub balances_before: BalanceSnapshot,
    pub balances_after: BalanceSnapshot,
}

/// Recipient balances at one point in time. Each reading is `None` when it
/// could not be taken.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BalanceSnapshot {
    pub native: Option<U256>,
    pub token_in: Option<U256>,
    pub token_out: Option<U256>,
}

/// Clears the in-flight flag when the swap or connect ends, however it ends.
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct SwapOrchestrator {
    ledger: Arc<dyn Ledger>,
    registry: AssetRegistry,
    pools: PoolSnapshot,
    planner: SettlementPlanner,
    session: Arc<Session>,
    notifier: Arc<dyn NotificationSink>,
    stage: watch::Sender<SwapStage>,
    in_flight: AtomicBool,
    cancel_requested: AtomicBool,
    cancel: Notify,
    confirmation_timeout: Duration,
}

impl SwapOrchestrator {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        encoder: Arc<dyn SettlementEncoder>,
        factory: Address,
        session: Arc<Session>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        let (stage, _rx) = watch::channel(SwapStage::Idle);
        Self {
            registry: AssetRegistry::new(ledger.clone()),
            pools: PoolSnapshot::new(ledger.clone(), factory),
            planner: SettlementPlanner::new(encoder),
            ledger,
            session,
            notifier,
            stage,
            in_flight: AtomicBool::new(false),
            cancel_requested: AtomicBool::new(false),
            cancel: Notify::new(),
            confirmation_timeout: DEFAULT_CONFIRMATION_TIMEOUT,
        }
    }

    pub fn with_confirmation_timeout(mut self, timeout: Duration) -> Self {
        self.confirmation_timeout = timeout;
        self
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn stage(&self) -> SwapStage {
        *self.stage.borrow()
    }

    pub fn subscribe_stage(&self) -> watch::Receiver<SwapStage> {
        self.stage.subscribe()
    }

    /// Abort the in-flight swap at its current suspension point. A
    /// transaction that was already broadcast may still be mined.
    pub fn cancel(&self) {
        self.cancel_requested.store(true, Ordering::Release);
        self.cancel.notify_waiters();
    }

    /// Connect the wallet and record the account in the session. Failures
    /// are reported to the notification sink and leave the session as it was.
    /// Rejected with `OperationInProgress` while a swap owns the session.
    pub async fn connect(&self) -> Result<Connection> {
        let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
            let err = SwapError::OperationInProgress;
            warn!("[SWAP] connect rejected, a swap is in flight");
            self.report(&err);
            return Err(err);
        };
        self.session.set_loading(true);
        let result = self.ledger.connect().await;
        self.session.set_loading(false);
        match result {
            Ok(connection) => {
                self.session
                    .set_connected(connection.address, connection.chain_id);
                info!(address = ?connection.address, chain_id = connection.chain_id, "[SWAP] wallet connected");
                Ok(connection)
            }
            Err(e) => {
                self.report(&e);
                Err(e)
            }
        }
    }

    /// Run the pipeline once. Every failure is reported to the notification
    /// sink and leaves the stage at `Failed(kind)`, except
    /// `OperationInProgress`, which does not touch the running swap.
    pub async fn swap(&self, request: SwapRequest) -> Result<SwapReceipt> {
        let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
            let err = SwapError::OperationInProgress;
            warn!("[SWAP] rejected, another operation is in flight");
            self.report(&err);
            return Err(err);
        };
        self.cancel_requested.store(false, Ordering::Release);

        self.session.set_loading(true);
        let result = self.run(&request).await;
        self.session.set_loading(false);

        match result {
            Ok(receipt) => {
                self.advance(SwapStage::Settled);
                self.notifier.notify(Notification::success(format!(
                    "Swap settled in transaction {:?}",
                    receipt.tx_hash
                )));
                Ok(receipt)
            }
            Err(e) => {
                self.advance(SwapStage::Failed(e.kind()));
                self.report(&e);
                Err(e)
            }
        }
    }

    async fn run(&self, request: &SwapRequest) -> Result<SwapReceipt> {
        self.advance(SwapStage::Connecting);
        let connection = self.cancellable(self.ledger.connect()).await?;
        self.session
            .set_connected(connection.address, connection.chain_id);

        self.advance(SwapStage::ResolvingAssets);
        let token_in = self.cancellable(self.registry.resolve(request.token_in)).await?;
        let token_out = self.cancellable(self.registry.resolve(request.token_out)).await?;

        self.advance(SwapStage::SnapshottingPool);
        let pool = self
            .cancellable(self.pools.fetch(&token_in, &token_out, request.fee_tier))
            .await?;

        self.advance(SwapStage::BuildingRoute);
        let mut route = Route::new(vec![pool], token_in.clone(), token_out.clone())?;
        if request.native_input {
            route = route.with_native_input();
        }
        let leg = TradeLeg::direct(route, request.amount, request.direction)?;
        let trade = RouteBuilder::build(vec![leg])?;
        info!(
            input = %token_in.format_amount(trade.input_amount()),
            output = %token_out.format_amount(trade.output_amount()),
            token_in = %token_in.symbol,
            token_out = %token_out.symbol,
            "[SWAP] trade quoted"
        );

        self.advance(SwapStage::PlanningSettlement);
        let settlement = self.planner.compute_settlement(&trade, &request.options)?;
        let balances_before = self
            .balances_of(settlement.recipient, &token_in, &token_out)
            .await;

        self.advance(SwapStage::Submitting);
        let handle = self
            .cancellable(self.ledger.submit_transaction(TransactionRequest {
                from: connection.address,
                to: settlement.target_contract,
                data: settlement.calldata.clone(),
                value: settlement.native_value,
            }))
            .await?;

        self.advance(SwapStage::Confirming);
        let receipt = self
            .cancellable(
                self.ledger
                    .await_confirmation(handle, self.confirmation_timeout),
            )
            .await?;
        if !receipt.success {
            return Err(SwapError::TransactionReverted(receipt.tx_hash));
        }
        let balances_after = self
            .balances_of(settlement.recipient, &token_in, &token_out)
            .await;

        Ok(SwapReceipt {
            tx_hash: receipt.tx_hash,
            block_number: receipt.block_number,
            gas_used: receipt.gas_used,
            input_amount: trade.input_amount(),
            quoted_output: trade.output_amount(),
            settlement,
            balances_before,
            balances_after,
        })
    }

    async fn cancellable<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        let cancelled = self.cancel.notified();
        tokio::pin!(cancelled);
        // register before checking the flag so a concurrent cancel() is not lost
        cancelled.as_mut().enable();
        if self.cancel_requested.load(Ordering::Acquire) {
            return Err(SwapError::Cancelled);
        }
        tokio::select! {
            res = fut => res,
            _ = cancelled => Err(SwapError::Cancelled),
        }
    }

    async fn balances_of(&self, owner: Address, token_in: &Asset, token_out: &Asset) -> BalanceSnapshot {
        let (native, token_in_balance, token_out_balance) = futures::join!(
            self.ledger.get_balance(owner),
            self.ledger.token_balance(token_in.address, owner),
            self.ledger.token_balance(token_out.address, owner),
        );
        let snapshot = BalanceSnapshot {
            native: best_effort(native, owner, "native"),
            token_in: best_effort(token_in_balance, owner, &token_in.symbol),
            token_out: best_effort(token_out_balance, owner, &token_out.symbol),
        };
        info!(?owner, ?snapshot, "[SWAP] balances");
        snapshot
    }

    fn advance(&self, stage: SwapStage) {
        self.stage.send_replace(stage);
        info!(?stage, "[SWAP] stage");
    }

    fn report(&self, err: &SwapError) {
        warn!(kind = ?err.kind(), error = %err, "[SWAP] failed");
        self.notifier.notify(Notification::error(err.to_string()));
    }
}

fn best_effort(reading: Result<U256>, owner: Address, what: &str) -> Option<U256> {
    reading
        .inspect_err(|e| warn!(error = %e, ?owner, what, "[SWAP] balance read failed"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dex::fixtures::{self, factory, usdc, weth, weth_usdc_address, weth_usdc_raw};
    use crate::ledger::mock::{ConfirmBehavior, MockLedger, SubmitBehavior};
    use crate::models::SessionState;
    use crate::notify::NotificationKind;
    use crate::notify::testing::RecordingNotifier;
    use crate::settlement::SwapRouter02Encoder;

    struct Harness {
        orchestrator: Arc<SwapOrchestrator>,
        ledger: Arc<MockLedger>,
        notifier: Arc<RecordingNotifier>,
        session: Arc<Session>,
    }

    fn account() -> Address {
        Address::repeat_byte(0x5a)
    }

    fn router() -> Address {
        "0x68b3465833fb72A70ecDF485E0e4C7bD8665Fc45".parse().unwrap()
    }

    fn funded_ledger() -> MockLedger {
        MockLedger::new(account())
            .with_token(weth().address, 18, "WETH", "Wrapped Ether")
            .with_token(usdc().address, 6, "USDC", "USD Coin")
            .with_pool(weth_usdc_address(), weth_usdc_raw())
            .with_balance(account(), U256::exp10(19))
            .with_token_balance(usdc().address, account(), U256::from(5_000_000u64))
    }

    fn harness(ledger: MockLedger) -> Harness {
        let ledger = Arc::new(ledger);
        let notifier = Arc::new(RecordingNotifier::default());
        let session = Arc::new(Session::new());
        let orchestrator = SwapOrchestrator::new(
            ledger.clone(),
            Arc::new(SwapRouter02Encoder::new(router())),
            factory(),
            session.clone(),
            notifier.clone(),
        );
        Harness {
            orchestrator: Arc::new(orchestrator),
            ledger,
            notifier,
            session,
        }
    }

    fn one_ether_for_usdc() -> SwapRequest {
        SwapRequest {
            token_in: fixtures::weth().address,
            token_out: fixtures::usdc().address,
            fee_tier: FeeTier::Medium,
            amount: U256::exp10(18),
            direction: TradeDirection::ExactInput,
            native_input: true,
            options: SettlementOptions::with_recipient(account()),
        }
    }

    #[tokio::test]
    async fn settles_native_exact_input_swap() {
        let h = harness(funded_ledger());
        let receipt = h.orchestrator.swap(one_ether_for_usdc()).await.unwrap();

        assert_eq!(h.orchestrator.stage(), SwapStage::Settled);
        assert_eq!(receipt.input_amount, U256::exp10(18));
        assert!(receipt.quoted_output > U256::from(2_900_000_000u64));
        assert_eq!(
            receipt.balances_before,
            BalanceSnapshot {
                native: Some(U256::exp10(19)),
                token_in: Some(U256::zero()),
                token_out: Some(U256::from(5_000_000u64)),
            }
        );
        assert!(receipt.balances_after.token_out.is_some());

        let submitted = h.ledger.submitted();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].to, router());
        assert_eq!(submitted[0].from, account());
        assert_eq!(submitted[0].value, U256::exp10(18));
        assert!(!submitted[0].data.is_empty());

        let session = h.session.snapshot();
        assert_eq!(session.connected_address, Some(account()));
        assert_eq!(session.chain_id, Some(1));
        assert!(!session.loading);
        assert_eq!(h.notifier.last().unwrap().kind, NotificationKind::Success);
    }

    #[tokio::test]
    async fn connect_without_wallet_leaves_session_untouched() {
        let h = harness(MockLedger::without_wallet());
        let err = h.orchestrator.connect().await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::WalletUnavailable);
        assert_eq!(h.session.snapshot(), SessionState::default());
        let note = h.notifier.last().unwrap();
        assert_eq!(note.kind, NotificationKind::Error);
        assert_eq!(note.message, SwapError::WalletUnavailable.to_string());
    }

    #[tokio::test]
    async fn empty_account_list_is_reported() {
        let mut ledger = funded_ledger();
        ledger.accounts = Some(Vec::new());
        let h = harness(ledger);
        let err = h.orchestrator.swap(one_ether_for_usdc()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoAccountsAuthorized);
        assert_eq!(
            h.orchestrator.stage(),
            SwapStage::Failed(ErrorKind::NoAccountsAuthorized)
        );
    }

    #[tokio::test]
    async fn rejected_submission_fails_then_retry_is_accepted() {
        let h = harness(funded_ledger());
        h.ledger.set_submit(SubmitBehavior::Reject);

        let err = h.orchestrator.swap(one_ether_for_usdc()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SubmissionRejected);
        assert_eq!(
            h.orchestrator.stage(),
            SwapStage::Failed(ErrorKind::SubmissionRejected)
        );
        assert!(!h.session.snapshot().loading);

        h.ledger.set_submit(SubmitBehavior::Accept);
        h.orchestrator.swap(one_ether_for_usdc()).await.unwrap();
        assert_eq!(h.orchestrator.stage(), SwapStage::Settled);
    }

    #[tokio::test]
    async fn underfunded_submission_is_insufficient_funds() {
        let h = harness(funded_ledger());
        h.ledger.set_submit(SubmitBehavior::Underfunded);
        let err = h.orchestrator.swap(one_ether_for_usdc()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
    }

    #[tokio::test]
    async fn confirmation_timeout_is_not_a_rejection() {
        let h = harness(funded_ledger());
        h.ledger.set_confirm(ConfirmBehavior::Timeout);

        let err = h.orchestrator.swap(one_ether_for_usdc()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfirmationTimeout);
        assert_eq!(
            h.orchestrator.stage(),
            SwapStage::Failed(ErrorKind::ConfirmationTimeout)
        );
        // the transaction did go out
        assert_eq!(h.ledger.submitted().len(), 1);
    }

    #[tokio::test]
    async fn reverted_receipt_fails_the_swap() {
        let h = harness(funded_ledger());
        h.ledger.set_confirm(ConfirmBehavior::Reverted);
        let err = h.orchestrator.swap(one_ether_for_usdc()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransactionReverted);
    }

    #[tokio::test]
    async fn missing_pool_fails_before_submission() {
        let ledger = MockLedger::new(account())
            .with_token(weth().address, 18, "WETH", "Wrapped Ether")
            .with_token(usdc().address, 6, "USDC", "USD Coin");
        let h = harness(ledger);
        let err = h.orchestrator.swap(one_ether_for_usdc()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PoolNotFound);
        assert!(h.ledger.submitted().is_empty());
    }

    #[tokio::test]
    async fn missing_recipient_fails_while_planning() {
        let h = harness(funded_ledger());
        let mut request = one_ether_for_usdc();
        request.options = SettlementOptions::default();
        let err = h.orchestrator.swap(request).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidSettlementOptions);
        assert!(h.ledger.submitted().is_empty());
    }

    #[tokio::test]
    async fn second_swap_is_rejected_while_first_is_confirming() {
        let h = harness(funded_ledger());
        h.ledger.set_confirm(ConfirmBehavior::Gated);
        let mut stages = h.orchestrator.subscribe_stage();

        let first = {
            let orchestrator = h.orchestrator.clone();
            tokio::spawn(async move { orchestrator.swap(one_ether_for_usdc()).await })
        };
        stages
            .wait_for(|s| *s == SwapStage::Confirming)
            .await
            .unwrap();

        let err = h.orchestrator.swap(one_ether_for_usdc()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OperationInProgress);
        assert_eq!(h.orchestrator.stage(), SwapStage::Confirming);
        assert_eq!(h.ledger.submitted().len(), 1);
        let notes = h.notifier.all();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].message, SwapError::OperationInProgress.to_string());

        h.ledger.release();
        first.await.unwrap().unwrap();
        assert_eq!(h.orchestrator.stage(), SwapStage::Settled);
    }

    #[tokio::test]
    async fn cancel_aborts_confirmation_wait() {
        let h = harness(funded_ledger());
        h.ledger.set_confirm(ConfirmBehavior::Gated);
        let mut stages = h.orchestrator.subscribe_stage();

        let first = {
            let orchestrator = h.orchestrator.clone();
            tokio::spawn(async move { orchestrator.swap(one_ether_for_usdc()).await })
        };
        stages
            .wait_for(|s| *s == SwapStage::Confirming)
            .await
            .unwrap();
        h.orchestrator.cancel();

        let err = first.await.unwrap().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert_eq!(h.orchestrator.stage(), SwapStage::Failed(ErrorKind::Cancelled));

        h.ledger.set_confirm(ConfirmBehavior::Mined);
        h.orchestrator.swap(one_ether_for_usdc()).await.unwrap();
    }

    #[tokio::test]
    async fn connect_during_swap_leaves_session_alone() {
        let h = harness(funded_ledger());
        h.ledger.set_confirm(ConfirmBehavior::Gated);
        let mut stages = h.orchestrator.subscribe_stage();

        let first = {
            let orchestrator = h.orchestrator.clone();
            tokio::spawn(async move { orchestrator.swap(one_ether_for_usdc()).await })
        };
        stages
            .wait_for(|s| *s == SwapStage::Confirming)
            .await
            .unwrap();
        let before = h.session.snapshot();
        assert!(before.loading);

        let err = h.orchestrator.connect().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OperationInProgress);
        assert_eq!(h.session.snapshot(), before);
        assert_eq!(h.orchestrator.stage(), SwapStage::Confirming);

        h.ledger.release();
        first.await.unwrap().unwrap();
        assert!(!h.session.snapshot().loading);
        h.orchestrator.connect().await.unwrap();
    }

    #[tokio::test]
    async fn unreadable_balances_do_not_fail_the_swap() {
        let mut ledger = funded_ledger();
        ledger.balances_unreadable = true;
        let h = harness(ledger);
        let receipt = h.orchestrator.swap(one_ether_for_usdc()).await.unwrap();
        assert_eq!(receipt.balances_before, BalanceSnapshot::default());
        assert_eq!(receipt.balances_after, BalanceSnapshot::default());
        assert_eq!(h.orchestrator.stage(), SwapStage::Settled);
    }
}
