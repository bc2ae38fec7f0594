//! Scan-to-submit transfer flow
//!
//! One flow at a time moves through
//! `Idle -> Parsing -> Validating -> AwaitingConfirmation -> Submitting -> Completed -> Idle`.
//! A parse failure returns straight to `Idle`; a submission failure passes
//! through `Failed` back to `AwaitingConfirmation` so the user can retry.
//!
//! Each flow gets a fresh [`FlowId`] and cancellation token. Results that
//! arrive after the flow was cancelled or replaced are compared against the
//! current flow id and phase, and dropped when they no longer match.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use qrpay_uri::{parse_uri, PaymentIntent};
use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    AccountRef, BalanceSource, BalanceValidator, FlowError, FlowResult, SubmissionReceipt,
    TransferRequest, TransferSubmitter, ValidationResult,
};

/// Shown when a scanned request names no recipient
pub const MISSING_RECIPIENT_MESSAGE: &str = "Payment request has no recipient";

/// Recorded when a submission was abandoned before the wallet answered
pub const SUBMISSION_UNKNOWN_MESSAGE: &str = "Submission outcome unknown";

/// Recorded when a balance check was abandoned before it finished
pub const CHECK_ABANDONED_MESSAGE: &str = "Balance check abandoned";

/// Identifies one scan-to-submit flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct FlowId(u64);

impl FlowId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where the current flow stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowPhase {
    Idle,
    Parsing,
    Validating,
    AwaitingConfirmation,
    Submitting,
    Completed,
    Failed,
}

impl FlowPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowPhase::Idle => "idle",
            FlowPhase::Parsing => "parsing",
            FlowPhase::Validating => "validating",
            FlowPhase::AwaitingConfirmation => "awaiting_confirmation",
            FlowPhase::Submitting => "submitting",
            FlowPhase::Completed => "completed",
            FlowPhase::Failed => "failed",
        }
    }
}

impl fmt::Display for FlowPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a confirmation view needs to render the current flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlowSnapshot {
    pub flow_id: Option<FlowId>,
    pub phase: FlowPhase,
    pub intent: Option<PaymentIntent>,
    pub validation: ValidationResult,
    /// Last submission failure, cleared when the user retries
    pub error_message: Option<String>,
}

impl FlowSnapshot {
    pub fn idle() -> Self {
        Self {
            flow_id: None,
            phase: FlowPhase::Idle,
            intent: None,
            validation: ValidationResult::idle(),
            error_message: None,
        }
    }

    /// Whether the confirm action should be enabled
    pub fn can_confirm(&self) -> bool {
        self.phase == FlowPhase::AwaitingConfirmation && self.validation.can_proceed()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl Default for FlowSnapshot {
    fn default() -> Self {
        Self::idle()
    }
}

/// Drives one payment at a time from a scanned string to a submitted transfer
pub struct TransferOrchestrator<B, S> {
    account: AccountRef,
    validator: BalanceValidator<B>,
    submitter: S,
    flow: watch::Sender<FlowSnapshot>,
    next_flow: AtomicU64,
    cancel: Mutex<CancellationToken>,
}

impl<B, S> TransferOrchestrator<B, S>
where
    B: BalanceSource,
    S: TransferSubmitter,
{
    pub fn new(account: AccountRef, balance_source: B, submitter: S) -> Self {
        let (flow, _) = watch::channel(FlowSnapshot::idle());
        Self {
            account,
            validator: BalanceValidator::new(balance_source),
            submitter,
            flow,
            next_flow: AtomicU64::new(0),
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    pub fn account(&self) -> &AccountRef {
        &self.account
    }

    pub fn submitter(&self) -> &S {
        &self.submitter
    }

    pub fn balance_source(&self) -> &B {
        self.validator.source()
    }

    pub fn snapshot(&self) -> FlowSnapshot {
        self.flow.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<FlowSnapshot> {
        self.flow.subscribe()
    }

    /// Start a flow from a scanned string
    ///
    /// Rejected with [`FlowError::Busy`] unless the orchestrator is idle. A
    /// string that is not a payment request leaves the orchestrator idle and
    /// returns [`FlowError::Parse`]. Otherwise the flow ends up awaiting
    /// confirmation, whatever the balance check concluded; inspect
    /// [`snapshot`](Self::snapshot) for the outcome.
    pub async fn handle_scan(&self, scanned: &str) -> FlowResult<FlowId> {
        let mut busy = None;
        self.flow.send_if_modified(|flow| {
            if flow.phase == FlowPhase::Idle {
                flow.phase = FlowPhase::Parsing;
                true
            } else {
                busy = Some(flow.phase);
                false
            }
        });
        if let Some(phase) = busy {
            debug!(%phase, "ignoring scan while a transfer is in progress");
            return Err(FlowError::Busy(phase));
        }

        let intent = match parse_uri(scanned) {
            Ok(intent) => intent,
            Err(e) => {
                warn!(error = %e, "scanned code is not a payment request");
                self.flow.send_if_modified(|flow| {
                    if flow.phase == FlowPhase::Parsing {
                        *flow = FlowSnapshot::idle();
                        true
                    } else {
                        false
                    }
                });
                return Err(e.into());
            }
        };

        let flow_id = FlowId(self.next_flow.fetch_add(1, Ordering::SeqCst) + 1);
        info!(flow = %flow_id, request = %intent.summary(), "payment request scanned");

        let mut started = None;
        self.flow.send_if_modified(|flow| {
            if flow.phase != FlowPhase::Parsing {
                return false;
            }
            flow.flow_id = Some(flow_id);
            flow.phase = FlowPhase::Validating;
            flow.intent = Some(intent.clone());
            flow.validation = ValidationResult::idle();
            flow.error_message = None;
            started = Some(self.renew_token());
            true
        });
        let token = started.ok_or(FlowError::Cancelled)?;

        self.run_validation(flow_id, &intent, &token).await?;
        Ok(flow_id)
    }

    /// Re-run the balance check for the payment awaiting confirmation
    pub async fn revalidate(&self) -> FlowResult<ValidationResult> {
        let mut claimed = None;
        self.flow.send_if_modified(|flow| {
            if flow.phase != FlowPhase::AwaitingConfirmation {
                return false;
            }
            match (flow.flow_id, flow.intent.clone()) {
                (Some(flow_id), Some(intent)) => {
                    flow.phase = FlowPhase::Validating;
                    flow.error_message = None;
                    claimed = Some((flow_id, intent, self.current_token()));
                    true
                }
                _ => false,
            }
        });
        let (flow_id, intent, token) =
            claimed.ok_or(FlowError::NotReady("no payment awaiting confirmation"))?;

        debug!(flow = %flow_id, "re-checking balance");
        self.run_validation(flow_id, &intent, &token).await?;
        Ok(self.snapshot().validation)
    }

    /// Submit the payment awaiting confirmation
    ///
    /// Refused without calling the submitter unless the balance check passed.
    /// A failed submission is not retried; the flow returns to awaiting
    /// confirmation with the error recorded, and calling `confirm` again is
    /// the retry. Dropping the future before the wallet answers does the
    /// same with [`SUBMISSION_UNKNOWN_MESSAGE`].
    pub async fn confirm(&self) -> FlowResult<SubmissionReceipt> {
        let mut refusal = None;
        let mut claimed = None;
        self.flow.send_if_modified(|flow| {
            if flow.phase != FlowPhase::AwaitingConfirmation {
                refusal = Some("no payment awaiting confirmation");
                return false;
            }
            if !flow.validation.can_proceed() {
                refusal = Some("balance check has not passed");
                return false;
            }
            match (flow.flow_id, flow.intent.as_ref()) {
                (Some(flow_id), Some(intent)) => {
                    claimed = Some((flow_id, TransferRequest::from_validated(intent)));
                    flow.phase = FlowPhase::Submitting;
                    flow.error_message = None;
                    true
                }
                _ => {
                    refusal = Some("no payment awaiting confirmation");
                    false
                }
            }
        });
        if let Some(reason) = refusal {
            debug!(reason, "confirm refused");
            return Err(FlowError::NotReady(reason));
        }
        let (flow_id, request) =
            claimed.ok_or(FlowError::NotReady("no payment awaiting confirmation"))?;

        info!(
            flow = %flow_id,
            recipient = request.recipient_address(),
            amount = request.amount(),
            chain_id = request.chain_id(),
            "submitting transfer"
        );

        let _abandoned = FlowGuard::new(&self.flow, flow_id, FlowPhase::Submitting);
        match self.submitter.submit(&request).await {
            Ok(receipt) => {
                info!(flow = %flow_id, tx_hash = %receipt.transaction_hash, "transfer submitted");
                self.transition(flow_id, FlowPhase::Submitting, |flow| {
                    flow.phase = FlowPhase::Completed;
                });
                self.transition(flow_id, FlowPhase::Completed, |flow| {
                    *flow = FlowSnapshot::idle();
                });
                self.validator.reset();
                Ok(receipt)
            }
            Err(e) => {
                warn!(flow = %flow_id, error = %e, "transfer submission failed");
                let message = e.to_string();
                self.transition(flow_id, FlowPhase::Submitting, |flow| {
                    flow.phase = FlowPhase::Failed;
                    flow.error_message = Some(message);
                });
                self.transition(flow_id, FlowPhase::Failed, |flow| {
                    flow.phase = FlowPhase::AwaitingConfirmation;
                });
                Err(e.into())
            }
        }
    }

    /// Abandon the current flow
    ///
    /// A submission already handed to the wallet cannot be withdrawn, so
    /// cancelling while submitting returns [`FlowError::Busy`]. Cancelling an
    /// idle orchestrator is a no-op.
    pub fn cancel(&self) -> FlowResult<()> {
        let mut refusal = None;
        let mut abandoned = None;
        self.flow.send_if_modified(|flow| match flow.phase {
            FlowPhase::Idle => false,
            FlowPhase::Submitting | FlowPhase::Completed | FlowPhase::Failed => {
                refusal = Some(flow.phase);
                false
            }
            FlowPhase::Parsing | FlowPhase::Validating | FlowPhase::AwaitingConfirmation => {
                // the token must belong to the flow being reset, not one started after
                abandoned = Some((flow.flow_id, self.current_token()));
                self.validator.reset();
                *flow = FlowSnapshot::idle();
                true
            }
        });
        if let Some(phase) = refusal {
            return Err(FlowError::Busy(phase));
        }

        if let Some((flow_id, token)) = abandoned {
            token.cancel();
            match flow_id {
                Some(flow_id) => info!(flow = %flow_id, "transfer flow cancelled"),
                None => info!("scan cancelled before parsing finished"),
            }
        }
        Ok(())
    }

    async fn run_validation(
        &self,
        flow_id: FlowId,
        intent: &PaymentIntent,
        token: &CancellationToken,
    ) -> FlowResult<()> {
        if !intent.has_recipient() {
            warn!(flow = %flow_id, "payment request has no recipient");
            let rejected = ValidationResult::rejected(MISSING_RECIPIENT_MESSAGE);
            self.settle(flow_id, rejected)?;
            return Ok(());
        }

        let check = self.validator.validate(intent.display_amount, &self.account);
        self.transition(flow_id, FlowPhase::Validating, |flow| {
            flow.validation = ValidationResult::checking();
        });
        let _abandoned = FlowGuard::new(&self.flow, flow_id, FlowPhase::Validating);

        let outcome = tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!(flow = %flow_id, "balance check abandoned");
                return Err(FlowError::Cancelled);
            }
            outcome = check => outcome,
        };

        let validation = match outcome {
            Ok(result) => result,
            Err(e) => ValidationResult::failed(e.to_string()),
        };
        debug!(
            flow = %flow_id,
            sufficient = ?validation.sufficient_funds,
            "balance check finished"
        );
        self.settle(flow_id, validation)
    }

    /// Record a validation outcome and wait for confirmation
    fn settle(&self, flow_id: FlowId, validation: ValidationResult) -> FlowResult<()> {
        let applied = self.transition(flow_id, FlowPhase::Validating, |flow| {
            flow.validation = validation;
            flow.phase = FlowPhase::AwaitingConfirmation;
        });
        if applied {
            Ok(())
        } else {
            debug!(flow = %flow_id, "discarding result for a superseded flow");
            Err(FlowError::Cancelled)
        }
    }

    /// Apply `update` only while `flow_id` is current and in `expected`
    fn transition<F>(&self, flow_id: FlowId, expected: FlowPhase, update: F) -> bool
    where
        F: FnOnce(&mut FlowSnapshot),
    {
        self.flow.send_if_modified(|flow| {
            if flow.flow_id == Some(flow_id) && flow.phase == expected {
                update(flow);
                true
            } else {
                false
            }
        })
    }

    fn renew_token(&self) -> CancellationToken {
        let mut current = self.cancel.lock().unwrap_or_else(PoisonError::into_inner);
        *current = CancellationToken::new();
        current.clone()
    }

    fn current_token(&self) -> CancellationToken {
        self.cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Settles a flow left mid-operation when the future driving it is dropped
///
/// A no-op once the flow has moved on, so the normal paths need not disarm it.
struct FlowGuard<'a> {
    flow: &'a watch::Sender<FlowSnapshot>,
    flow_id: FlowId,
    phase: FlowPhase,
}

impl<'a> FlowGuard<'a> {
    fn new(flow: &'a watch::Sender<FlowSnapshot>, flow_id: FlowId, phase: FlowPhase) -> Self {
        Self {
            flow,
            flow_id,
            phase,
        }
    }
}

impl Drop for FlowGuard<'_> {
    fn drop(&mut self) {
        let (flow_id, phase) = (self.flow_id, self.phase);
        let settled = self.flow.send_if_modified(|flow| {
            if flow.flow_id != Some(flow_id) || flow.phase != phase {
                return false;
            }
            match phase {
                FlowPhase::Submitting => {
                    flow.error_message = Some(SUBMISSION_UNKNOWN_MESSAGE.to_string());
                }
                _ => flow.validation = ValidationResult::failed(CHECK_ABANDONED_MESSAGE),
            }
            flow.phase = FlowPhase::AwaitingConfirmation;
            true
        });
        if settled {
            warn!(flow = %flow_id, %phase, "flow abandoned mid-operation");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{FailingBalanceSource, MemoryBalanceSource, MemorySubmitter};
    use crate::{SourceError, SubmissionError, INSUFFICIENT_BALANCE_MESSAGE};
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use std::collections::VecDeque;
    use std::str::FromStr;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Notify;
    use tokio::time::timeout;

    const ACCOUNT: &str = "0x5DFE0A60d3c27976eb3F1530F8a1CfA4bE2BAD30";
    const FIVE_USDC: &str = "ethereum:0xAAA@8453/transfer?address=0xBBB&uint256=5000000";

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn orchestrator(
        balance: &str,
    ) -> TransferOrchestrator<MemoryBalanceSource, MemorySubmitter> {
        let account = AccountRef::new(ACCOUNT);
        let source = MemoryBalanceSource::with_balance(&account, dec(balance));
        TransferOrchestrator::new(account, source, MemorySubmitter::new())
    }

    /// Holds every balance lookup until released
    struct GatedBalanceSource {
        balance: Decimal,
        gate: Notify,
        calls: AtomicUsize,
    }

    impl GatedBalanceSource {
        fn new(balance: &str) -> Self {
            Self {
                balance: dec(balance),
                gate: Notify::new(),
                calls: AtomicUsize::new(0),
            }
        }

        fn release(&self) {
            self.gate.notify_one();
        }
    }

    #[async_trait]
    impl BalanceSource for GatedBalanceSource {
        async fn get_balance(&self, _account: &AccountRef) -> Result<Decimal, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.gate.notified().await;
            Ok(self.balance)
        }
    }

    /// Replays queued lookups in order
    #[derive(Default)]
    struct ScriptedBalanceSource {
        script: Mutex<VecDeque<Result<Decimal, SourceError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedBalanceSource {
        fn then(self, result: Result<Decimal, SourceError>) -> Self {
            self.script.lock().unwrap().push_back(result);
            self
        }
    }

    #[async_trait]
    impl BalanceSource for ScriptedBalanceSource {
        async fn get_balance(&self, _account: &AccountRef) -> Result<Decimal, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(SourceError::InvalidResponse("script exhausted".into())))
        }
    }

    /// Never answers
    struct HangingSubmitter;

    #[async_trait]
    impl TransferSubmitter for HangingSubmitter {
        async fn submit(
            &self,
            _request: &TransferRequest,
        ) -> Result<SubmissionReceipt, SubmissionError> {
            std::future::pending().await
        }
    }

    type Gated = TransferOrchestrator<Arc<GatedBalanceSource>, Arc<MemorySubmitter>>;

    fn gated(balance: &str) -> (Arc<Gated>, Arc<GatedBalanceSource>, Arc<MemorySubmitter>) {
        let source = Arc::new(GatedBalanceSource::new(balance));
        let submitter = Arc::new(MemorySubmitter::new());
        let orchestrator = Arc::new(TransferOrchestrator::new(
            AccountRef::new(ACCOUNT),
            source.clone(),
            submitter.clone(),
        ));
        (orchestrator, source, submitter)
    }

    async fn wait_until_checking(orchestrator: &Gated) {
        let mut updates = orchestrator.subscribe();
        updates
            .wait_for(|flow| flow.validation.is_checking)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_happy_path() {
        let orchestrator = orchestrator("10");

        let flow_id = orchestrator.handle_scan(FIVE_USDC).await.unwrap();
        let snapshot = orchestrator.snapshot();
        assert_eq!(snapshot.flow_id, Some(flow_id));
        assert_eq!(snapshot.phase, FlowPhase::AwaitingConfirmation);
        assert_eq!(snapshot.intent.as_ref().unwrap().display_amount, dec("5"));
        assert!(snapshot.can_confirm());

        let receipt = orchestrator.confirm().await.unwrap();
        assert!(receipt.transaction_hash.starts_with("0x"));

        let submitted = orchestrator.submitter().submitted();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].recipient_address(), "0xBBB");
        assert_eq!(submitted[0].amount(), 5_000_000);
        assert_eq!(submitted[0].chain_id(), 8453);
        assert_eq!(submitted[0].token_address(), "0xAAA");

        assert_eq!(orchestrator.snapshot(), FlowSnapshot::idle());
    }

    #[tokio::test]
    async fn test_unparseable_scan_stays_idle() {
        let orchestrator = orchestrator("10");

        let err = orchestrator.handle_scan("garbage").await.unwrap_err();
        assert!(matches!(err, FlowError::Parse(_)));
        assert_eq!(orchestrator.snapshot(), FlowSnapshot::idle());

        // the next scan is accepted
        orchestrator.handle_scan(FIVE_USDC).await.unwrap();
        assert_eq!(orchestrator.snapshot().phase, FlowPhase::AwaitingConfirmation);
    }

    #[tokio::test]
    async fn test_insufficient_balance_blocks_confirm() {
        let orchestrator = orchestrator("1");

        orchestrator.handle_scan(FIVE_USDC).await.unwrap();
        let snapshot = orchestrator.snapshot();
        assert_eq!(snapshot.phase, FlowPhase::AwaitingConfirmation);
        assert_eq!(snapshot.validation.sufficient_funds, Some(false));
        assert_eq!(
            snapshot.validation.error_message.as_deref(),
            Some(INSUFFICIENT_BALANCE_MESSAGE)
        );
        assert!(!snapshot.can_confirm());

        let err = orchestrator.confirm().await.unwrap_err();
        assert!(matches!(err, FlowError::NotReady(_)));
        assert_eq!(orchestrator.submitter().submission_count(), 0);
    }

    #[tokio::test]
    async fn test_exact_balance_is_enough() {
        let orchestrator = orchestrator("5");
        orchestrator.handle_scan(FIVE_USDC).await.unwrap();
        assert!(orchestrator.snapshot().can_confirm());
    }

    #[tokio::test]
    async fn test_confirm_while_checking_is_refused() {
        let (orchestrator, source, submitter) = gated("10");

        let scan = tokio::spawn({
            let orchestrator = orchestrator.clone();
            async move { orchestrator.handle_scan(FIVE_USDC).await }
        });
        wait_until_checking(&orchestrator).await;

        assert_eq!(orchestrator.snapshot().phase, FlowPhase::Validating);
        let err = orchestrator.confirm().await.unwrap_err();
        assert!(matches!(err, FlowError::NotReady(_)));
        assert_eq!(submitter.submission_count(), 0);

        source.release();
        scan.await.unwrap().unwrap();
        assert!(orchestrator.snapshot().can_confirm());
    }

    #[tokio::test]
    async fn test_scan_while_busy_is_rejected() {
        let (orchestrator, source, _) = gated("10");

        let scan = tokio::spawn({
            let orchestrator = orchestrator.clone();
            async move { orchestrator.handle_scan(FIVE_USDC).await }
        });
        wait_until_checking(&orchestrator).await;

        let err = orchestrator
            .handle_scan("ethereum:0xAAA@8453/transfer?address=0xCCC&uint256=1")
            .await
            .unwrap_err();
        assert_eq!(err, FlowError::Busy(FlowPhase::Validating));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        source.release();
        scan.await.unwrap().unwrap();
        let snapshot = orchestrator.snapshot();
        assert_eq!(snapshot.intent.unwrap().recipient_address, "0xBBB");
    }

    #[tokio::test]
    async fn test_cancel_during_validation_discards_result() {
        let (orchestrator, source, _) = gated("10");

        let scan = tokio::spawn({
            let orchestrator = orchestrator.clone();
            async move { orchestrator.handle_scan(FIVE_USDC).await }
        });
        wait_until_checking(&orchestrator).await;

        orchestrator.cancel().unwrap();
        assert_eq!(orchestrator.snapshot(), FlowSnapshot::idle());
        assert_eq!(scan.await.unwrap().unwrap_err(), FlowError::Cancelled);

        // a late balance reply must not resurrect the abandoned flow
        source.release();
        tokio::task::yield_now().await;
        assert_eq!(orchestrator.snapshot(), FlowSnapshot::idle());
    }

    #[tokio::test]
    async fn test_new_flow_after_cancel_gets_fresh_state() {
        let (orchestrator, source, _) = gated("10");

        let first = tokio::spawn({
            let orchestrator = orchestrator.clone();
            async move { orchestrator.handle_scan(FIVE_USDC).await }
        });
        wait_until_checking(&orchestrator).await;
        orchestrator.cancel().unwrap();
        assert_eq!(first.await.unwrap().unwrap_err(), FlowError::Cancelled);

        let second = tokio::spawn({
            let orchestrator = orchestrator.clone();
            async move {
                orchestrator
                    .handle_scan("ethereum:0xAAA@8453/transfer?address=0xCCC&uint256=2000000")
                    .await
            }
        });
        wait_until_checking(&orchestrator).await;
        source.release();
        let second_id = second.await.unwrap().unwrap();

        let snapshot = orchestrator.snapshot();
        assert_eq!(snapshot.flow_id, Some(second_id));
        assert_eq!(snapshot.intent.unwrap().recipient_address, "0xCCC");
        assert!(snapshot.validation.can_proceed());
    }

    #[tokio::test]
    async fn test_balance_failure_then_revalidate() {
        let account = AccountRef::new(ACCOUNT);
        let source = ScriptedBalanceSource::default()
            .then(Err(SourceError::Network("rpc timeout".into())))
            .then(Ok(dec("10")));
        let orchestrator = TransferOrchestrator::new(account, source, MemorySubmitter::new());

        orchestrator.handle_scan(FIVE_USDC).await.unwrap();
        let snapshot = orchestrator.snapshot();
        assert_eq!(snapshot.phase, FlowPhase::AwaitingConfirmation);
        assert!(!snapshot.validation.is_checking);
        assert_eq!(snapshot.validation.sufficient_funds, None);
        assert!(snapshot
            .validation
            .error_message
            .unwrap()
            .contains("rpc timeout"));
        assert!(matches!(
            orchestrator.confirm().await.unwrap_err(),
            FlowError::NotReady(_)
        ));

        let validation = orchestrator.revalidate().await.unwrap();
        assert!(validation.can_proceed());
        assert_eq!(orchestrator.balance_source().calls.load(Ordering::SeqCst), 2);
        orchestrator.confirm().await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_recipient_is_rejected_without_lookup() {
        let account = AccountRef::new(ACCOUNT);
        let orchestrator = TransferOrchestrator::new(
            account,
            ScriptedBalanceSource::default(),
            MemorySubmitter::new(),
        );

        orchestrator
            .handle_scan("ethereum:0xAAA@8453/transfer?uint256=5000000")
            .await
            .unwrap();
        let snapshot = orchestrator.snapshot();
        assert_eq!(snapshot.phase, FlowPhase::AwaitingConfirmation);
        assert_eq!(snapshot.validation.sufficient_funds, Some(false));
        assert_eq!(
            snapshot.validation.error_message.as_deref(),
            Some(MISSING_RECIPIENT_MESSAGE)
        );
        assert_eq!(orchestrator.balance_source().calls.load(Ordering::SeqCst), 0);
        assert!(orchestrator.confirm().await.is_err());
    }

    #[tokio::test]
    async fn test_zero_amount_needs_no_balance() {
        let account = AccountRef::new(ACCOUNT);
        let orchestrator = TransferOrchestrator::new(
            account,
            FailingBalanceSource::network("unreachable"),
            MemorySubmitter::new(),
        );

        orchestrator
            .handle_scan("ethereum:0xAAA@8453/transfer?address=0xBBB")
            .await
            .unwrap();
        assert!(orchestrator.snapshot().can_confirm());
    }

    #[tokio::test]
    async fn test_submission_failure_keeps_intent_for_retry() {
        let orchestrator = orchestrator("10");
        orchestrator
            .submitter()
            .fail_next(SubmissionError::Network("connection reset".into()));

        orchestrator.handle_scan(FIVE_USDC).await.unwrap();
        let err = orchestrator.confirm().await.unwrap_err();
        assert_eq!(
            err,
            FlowError::Submission(SubmissionError::Network("connection reset".into()))
        );

        let snapshot = orchestrator.snapshot();
        assert_eq!(snapshot.phase, FlowPhase::AwaitingConfirmation);
        assert!(snapshot.error_message.unwrap().contains("connection reset"));
        assert!(snapshot.intent.is_some());
        assert_eq!(orchestrator.submitter().submission_count(), 1);

        orchestrator.confirm().await.unwrap();
        assert_eq!(orchestrator.submitter().submission_count(), 2);
        assert_eq!(orchestrator.snapshot().phase, FlowPhase::Idle);
    }

    #[tokio::test]
    async fn test_dropped_confirm_returns_to_confirmation() {
        let account = AccountRef::new(ACCOUNT);
        let source = MemoryBalanceSource::with_balance(&account, dec("10"));
        let orchestrator = TransferOrchestrator::new(account, source, HangingSubmitter);

        orchestrator.handle_scan(FIVE_USDC).await.unwrap();
        let confirm = timeout(Duration::from_millis(10), orchestrator.confirm()).await;
        assert!(confirm.is_err());

        let snapshot = orchestrator.snapshot();
        assert_eq!(snapshot.phase, FlowPhase::AwaitingConfirmation);
        assert_eq!(
            snapshot.error_message.as_deref(),
            Some(SUBMISSION_UNKNOWN_MESSAGE)
        );
        assert!(snapshot.intent.is_some());

        // the user can walk away and start over
        orchestrator.cancel().unwrap();
        assert_eq!(orchestrator.snapshot(), FlowSnapshot::idle());
        orchestrator.handle_scan(FIVE_USDC).await.unwrap();
        assert_eq!(orchestrator.snapshot().phase, FlowPhase::AwaitingConfirmation);
    }

    #[tokio::test]
    async fn test_dropped_scan_stops_checking() {
        let (orchestrator, source, _) = gated("10");

        let scan = timeout(Duration::from_millis(10), orchestrator.handle_scan(FIVE_USDC)).await;
        assert!(scan.is_err());

        let snapshot = orchestrator.snapshot();
        assert_eq!(snapshot.phase, FlowPhase::AwaitingConfirmation);
        assert!(!snapshot.validation.is_checking);
        assert_eq!(snapshot.validation.sufficient_funds, None);
        assert_eq!(
            snapshot.validation.error_message.as_deref(),
            Some(CHECK_ABANDONED_MESSAGE)
        );
        assert!(!snapshot.can_confirm());

        source.release();
        let validation = orchestrator.revalidate().await.unwrap();
        assert!(validation.can_proceed());
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancel_racing_scan_never_strands_flow() {
        let orchestrator = Arc::new(orchestrator("10"));

        for _ in 0..200 {
            let canceller = tokio::spawn({
                let orchestrator = orchestrator.clone();
                async move {
                    let _ = orchestrator.cancel();
                }
            });
            let outcome = orchestrator.handle_scan(FIVE_USDC).await;
            canceller.await.unwrap();

            let snapshot = orchestrator.snapshot();
            assert!(!snapshot.validation.is_checking);
            match outcome {
                Ok(_) => assert!(matches!(
                    snapshot.phase,
                    FlowPhase::AwaitingConfirmation | FlowPhase::Idle
                )),
                Err(FlowError::Cancelled) => assert_eq!(snapshot, FlowSnapshot::idle()),
                Err(other) => panic!("unexpected scan outcome: {other}"),
            }
            orchestrator.cancel().unwrap();
        }
    }

    #[tokio::test]
    async fn test_cancel_awaiting_confirmation() {
        let orchestrator = orchestrator("10");
        orchestrator.cancel().unwrap();

        orchestrator.handle_scan(FIVE_USDC).await.unwrap();
        orchestrator.cancel().unwrap();
        assert_eq!(orchestrator.snapshot(), FlowSnapshot::idle());
        assert!(matches!(
            orchestrator.confirm().await.unwrap_err(),
            FlowError::NotReady(_)
        ));
        assert_eq!(orchestrator.submitter().submission_count(), 0);
    }

    #[tokio::test]
    async fn test_revalidate_requires_pending_payment() {
        let orchestrator = orchestrator("10");
        assert!(matches!(
            orchestrator.revalidate().await.unwrap_err(),
            FlowError::NotReady(_)
        ));
    }

    #[tokio::test]
    async fn test_flow_ids_increase() {
        let orchestrator = orchestrator("10");
        let first = orchestrator.handle_scan(FIVE_USDC).await.unwrap();
        orchestrator.cancel().unwrap();
        let second = orchestrator.handle_scan(FIVE_USDC).await.unwrap();
        assert!(second > first);
        assert_eq!(first.to_string(), "#1");
    }

    #[test]
    fn test_snapshot_json() {
        let json = FlowSnapshot::idle().to_json().unwrap();
        assert!(json.contains("\"phase\":\"idle\""));
    }
}
