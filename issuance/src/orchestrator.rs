//! Batch orchestration: groups, pacing, retries and cancellation.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use certanchor_ledger::{CertificateLedger, LedgerHealth};
use certanchor_store::CertificateStore;
use certanchor_types::{
    BatchMode, BatchResult, Certificate, CertificateId, FailureReason, ItemFailure, ItemOutcome,
    ItemResult,
};

use crate::config::BatchConfig;
use crate::dashboard::DashboardMetrics;
use crate::demo;
use crate::executor::{IssuanceExecutor, IssuanceOutcome};
use crate::failure;
use crate::metrics::IssuanceMetrics;
use crate::reconciler::StatusReconciler;
use crate::IssuanceError;

/// Cooperative cancellation signal for a running batch.
#[derive(Clone)]
struct CancelSignal(watch::Receiver<bool>);

impl CancelSignal {
    fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once cancellation is requested. Never resolves if the
    /// sender is dropped without cancelling.
    async fn cancelled(&mut self) {
        if self.0.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Cancels a spawned batch from another task.
#[derive(Clone)]
pub struct BatchCanceller(Arc<watch::Sender<bool>>);

impl BatchCanceller {
    /// Ask the batch to stop. The submission in flight completes; ids not
    /// yet attempted are reported as cancelled.
    pub fn cancel(&self) {
        self.0.send_replace(true);
    }
}

/// Handle to a batch running on the tokio runtime.
pub struct BatchHandle {
    cancel: BatchCanceller,
    task: JoinHandle<Result<BatchResult, IssuanceError>>,
}

impl BatchHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn canceller(&self) -> BatchCanceller {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub async fn join(self) -> Result<BatchResult, IssuanceError> {
        self.task
            .await
            .map_err(|e| IssuanceError::TaskFailed(e.to_string()))?
    }
}

/// Runs certificate batches in demo or production mode.
pub struct Orchestrator<L, S> {
    ledger: Arc<L>,
    reconciler: StatusReconciler<S>,
    executor: IssuanceExecutor<L, S>,
    config: BatchConfig,
    metrics: Option<Arc<IssuanceMetrics>>,
}

impl<L: CertificateLedger, S: CertificateStore> Orchestrator<L, S> {
    pub fn new(ledger: Arc<L>, store: Arc<S>, config: BatchConfig) -> Result<Self, IssuanceError> {
        config.validate()?;
        let reconciler = StatusReconciler::new(store);
        let executor = IssuanceExecutor::new(Arc::clone(&ledger), reconciler.clone());
        Ok(Self {
            ledger,
            reconciler,
            executor,
            config,
            metrics: None,
        })
    }

    pub fn with_metrics(mut self, metrics: Arc<IssuanceMetrics>) -> Self {
        self.executor = self.executor.with_metrics(Arc::clone(&metrics));
        self.metrics = Some(metrics);
        self
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    pub fn executor(&self) -> &IssuanceExecutor<L, S> {
        &self.executor
    }

    pub fn reconciler(&self) -> &StatusReconciler<S> {
        &self.reconciler
    }

    pub fn status(&self) -> LedgerHealth {
        self.ledger.status()
    }

    pub async fn dashboard(&self) -> Result<DashboardMetrics, IssuanceError> {
        self.reconciler.dashboard().await
    }

    /// Fetch one certificate and submit it once, without pacing or retries.
    pub async fn issue_one(&self, id: &CertificateId) -> Result<IssuanceOutcome, IssuanceError> {
        let certificate = self.reconciler.snapshot(id).await?;
        self.ensure_ready().await?;
        Ok(self.executor.issue_one(&certificate).await)
    }

    pub async fn run_batch(
        &self,
        ids: &[CertificateId],
        mode: BatchMode,
    ) -> Result<BatchResult, IssuanceError> {
        let (_cancel, signal) = watch::channel(false);
        self.run_cancellable(ids, mode, CancelSignal(signal)).await
    }

    async fn run_cancellable(
        &self,
        ids: &[CertificateId],
        mode: BatchMode,
        signal: CancelSignal,
    ) -> Result<BatchResult, IssuanceError> {
        tracing::info!(%mode, total = ids.len(), "starting batch");
        let items = match mode {
            BatchMode::Demo => {
                demo::run_demo(
                    &self.reconciler,
                    ids,
                    self.config.batch_size,
                    self.metrics.as_deref(),
                )
                .await
            }
            BatchMode::Production => {
                self.ensure_ready().await?;
                self.run_production(ids, signal).await
            }
        };
        let result = BatchResult::from_items(mode, items);
        tracing::info!(
            %mode,
            total = result.total,
            confirmed = result.confirmed,
            failed = result.failed,
            "batch finished"
        );
        Ok(result)
    }

    /// One initialization attempt if the ledger is not ready yet.
    async fn ensure_ready(&self) -> Result<(), IssuanceError> {
        if self.ledger.is_ready() || self.ledger.initialize().await {
            return Ok(());
        }
        tracing::error!("ledger client unavailable, production batch aborted");
        Err(IssuanceError::ServiceUnavailable(
            "ledger client could not be initialized".into(),
        ))
    }

    async fn run_production(&self, ids: &[CertificateId], mut signal: CancelSignal) -> Vec<ItemOutcome> {
        let mut outcomes = Vec::with_capacity(ids.len());
        let mut pacer = Pacer::default();

        for (group, chunk) in ids.chunks(self.config.batch_size).enumerate() {
            tracing::info!(group, size = chunk.len(), "processing group");
            for id in chunk {
                let outcome = if signal.is_cancelled() {
                    cancelled(id, group, 0)
                } else {
                    self.issue_with_retry(id, group, &mut pacer, &mut signal).await
                };
                outcomes.push(outcome);
            }
        }
        outcomes
    }

    async fn issue_with_retry(
        &self,
        id: &CertificateId,
        group: usize,
        pacer: &mut Pacer,
        signal: &mut CancelSignal,
    ) -> ItemOutcome {
        let certificate: Certificate = match self.reconciler.snapshot(id).await {
            Ok(certificate) => certificate,
            Err(e) => {
                tracing::warn!(certificate_id = %id, error = %e, "cannot load certificate");
                return outcome(id, group, 0, ItemResult::Failed(failure::from_issuance(&e)));
            }
        };
        if certificate.is_confirmed() {
            let failure = failure::invalid_state(id, certificate.ledger_status);
            return outcome(id, group, 0, ItemResult::Failed(failure));
        }

        let mut last_failure: Option<ItemFailure> = None;
        let mut attempts = 0;
        while attempts < self.config.max_attempts {
            if let Some(tx_hash) = last_failure.as_ref().and_then(ItemFailure::unconfirmed_tx) {
                match self.executor.recheck(&certificate, tx_hash).await {
                    None => {}
                    Some(IssuanceOutcome::Confirmed(receipt)) => {
                        return outcome(id, group, attempts, ItemResult::Confirmed { receipt });
                    }
                    Some(IssuanceOutcome::Failed(failure)) if failure.is_retryable() => {
                        last_failure = Some(failure);
                    }
                    Some(IssuanceOutcome::Failed(failure)) => {
                        return outcome(id, group, attempts, ItemResult::Failed(failure));
                    }
                }
            }

            let wait = match &last_failure {
                Some(f) if f.reason == FailureReason::Unreachable => {
                    self.config.unreachable_backoff(attempts)
                }
                _ => self.config.pacing_delay(),
            };
            if !pacer.wait(wait, signal).await {
                return cancelled(id, group, attempts);
            }

            attempts += 1;
            tracing::debug!(certificate_id = %id, attempt = attempts, "submitting certificate");
            match self.executor.issue_one(&certificate).await {
                IssuanceOutcome::Confirmed(receipt) => {
                    return outcome(id, group, attempts, ItemResult::Confirmed { receipt });
                }
                IssuanceOutcome::Failed(failure) if failure.is_retryable() => {
                    if attempts < self.config.max_attempts {
                        tracing::warn!(
                            certificate_id = %id,
                            attempt = attempts,
                            reason = ?failure.reason,
                            "retryable failure, resubmitting"
                        );
                    }
                    last_failure = Some(failure);
                }
                IssuanceOutcome::Failed(failure) => {
                    return outcome(id, group, attempts, ItemResult::Failed(failure));
                }
            }
        }

        match last_failure {
            Some(failure) => outcome(id, group, attempts, ItemResult::Failed(failure)),
            // max_attempts is validated non-zero
            None => cancelled(id, group, attempts),
        }
    }
}

impl<L, S> Orchestrator<L, S>
where
    L: CertificateLedger + 'static,
    S: CertificateStore + 'static,
{
    /// Run a batch as a background task that can be awaited or cancelled.
    pub fn spawn_batch(self: &Arc<Self>, ids: Vec<CertificateId>, mode: BatchMode) -> BatchHandle {
        let (cancel, signal) = watch::channel(false);
        let orchestrator = Arc::clone(self);
        let task = tokio::spawn(async move {
            orchestrator
                .run_cancellable(&ids, mode, CancelSignal(signal))
                .await
        });
        BatchHandle {
            cancel: BatchCanceller(Arc::new(cancel)),
            task,
        }
    }
}

/// Enforces the delay between consecutive submissions of one batch.
#[derive(Default)]
struct Pacer {
    submitted: bool,
}

impl Pacer {
    /// Wait `delay` unless this is the batch's first submission. Returns
    /// `false` if the batch was cancelled first.
    async fn wait(&mut self, delay: std::time::Duration, signal: &mut CancelSignal) -> bool {
        if signal.is_cancelled() {
            return false;
        }
        if self.submitted {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = signal.cancelled() => return false,
            }
        }
        self.submitted = true;
        true
    }
}

fn outcome(id: &CertificateId, group: usize, attempts: u32, result: ItemResult) -> ItemOutcome {
    ItemOutcome {
        certificate_id: id.clone(),
        group,
        attempts,
        result,
    }
}

fn cancelled(id: &CertificateId, group: usize, attempts: u32) -> ItemOutcome {
    outcome(id, group, attempts, ItemResult::Failed(failure::cancelled()))
}
