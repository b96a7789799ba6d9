//! Single-certificate issuance against the ledger.

use std::sync::Arc;

use tokio::time::Instant;

use certanchor_ledger::{CertificateLedger, LedgerError};
use certanchor_store::CertificateStore;
use certanchor_types::{
    Certificate, ItemFailure, ItemResult, LedgerReceipt, LedgerReference, LedgerWriteRequest, TxHash,
};

use crate::failure;
use crate::metrics::IssuanceMetrics;
use crate::reconciler::StatusReconciler;

/// Result of one submission attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IssuanceOutcome {
    Confirmed(LedgerReceipt),
    Failed(ItemFailure),
}

impl IssuanceOutcome {
    pub fn failure(&self) -> Option<&ItemFailure> {
        match self {
            Self::Failed(failure) => Some(failure),
            Self::Confirmed(_) => None,
        }
    }

    pub fn into_result(self) -> ItemResult {
        match self {
            Self::Confirmed(receipt) => ItemResult::Confirmed { receipt },
            Self::Failed(failure) => ItemResult::Failed(failure),
        }
    }
}

/// Submits one certificate and records the outcome. Never retries.
pub struct IssuanceExecutor<L, S> {
    ledger: Arc<L>,
    reconciler: StatusReconciler<S>,
    metrics: Option<Arc<IssuanceMetrics>>,
}

impl<L, S> Clone for IssuanceExecutor<L, S> {
    fn clone(&self) -> Self {
        Self {
            ledger: Arc::clone(&self.ledger),
            reconciler: self.reconciler.clone(),
            metrics: self.metrics.clone(),
        }
    }
}

impl<L: CertificateLedger, S: CertificateStore> IssuanceExecutor<L, S> {
    pub fn new(ledger: Arc<L>, reconciler: StatusReconciler<S>) -> Self {
        Self {
            ledger,
            reconciler,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<IssuanceMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub async fn issue_one(&self, certificate: &Certificate) -> IssuanceOutcome {
        let id = &certificate.id;
        if certificate.is_confirmed() {
            return IssuanceOutcome::Failed(failure::invalid_state(id, certificate.ledger_status));
        }

        match self.reconciler.mark_pending(id).await {
            Ok(reconciled) if !reconciled.was_applied() => {
                // Confirmed by someone else since the caller read it.
                let stored = reconciled.certificate().ledger_status;
                return IssuanceOutcome::Failed(failure::invalid_state(id, stored));
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(certificate_id = %id, error = %e, "could not mark certificate pending");
                return IssuanceOutcome::Failed(failure::from_issuance(&e));
            }
        }

        let request = LedgerWriteRequest::from_certificate(certificate);
        if let Some(metrics) = &self.metrics {
            metrics.submissions.inc();
        }
        let started = Instant::now();

        match self.ledger.submit_write(&request).await {
            Ok(receipt) => {
                if let Some(metrics) = &self.metrics {
                    metrics
                        .confirmation_latency_ms
                        .observe(started.elapsed().as_millis() as f64);
                }
                self.record_confirmed(certificate, receipt).await
            }
            Err(e) => self.record_failed(certificate, &e).await,
        }
    }

    /// Look up a write that timed out before resubmitting it. `None` while
    /// the transaction is still unmined; otherwise the outcome is recorded
    /// as `issue_one` would record it.
    pub async fn recheck(&self, certificate: &Certificate, tx_hash: TxHash) -> Option<IssuanceOutcome> {
        match self.ledger.find_write(&tx_hash).await {
            Ok(None) => {
                tracing::debug!(certificate_id = %certificate.id, %tx_hash, "earlier write not mined");
                None
            }
            Ok(Some(receipt)) => Some(self.record_confirmed(certificate, receipt).await),
            Err(e) => Some(self.record_failed(certificate, &e).await),
        }
    }

    async fn record_confirmed(&self, certificate: &Certificate, receipt: LedgerReceipt) -> IssuanceOutcome {
        let id = &certificate.id;
        if let Some(metrics) = &self.metrics {
            metrics.confirmed.inc();
        }
        if let Err(e) = self.reconciler.mark_confirmed(id, &receipt).await {
            tracing::error!(
                certificate_id = %id,
                tx_hash = %receipt.tx_hash,
                block_number = receipt.block_number,
                error = %e,
                "write confirmed on the ledger but the store update failed"
            );
        }
        IssuanceOutcome::Confirmed(receipt)
    }

    async fn record_failed(&self, certificate: &Certificate, error: &LedgerError) -> IssuanceOutcome {
        let id = &certificate.id;
        if let Some(metrics) = &self.metrics {
            metrics.failed.inc();
        }
        let item_failure = failure::from_ledger(error);
        tracing::warn!(
            certificate_id = %id,
            reason = ?item_failure.reason,
            retryable = item_failure.is_retryable(),
            code = ?item_failure.code,
            error = %error,
            "certificate write failed"
        );
        if let Err(store_err) = self
            .reconciler
            .mark_failed(id, &item_failure, broadcast_reference(error))
            .await
        {
            tracing::error!(certificate_id = %id, error = %store_err, "could not record failure");
        }
        IssuanceOutcome::Failed(item_failure)
    }
}

/// The transaction a failed write refers to, if it was broadcast.
fn broadcast_reference(error: &LedgerError) -> Option<LedgerReference> {
    match error {
        LedgerError::ConfirmationTimeout { tx_hash, .. } | LedgerError::Reverted { tx_hash } => {
            Some(LedgerReference::Transaction(*tx_hash))
        }
        _ => None,
    }
}
