//! Writes ledger outcomes back to the certificate store.
//!
//! Every write is a conditional update whose precondition is the set of
//! stored statuses allowed to move to the new status. A write the
//! precedence rules forbid (anything after `confirmed`, `demo` over a real
//! attempt) leaves the record untouched and reports [`Reconciled::Unchanged`].

use std::sync::Arc;

use certanchor_store::{CertificateStore, ConditionalUpdate, LedgerStateUpdate};
use certanchor_types::{
    Certificate, CertificateId, ItemFailure, LedgerReceipt, LedgerReference, LedgerStatus, Timestamp,
};

use crate::dashboard::DashboardMetrics;
use crate::IssuanceError;

/// Result of [`StatusReconciler::apply_outcome`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reconciled {
    /// The update was written; carries the new record.
    Applied(Certificate),
    /// The transition was not allowed; carries the stored record.
    Unchanged(Certificate),
}

impl Reconciled {
    pub fn certificate(&self) -> &Certificate {
        match self {
            Self::Applied(c) | Self::Unchanged(c) => c,
        }
    }

    pub fn was_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }
}

pub struct StatusReconciler<S> {
    store: Arc<S>,
}

impl<S> Clone for StatusReconciler<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: CertificateStore> StatusReconciler<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn apply_outcome(
        &self,
        id: &CertificateId,
        update: &LedgerStateUpdate,
    ) -> Result<Reconciled, IssuanceError> {
        let allowed = LedgerStatus::sources_for(update.status);
        match self.store.update_ledger_state(id, &allowed, update).await? {
            ConditionalUpdate::Applied(certificate) => {
                tracing::debug!(certificate_id = %id, status = %update.status, "ledger state updated");
                Ok(Reconciled::Applied(certificate))
            }
            ConditionalUpdate::Rejected(certificate) => {
                tracing::debug!(
                    certificate_id = %id,
                    stored = %certificate.ledger_status,
                    requested = %update.status,
                    "ledger state transition ignored"
                );
                Ok(Reconciled::Unchanged(certificate))
            }
        }
    }

    pub async fn mark_pending(&self, id: &CertificateId) -> Result<Reconciled, IssuanceError> {
        let update = LedgerStateUpdate {
            status: LedgerStatus::Pending,
            reference: None,
            block_number: None,
            error: None,
        };
        self.apply_outcome(id, &update).await
    }

    pub async fn mark_confirmed(
        &self,
        id: &CertificateId,
        receipt: &LedgerReceipt,
    ) -> Result<Reconciled, IssuanceError> {
        let update = LedgerStateUpdate {
            status: LedgerStatus::Confirmed,
            reference: Some(LedgerReference::Transaction(receipt.tx_hash)),
            block_number: Some(receipt.block_number),
            error: None,
        };
        self.apply_outcome(id, &update).await
    }

    /// `reference` is the submitted transaction, when one was broadcast.
    pub async fn mark_failed(
        &self,
        id: &CertificateId,
        failure: &ItemFailure,
        reference: Option<LedgerReference>,
    ) -> Result<Reconciled, IssuanceError> {
        let update = LedgerStateUpdate {
            status: LedgerStatus::Failed,
            reference,
            block_number: None,
            error: Some(failure.message.clone()),
        };
        self.apply_outcome(id, &update).await
    }

    pub async fn mark_demo(
        &self,
        id: &CertificateId,
        reference: LedgerReference,
    ) -> Result<Reconciled, IssuanceError> {
        let update = LedgerStateUpdate {
            status: LedgerStatus::Demo,
            reference: Some(reference),
            block_number: None,
            error: None,
        };
        self.apply_outcome(id, &update).await
    }

    /// Bump the verification counter. Concurrent hits may land in any order.
    pub async fn record_verification_hit(&self, id: &CertificateId) -> Result<u64, IssuanceError> {
        Ok(self.store.increment_verification_count(id).await?)
    }

    pub async fn snapshot(&self, id: &CertificateId) -> Result<Certificate, IssuanceError> {
        Ok(self.store.get_certificate(id).await?)
    }

    pub async fn dashboard(&self) -> Result<DashboardMetrics, IssuanceError> {
        let certificates = self.store.all_certificates().await?;
        Ok(DashboardMetrics::from_certificates(&certificates, Timestamp::now()))
    }
}
