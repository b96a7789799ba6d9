//! Certificate verification: stored record, hit counter and on-chain proof.

use std::sync::Arc;

use serde::Serialize;

use certanchor_ledger::CertificateLedger;
use certanchor_store::CertificateStore;
use certanchor_types::{Certificate, CertificateId, OnChainRecord};

use crate::reconciler::StatusReconciler;
use crate::IssuanceError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VerificationReport {
    pub certificate: Certificate,
    /// Counter value after this verification.
    pub verification_count: u64,
    /// On-chain record, for confirmed certificates whose ledger read
    /// succeeded.
    pub onchain: Option<OnChainRecord>,
}

impl VerificationReport {
    /// Whether the ledger holds a record for this certificate.
    pub fn is_anchored(&self) -> bool {
        self.onchain.as_ref().is_some_and(|record| record.exists)
    }
}

pub struct Verifier<L, S> {
    ledger: Arc<L>,
    reconciler: StatusReconciler<S>,
}

impl<L: CertificateLedger, S: CertificateStore> Verifier<L, S> {
    pub fn new(ledger: Arc<L>, reconciler: StatusReconciler<S>) -> Self {
        Self { ledger, reconciler }
    }

    pub async fn verify(&self, id: &CertificateId) -> Result<VerificationReport, IssuanceError> {
        let certificate = self.reconciler.snapshot(id).await?;

        let verification_count = match self.reconciler.record_verification_hit(id).await {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(certificate_id = %id, error = %e, "could not count verification");
                certificate.verification_count
            }
        };

        let onchain = if certificate.is_confirmed() {
            match self.ledger.read_verification(id).await {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!(certificate_id = %id, error = %e, "on-chain verification failed");
                    None
                }
            }
        } else {
            None
        };

        Ok(VerificationReport {
            certificate,
            verification_count,
            onchain,
        })
    }
}
