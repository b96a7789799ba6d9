//! Simulated issuance. Holds no ledger handle, so it cannot write to one.

use sha2::{Digest, Sha256};

use certanchor_store::CertificateStore;
use certanchor_types::{CertificateId, ItemOutcome, ItemResult, LedgerReference};

use crate::failure;
use crate::metrics::IssuanceMetrics;
use crate::reconciler::{Reconciled, StatusReconciler};

/// Deterministic demo reference for a certificate: `demo:<sha256(id)>`.
pub fn demo_reference(id: &CertificateId) -> LedgerReference {
    let digest = Sha256::digest(id.as_str().as_bytes());
    LedgerReference::Demo(hex::encode(digest))
}

/// Mark each certificate `demo`. Already-confirmed records keep their state
/// and count as confirmed.
pub(crate) async fn run_demo<S: CertificateStore>(
    reconciler: &StatusReconciler<S>,
    ids: &[CertificateId],
    batch_size: usize,
    metrics: Option<&IssuanceMetrics>,
) -> Vec<ItemOutcome> {
    let mut outcomes = Vec::with_capacity(ids.len());
    for (index, id) in ids.iter().enumerate() {
        let result = mark_one(reconciler, id).await;
        if matches!(result, ItemResult::Demo { .. }) {
            if let Some(metrics) = metrics {
                metrics.demo.inc();
            }
        }
        outcomes.push(ItemOutcome {
            certificate_id: id.clone(),
            group: index / batch_size.max(1),
            attempts: 0,
            result,
        });
    }
    tracing::info!(total = ids.len(), "demo batch complete");
    outcomes
}

async fn mark_one<S: CertificateStore>(reconciler: &StatusReconciler<S>, id: &CertificateId) -> ItemResult {
    let reference = demo_reference(id);
    match reconciler.mark_demo(id, reference.clone()).await {
        Ok(Reconciled::Applied(_)) => {
            tracing::debug!(certificate_id = %id, %reference, "certificate marked demo");
            ItemResult::Demo { reference }
        }
        Ok(Reconciled::Unchanged(stored)) if stored.is_confirmed() => ItemResult::AlreadyConfirmed {
            reference: stored.ledger_reference,
            block_number: stored.block_number,
        },
        Ok(Reconciled::Unchanged(stored)) => {
            ItemResult::Failed(failure::invalid_state(id, stored.ledger_status))
        }
        Err(e) => {
            tracing::warn!(certificate_id = %id, error = %e, "demo marking failed");
            ItemResult::Failed(failure::from_issuance(&e))
        }
    }
}
