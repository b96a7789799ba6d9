//! Certificate storage trait.

use std::future::Future;

use certanchor_types::{Certificate, CertificateId, LedgerReference, LedgerStatus};
use serde::Serialize;

use crate::StoreError;

/// The ledger fields of a certificate, written as one unit.
///
/// All four fields replace the stored values, so a reader never sees a new
/// status next to a stale reference.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LedgerStateUpdate {
    #[serde(rename = "ledger_status")]
    pub status: LedgerStatus,
    #[serde(rename = "ledger_reference")]
    pub reference: Option<LedgerReference>,
    pub block_number: Option<u64>,
    #[serde(rename = "ledger_error")]
    pub error: Option<String>,
}

impl LedgerStateUpdate {
    pub fn apply_to(&self, certificate: &mut Certificate) {
        certificate.ledger_status = self.status;
        certificate.ledger_reference = self.reference.clone();
        certificate.block_number = self.block_number;
        certificate.ledger_error = self.error.clone();
    }
}

/// Result of a conditional ledger-state write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConditionalUpdate {
    /// The precondition held; carries the record as written.
    Applied(Certificate),
    /// The stored status was outside the allowed set; carries the record
    /// as currently stored.
    Rejected(Certificate),
}

impl ConditionalUpdate {
    pub fn certificate(&self) -> &Certificate {
        match self {
            Self::Applied(c) | Self::Rejected(c) => c,
        }
    }

    pub fn into_certificate(self) -> Certificate {
        match self {
            Self::Applied(c) | Self::Rejected(c) => c,
        }
    }

    pub fn was_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }
}

/// Trait for certificate storage operations.
pub trait CertificateStore: Send + Sync {
    fn insert_certificate(
        &self,
        certificate: &Certificate,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn get_certificate(
        &self,
        id: &CertificateId,
    ) -> impl Future<Output = Result<Certificate, StoreError>> + Send;

    /// Newest first, by creation time.
    fn list_certificates(
        &self,
        limit: usize,
        offset: usize,
    ) -> impl Future<Output = Result<Vec<Certificate>, StoreError>> + Send;

    fn all_certificates(&self) -> impl Future<Output = Result<Vec<Certificate>, StoreError>> + Send;

    /// Atomically write `update` if the stored status is in `allowed_from`.
    fn update_ledger_state(
        &self,
        id: &CertificateId,
        allowed_from: &[LedgerStatus],
        update: &LedgerStateUpdate,
    ) -> impl Future<Output = Result<ConditionalUpdate, StoreError>> + Send;

    /// Bump the verification counter and return the new value.
    ///
    /// Concurrent bumps carry no ordering guarantee.
    fn increment_verification_count(
        &self,
        id: &CertificateId,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;
}
