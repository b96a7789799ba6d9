//! Aggregate counts over the certificate store.

use serde::{Deserialize, Serialize};

use certanchor_types::{Certificate, LedgerStatus, Timestamp};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardMetrics {
    pub total: u64,
    pub confirmed: u64,
    /// Not yet anchored: `unanchored` or `pending`.
    pub pending: u64,
    pub failed: u64,
    pub demo: u64,
    /// Created in the same calendar month (UTC) as `now`.
    pub this_month: u64,
    /// Sum of every certificate's verification counter.
    pub verifications: u64,
}

impl DashboardMetrics {
    pub fn from_certificates<'a>(
        certificates: impl IntoIterator<Item = &'a Certificate>,
        now: Timestamp,
    ) -> Self {
        let current_month = now.year_month();
        let mut metrics = Self::default();
        for certificate in certificates {
            metrics.total += 1;
            match certificate.ledger_status {
                LedgerStatus::Confirmed => metrics.confirmed += 1,
                LedgerStatus::Unanchored | LedgerStatus::Pending => metrics.pending += 1,
                LedgerStatus::Failed => metrics.failed += 1,
                LedgerStatus::Demo => metrics.demo += 1,
            }
            if certificate.created_at.year_month() == current_month {
                metrics.this_month += 1;
            }
            metrics.verifications += certificate.verification_count;
        }
        metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use certanchor_types::{CertificateId, OrganizationId};

    fn cert(id: &str, status: LedgerStatus, created_at: u64, verifications: u64) -> Certificate {
        let mut certificate = Certificate::new(
            CertificateId::new(id),
            "Grace Hopper",
            "grace@example.org",
            "Compilers",
            OrganizationId::new("org-1"),
            Timestamp::new(created_at),
        );
        certificate.created_at = Timestamp::new(created_at);
        certificate.ledger_status = status;
        certificate.verification_count = verifications;
        certificate
    }

    #[test]
    fn counts_by_status_and_month() {
        // 2024-03-15 and 2024-02-10
        let march = 1_710_460_800;
        let february = 1_707_523_200;
        let certificates = [
            cert("a", LedgerStatus::Confirmed, march, 4),
            cert("b", LedgerStatus::Pending, march, 0),
            cert("c", LedgerStatus::Unanchored, february, 1),
            cert("d", LedgerStatus::Failed, february, 0),
            cert("e", LedgerStatus::Demo, march, 2),
        ];
        let metrics = DashboardMetrics::from_certificates(&certificates, Timestamp::new(march + 3600));
        assert_eq!(
            metrics,
            DashboardMetrics {
                total: 5,
                confirmed: 1,
                pending: 2,
                failed: 1,
                demo: 1,
                this_month: 3,
                verifications: 7,
            }
        );
    }

    #[test]
    fn empty_store() {
        let metrics = DashboardMetrics::from_certificates(&[], Timestamp::new(0));
        assert_eq!(metrics, DashboardMetrics::default());
    }
}
