//! Nullable store: thread-safe in-memory certificate storage for testing.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use certanchor_store::{CertificateStore, ConditionalUpdate, LedgerStateUpdate, StoreError};
use certanchor_types::{Certificate, CertificateId, LedgerStatus};

/// An in-memory certificate store for testing.
/// Thread-safe for use with tokio's multi-threaded runtime.
///
/// Conditional updates check and write under one lock, matching the
/// atomicity a real backend provides.
pub struct NullStore {
    certificates: Mutex<HashMap<CertificateId, Certificate>>,
    /// Every applied ledger status, per certificate, in write order.
    history: Mutex<HashMap<CertificateId, Vec<LedgerStatus>>>,
    failing_updates: Mutex<HashSet<CertificateId>>,
    unreachable: AtomicBool,
    update_calls: AtomicUsize,
}

impl NullStore {
    pub fn new() -> Self {
        Self {
            certificates: Mutex::new(HashMap::new()),
            history: Mutex::new(HashMap::new()),
            failing_updates: Mutex::new(HashSet::new()),
            unreachable: AtomicBool::new(false),
            update_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_certificates(certificates: impl IntoIterator<Item = Certificate>) -> Self {
        let store = Self::new();
        for certificate in certificates {
            store.put(certificate);
        }
        store
    }

    /// Insert or replace a record directly, bypassing the status rules.
    pub fn put(&self, certificate: Certificate) {
        self.certificates
            .lock()
            .unwrap()
            .insert(certificate.id.clone(), certificate);
    }

    /// Read a record directly. Panics if absent.
    pub fn get(&self, id: &CertificateId) -> Certificate {
        self.certificates.lock().unwrap()[id].clone()
    }

    /// Applied ledger statuses for `id`, oldest first.
    pub fn history(&self, id: &CertificateId) -> Vec<LedgerStatus> {
        self.history
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .unwrap_or_default()
    }

    /// Make every ledger-state update for `id` fail with a backend error.
    pub fn fail_updates_for(&self, id: &CertificateId) {
        self.failing_updates.lock().unwrap().insert(id.clone());
    }

    /// Make every operation fail as if the backend were down.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Number of `update_ledger_state` calls, applied or not.
    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.certificates.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_reachable(&self) -> Result<(), StoreError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(StoreError::Unreachable("null store offline".into()));
        }
        Ok(())
    }

    fn sorted(&self) -> Vec<Certificate> {
        let mut all: Vec<Certificate> = self.certificates.lock().unwrap().values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        all
    }
}

impl Default for NullStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CertificateStore for NullStore {
    async fn insert_certificate(&self, certificate: &Certificate) -> Result<(), StoreError> {
        self.check_reachable()?;
        let mut certificates = self.certificates.lock().unwrap();
        if certificates.contains_key(&certificate.id) {
            return Err(StoreError::Duplicate(certificate.id.to_string()));
        }
        certificates.insert(certificate.id.clone(), certificate.clone());
        Ok(())
    }

    async fn get_certificate(&self, id: &CertificateId) -> Result<Certificate, StoreError> {
        self.check_reachable()?;
        self.certificates
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn list_certificates(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Certificate>, StoreError> {
        self.check_reachable()?;
        Ok(self.sorted().into_iter().skip(offset).take(limit).collect())
    }

    async fn all_certificates(&self) -> Result<Vec<Certificate>, StoreError> {
        self.check_reachable()?;
        Ok(self.sorted())
    }

    async fn update_ledger_state(
        &self,
        id: &CertificateId,
        allowed_from: &[LedgerStatus],
        update: &LedgerStateUpdate,
    ) -> Result<ConditionalUpdate, StoreError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        self.check_reachable()?;
        if self.failing_updates.lock().unwrap().contains(id) {
            return Err(StoreError::Backend(format!("scripted update failure for {id}")));
        }

        let mut certificates = self.certificates.lock().unwrap();
        let certificate = certificates
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        if !allowed_from.contains(&certificate.ledger_status) {
            return Ok(ConditionalUpdate::Rejected(certificate.clone()));
        }
        update.apply_to(certificate);
        self.history
            .lock()
            .unwrap()
            .entry(id.clone())
            .or_default()
            .push(update.status);
        Ok(ConditionalUpdate::Applied(certificate.clone()))
    }

    async fn increment_verification_count(&self, id: &CertificateId) -> Result<u64, StoreError> {
        self.check_reachable()?;
        let mut certificates = self.certificates.lock().unwrap();
        let certificate = certificates
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        certificate.verification_count += 1;
        Ok(certificate.verification_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use certanchor_types::{OrganizationId, Timestamp};

    fn cert(id: &str) -> Certificate {
        Certificate::new(
            CertificateId::new(id),
            "Ada Lovelace",
            "ada@example.org",
            "Analytical Engines",
            OrganizationId::new("org-1"),
            Timestamp::new(1_700_000_000),
        )
    }

    fn update(status: LedgerStatus) -> LedgerStateUpdate {
        LedgerStateUpdate {
            status,
            reference: None,
            block_number: None,
            error: None,
        }
    }

    #[tokio::test]
    async fn insert_rejects_duplicates() {
        let store = NullStore::new();
        store.insert_certificate(&cert("a")).await.unwrap();
        assert!(matches!(
            store.insert_certificate(&cert("a")).await,
            Err(StoreError::Duplicate(_))
        ));
    }

    #[tokio::test]
    async fn conditional_update_respects_precondition() {
        let store = NullStore::with_certificates([cert("a")]);
        let id = CertificateId::new("a");

        let applied = store
            .update_ledger_state(&id, &[LedgerStatus::Unanchored], &update(LedgerStatus::Pending))
            .await
            .unwrap();
        assert!(applied.was_applied());

        let rejected = store
            .update_ledger_state(&id, &[LedgerStatus::Unanchored], &update(LedgerStatus::Demo))
            .await
            .unwrap();
        assert!(!rejected.was_applied());
        assert_eq!(rejected.certificate().ledger_status, LedgerStatus::Pending);
        assert_eq!(store.history(&id), vec![LedgerStatus::Pending]);
        assert_eq!(store.update_calls(), 2);
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let store = NullStore::new();
        let result = store
            .update_ledger_state(
                &CertificateId::new("missing"),
                &[LedgerStatus::Unanchored],
                &update(LedgerStatus::Pending),
            )
            .await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn counter_increments() {
        let store = NullStore::with_certificates([cert("a")]);
        let id = CertificateId::new("a");
        assert_eq!(store.increment_verification_count(&id).await.unwrap(), 1);
        assert_eq!(store.increment_verification_count(&id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn unreachable_fails_everything() {
        let store = NullStore::with_certificates([cert("a")]);
        store.set_unreachable(true);
        assert!(matches!(
            store.get_certificate(&CertificateId::new("a")).await,
            Err(StoreError::Unreachable(_))
        ));
    }
}
