//! Certificate creation: request validation and id generation.
//!
//! Ids look like `TECH-2024-04217` for certificates meant for the ledger and
//! `DEMO-2024-04217` otherwise. The serial is random, so a collision with an
//! existing row is possible; the store rejects it as a duplicate and a new
//! serial is drawn.

use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Serialize};

use certanchor_store::{CertificateStore, StoreError};
use certanchor_types::{Certificate, CertificateId, LedgerAddress, OrganizationId, Timestamp};

use crate::IssuanceError;

/// Issuing organization when a request names none.
pub const DEFAULT_ORGANIZATION_ID: &str = "b1891ae6-15ef-4ce9-b48f-3442fd6d321f";

/// Serials drawn before a create gives up on collisions.
const ID_ATTEMPTS: usize = 5;

/// A request to create a certificate.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NewCertificate {
    pub subject_name: String,
    pub subject_email: String,
    pub course_name: String,
    /// Defaults to the creation time.
    #[serde(default)]
    pub issued_at: Option<Timestamp>,
    #[serde(default)]
    pub organization_id: Option<OrganizationId>,
    #[serde(default)]
    pub recipient: Option<LedgerAddress>,
    #[serde(default)]
    pub content_hash: Option<String>,
    /// Meant for ledger anchoring. Selects the `TECH` id prefix.
    #[serde(default)]
    pub anchored: bool,
}

impl NewCertificate {
    fn validate(&self) -> Result<(), IssuanceError> {
        let mut missing = Vec::new();
        if self.subject_name.trim().is_empty() {
            missing.push("subject name");
        }
        if self.subject_email.trim().is_empty() {
            missing.push("subject email");
        }
        if self.course_name.trim().is_empty() {
            missing.push("course name");
        }
        if !missing.is_empty() {
            return Err(IssuanceError::InvalidRequest(format!(
                "missing required fields: {}",
                missing.join(", ")
            )));
        }

        let email = self.subject_email.trim();
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
            _ => Err(IssuanceError::InvalidRequest(format!(
                "not an email address: {email}"
            ))),
        }
    }
}

/// `TECH-<year>-<serial>` or `DEMO-<year>-<serial>`, serial in `00000..=99999`.
pub fn generate_id<R: Rng + ?Sized>(anchored: bool, year: i32, rng: &mut R) -> CertificateId {
    let prefix = if anchored { "TECH" } else { "DEMO" };
    let serial: u32 = rng.gen_range(0..100_000);
    CertificateId::new(format!("{prefix}-{year}-{serial:05}"))
}

/// Creates and looks up certificate records.
pub struct CertificateRegistry<S> {
    store: Arc<S>,
    default_organization: OrganizationId,
}

impl<S: CertificateStore> CertificateRegistry<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            default_organization: OrganizationId::new(DEFAULT_ORGANIZATION_ID),
        }
    }

    pub fn with_default_organization(mut self, organization_id: OrganizationId) -> Self {
        self.default_organization = organization_id;
        self
    }

    /// Validate `request` and insert it as an unanchored certificate under a
    /// freshly generated id.
    pub async fn create(&self, request: NewCertificate) -> Result<Certificate, IssuanceError> {
        let year = Timestamp::now().year();
        let anchored = request.anchored;
        self.insert_with(request, || generate_id(anchored, year, &mut rand::thread_rng()))
            .await
    }

    pub async fn get(&self, id: &CertificateId) -> Result<Certificate, IssuanceError> {
        Ok(self.store.get_certificate(id).await?)
    }

    async fn insert_with(
        &self,
        request: NewCertificate,
        mut next_id: impl FnMut() -> CertificateId + Send,
    ) -> Result<Certificate, IssuanceError> {
        request.validate()?;
        let organization_id = request
            .organization_id
            .clone()
            .unwrap_or_else(|| self.default_organization.clone());

        let mut last_taken = None;
        for _ in 0..ID_ATTEMPTS {
            let now = Timestamp::now();
            let mut certificate = Certificate::new(
                next_id(),
                request.subject_name.trim(),
                request.subject_email.trim(),
                request.course_name.trim(),
                organization_id.clone(),
                request.issued_at.unwrap_or(now),
            );
            certificate.recipient = request.recipient;
            certificate.content_hash = request.content_hash.clone();

            match self.store.insert_certificate(&certificate).await {
                Ok(()) => {
                    tracing::info!(
                        certificate_id = %certificate.id,
                        organization_id = %certificate.organization_id,
                        "certificate created"
                    );
                    return Ok(certificate);
                }
                Err(StoreError::Duplicate(taken)) => {
                    tracing::debug!(certificate_id = %taken, "certificate id taken, drawing another");
                    last_taken = Some(taken);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(IssuanceError::Store(StoreError::Duplicate(
            last_taken.unwrap_or_default(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use certanchor_nullables::NullStore;
    use certanchor_types::LedgerStatus;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn request() -> NewCertificate {
        NewCertificate {
            subject_name: " Grace Hopper ".into(),
            subject_email: "grace@example.org".into(),
            course_name: "Compilers".into(),
            ..NewCertificate::default()
        }
    }

    fn registry() -> (CertificateRegistry<NullStore>, Arc<NullStore>) {
        let store = Arc::new(NullStore::new());
        (CertificateRegistry::new(Arc::clone(&store)), store)
    }

    #[test]
    fn generated_ids_follow_the_pattern() {
        let mut rng = StdRng::seed_from_u64(7);
        for anchored in [true, false] {
            for _ in 0..200 {
                let id = generate_id(anchored, 2024, &mut rng);
                let (prefix, serial) = id.as_str().rsplit_once('-').unwrap();
                assert_eq!(prefix, if anchored { "TECH-2024" } else { "DEMO-2024" });
                assert_eq!(serial.len(), 5);
                assert!(serial.bytes().all(|b| b.is_ascii_digit()));
            }
        }
    }

    #[tokio::test]
    async fn creates_unanchored_record_with_defaults() {
        let (registry, store) = registry();
        let before = Timestamp::now();

        let certificate = registry.create(request()).await.unwrap();
        assert!(certificate.id.as_str().starts_with(&format!("DEMO-{}-", before.year())));
        assert_eq!(certificate.subject_name, "Grace Hopper");
        assert_eq!(certificate.organization_id.as_str(), DEFAULT_ORGANIZATION_ID);
        assert!(certificate.issued_at >= before);
        assert_eq!(certificate.verification_count, 0);
        assert_eq!(certificate.ledger_status, LedgerStatus::Unanchored);
        assert_eq!(certificate.ledger_reference, None);

        assert_eq!(store.get(&certificate.id), certificate);
        assert_eq!(registry.get(&certificate.id).await.unwrap(), certificate);
    }

    #[tokio::test]
    async fn keeps_explicit_fields() {
        let (registry, _) = registry();
        let issued_at: Timestamp = "2024-06-01T09:00:00Z".parse().unwrap();
        let recipient: LedgerAddress = "0x00000000000000000000000000000000000000aa".parse().unwrap();

        let certificate = registry
            .create(NewCertificate {
                issued_at: Some(issued_at),
                organization_id: Some(OrganizationId::new("org-7")),
                recipient: Some(recipient),
                content_hash: Some("bafybeigdyr".into()),
                anchored: true,
                ..request()
            })
            .await
            .unwrap();
        assert!(certificate.id.as_str().starts_with("TECH-"));
        assert_eq!(certificate.issued_at, issued_at);
        assert_eq!(certificate.organization_id, OrganizationId::new("org-7"));
        assert_eq!(certificate.recipient, Some(recipient));
        assert_eq!(certificate.content_hash.as_deref(), Some("bafybeigdyr"));
    }

    #[tokio::test]
    async fn rejects_incomplete_requests() {
        let (registry, store) = registry();
        let incomplete = [
            NewCertificate { subject_name: "  ".into(), ..request() },
            NewCertificate { subject_email: String::new(), ..request() },
            NewCertificate { course_name: "\t".into(), ..request() },
            NewCertificate { subject_email: "grace.example.org".into(), ..request() },
            NewCertificate { subject_email: "@example.org".into(), ..request() },
        ];
        for bad in incomplete {
            let err = registry.create(bad).await.unwrap_err();
            assert!(matches!(err, IssuanceError::InvalidRequest(_)), "{err}");
        }
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn taken_id_draws_another() {
        let (registry, store) = registry();
        let first = registry.create(request()).await.unwrap();

        let mut ids = vec![CertificateId::new("DEMO-2024-00002"), first.id.clone()];
        let second = registry
            .insert_with(request(), move || ids.pop().unwrap())
            .await
            .unwrap();
        assert_eq!(second.id, CertificateId::new("DEMO-2024-00002"));
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn gives_up_after_repeated_collisions() {
        let (registry, store) = registry();
        let taken = registry.create(request()).await.unwrap().id;

        let err = registry
            .insert_with(request(), || taken.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, IssuanceError::Store(StoreError::Duplicate(_))));
        assert_eq!(store.len(), 1);
    }
}
