//! Certificate records as held by the certificate store.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{LedgerAddress, LedgerReference, LedgerStatus, Timestamp};

/// Opaque certificate identifier. Unique, immutable once created.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CertificateId(String);

impl CertificateId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CertificateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CertificateId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for CertificateId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Reference to the organization that issued a certificate.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrganizationId(String);

impl OrganizationId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrganizationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A certificate and its ledger anchoring state.
///
/// The ledger fields (`ledger_status`, `ledger_reference`, `block_number`,
/// `ledger_error`) are only ever written together, through the status
/// reconciler.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    pub id: CertificateId,
    pub subject_name: String,
    pub subject_email: String,
    pub course_name: String,
    pub issued_at: Timestamp,
    pub organization_id: OrganizationId,
    pub created_at: Timestamp,
    /// Incremented on each successful verification.
    #[serde(default)]
    pub verification_count: u64,
    pub ledger_status: LedgerStatus,
    #[serde(default)]
    pub ledger_reference: Option<LedgerReference>,
    #[serde(default)]
    pub block_number: Option<u64>,
    /// Last ledger failure, kept for operators deciding on resubmission.
    #[serde(default)]
    pub ledger_error: Option<String>,
    /// On-chain recipient. `None` anchors to the issuer's own address.
    #[serde(default)]
    pub recipient: Option<LedgerAddress>,
    /// Content hash or off-chain pointer (e.g. an IPFS CID) recorded on-chain.
    #[serde(default)]
    pub content_hash: Option<String>,
}

impl Certificate {
    /// A freshly created, unanchored certificate.
    pub fn new(
        id: CertificateId,
        subject_name: impl Into<String>,
        subject_email: impl Into<String>,
        course_name: impl Into<String>,
        organization_id: OrganizationId,
        issued_at: Timestamp,
    ) -> Self {
        Self {
            id,
            subject_name: subject_name.into(),
            subject_email: subject_email.into(),
            course_name: course_name.into(),
            issued_at,
            organization_id,
            created_at: Timestamp::now(),
            verification_count: 0,
            ledger_status: LedgerStatus::Unanchored,
            ledger_reference: None,
            block_number: None,
            ledger_error: None,
            recipient: None,
            content_hash: None,
        }
    }

    pub fn with_recipient(mut self, recipient: LedgerAddress) -> Self {
        self.recipient = Some(recipient);
        self
    }

    pub fn with_content_hash(mut self, content_hash: impl Into<String>) -> Self {
        self.content_hash = Some(content_hash.into());
        self
    }

    pub fn is_confirmed(&self) -> bool {
        self.ledger_status == LedgerStatus::Confirmed
    }
}
