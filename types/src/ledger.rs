//! Values exchanged with the ledger: write requests, receipts, references.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::{Certificate, CertificateId, LedgerAddress, Timestamp, TxHash, TypesError};

/// Payload of a single certificate write. Lives for one issuance attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LedgerWriteRequest {
    pub certificate_id: CertificateId,
    /// `None` lets the ledger client substitute the issuer's own address.
    pub recipient: Option<LedgerAddress>,
    pub content_hash: Option<String>,
    pub timestamp: Timestamp,
}

impl LedgerWriteRequest {
    pub fn from_certificate(certificate: &Certificate) -> Self {
        Self {
            certificate_id: certificate.id.clone(),
            recipient: certificate.recipient,
            content_hash: certificate.content_hash.clone(),
            timestamp: certificate.issued_at,
        }
    }
}

/// Proof that a write was included and confirmed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerReceipt {
    pub tx_hash: TxHash,
    pub block_number: u64,
    pub gas_used: u64,
}

/// What a certificate's ledger reference points at.
///
/// Demo references render as `demo:<tag>` and can never be mistaken for a
/// transaction hash.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum LedgerReference {
    Transaction(TxHash),
    Demo(String),
}

impl LedgerReference {
    pub const DEMO_PREFIX: &'static str = "demo:";

    pub fn is_demo(&self) -> bool {
        matches!(self, Self::Demo(_))
    }

    pub fn tx_hash(&self) -> Option<TxHash> {
        match self {
            Self::Transaction(hash) => Some(*hash),
            Self::Demo(_) => None,
        }
    }
}

impl fmt::Display for LedgerReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transaction(hash) => write!(f, "{hash}"),
            Self::Demo(tag) => write!(f, "{}{tag}", Self::DEMO_PREFIX),
        }
    }
}

impl FromStr for LedgerReference {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(tag) = s.strip_prefix(Self::DEMO_PREFIX) {
            if tag.is_empty() {
                return Err(TypesError::InvalidReference(s.to_string()));
            }
            return Ok(Self::Demo(tag.to_string()));
        }
        s.parse::<TxHash>()
            .map(Self::Transaction)
            .map_err(|_| TypesError::InvalidReference(s.to_string()))
    }
}

impl Serialize for LedgerReference {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for LedgerReference {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Certificate data as recorded by the on-chain contract.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnChainRecord {
    pub exists: bool,
    pub recipient: LedgerAddress,
    pub content_hash: String,
    pub timestamp: Timestamp,
    pub issuer: LedgerAddress,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_reference_is_tagged() {
        let r = LedgerReference::Demo("abc123".into());
        assert_eq!(r.to_string(), "demo:abc123");
        assert!(r.tx_hash().is_none());
        assert_eq!("demo:abc123".parse::<LedgerReference>().unwrap(), r);
    }

    #[test]
    fn transaction_reference_parses() {
        let hash = TxHash::new([0xab; 32]);
        let rendered = LedgerReference::Transaction(hash).to_string();
        assert!(rendered.starts_with("0xabab"));
        assert_eq!(
            rendered.parse::<LedgerReference>().unwrap(),
            LedgerReference::Transaction(hash)
        );
    }

    #[test]
    fn rejects_untagged_garbage() {
        assert!("demo:".parse::<LedgerReference>().is_err());
        assert!("abcd".parse::<LedgerReference>().is_err());
    }

    #[test]
    fn write_request_copies_certificate_fields() {
        let cert = Certificate::new(
            CertificateId::new("TECH-2024-00001"),
            "Ada",
            "ada@example.org",
            "Rust 101",
            crate::OrganizationId::new("org-1"),
            Timestamp::new(1_700_000_000),
        )
        .with_content_hash("bafy...");
        let req = LedgerWriteRequest::from_certificate(&cert);
        assert_eq!(req.certificate_id, cert.id);
        assert_eq!(req.recipient, None);
        assert_eq!(req.content_hash.as_deref(), Some("bafy..."));
        assert_eq!(req.timestamp, Timestamp::new(1_700_000_000));
    }
}
