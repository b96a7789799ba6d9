//! Fundamental types for certificate issuance and ledger anchoring.
//!
//! This crate defines the types shared by every other crate in the workspace:
//! certificate records, ledger status and references, ledger addresses and
//! transaction hashes, timestamps, and batch results.

pub mod address;
pub mod batch;
pub mod certificate;
pub mod error;
pub mod hash;
pub mod ledger;
pub mod status;
pub mod time;

pub use address::LedgerAddress;
pub use batch::{BatchMode, BatchResult, FailureKind, FailureReason, ItemFailure, ItemOutcome, ItemResult};
pub use certificate::{Certificate, CertificateId, OrganizationId};
pub use error::TypesError;
pub use hash::TxHash;
pub use ledger::{LedgerReceipt, LedgerReference, LedgerWriteRequest, OnChainRecord};
pub use status::LedgerStatus;
pub use time::Timestamp;
