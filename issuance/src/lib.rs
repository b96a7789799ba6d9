//! Certificate issuance on top of the ledger client and certificate store.
//!
//! - [`IssuanceExecutor`] submits one certificate and records the outcome.
//! - [`Orchestrator`] runs batches: demo marking, or paced production
//!   submissions with retries, optionally as a cancellable task.
//! - [`StatusReconciler`] is the only writer of ledger state to the store
//!   and enforces status precedence.
//! - [`Verifier`] answers verification requests.
//! - [`CertificateRegistry`] creates certificate records.

pub mod config;
pub mod dashboard;
pub mod demo;
pub mod error;
pub mod executor;
pub mod failure;
pub mod metrics;
pub mod orchestrator;
pub mod reconciler;
pub mod registry;
pub mod verifier;

pub use config::BatchConfig;
pub use dashboard::DashboardMetrics;
pub use demo::demo_reference;
pub use error::IssuanceError;
pub use executor::{IssuanceExecutor, IssuanceOutcome};
pub use metrics::IssuanceMetrics;
pub use orchestrator::{BatchCanceller, BatchHandle, Orchestrator};
pub use reconciler::{Reconciled, StatusReconciler};
pub use registry::{generate_id, CertificateRegistry, NewCertificate, DEFAULT_ORGANIZATION_ID};
pub use verifier::{VerificationReport, Verifier};
