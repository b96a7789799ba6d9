//! Certificate storage.
//!
//! Every backend (PostgREST, in-memory for testing) implements
//! [`CertificateStore`]. The rest of the workspace depends only on the trait.
//! Ledger status fields are written exclusively through
//! [`CertificateStore::update_ledger_state`], a conditional update that is
//! atomic per record.

pub mod certificate;
pub mod error;
pub mod postgrest;

pub use certificate::{CertificateStore, ConditionalUpdate, LedgerStateUpdate};
pub use error::StoreError;
pub use postgrest::{PostgrestConfig, PostgrestStore};
