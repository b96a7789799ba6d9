//! Nullable infrastructure for deterministic testing.
//!
//! Every external dependency of the issuance pipeline (certificate store,
//! ledger, ledger JSON-RPC node) sits behind a trait. This crate provides
//! in-memory implementations that:
//! - Return deterministic values
//! - Can be scripted to fail on demand
//! - Record how they were called
//! - Never touch the network
//!
//! Usage: swap real implementations for nullables in tests.

pub mod ledger;
pub mod rpc;
pub mod store;

pub use ledger::{NullLedger, Submission};
pub use rpc::NullLedgerRpc;
pub use store::NullStore;
