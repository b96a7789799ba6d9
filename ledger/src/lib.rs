//! Ledger client for anchoring certificates through a smart contract.
//!
//! Layers, bottom-up:
//! - [`rpc::LedgerRpc`]: the JSON-RPC transport seam, implemented over HTTP
//!   by [`http::HttpLedgerRpc`].
//! - [`contract`]: ABI encoding for the certificate registry contract.
//! - [`signer::LedgerSigner`]: EIP-1559 transaction signing.
//! - [`client::LedgerClient`]: gas estimation, funding checks, nonce
//!   handling, confirmation tracking and the degraded read-only mode.
//!
//! Callers depend on the [`CertificateLedger`] trait, not on the client type.

pub mod client;
pub mod config;
pub mod contract;
pub mod error;
pub mod http;
pub mod rpc;
pub mod signer;

pub use client::{CertificateLedger, LedgerClient, LedgerHealth};
pub use config::{CredentialMode, LedgerConfig, SigningKey};
pub use error::LedgerError;
pub use http::HttpLedgerRpc;
pub use rpc::{CallRequest, LedgerRpc, RpcError, RpcReceipt};
pub use signer::{LedgerSigner, SignedWrite};

use alloy_primitives::{Address, B256};
use certanchor_types::{LedgerAddress, TxHash};

/// Convert a workspace address into the alloy representation.
pub fn to_alloy_address(address: &LedgerAddress) -> Address {
    Address::from(*address.as_bytes())
}

/// Convert an alloy address into the workspace representation.
pub fn from_alloy_address(address: Address) -> LedgerAddress {
    LedgerAddress::new(address.0 .0)
}

/// Convert an alloy transaction hash into the workspace representation.
pub fn from_alloy_hash(hash: B256) -> TxHash {
    TxHash::new(hash.0)
}

/// Convert a workspace transaction hash into the alloy representation.
pub fn to_alloy_hash(hash: &TxHash) -> B256 {
    B256::from(*hash.as_bytes())
}
