//! Ledger client errors and their classification.

use alloy_primitives::U256;
use certanchor_types::{LedgerAddress, TxHash};
use thiserror::Error;

use crate::rpc::RpcError;

#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    #[error("ledger client not ready: {0}")]
    ServiceUnavailable(String),

    #[error("signing credential required but not configured")]
    MissingCredential,

    #[error("insufficient funds: {message}")]
    InsufficientFunds { code: Option<i64>, message: String },

    #[error("nonce conflict (code {code}): {message}")]
    NonceConflict { code: i64, message: String },

    #[error("transaction underpriced (code {code}): {message}")]
    Underpriced { code: i64, message: String },

    #[error("ledger RPC endpoint unreachable: {0}")]
    Unreachable(String),

    #[error("transaction {tx_hash} not confirmed within {waited_secs}s")]
    ConfirmationTimeout { tx_hash: TxHash, waited_secs: u64 },

    #[error("transaction {tx_hash} reverted")]
    Reverted { tx_hash: TxHash },

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("no contract deployed at {0}")]
    ContractNotDeployed(LedgerAddress),

    #[error("connected to chain {actual}, expected {expected}")]
    ChainMismatch { expected: u64, actual: u64 },

    #[error("invalid RPC response: {0}")]
    InvalidResponse(String),

    #[error("signing error: {0}")]
    Signing(String),

    #[error("config error: {0}")]
    Config(String),
}

impl LedgerError {
    pub fn insufficient_balance(balance: U256, needed: U256) -> Self {
        Self::InsufficientFunds {
            code: None,
            message: format!("balance {balance} wei below estimated cost {needed} wei"),
        }
    }

    /// Whether resubmitting the same write later can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ServiceUnavailable(_)
                | Self::InsufficientFunds { .. }
                | Self::NonceConflict { .. }
                | Self::Underpriced { .. }
                | Self::Unreachable(_)
                | Self::ConfirmationTimeout { .. }
        )
    }

    /// The JSON-RPC error code behind this error, if the node returned one.
    pub fn rpc_code(&self) -> Option<i64> {
        match self {
            Self::InsufficientFunds { code, .. } => *code,
            Self::NonceConflict { code, .. }
            | Self::Underpriced { code, .. }
            | Self::Rpc { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Node error messages differ between clients; these substrings cover geth,
/// reth, nethermind and the Substrate EVM frontends.
const UNDERPRICED_MARKERS: &[&str] = &[
    "underpriced",
    "fee cap less than block base fee",
    "max fee per gas less than block base fee",
    "fee too low",
];

const NONCE_MARKERS: &[&str] = &[
    "nonce too low",
    "nonce too high",
    "already known",
    "invalid nonce",
    "nonce has already been used",
];

impl From<RpcError> for LedgerError {
    fn from(e: RpcError) -> Self {
        match e {
            RpcError::Transport(msg) => Self::Unreachable(msg),
            RpcError::InvalidResponse(msg) => Self::InvalidResponse(msg),
            RpcError::Server { code, message } => {
                let lower = message.to_lowercase();
                if lower.contains("insufficient funds") {
                    Self::InsufficientFunds {
                        code: Some(code),
                        message,
                    }
                } else if UNDERPRICED_MARKERS.iter().any(|m| lower.contains(m)) {
                    Self::Underpriced { code, message }
                } else if NONCE_MARKERS.iter().any(|m| lower.contains(m)) {
                    Self::NonceConflict { code, message }
                } else {
                    Self::Rpc { code, message }
                }
            }
        }
    }
}
