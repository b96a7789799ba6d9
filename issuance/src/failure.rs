//! Normalisation of ledger and store errors into per-item failures.

use certanchor_ledger::LedgerError;
use certanchor_store::StoreError;
use certanchor_types::{CertificateId, FailureKind, FailureReason, ItemFailure, LedgerStatus};

use crate::IssuanceError;

fn kind(retryable: bool) -> FailureKind {
    if retryable {
        FailureKind::Retryable
    } else {
        FailureKind::Terminal
    }
}

/// Classify a ledger error, keeping its code and message.
pub fn from_ledger(error: &LedgerError) -> ItemFailure {
    let reason = match error {
        LedgerError::ServiceUnavailable(_) | LedgerError::MissingCredential => {
            FailureReason::ServiceUnavailable
        }
        LedgerError::InsufficientFunds { .. } => FailureReason::InsufficientFunds,
        LedgerError::NonceConflict { .. } => FailureReason::NonceConflict,
        LedgerError::Underpriced { .. } => FailureReason::Underpriced,
        LedgerError::Unreachable(_) => FailureReason::Unreachable,
        LedgerError::ConfirmationTimeout { .. } => FailureReason::ConfirmationTimeout,
        LedgerError::Reverted { .. } => FailureReason::Reverted,
        LedgerError::Rpc { .. }
        | LedgerError::ContractNotDeployed(_)
        | LedgerError::ChainMismatch { .. }
        | LedgerError::InvalidResponse(_)
        | LedgerError::Signing(_)
        | LedgerError::Config(_) => FailureReason::Rpc,
    };
    ItemFailure {
        kind: kind(error.is_retryable()),
        reason,
        code: error.rpc_code(),
        message: error.to_string(),
        tx_hash: match error {
            LedgerError::ConfirmationTimeout { tx_hash, .. } | LedgerError::Reverted { tx_hash } => {
                Some(*tx_hash)
            }
            _ => None,
        },
    }
}

pub fn from_store(error: &StoreError) -> ItemFailure {
    let (reason, retryable) = match error {
        StoreError::NotFound(_) => (FailureReason::NotFound, false),
        StoreError::Unreachable(_) => (FailureReason::Store, true),
        _ => (FailureReason::Store, false),
    };
    ItemFailure {
        kind: kind(retryable),
        reason,
        code: None,
        message: error.to_string(),
        tx_hash: None,
    }
}

/// Classify a failed store round-trip made on behalf of an item.
pub fn from_issuance(error: &IssuanceError) -> ItemFailure {
    match error {
        IssuanceError::Store(e) => from_store(e),
        IssuanceError::NotFound(_) => ItemFailure {
            kind: FailureKind::Terminal,
            reason: FailureReason::NotFound,
            code: None,
            message: error.to_string(),
            tx_hash: None,
        },
        IssuanceError::Ledger(e) => from_ledger(e),
        IssuanceError::InvalidState { id, status } => invalid_state(id, *status),
        other => ItemFailure {
            kind: FailureKind::Terminal,
            reason: FailureReason::Store,
            code: None,
            message: other.to_string(),
            tx_hash: None,
        },
    }
}

pub fn invalid_state(id: &CertificateId, status: LedgerStatus) -> ItemFailure {
    ItemFailure {
        kind: FailureKind::Terminal,
        reason: FailureReason::InvalidState,
        code: None,
        message: format!("certificate {id} is {status}"),
        tx_hash: None,
    }
}

/// An item the batch never got to because it was cancelled.
pub fn cancelled() -> ItemFailure {
    ItemFailure {
        kind: FailureKind::Retryable,
        reason: FailureReason::Cancelled,
        code: None,
        message: "batch cancelled before this certificate was submitted".into(),
        tx_hash: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use certanchor_types::TxHash;

    #[test]
    fn nonce_conflict_keeps_context() {
        let failure = from_ledger(&LedgerError::NonceConflict {
            code: -32000,
            message: "nonce too low".into(),
        });
        assert_eq!(failure.reason, FailureReason::NonceConflict);
        assert_eq!(failure.kind, FailureKind::Retryable);
        assert_eq!(failure.code, Some(-32000));
        assert!(failure.message.contains("nonce too low"));
    }

    #[test]
    fn revert_is_terminal() {
        let failure = from_ledger(&LedgerError::Reverted {
            tx_hash: TxHash::new([7; 32]),
        });
        assert_eq!(failure.reason, FailureReason::Reverted);
        assert!(!failure.is_retryable());
        assert_eq!(failure.tx_hash, Some(TxHash::new([7; 32])));
        assert_eq!(failure.unconfirmed_tx(), None);
    }

    #[test]
    fn timeout_is_retryable() {
        let failure = from_ledger(&LedgerError::ConfirmationTimeout {
            tx_hash: TxHash::new([7; 32]),
            waited_secs: 180,
        });
        assert_eq!(failure.reason, FailureReason::ConfirmationTimeout);
        assert!(failure.is_retryable());
        assert_eq!(failure.unconfirmed_tx(), Some(TxHash::new([7; 32])));
    }

    #[test]
    fn unknown_id_maps_to_not_found() {
        let failure = from_issuance(&IssuanceError::from(StoreError::NotFound("x".into())));
        assert_eq!(failure.reason, FailureReason::NotFound);
        assert!(!failure.is_retryable());
    }

    #[test]
    fn store_outage_is_retryable() {
        assert!(from_store(&StoreError::Unreachable("down".into())).is_retryable());
        let missing = from_store(&StoreError::NotFound("x".into()));
        assert_eq!(missing.reason, FailureReason::NotFound);
        assert!(!missing.is_retryable());
    }
}
