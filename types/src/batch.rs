//! Batch run modes and per-item outcomes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{CertificateId, LedgerReceipt, LedgerReference, TxHash, TypesError};

/// Whether a batch writes to the ledger or only simulates it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchMode {
    /// No ledger calls; every certificate is marked `demo`.
    Demo,
    /// Real ledger writes.
    Production,
}

impl BatchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Demo => "demo",
            Self::Production => "production",
        }
    }
}

impl fmt::Display for BatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BatchMode {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "demo" => Ok(Self::Demo),
            "production" | "prod" => Ok(Self::Production),
            _ => Err(TypesError::UnknownMode(s.to_string())),
        }
    }
}

/// Whether resubmitting a failed item can succeed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    Retryable,
    Terminal,
}

/// Why an item failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    ServiceUnavailable,
    InsufficientFunds,
    NonceConflict,
    Underpriced,
    Unreachable,
    ConfirmationTimeout,
    Reverted,
    Rpc,
    NotFound,
    InvalidState,
    Store,
    Cancelled,
}

/// A failed item, with enough context to decide on resubmission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFailure {
    pub kind: FailureKind,
    pub reason: FailureReason,
    /// Underlying JSON-RPC error code, when the ledger returned one.
    pub code: Option<i64>,
    pub message: String,
    /// The broadcast transaction, for timeouts and reverts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<TxHash>,
}

impl ItemFailure {
    pub fn is_retryable(&self) -> bool {
        self.kind == FailureKind::Retryable
    }

    /// A broadcast write whose outcome is unknown: it timed out waiting for
    /// confirmation and may still be mined.
    pub fn unconfirmed_tx(&self) -> Option<TxHash> {
        match self.reason {
            FailureReason::ConfirmationTimeout => self.tx_hash,
            _ => None,
        }
    }
}

/// What happened to one certificate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ItemResult {
    Confirmed { receipt: LedgerReceipt },
    Demo { reference: LedgerReference },
    /// Already confirmed before this run; left untouched.
    AlreadyConfirmed {
        reference: Option<LedgerReference>,
        block_number: Option<u64>,
    },
    Failed(ItemFailure),
}

/// Outcome of one certificate within a batch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemOutcome {
    pub certificate_id: CertificateId,
    /// Zero-based index of the submission group this item ran in.
    pub group: usize,
    /// Ledger submissions made for this item (0 for demo and skipped items).
    pub attempts: u32,
    pub result: ItemResult,
}

impl ItemOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self.result, ItemResult::Failed(_))
    }

    pub fn failure(&self) -> Option<&ItemFailure> {
        match &self.result {
            ItemResult::Failed(failure) => Some(failure),
            _ => None,
        }
    }
}

/// Aggregate over one orchestration run. Built fresh per call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    pub mode: BatchMode,
    pub total: usize,
    pub confirmed: usize,
    pub failed: usize,
    /// In the order the ids were requested.
    pub items: Vec<ItemOutcome>,
}

impl BatchResult {
    pub fn from_items(mode: BatchMode, items: Vec<ItemOutcome>) -> Self {
        let confirmed = items.iter().filter(|item| item.is_success()).count();
        Self {
            mode,
            total: items.len(),
            confirmed,
            failed: items.len() - confirmed,
            items,
        }
    }

    /// Ids whose failure is retryable, in request order.
    pub fn retryable_ids(&self) -> Vec<CertificateId> {
        self.items
            .iter()
            .filter(|item| item.failure().is_some_and(ItemFailure::is_retryable))
            .map(|item| item.certificate_id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TxHash;

    fn failed(id: &str, kind: FailureKind) -> ItemOutcome {
        ItemOutcome {
            certificate_id: CertificateId::new(id),
            group: 0,
            attempts: 1,
            result: ItemResult::Failed(ItemFailure {
                kind,
                reason: FailureReason::NonceConflict,
                code: Some(-32000),
                message: "nonce too low".into(),
                tx_hash: None,
            }),
        }
    }

    #[test]
    fn counts_follow_items() {
        let ok = ItemOutcome {
            certificate_id: CertificateId::new("a"),
            group: 0,
            attempts: 1,
            result: ItemResult::Confirmed {
                receipt: LedgerReceipt {
                    tx_hash: TxHash::new([1; 32]),
                    block_number: 7,
                    gas_used: 21_000,
                },
            },
        };
        let result = BatchResult::from_items(
            BatchMode::Production,
            vec![ok, failed("b", FailureKind::Retryable), failed("c", FailureKind::Terminal)],
        );
        assert_eq!(result.total, 3);
        assert_eq!(result.confirmed, 1);
        assert_eq!(result.failed, 2);
        assert_eq!(result.retryable_ids(), vec![CertificateId::new("b")]);
    }

    #[test]
    fn mode_parses_case_insensitively() {
        assert_eq!("Demo".parse::<BatchMode>().unwrap(), BatchMode::Demo);
        assert_eq!("PRODUCTION".parse::<BatchMode>().unwrap(), BatchMode::Production);
        assert!("simulate".parse::<BatchMode>().is_err());
    }

    #[test]
    fn item_result_serializes_with_tag() {
        let json = serde_json::to_value(&failed("x", FailureKind::Retryable).result).unwrap();
        assert_eq!(json["result"], "failed");
        assert_eq!(json["reason"], "nonce_conflict");
        assert_eq!(json["kind"], "retryable");
    }
}
