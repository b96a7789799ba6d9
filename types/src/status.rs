//! Ledger anchoring status and its precedence rules.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::TypesError;

/// Where a certificate is in its ledger anchoring lifecycle.
///
/// Status only moves forward along
/// `Unanchored → Pending → {Confirmed | Failed | Demo}`. `Confirmed` is
/// absorbing. Every other status may be re-submitted (`Pending`) or
/// simulated (`Demo`) until the certificate is confirmed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerStatus {
    /// Created, no ledger write attempted yet.
    Unanchored,
    /// A write transaction has been submitted and is awaiting confirmations.
    Pending,
    /// The write reached the configured confirmation depth.
    Confirmed,
    /// The last write attempt failed.
    Failed,
    /// Marked by a simulated run; nothing was written to the ledger.
    Demo,
}

impl LedgerStatus {
    pub const ALL: [LedgerStatus; 5] = [
        Self::Unanchored,
        Self::Pending,
        Self::Confirmed,
        Self::Failed,
        Self::Demo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unanchored => "unanchored",
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Failed => "failed",
            Self::Demo => "demo",
        }
    }

    /// Whether a stored record in `self` may be overwritten with `next`.
    pub fn accepts(&self, next: LedgerStatus) -> bool {
        match next {
            Self::Unanchored => false,
            Self::Pending | Self::Confirmed | Self::Failed | Self::Demo => *self != Self::Confirmed,
        }
    }

    /// Every stored status from which a write of `next` is accepted.
    ///
    /// This is the precondition set handed to the store's conditional update.
    pub fn sources_for(next: LedgerStatus) -> Vec<LedgerStatus> {
        Self::ALL
            .iter()
            .copied()
            .filter(|from| from.accepts(next))
            .collect()
    }

    /// Whether a new ledger write may be started for this record.
    pub fn is_anchorable(&self) -> bool {
        *self != Self::Confirmed
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Failed | Self::Demo)
    }
}

impl fmt::Display for LedgerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LedgerStatus {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| TypesError::UnknownStatus(s.to_string()))
    }
}
