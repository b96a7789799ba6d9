//! Ledger client configuration with serde defaults.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use zeroize::Zeroizing;

use certanchor_types::LedgerAddress;

use crate::LedgerError;

/// Minimum confirmation depth accepted by [`LedgerConfig::validate`].
pub const MIN_CONFIRMATIONS: u64 = 2;

const WEI_PER_GWEI: u128 = 1_000_000_000;

/// How the client treats a missing or unusable signing credential.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialMode {
    /// A signing credential is required; construction fails without one.
    Strict,
    /// Without a credential the client serves reads only.
    #[default]
    Degraded,
}

/// Private signing key material. Wiped on drop, redacted in `Debug`.
#[derive(Clone)]
pub struct SigningKey(Zeroizing<String>);

impl SigningKey {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(Zeroizing::new(raw.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningKey(<redacted>)")
    }
}

/// Configuration for [`crate::LedgerClient`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// JSON-RPC endpoint.
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,

    /// Certificate registry contract.
    #[serde(default = "default_contract_address")]
    pub contract_address: LedgerAddress,

    /// Expected chain id. When set, initialization fails on any other chain.
    #[serde(default = "default_chain_id")]
    pub chain_id: Option<u64>,

    #[serde(default)]
    pub credential_mode: CredentialMode,

    /// Environment variable the daemon reads the signing key from at startup.
    #[serde(default = "default_signer_key_env")]
    pub signer_key_env: String,

    /// Resolved signing key. Never serialized.
    #[serde(skip)]
    pub signer_key: Option<SigningKey>,

    /// Blocks (inclusion block counted) required before a write is confirmed.
    #[serde(default = "default_confirmations")]
    pub confirmations: u64,

    #[serde(default = "default_confirmation_timeout_secs")]
    pub confirmation_timeout_secs: u64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Safety margin applied on top of the gas estimate, in percent.
    #[serde(default = "default_gas_margin_percent")]
    pub gas_margin_percent: u64,

    #[serde(default = "default_max_fee_per_gas_gwei")]
    pub max_fee_per_gas_gwei: u64,

    #[serde(default = "default_max_priority_fee_per_gas_gwei")]
    pub max_priority_fee_per_gas_gwei: u64,

    /// Signer balance below which initialization logs a warning.
    #[serde(default = "default_low_balance_gwei")]
    pub low_balance_gwei: u64,

    /// Per-request HTTP timeout.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_rpc_url() -> String {
    "https://paseo-rpc.dwellir.com".to_string()
}

fn default_contract_address() -> LedgerAddress {
    LedgerAddress::new([
        0x96, 0x95, 0x06, 0x29, 0x52, 0x3b, 0x23, 0x9c, 0x2b, 0x0d, 0x6d, 0xd0, 0x29, 0x30, 0x0d,
        0xda, 0xe1, 0x9b, 0xe2, 0xcc,
    ])
}

fn default_chain_id() -> Option<u64> {
    Some(420_420_422)
}

fn default_signer_key_env() -> String {
    "CERTANCHOR_SIGNER_KEY".to_string()
}

fn default_confirmations() -> u64 {
    MIN_CONFIRMATIONS
}

fn default_confirmation_timeout_secs() -> u64 {
    180
}

fn default_poll_interval_ms() -> u64 {
    1500
}

fn default_gas_margin_percent() -> u64 {
    20
}

fn default_max_fee_per_gas_gwei() -> u64 {
    30
}

fn default_max_priority_fee_per_gas_gwei() -> u64 {
    2
}

fn default_low_balance_gwei() -> u64 {
    // 0.01 of the native token
    10_000_000
}

fn default_request_timeout_secs() -> u64 {
    15
}

// ── Impl ───────────────────────────────────────────────────────────────

impl LedgerConfig {
    pub fn with_signer_key(mut self, key: SigningKey) -> Self {
        self.signer_key = Some(key);
        self
    }

    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.confirmations < MIN_CONFIRMATIONS {
            return Err(LedgerError::Config(format!(
                "confirmations must be at least {MIN_CONFIRMATIONS}, got {}",
                self.confirmations
            )));
        }
        if self.poll_interval_ms == 0 {
            return Err(LedgerError::Config("poll_interval_ms must be non-zero".into()));
        }
        if self.max_priority_fee_per_gas_gwei > self.max_fee_per_gas_gwei {
            return Err(LedgerError::Config(format!(
                "max_priority_fee_per_gas_gwei ({}) exceeds max_fee_per_gas_gwei ({})",
                self.max_priority_fee_per_gas_gwei, self.max_fee_per_gas_gwei
            )));
        }
        Ok(())
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn max_fee_per_gas_wei(&self) -> u128 {
        self.max_fee_per_gas_gwei as u128 * WEI_PER_GWEI
    }

    pub fn max_priority_fee_per_gas_wei(&self) -> u128 {
        self.max_priority_fee_per_gas_gwei as u128 * WEI_PER_GWEI
    }

    pub fn low_balance_wei(&self) -> u128 {
        self.low_balance_gwei as u128 * WEI_PER_GWEI
    }

    /// Gas limit for a write: the estimate plus the configured margin.
    pub fn apply_gas_margin(&self, estimate: u64) -> u64 {
        let padded = estimate as u128 * (100 + self.gas_margin_percent as u128) / 100;
        u64::try_from(padded).unwrap_or(u64::MAX)
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            contract_address: default_contract_address(),
            chain_id: default_chain_id(),
            credential_mode: CredentialMode::default(),
            signer_key_env: default_signer_key_env(),
            signer_key: None,
            confirmations: default_confirmations(),
            confirmation_timeout_secs: default_confirmation_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            gas_margin_percent: default_gas_margin_percent(),
            max_fee_per_gas_gwei: default_max_fee_per_gas_gwei(),
            max_priority_fee_per_gas_gwei: default_max_priority_fee_per_gas_gwei(),
            low_balance_gwei: default_low_balance_gwei(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}
