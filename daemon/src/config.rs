//! Daemon configuration, loaded from a TOML file.
//!
//! Secrets never live in the file. The file names the environment
//! variables that hold them and [`DaemonConfig::load_credentials`] reads
//! those once at startup.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use certanchor_issuance::{BatchConfig, DEFAULT_ORGANIZATION_ID};
use certanchor_ledger::{LedgerConfig, SigningKey};
use certanchor_store::PostgrestConfig;
use certanchor_types::OrganizationId;
use certanchor_utils::LogFormat;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default)]
    pub log_format: LogFormat,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub ledger: LedgerConfig,

    #[serde(default)]
    pub batch: BatchConfig,

    /// Issuing organization for `create` requests that name none.
    #[serde(default = "default_organization_id")]
    pub organization_id: OrganizationId,

    /// Certificate store. Commands that read or write certificates fail
    /// without it.
    #[serde(default)]
    pub store: Option<PostgrestConfig>,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}

fn default_organization_id() -> OrganizationId {
    OrganizationId::new(DEFAULT_ORGANIZATION_ID)
}

// ── Impl ───────────────────────────────────────────────────────────────

impl DaemonConfig {
    pub fn from_toml_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(s)?;
        config.ledger.validate()?;
        config.batch.validate()?;
        Ok(config)
    }

    /// Resolve the signing key and store API key through `lookup`.
    /// Empty values count as absent.
    pub fn load_credentials(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let present = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(key) = present(&self.ledger.signer_key_env) {
            self.ledger.signer_key = Some(SigningKey::new(key.trim()));
        }
        if let Some(store) = self.store.as_mut() {
            if let Some(api_key) = present(&store.api_key_env) {
                store.api_key = Some(api_key);
            }
        }
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::default(),
            log_level: default_log_level(),
            ledger: LedgerConfig::default(),
            batch: BatchConfig::default(),
            organization_id: default_organization_id(),
            store: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use certanchor_ledger::CredentialMode;
    use std::io::Write;

    #[test]
    fn empty_toml_uses_defaults() {
        let config = DaemonConfig::from_toml_str("").unwrap();
        assert_eq!(config.log_format, LogFormat::Human);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.batch, BatchConfig::default());
        assert_eq!(config.ledger.credential_mode, CredentialMode::Degraded);
        assert!(config.store.is_none());
        assert_eq!(config.organization_id.as_str(), DEFAULT_ORGANIZATION_ID);
    }

    #[test]
    fn partial_toml_overrides() {
        let toml = r#"
            log_format = "json"
            organization_id = "org-7"

            [ledger]
            rpc_url = "http://127.0.0.1:8545"
            credential_mode = "strict"

            [batch]
            batch_size = 10
            pacing_delay_ms = 3000

            [store]
            url = "https://example.supabase.co/rest/v1"
        "#;
        let config = DaemonConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.ledger.rpc_url, "http://127.0.0.1:8545");
        assert_eq!(config.ledger.credential_mode, CredentialMode::Strict);
        assert_eq!(config.batch.batch_size, 10);
        assert_eq!(config.batch.pacing_delay_ms, 3000);
        assert_eq!(config.batch.max_attempts, 3);
        assert_eq!(config.organization_id, OrganizationId::new("org-7"));
        let store = config.store.unwrap();
        assert_eq!(store.table, "certificates");
        assert!(store.api_key.is_none());
    }

    #[test]
    fn pacing_below_floor_is_rejected() {
        let toml = "[batch]\npacing_delay_ms = 500\n";
        assert!(DaemonConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "log_level = \"debug\"\n[batch]\nmax_attempts = 5").unwrap();

        let config = DaemonConfig::from_toml_file(file.path()).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.batch.max_attempts, 5);
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = DaemonConfig::from_toml_file(&dir.path().join("absent.toml")).unwrap_err();
        assert!(err.to_string().contains("absent.toml"));
    }

    #[test]
    fn credentials_come_from_named_variables() {
        let mut config = DaemonConfig {
            store: Some(PostgrestConfig::new("https://example.supabase.co/rest/v1")),
            ..Default::default()
        };
        config.load_credentials(|name| match name {
            "CERTANCHOR_SIGNER_KEY" => Some(" 0xabc \n".to_string()),
            "CERTANCHOR_STORE_KEY" => Some("anon-key".to_string()),
            _ => None,
        });
        assert_eq!(config.ledger.signer_key.unwrap().expose(), "0xabc");
        assert_eq!(config.store.unwrap().api_key.as_deref(), Some("anon-key"));
    }

    #[test]
    fn blank_credentials_are_ignored() {
        let mut config = DaemonConfig::default();
        config.load_credentials(|_| Some("   ".to_string()));
        assert!(config.ledger.signer_key.is_none());
    }

    #[test]
    fn secrets_are_not_serialized() {
        let mut config = DaemonConfig::default();
        config.load_credentials(|_| Some("0xsecret".to_string()));
        let rendered = toml::to_string(&config).unwrap();
        assert!(!rendered.contains("0xsecret"));
    }
}
