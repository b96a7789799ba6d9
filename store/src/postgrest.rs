//! PostgREST-backed certificate store.
//!
//! Talks to a `certificates` table exposed through PostgREST (e.g. a Supabase
//! project). Conditional ledger-state writes are a single filtered `PATCH`,
//! so the database evaluates the status precondition and the write as one
//! statement. The verification counter is bumped server-side by a SQL
//! function called through `rpc/`:
//!
//! ```sql
//! create function increment_verification_count(certificate_id text)
//! returns bigint language sql as $$
//!   update certificates set verification_count = verification_count + 1
//!   where id = certificate_id
//!   returning verification_count
//! $$;
//! ```

use std::time::Duration;

use certanchor_types::{Certificate, CertificateId, LedgerStatus};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};

use crate::certificate::{CertificateStore, ConditionalUpdate, LedgerStateUpdate};
use crate::StoreError;

/// Default timeout for store requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default connection timeout.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection settings for [`PostgrestStore`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PostgrestConfig {
    /// Base REST URL, e.g. `https://<project>.supabase.co/rest/v1`.
    pub url: String,

    /// Table holding certificate rows.
    #[serde(default = "default_table")]
    pub table: String,

    /// Name of the environment variable holding the API key. Read once at
    /// startup by the daemon.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Resolved API key. Never serialized.
    #[serde(skip)]
    pub api_key: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// SQL function that increments a certificate's verification counter
    /// and returns the new value, or null for an unknown id.
    #[serde(default = "default_counter_function")]
    pub counter_function: String,
}

fn default_table() -> String {
    "certificates".to_string()
}

fn default_api_key_env() -> String {
    "CERTANCHOR_STORE_KEY".to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

fn default_counter_function() -> String {
    "increment_verification_count".to_string()
}

impl PostgrestConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            table: default_table(),
            api_key_env: default_api_key_env(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
            counter_function: default_counter_function(),
        }
    }
}

/// Certificate store backed by a PostgREST endpoint.
pub struct PostgrestStore {
    http_client: reqwest::Client,
    endpoint: String,
    counter_endpoint: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct CounterArgs<'a> {
    certificate_id: &'a CertificateId,
}

impl PostgrestStore {
    pub fn new(config: &PostgrestConfig) -> Result<Self, StoreError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()
            .map_err(|e| StoreError::Backend(format!("cannot build HTTP client: {e}")))?;
        let base = config.url.trim_end_matches('/');
        Ok(Self {
            http_client,
            endpoint: format!("{base}/{}", config.table.trim_matches('/')),
            counter_endpoint: format!("{base}/rpc/{}", config.counter_function.trim_matches('/')),
            api_key: config.api_key.clone(),
        })
    }

    fn counter_request(&self, id: &CertificateId) -> RequestBuilder {
        self.http_client
            .post(&self.counter_endpoint)
            .json(&CounterArgs { certificate_id: id })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("apikey", key).bearer_auth(key),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, StoreError> {
        let response = self.authorize(request).send().await.map_err(|e| {
            if e.is_timeout() || e.is_connect() {
                StoreError::Unreachable(e.to_string())
            } else {
                StoreError::Backend(e.to_string())
            }
        })?;
        Ok(response)
    }

    async fn rows(&self, response: Response) -> Result<Vec<Certificate>, StoreError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Backend(format!("HTTP status {status}: {body}")));
        }
        response
            .json::<Vec<Certificate>>()
            .await
            .map_err(|e| StoreError::Serialization(format!("failed to parse certificate rows: {e}")))
    }

    async fn fetch_one(&self, id: &CertificateId) -> Result<Certificate, StoreError> {
        let request = self
            .http_client
            .get(&self.endpoint)
            .query(&[("select", "*".to_string()), ("id", format!("eq.{id}"))]);
        let response = self.send(request).await?;
        self.rows(response)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }
}

/// PostgREST `in.(...)` filter over status names.
fn status_filter(statuses: &[LedgerStatus]) -> String {
    let names: Vec<&str> = statuses.iter().map(LedgerStatus::as_str).collect();
    format!("in.({})", names.join(","))
}

impl CertificateStore for PostgrestStore {
    async fn insert_certificate(&self, certificate: &Certificate) -> Result<(), StoreError> {
        let request = self
            .http_client
            .post(&self.endpoint)
            .header("Prefer", "return=minimal")
            .json(certificate);
        let response = self.send(request).await?;
        match response.status() {
            s if s.is_success() => Ok(()),
            StatusCode::CONFLICT => Err(StoreError::Duplicate(certificate.id.to_string())),
            s => {
                let body = response.text().await.unwrap_or_default();
                Err(StoreError::Backend(format!("HTTP status {s}: {body}")))
            }
        }
    }

    async fn get_certificate(&self, id: &CertificateId) -> Result<Certificate, StoreError> {
        self.fetch_one(id).await
    }

    async fn list_certificates(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Certificate>, StoreError> {
        let request = self.http_client.get(&self.endpoint).query(&[
            ("select", "*".to_string()),
            ("order", "created_at.desc".to_string()),
            ("limit", limit.to_string()),
            ("offset", offset.to_string()),
        ]);
        let response = self.send(request).await?;
        self.rows(response).await
    }

    async fn all_certificates(&self) -> Result<Vec<Certificate>, StoreError> {
        let request = self
            .http_client
            .get(&self.endpoint)
            .query(&[("select", "*"), ("order", "created_at.desc")]);
        let response = self.send(request).await?;
        self.rows(response).await
    }

    async fn update_ledger_state(
        &self,
        id: &CertificateId,
        allowed_from: &[LedgerStatus],
        update: &LedgerStateUpdate,
    ) -> Result<ConditionalUpdate, StoreError> {
        if allowed_from.is_empty() {
            return self.fetch_one(id).await.map(ConditionalUpdate::Rejected);
        }

        let request = self
            .http_client
            .patch(&self.endpoint)
            .query(&[
                ("id", format!("eq.{id}")),
                ("ledger_status", status_filter(allowed_from)),
            ])
            .header("Prefer", "return=representation")
            .json(update);
        let response = self.send(request).await?;

        match self.rows(response).await?.into_iter().next() {
            Some(written) => Ok(ConditionalUpdate::Applied(written)),
            // Zero rows matched: either the id is unknown or the precondition
            // failed. The follow-up read tells the two apart.
            None => self.fetch_one(id).await.map(ConditionalUpdate::Rejected),
        }
    }

    async fn increment_verification_count(&self, id: &CertificateId) -> Result<u64, StoreError> {
        let response = self.send(self.counter_request(id)).await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(StoreError::Backend(format!(
                "verification counter call failed with HTTP status {status}: {body}"
            )));
        }
        let count = parse_counter(id, &body)?;
        tracing::debug!(certificate_id = %id, count, "verification counted");
        Ok(count)
    }
}

/// The counter function answers with the new value, or null when no row
/// matched the id.
fn parse_counter(id: &CertificateId, body: &str) -> Result<u64, StoreError> {
    match serde_json::from_str::<Option<u64>>(body.trim()) {
        Ok(Some(count)) => Ok(count),
        Ok(None) => Err(StoreError::NotFound(id.to_string())),
        Err(e) => Err(StoreError::Serialization(format!(
            "unexpected verification counter response {body:?}: {e}"
        ))),
    }
}
