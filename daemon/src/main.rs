//! certanchor: command line entry point for certificate issuance.

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;

use certanchor_issuance::{
    CertificateRegistry, IssuanceMetrics, IssuanceOutcome, NewCertificate, Orchestrator,
    StatusReconciler, Verifier,
};
use certanchor_ledger::{CertificateLedger, HttpLedgerRpc, LedgerClient};
use certanchor_store::{CertificateStore, PostgrestStore};
use certanchor_types::{BatchMode, CertificateId, LedgerAddress, OrganizationId, Timestamp};
use certanchor_utils::{format_millis, init_logging, LogFormat};

use crate::config::DaemonConfig;

#[derive(Parser)]
#[command(name = "certanchor", about = "Certificate issuance and ledger anchoring")]
struct Cli {
    /// Path to a TOML configuration file. Built-in defaults apply without one.
    #[arg(long, env = "CERTANCHOR_CONFIG")]
    config: Option<PathBuf>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "CERTANCHOR_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "CERTANCHOR_LOG_FORMAT", value_parser = parse_log_format)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Initialize the ledger client and print its health.
    Status,

    /// Create an unanchored certificate and print it.
    Create {
        #[arg(long)]
        name: String,

        #[arg(long)]
        email: String,

        #[arg(long)]
        course: String,

        /// RFC 3339 issue date. Defaults to now.
        #[arg(long)]
        issued_at: Option<Timestamp>,

        /// Issuing organization. Defaults to `organization_id` from the config.
        #[arg(long)]
        organization: Option<String>,

        /// On-chain recipient address.
        #[arg(long)]
        recipient: Option<LedgerAddress>,

        /// Content hash or off-chain pointer recorded on-chain.
        #[arg(long)]
        content_hash: Option<String>,

        /// The certificate will be anchored: use a `TECH-` id instead of `DEMO-`.
        #[arg(long)]
        anchored: bool,
    },

    /// Print one stored certificate.
    Show { id: String },

    /// Issue a batch of certificates.
    Issue {
        /// "demo" marks certificates without touching the ledger.
        #[arg(long, default_value = "demo")]
        mode: BatchMode,

        /// Print issuance counters in Prometheus text format afterwards.
        #[arg(long)]
        print_metrics: bool,

        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Submit one certificate once, without pacing or retries.
    Anchor { id: String },

    /// Verify a certificate against the store and the ledger.
    Verify { id: String },

    /// List stored certificates, newest first.
    List {
        #[arg(long, default_value_t = 20)]
        limit: usize,

        #[arg(long, default_value_t = 0)]
        offset: usize,
    },

    /// Print dashboard counters.
    Metrics,
}

fn parse_log_format(s: &str) -> Result<LogFormat, String> {
    match s.to_lowercase().as_str() {
        "human" => Ok(LogFormat::Human),
        "json" => Ok(LogFormat::Json),
        other => Err(format!("unknown log format: {other}")),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => DaemonConfig::from_toml_file(path)?,
        None => DaemonConfig::default(),
    };
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }
    if let Some(format) = cli.log_format {
        config.log_format = format;
    }
    init_logging(config.log_format, &config.log_level);
    if let Some(path) = &cli.config {
        tracing::info!(path = %path.display(), "loaded config");
    }

    config.load_credentials(|name| std::env::var(name).ok());

    let rpc = HttpLedgerRpc::new(config.ledger.rpc_url.clone(), config.ledger.request_timeout())?;
    let ledger = Arc::new(LedgerClient::new(config.ledger.clone(), rpc)?);

    match cli.command {
        Command::Status => {
            if !ledger.initialize().await {
                tracing::warn!("ledger client not ready for writes");
            }
            print_json(&ledger.status())?;
        }
        Command::Create {
            name,
            email,
            course,
            issued_at,
            organization,
            recipient,
            content_hash,
            anchored,
        } => {
            let registry = CertificateRegistry::new(open_store(&config)?)
                .with_default_organization(config.organization_id.clone());
            let certificate = registry
                .create(NewCertificate {
                    subject_name: name,
                    subject_email: email,
                    course_name: course,
                    issued_at,
                    organization_id: organization.map(OrganizationId::new),
                    recipient,
                    content_hash,
                    anchored,
                })
                .await?;
            print_json(&certificate)?;
        }
        Command::Show { id } => {
            let certificate = CertificateRegistry::new(open_store(&config)?)
                .get(&CertificateId::new(id))
                .await?;
            print_json(&certificate)?;
        }
        Command::Issue {
            mode,
            print_metrics,
            ids,
        } => {
            let metrics = Arc::new(IssuanceMetrics::new()?);
            let orchestrator = Arc::new(
                Orchestrator::new(Arc::clone(&ledger), open_store(&config)?, config.batch.clone())?
                    .with_metrics(Arc::clone(&metrics)),
            );
            let ids = ids.into_iter().map(CertificateId::new).collect();

            let started = tokio::time::Instant::now();
            let handle = orchestrator.spawn_batch(ids, mode);
            let canceller = handle.canceller();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("interrupt received, cancelling batch");
                    canceller.cancel();
                }
            });

            let result = handle.join().await?;
            tracing::info!(elapsed = %format_millis(started.elapsed()), "batch complete");
            let retryable = result.retryable_ids();
            if !retryable.is_empty() {
                tracing::warn!(count = retryable.len(), "some certificates can be resubmitted");
            }
            print_json(&result)?;
            if print_metrics {
                print!("{}", metrics.encode_text()?);
            }
        }
        Command::Anchor { id } => {
            let orchestrator =
                Orchestrator::new(Arc::clone(&ledger), open_store(&config)?, config.batch.clone())?;
            match orchestrator.issue_one(&CertificateId::new(id)).await? {
                IssuanceOutcome::Confirmed(receipt) => print_json(&receipt)?,
                IssuanceOutcome::Failed(failure) => {
                    print_json(&failure)?;
                    anyhow::bail!("certificate was not anchored: {}", failure.message);
                }
            }
        }
        Command::Verify { id } => {
            let verifier = Verifier::new(Arc::clone(&ledger), StatusReconciler::new(open_store(&config)?));
            let report = verifier.verify(&CertificateId::new(id)).await?;
            print_json(&report)?;
        }
        Command::List { limit, offset } => {
            let certificates = open_store(&config)?.list_certificates(limit, offset).await?;
            print_json(&certificates)?;
        }
        Command::Metrics => {
            let dashboard = StatusReconciler::new(open_store(&config)?).dashboard().await?;
            print_json(&dashboard)?;
        }
    }

    Ok(())
}

fn open_store(config: &DaemonConfig) -> anyhow::Result<Arc<PostgrestStore>> {
    let store = config
        .store
        .as_ref()
        .context("no [store] section in the configuration")?;
    if store.api_key.is_none() {
        tracing::warn!(env = %store.api_key_env, "store API key not set, requests are anonymous");
    }
    Ok(Arc::new(PostgrestStore::new(store)?))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
