//! Prometheus metrics for certificate issuance.
//!
//! [`IssuanceMetrics`] owns a dedicated [`Registry`] which the daemon can
//! encode into the Prometheus text exposition format.

use prometheus::{
    register_histogram_with_registry, register_int_counter_with_registry, Encoder, Histogram,
    HistogramOpts, IntCounter, Opts, Registry, TextEncoder,
};

pub struct IssuanceMetrics {
    /// The Prometheus registry that owns every metric below.
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    /// Ledger write submissions, retries included.
    pub submissions: IntCounter,
    /// Writes that reached the confirmation depth.
    pub confirmed: IntCounter,
    /// Submissions that ended in a failure.
    pub failed: IntCounter,
    /// Certificates marked by demo runs.
    pub demo: IntCounter,

    // ── Histograms ──────────────────────────────────────────────────────
    /// Time from submission to confirmation, in milliseconds.
    pub confirmation_latency_ms: Histogram,
}

impl IssuanceMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let submissions = register_int_counter_with_registry!(
            Opts::new(
                "certanchor_submissions_total",
                "Certificate writes submitted to the ledger"
            ),
            registry
        )?;
        let confirmed = register_int_counter_with_registry!(
            Opts::new(
                "certanchor_confirmed_total",
                "Certificate writes confirmed on the ledger"
            ),
            registry
        )?;
        let failed = register_int_counter_with_registry!(
            Opts::new("certanchor_failed_total", "Certificate writes that failed"),
            registry
        )?;
        let demo = register_int_counter_with_registry!(
            Opts::new("certanchor_demo_total", "Certificates marked by demo runs"),
            registry
        )?;

        // 1s .. ~4.5min; confirmations take a few blocks
        let confirmation_latency_ms = register_histogram_with_registry!(
            HistogramOpts::new(
                "certanchor_confirmation_latency_ms",
                "Time from submission to confirmation in milliseconds"
            )
            .buckets(prometheus::exponential_buckets(1000.0, 2.0, 9)?),
            registry
        )?;

        Ok(Self {
            registry,
            submissions,
            confirmed,
            failed,
            demo,
            confirmation_latency_ms,
        })
    }

    /// Encode every metric in the Prometheus text format.
    pub fn encode_text(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
