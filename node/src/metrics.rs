//! # Prometheus Metrics
//!
//! Exposes operational metrics for the lending node. Scraped by Prometheus
//! at the `/metrics` HTTP endpoint on the configured metrics port.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] so they
//! do not collide with any default global registry consumers.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder};
use std::sync::Arc;

/// Holds all Prometheus metric handles for the node.
///
/// Clone-friendly (wraps `Arc` internally via prometheus handles) so it can
/// be shared across request handlers and background tasks.
#[derive(Clone)]
pub struct NodeMetrics {
    /// Prometheus registry that owns all metrics below.
    registry: Registry,
    /// Total number of proposals put on record via the made-set.
    pub proposals_made_total: IntCounter,
    /// Total number of loans originated by this node.
    pub loans_originated_total: IntCounter,
    /// Total number of loans repaid in full.
    pub loans_repaid_total: IntCounter,
    /// Total number of claims settled (repayment or collateral payout).
    pub loans_claimed_total: IntCounter,
    /// Total number of claims that paid out collateral after a default.
    pub defaulted_claims_total: IntCounter,
    /// Total number of nonce revocations (single nonces and whole spaces).
    pub nonce_revocations_total: IntCounter,
    /// Number of loans currently live (collateral still in the vault).
    pub running_loans: IntGauge,
    /// Sum of repayment amounts owed across live loans, in credit units.
    pub escrowed_value_units: IntGauge,
    /// Histogram of origination latency in seconds.
    pub origination_seconds: Histogram,
}

impl NodeMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Self {
        let registry = Registry::new_custom(Some("lien".into()), None)
            .expect("failed to create prometheus registry");

        let proposals_made_total = IntCounter::new(
            "proposals_made_total",
            "Total number of proposals put on record via the made-set",
        )
        .expect("metric creation");
        registry
            .register(Box::new(proposals_made_total.clone()))
            .expect("metric registration");

        let loans_originated_total = IntCounter::new(
            "loans_originated_total",
            "Total number of loans originated by this node",
        )
        .expect("metric creation");
        registry
            .register(Box::new(loans_originated_total.clone()))
            .expect("metric registration");

        let loans_repaid_total =
            IntCounter::new("loans_repaid_total", "Total number of loans repaid in full")
                .expect("metric creation");
        registry
            .register(Box::new(loans_repaid_total.clone()))
            .expect("metric registration");

        let loans_claimed_total = IntCounter::new(
            "loans_claimed_total",
            "Total number of claims settled, repayment and collateral payouts combined",
        )
        .expect("metric creation");
        registry
            .register(Box::new(loans_claimed_total.clone()))
            .expect("metric registration");

        let defaulted_claims_total = IntCounter::new(
            "defaulted_claims_total",
            "Total number of claims that paid out collateral after a default",
        )
        .expect("metric creation");
        registry
            .register(Box::new(defaulted_claims_total.clone()))
            .expect("metric registration");

        let nonce_revocations_total = IntCounter::new(
            "nonce_revocations_total",
            "Total number of nonce revocations, single nonces and whole spaces",
        )
        .expect("metric creation");
        registry
            .register(Box::new(nonce_revocations_total.clone()))
            .expect("metric registration");

        let running_loans = IntGauge::new(
            "running_loans",
            "Number of loans currently live with collateral in the vault",
        )
        .expect("metric creation");
        registry
            .register(Box::new(running_loans.clone()))
            .expect("metric registration");

        let escrowed_value_units = IntGauge::new(
            "escrowed_value_units",
            "Sum of repayment amounts owed across live loans, in credit units",
        )
        .expect("metric creation");
        registry
            .register(Box::new(escrowed_value_units.clone()))
            .expect("metric registration");

        let origination_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "origination_seconds",
                "End-to-end loan origination latency in seconds",
            )
            .buckets(vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
            ]),
        )
        .expect("metric creation");
        registry
            .register(Box::new(origination_seconds.clone()))
            .expect("metric registration");

        Self {
            registry,
            proposals_made_total,
            loans_originated_total,
            loans_repaid_total,
            loans_claimed_total,
            defaulted_claims_total,
            nonce_revocations_total,
            running_loans,
            escrowed_value_units,
            origination_seconds,
        }
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer).expect("prometheus output is valid utf-8"))
    }
}

/// Shared metrics state passed to axum handlers via extension.
pub type SharedMetrics = Arc<NodeMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
///
/// Returns HTTP 500 if encoding fails (should never happen in practice).
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}
