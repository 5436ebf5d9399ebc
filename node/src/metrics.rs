//! # Prometheus Metrics
//!
//! Operational metrics for the node, scraped at `/metrics` on the
//! configured metrics port.
//!
//! All metrics live in a dedicated [`prometheus::Registry`] (prefix
//! `novax`) so they never collide with default-registry consumers.
//! Transaction counters are fed by [`MeteredProvider`], which wraps the
//! chain provider the gateway talks through, so every write is counted
//! no matter which code path submitted it.

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder};

use novax_protocol::chain::{ChainError, ChainProvider, ContractCall, TransactionReceipt, ViewCall};

/// Holds all Prometheus metric handles for the node.
///
/// Clone-friendly (prometheus handles are internally ref-counted) so it
/// can be shared across request handlers and the provider wrapper.
#[derive(Clone)]
pub struct NodeMetrics {
    /// Registry that owns every metric below.
    registry: Registry,
    /// Total transactions submitted through the gateway.
    pub transactions_submitted_total: IntCounter,
    /// Total transactions that reverted on-chain.
    pub transactions_reverted_total: IntCounter,
    /// Total receivables tokenized on this chain.
    pub receivables_created_total: IntCounter,
    /// Number of pools currently in the Active (fundraising) state.
    pub pools_active: IntGauge,
    /// Current block height of the backing chain.
    pub block_height: IntGauge,
    /// Histogram of REST API request latency in seconds.
    pub request_latency_seconds: Histogram,
}

fn counter(registry: &Registry, name: &str, help: &str) -> IntCounter {
    let c = IntCounter::new(name, help).expect("metric creation");
    registry.register(Box::new(c.clone())).expect("metric registration");
    c
}

fn gauge(registry: &Registry, name: &str, help: &str) -> IntGauge {
    let g = IntGauge::new(name, help).expect("metric creation");
    registry.register(Box::new(g.clone())).expect("metric registration");
    g
}

impl NodeMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Self {
        let registry = Registry::new_custom(Some("novax".into()), None)
            .expect("failed to create prometheus registry");

        let transactions_submitted_total = counter(
            &registry,
            "transactions_submitted_total",
            "Total transactions submitted through the gateway",
        );
        let transactions_reverted_total = counter(
            &registry,
            "transactions_reverted_total",
            "Total transactions rejected by contract revert",
        );
        let receivables_created_total = counter(
            &registry,
            "receivables_created_total",
            "Total receivables tokenized",
        );
        let pools_active = gauge(
            &registry,
            "pools_active",
            "Pools currently open for investment",
        );
        let block_height = gauge(&registry, "block_height", "Current chain block height");

        let request_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "request_latency_seconds",
                "REST API request latency in seconds",
            )
            .buckets(vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
            ]),
        )
        .expect("metric creation");
        registry
            .register(Box::new(request_latency_seconds.clone()))
            .expect("metric registration");

        Self {
            registry,
            transactions_submitted_total,
            transactions_reverted_total,
            receivables_created_total,
            pools_active,
            block_height,
            request_latency_seconds,
        }
    }

    /// Encodes all registered metrics into the Prometheus text format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer).expect("prometheus output is valid utf-8"))
    }
}

impl Default for NodeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared metrics state passed to axum handlers via state.
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

/// A [`ChainProvider`] decorator that counts traffic.
///
/// Submits increment the transaction counters (reverted ones twice: once
/// as submitted, once as reverted), successful receipts advance the
/// block-height gauge, and `ReceivableCreated` events bump the
/// receivable counter. Views pass through untouched.
pub struct MeteredProvider {
    inner: Arc<dyn ChainProvider>,
    metrics: SharedMetrics,
}

impl MeteredProvider {
    pub fn new(inner: Arc<dyn ChainProvider>, metrics: SharedMetrics) -> Self {
        Self { inner, metrics }
    }
}

#[async_trait]
impl ChainProvider for MeteredProvider {
    async fn submit(&self, call: ContractCall) -> Result<TransactionReceipt, ChainError> {
        self.metrics.transactions_submitted_total.inc();
        match self.inner.submit(call).await {
            Ok(receipt) => {
                self.metrics.block_height.set(receipt.block_height as i64);
                if receipt.find_event("ReceivableCreated").is_some() {
                    self.metrics.receivables_created_total.inc();
                }
                Ok(receipt)
            }
            Err(e) => {
                if matches!(e, ChainError::Revert(_)) {
                    self.metrics.transactions_reverted_total.inc();
                }
                Err(e)
            }
        }
    }

    async fn view(&self, call: ViewCall) -> Result<serde_json::Value, ChainError> {
        self.inner.view(call).await
    }

    async fn chain_id_hex(&self) -> Result<String, ChainError> {
        self.inner.chain_id_hex().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use novax_contracts::chain::LocalChain;
    use novax_protocol::gateway::AddressBook;
    use serde_json::json;

    #[test]
    fn encode_includes_registered_metrics() {
        let metrics = NodeMetrics::new();
        metrics.transactions_submitted_total.inc();
        metrics.pools_active.set(3);

        let text = metrics.encode().expect("encode");
        assert!(text.contains("novax_transactions_submitted_total 1"));
        assert!(text.contains("novax_pools_active 3"));
        assert!(text.contains("novax_request_latency_seconds"));
    }

    #[tokio::test]
    async fn metered_provider_counts_submits_and_reverts() {
        let metrics = Arc::new(NodeMetrics::new());
        let chain = Arc::new(LocalChain::new(AddressBook::devnet(), "0xamc"));
        let provider = MeteredProvider::new(chain.clone(), metrics.clone());

        let addresses = AddressBook::devnet();
        let good = ContractCall::new(
            &addresses.receivable_factory,
            "createReceivable",
            "0xexporter",
            json!({
                "importer": "0ximporter",
                "amount_usd": "50000000",
                "due_date": chrono::Utc::now() + chrono::Duration::days(30),
                "metadata_cid": "QmDocs",
            }),
        );
        let receipt = provider.submit(good).await.expect("accepted");
        assert_eq!(metrics.transactions_submitted_total.get(), 1);
        assert_eq!(metrics.receivables_created_total.get(), 1);
        assert_eq!(metrics.block_height.get(), receipt.block_height as i64);

        // Zero-amount invoices revert on-chain.
        let bad = ContractCall::new(
            &addresses.receivable_factory,
            "createReceivable",
            "0xexporter",
            json!({
                "importer": "0ximporter",
                "amount_usd": "0",
                "due_date": chrono::Utc::now() + chrono::Duration::days(30),
                "metadata_cid": "QmDocs",
            }),
        );
        let err = provider.submit(bad).await.unwrap_err();
        assert!(matches!(err, ChainError::Revert(_)));
        assert_eq!(metrics.transactions_submitted_total.get(), 2);
        assert_eq!(metrics.transactions_reverted_total.get(), 1);
        assert_eq!(metrics.receivables_created_total.get(), 1);
    }
}
