//! Prometheus-backed metrics and HTTP exporter.
//!
//! [`MetricsRegistry`] owns a Prometheus registry plus the node-level
//! metric group; [`run_prometheus_http_server`] serves `GET /metrics`
//! in text exposition format over `hyper`.

use std::{convert::Infallible, net::SocketAddr, sync::Arc};

use bytes::Bytes;
use http_body_util::Full;
use hyper::{
    Method, Request, Response, StatusCode, body::Incoming, header, server::conn::http1,
    service::service_fn,
};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

use prometheus::{
    self, Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry, TextEncoder,
};

/// Node-level Prometheus metrics.
///
/// Updated from the node event loop as it pools messages, ingests and
/// produces blocks, and rotates turns.
#[derive(Clone)]
pub struct NodeMetrics {
    /// Valid messages accepted into the pool.
    pub messages_pooled: IntCounter,
    /// Inbound messages dropped (unknown author or bad signature).
    pub messages_rejected: IntCounter,
    /// Blocks appended to the local chain, local and remote production.
    pub blocks_appended: IntCounter,
    /// Inbound blocks dropped (signature or structural failure).
    pub blocks_rejected: IntCounter,
    /// Recovery blocks this node produced when taking a turn.
    pub recovery_blocks_produced: IntCounter,
    /// Turns this node served as leader.
    pub turns_led: IntCounter,
    /// Current local chain length, genesis included.
    pub chain_length: IntGauge,
    /// Messages currently pending (observed but not seen committed).
    pub pool_pending: IntGauge,
    /// Latency of inbound block verification + append, in seconds.
    pub block_ingest_seconds: Histogram,
}

impl NodeMetrics {
    /// Registers the node metrics into the given `Registry`.
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let messages_pooled = IntCounter::with_opts(Opts::new(
            "node_messages_pooled_total",
            "Valid messages accepted into the local pool",
        ))?;
        registry.register(Box::new(messages_pooled.clone()))?;

        let messages_rejected = IntCounter::with_opts(Opts::new(
            "node_messages_rejected_total",
            "Inbound messages dropped for unknown author or bad signature",
        ))?;
        registry.register(Box::new(messages_rejected.clone()))?;

        let blocks_appended = IntCounter::with_opts(Opts::new(
            "node_blocks_appended_total",
            "Blocks appended to the local chain",
        ))?;
        registry.register(Box::new(blocks_appended.clone()))?;

        let blocks_rejected = IntCounter::with_opts(Opts::new(
            "node_blocks_rejected_total",
            "Inbound blocks dropped for signature or structural failure",
        ))?;
        registry.register(Box::new(blocks_rejected.clone()))?;

        let recovery_blocks_produced = IntCounter::with_opts(Opts::new(
            "node_recovery_blocks_produced_total",
            "Lost-message recovery blocks produced by this node",
        ))?;
        registry.register(Box::new(recovery_blocks_produced.clone()))?;

        let turns_led = IntCounter::with_opts(Opts::new(
            "node_turns_led_total",
            "Turns this node served as leader",
        ))?;
        registry.register(Box::new(turns_led.clone()))?;

        let chain_length = IntGauge::with_opts(Opts::new(
            "node_chain_length",
            "Current local chain length, genesis included",
        ))?;
        registry.register(Box::new(chain_length.clone()))?;

        let pool_pending = IntGauge::with_opts(Opts::new(
            "node_pool_pending",
            "Messages observed but not yet seen committed",
        ))?;
        registry.register(Box::new(pool_pending.clone()))?;

        let block_ingest_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "node_block_ingest_seconds",
                "Time to verify and append an inbound block, in seconds",
            )
            .buckets(vec![
                0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25,
            ]),
        )?;
        registry.register(Box::new(block_ingest_seconds.clone()))?;

        Ok(Self {
            messages_pooled,
            messages_rejected,
            blocks_appended,
            blocks_rejected,
            recovery_blocks_produced,
            turns_led,
            chain_length,
            pool_pending,
            block_ingest_seconds,
        })
    }
}

/// Wrapper around a Prometheus registry and the node metrics.
///
/// Wrap it in an [`Arc`] and share it between the node event loop and
/// the exporter task.
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Registry,
    pub node: NodeMetrics,
}

impl MetricsRegistry {
    /// Creates a registry with the `pot` namespace and the node metrics
    /// registered.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("pot".to_string()), None)?;
        let node = NodeMetrics::register(&registry)?;
        Ok(Self { registry, node })
    }

    /// Encodes all metrics into the Prometheus text format.
    pub fn gather_text(&self) -> String {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            tracing::warn!("failed to encode Prometheus metrics: {e}");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

/// Runs an HTTP server that exposes Prometheus metrics.
///
/// Listens on `addr` and serves `GET /metrics`; all other paths return
/// 404. Intended to be spawned onto the runtime next to the node:
///
/// ```ignore
/// let registry = Arc::new(MetricsRegistry::new()?);
/// let addr: SocketAddr = "127.0.0.1:9898".parse()?;
/// tokio::spawn(run_prometheus_http_server(registry.clone(), addr));
/// ```
pub async fn run_prometheus_http_server(
    metrics: Arc<MetricsRegistry>,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let svc = service_fn(move |req| {
                let metrics = metrics.clone();
                handle_request(req, metrics)
            });

            if let Err(err) = http1::Builder::new().serve_connection(io, svc).await {
                tracing::warn!("metrics exporter connection error: {err}");
            }
        });
    }
}

async fn handle_request(
    req: Request<Incoming>,
    metrics: Arc<MetricsRegistry>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let response = match (req.method(), req.uri().path()) {
        (&Method::GET, "/metrics") => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "text/plain; version=0.0.4")
            .body(Full::new(Bytes::from(metrics.gather_text()))),
        _ => Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Full::new(Bytes::from("not found"))),
    };
    Ok(response.expect("static response parts are valid"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::Registry;

    #[test]
    fn node_metrics_register_and_record() {
        let registry = Registry::new();
        let metrics = NodeMetrics::register(&registry).expect("register metrics");

        metrics.messages_pooled.inc();
        metrics.blocks_appended.inc();
        metrics.chain_length.set(2);
        metrics.block_ingest_seconds.observe(0.002);

        assert!(!registry.gather().is_empty());
    }

    #[test]
    fn metrics_registry_gathers_namespaced_text() {
        let registry = MetricsRegistry::new().expect("create metrics registry");
        registry.node.turns_led.inc();

        let text = registry.gather_text();
        assert!(text.contains("pot_node_turns_led_total"));
    }
}
