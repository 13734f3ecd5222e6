//! Metrics and instrumentation for the node.
//!
//! Prometheus-compatible metrics for message/block flow and turn
//! rotation, plus a small HTTP exporter serving `/metrics` in text
//! exposition format.
//!
//! Typical usage in a node binary:
//!
//! ```ignore
//! use std::net::SocketAddr;
//! use std::sync::Arc;
//! use pot_chain::metrics::{MetricsRegistry, run_prometheus_http_server};
//!
//! let registry = Arc::new(MetricsRegistry::new()?);
//! let addr: SocketAddr = "127.0.0.1:9898".parse()?;
//! tokio::spawn(run_prometheus_http_server(registry.clone(), addr));
//!
//! // Elsewhere in the code:
//! registry.node.blocks_appended.inc();
//! ```

pub mod prometheus;

pub use prometheus::{MetricsRegistry, NodeMetrics, run_prometheus_http_server};
