//! Top-level configuration for a node.
//!
//! This aggregates:
//!
//! - turn-rotation timing (`TurnConfig`),
//! - metrics exporter settings (`MetricsConfig`).
//!
//! Binaries construct a single `NodeConfig` from defaults, files, or
//! environment as needed; the turn constants must match across every
//! node in the membership.

use std::net::SocketAddr;

use crate::consensus::TurnConfig;

/// Configuration for the Prometheus metrics exporter.
#[derive(Clone, Debug)]
pub struct MetricsConfig {
    /// Whether to run a `/metrics` HTTP exporter.
    pub enabled: bool,
    /// Address to bind the metrics HTTP server to.
    pub listen_addr: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        // Safe to unwrap: this is a fixed, valid address literal.
        let addr: SocketAddr = "127.0.0.1:9898"
            .parse()
            .expect("hard-coded metrics listen address should parse");
        Self {
            enabled: true,
            listen_addr: addr,
        }
    }
}

/// Top-level configuration for a node.
#[derive(Clone, Debug, Default)]
pub struct NodeConfig {
    pub turn: TurnConfig,
    pub metrics: MetricsConfig,
}
