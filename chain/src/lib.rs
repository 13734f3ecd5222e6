//! Proof-of-Turn core library.
//!
//! This crate provides the building blocks of a Proof-of-Turn node: a
//! fixed-membership group of peers takes fixed-length turns appending
//! Ed25519-signed chat messages to a hash-chained, append-only log.
//!
//! - cryptographic facade (`crypto`),
//! - signed messages and typed blocks (`types`),
//! - the validated append-only chain (`chain`),
//! - the observed-message pool with inclusion tracking (`pool`),
//! - the turn-rotation state machine (`consensus`),
//! - the per-node actor and its public handle (`node`),
//! - the broadcast transport seam (`transport`),
//! - Prometheus-based metrics (`metrics`),
//! - and top-level node configuration (`config`).
//!
//! Higher-level binaries compose these pieces into demo clusters and
//! gateways.

pub mod chain;
pub mod config;
pub mod consensus;
pub mod crypto;
pub mod metrics;
pub mod node;
pub mod pool;
pub mod transport;
pub mod types;

// Re-export top-level configuration types.
pub use config::{MetricsConfig, NodeConfig};

// Re-export "core" consensus types.
pub use consensus::{Membership, NodeError, NodeStatus, Rotation, TurnConfig, TurnManager, TurnPhase};

// Re-export the chain and pool state.
pub use chain::{Blockchain, ChainError};
pub use pool::MessagePool;

// Re-export the node actor surface.
pub use node::{Node, NodeHandle};

// Re-export the transport seam.
pub use transport::{InProcessBus, Transport, TransportError};

// Re-export metrics registry and exporter.
pub use metrics::{MetricsRegistry, NodeMetrics, run_prometheus_http_server};

// Re-export domain types at the crate root for convenience.
pub use types::*;
