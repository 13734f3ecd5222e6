//! Gateway configuration.
//!
//! This configures the HTTP listen address and the identity of the
//! embedded node. Turn timing and metrics settings come from
//! `pot_chain::NodeConfig::default()`.

use std::net::SocketAddr;

/// Configuration for the gateway HTTP server and its embedded node.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP server to.
    pub listen_addr: SocketAddr,
    /// Identity of the embedded node.
    ///
    /// The default deployment is a single-member network, so this node is
    /// the sole peer and perpetually holds the turn; messages posted via
    /// the API are committed at each turn end.
    pub node_id: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        // Safe to unwrap: fixed, valid address literal.
        // Bind to all interfaces so a container port mapping is reachable
        // from the host.
        let addr: SocketAddr = "0.0.0.0:8081"
            .parse()
            .expect("hard-coded API listen address should parse");
        Self {
            listen_addr: addr,
            node_id: "gateway".to_string(),
        }
    }
}
