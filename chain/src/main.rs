// src/main.rs
//
// Minimal demo cluster that wires up the pot-chain library:
//
// - three peers over an in-process broadcast bus
// - Prometheus metrics exporter on /metrics (first node's registry)
// - a simple loop that authors one message per turn from a rotating
//   peer and prints the resulting chain growth.

use std::{collections::HashMap, sync::Arc, time::Duration};

use pot_chain::{
    // Domain types
    NodeId,
    // Consensus
    Membership,
    // Node actor
    Node,
    NodeHandle,
    // Metrics
    MetricsRegistry,
    run_prometheus_http_server,
    // Config + transport
    NodeConfig,
    InProcessBus,
    Transport,
    // Crypto
    crypto,
};

#[tokio::main]
async fn main() {
    if let Err(err) = run_cluster().await {
        eprintln!("fatal error: {err}");
        std::process::exit(1);
    }
}

async fn run_cluster() -> Result<(), String> {
    // For now, just use defaults. Later you can load from a file/CLI/env.
    let cfg = NodeConfig::default();
    let peer_ids = ["alice", "bob", "carol"];

    // ---------------------------
    // Keys + shared membership
    // ---------------------------

    let mut public_keys = HashMap::new();
    let mut signing_keys = Vec::new();
    for id in peer_ids {
        let (pk, sk) = crypto::generate_keypair();
        public_keys.insert(id.to_string(), pk);
        signing_keys.push(sk);
    }
    let peers: Vec<NodeId> = peer_ids.iter().map(|s| s.to_string()).collect();

    // ---------------------------
    // Broadcast bus
    // ---------------------------

    let bus = Arc::new(InProcessBus::default());

    // ---------------------------
    // Nodes (+ exporter on the first node's registry)
    // ---------------------------

    let mut handles: Vec<NodeHandle> = Vec::new();
    for (i, id) in peer_ids.iter().enumerate() {
        let metrics = Arc::new(
            MetricsRegistry::new()
                .map_err(|e| format!("failed to initialise metrics registry: {e}"))?,
        );

        if i == 0 && cfg.metrics.enabled {
            let metrics_clone = metrics.clone();
            let addr = cfg.metrics.listen_addr;
            tokio::spawn(async move {
                if let Err(e) = run_prometheus_http_server(metrics_clone, addr).await {
                    eprintln!("metrics HTTP server error: {e}");
                }
            });
            eprintln!("metrics exporter listening on http://{addr}/metrics");
        }

        let membership = Membership::new(peers.clone(), public_keys.clone());
        let (handle, _task) = Node::spawn(
            id.to_string(),
            membership,
            signing_keys.remove(0),
            cfg.turn.clone(),
            bus.clone() as Arc<dyn Transport>,
            metrics,
        );
        handles.push(handle);
    }

    let turn = Duration::from_millis(cfg.turn.turn_duration_ms + cfg.turn.transition_duration_ms);
    eprintln!(
        "cluster of {} running with turn_duration_ms={} transition_duration_ms={}",
        handles.len(),
        cfg.turn.turn_duration_ms,
        cfg.turn.transition_duration_ms,
    );

    // ---------------------------
    // Author loop: one message per turn, rotating through the peers
    // ---------------------------

    let mut round = 0u64;
    loop {
        let author = &handles[(round % handles.len() as u64) as usize];
        let content = format!("round {round} from {}", author.node_id());

        match author.send_message(content).await {
            Ok(message_id) => {
                println!("sent message {message_id} via {}", author.node_id());
            }
            Err(e) => eprintln!("send failed on {}: {e}", author.node_id()),
        }

        tokio::time::sleep(turn).await;

        for handle in &handles {
            match handle.get_state().await {
                Ok(state) => println!(
                    "{}: phase={} leader={} chain_length={} pending={}",
                    state.node_id,
                    state.phase,
                    state.current_leader,
                    state.blockchain_length,
                    state.pending_messages,
                ),
                Err(e) => eprintln!("state query failed: {e}"),
            }
        }

        round += 1;
    }
}
