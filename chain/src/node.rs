//! The node actor: a single-consumer event loop around [`TurnManager`].
//!
//! Every node is one logical actor with a serialized mailbox: inbound
//! broadcasts, timer expirations, the cleanup tick, and control requests
//! all become [`NodeEvent`]s on one `mpsc` queue and are processed to
//! completion, one at a time. The turn and transition timers are spawned
//! tasks that post their event into the same queue and are aborted when
//! the phase they belong to is left early.
//!
//! [`NodeHandle`] is the public face: `send_message`, `get_blockchain`,
//! `get_state`, and `shutdown`, all answered through oneshot replies.

use std::sync::Arc;
use std::time::Duration;

use ed25519_dalek::SigningKey;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};
use tracing::{debug, warn};

use crate::chain::Blockchain;
use crate::consensus::{Membership, NodeError, NodeStatus, Rotation, TurnConfig, TurnManager, TurnPhase};
use crate::metrics::MetricsRegistry;
use crate::transport::Transport;
use crate::types::{now_ms, Block, Message, NodeId};

/// Mailbox depth; beyond this, producers briefly backpressure.
const MAILBOX_CAPACITY: usize = 256;

/// Everything a node reacts to, as one typed sum.
pub enum NodeEvent {
    /// A message arrived on the `messages` topic.
    Message(Message),
    /// A block arrived on the `blocks` topic.
    Block(Block),
    /// The current turn elapsed.
    TurnTimeout,
    /// The transition interval elapsed.
    TransitionTimeout,
    /// Periodic pool eviction.
    Cleanup,
    /// A request from a [`NodeHandle`].
    Control(Control),
}

/// Requests issued through a [`NodeHandle`].
pub enum Control {
    SendMessage {
        content: String,
        reply: oneshot::Sender<Result<String, NodeError>>,
    },
    GetChain {
        reply: oneshot::Sender<Blockchain>,
    },
    GetStatus {
        reply: oneshot::Sender<NodeStatus>,
    },
    Shutdown,
}

/// Cloneable handle for interacting with a running node.
#[derive(Clone)]
pub struct NodeHandle {
    node_id: NodeId,
    events_tx: mpsc::Sender<NodeEvent>,
}

impl NodeHandle {
    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    /// Authors, signs, and broadcasts a message.
    ///
    /// `Ok` means the broadcast was submitted, not that the message is
    /// committed; inclusion happens at a leader's turn end.
    pub async fn send_message(&self, content: impl Into<String>) -> Result<String, NodeError> {
        let (reply, rx) = oneshot::channel();
        self.request(Control::SendMessage {
            content: content.into(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| NodeError::Mailbox)?
    }

    /// Snapshot of the node's local blockchain.
    pub async fn get_blockchain(&self) -> Result<Blockchain, NodeError> {
        let (reply, rx) = oneshot::channel();
        self.request(Control::GetChain { reply }).await?;
        rx.await.map_err(|_| NodeError::Mailbox)
    }

    /// Snapshot of the node's rotation state.
    pub async fn get_state(&self) -> Result<NodeStatus, NodeError> {
        let (reply, rx) = oneshot::channel();
        self.request(Control::GetStatus { reply }).await?;
        rx.await.map_err(|_| NodeError::Mailbox)
    }

    /// Stops the event loop; timers are cancelled, in-flight handlers run
    /// to completion.
    pub async fn shutdown(&self) -> Result<(), NodeError> {
        self.request(Control::Shutdown).await
    }

    async fn request(&self, control: Control) -> Result<(), NodeError> {
        self.events_tx
            .send(NodeEvent::Control(control))
            .await
            .map_err(|_| NodeError::Mailbox)
    }
}

/// A running node: the turn state machine plus its I/O shell.
pub struct Node {
    manager: TurnManager,
    transport: Arc<dyn Transport>,
    metrics: Arc<MetricsRegistry>,
    events_tx: mpsc::Sender<NodeEvent>,
    events_rx: mpsc::Receiver<NodeEvent>,
    turn_timer: Option<JoinHandle<()>>,
    transition_timer: Option<JoinHandle<()>>,
}

impl Node {
    /// Spawns a node onto the runtime and returns its handle plus the
    /// join handle of the event loop task.
    ///
    /// The node subscribes to both topics before the loop starts, so no
    /// broadcast published afterwards is missed.
    pub fn spawn(
        node_id: impl Into<NodeId>,
        membership: Membership,
        signing_key: SigningKey,
        config: TurnConfig,
        transport: Arc<dyn Transport>,
        metrics: Arc<MetricsRegistry>,
    ) -> (NodeHandle, JoinHandle<()>) {
        let node_id = node_id.into();
        let (events_tx, events_rx) = mpsc::channel(MAILBOX_CAPACITY);

        forward_topic(transport.subscribe_messages(), events_tx.clone(), NodeEvent::Message);
        forward_topic(transport.subscribe_blocks(), events_tx.clone(), NodeEvent::Block);

        let manager = TurnManager::new(node_id.clone(), membership, signing_key, config);
        let node = Node {
            manager,
            transport,
            metrics,
            events_tx: events_tx.clone(),
            events_rx,
            turn_timer: None,
            transition_timer: None,
        };

        let task = tokio::spawn(node.run());
        (NodeHandle { node_id, events_tx }, task)
    }

    async fn run(mut self) {
        let produced = self.manager.init(now_ms());
        if self.manager.is_leader() {
            self.metrics.node.turns_led.inc();
        }
        self.broadcast_blocks(produced);
        // Every node tracks the rotation clock, leader or not; only the
        // leader drains on expiry.
        self.arm_turn_timer();

        let cleanup_period = Duration::from_millis(self.manager.config().cleanup_interval_ms);
        let mut cleanup = interval_at(Instant::now() + cleanup_period, cleanup_period);

        loop {
            tokio::select! {
                maybe_event = self.events_rx.recv() => {
                    let Some(event) = maybe_event else { break };
                    if self.on_event(event) {
                        break;
                    }
                }
                _ = cleanup.tick() => {
                    if self.on_event(NodeEvent::Cleanup) {
                        break;
                    }
                }
            }
        }

        self.cancel_turn_timer();
        self.cancel_transition_timer();
        debug!(node = %self.manager.node_id(), "event loop stopped");
    }

    /// Dispatches one event. Returns `true` when the node should stop.
    fn on_event(&mut self, event: NodeEvent) -> bool {
        match event {
            NodeEvent::Message(message) => self.on_message(message),
            NodeEvent::Block(block) => self.on_block(block),
            NodeEvent::TurnTimeout => self.on_turn_timeout(),
            NodeEvent::TransitionTimeout => self.on_transition_timeout(),
            NodeEvent::Cleanup => {
                self.manager.cleanup(now_ms());
                self.update_gauges();
            }
            NodeEvent::Control(control) => return self.on_control(control),
        }
        false
    }

    fn on_message(&mut self, message: Message) {
        let author = message.author_id.clone();
        match self.manager.handle_message(message, now_ms()) {
            Ok(()) => self.metrics.node.messages_pooled.inc(),
            Err(e) => {
                self.metrics.node.messages_rejected.inc();
                warn!(node = %self.manager.node_id(), %author, "dropping message: {e}");
            }
        }
        self.update_gauges();
    }

    fn on_block(&mut self, block: Block) {
        let author = block.author_id.clone();
        let started = std::time::Instant::now();
        match self.manager.handle_block(block) {
            Ok(()) => {
                self.metrics.node.blocks_appended.inc();
                self.metrics
                    .node
                    .block_ingest_seconds
                    .observe(started.elapsed().as_secs_f64());
            }
            Err(e) => {
                self.metrics.node.blocks_rejected.inc();
                warn!(node = %self.manager.node_id(), %author, "dropping block: {e}");
            }
        }
        self.update_gauges();
    }

    fn on_turn_timeout(&mut self) {
        if self.manager.phase() == TurnPhase::Transition {
            debug!(node = %self.manager.node_id(), "stale turn timeout ignored");
            return;
        }

        let produced = self.manager.on_turn_timeout(now_ms());
        self.broadcast_blocks(produced);

        self.cancel_turn_timer();
        self.arm_transition_timer();
        self.update_gauges();
    }

    fn on_transition_timeout(&mut self) {
        if self.manager.phase() != TurnPhase::Transition {
            debug!(node = %self.manager.node_id(), "stale transition timeout ignored");
            return;
        }

        match self.manager.complete_transition(now_ms()) {
            Rotation::Leading(produced) => {
                self.metrics.node.turns_led.inc();
                self.metrics
                    .node
                    .recovery_blocks_produced
                    .inc_by(produced.len() as u64);
                self.broadcast_blocks(produced);
            }
            Rotation::Waiting => {}
        }

        self.cancel_transition_timer();
        self.arm_turn_timer();
        self.update_gauges();
    }

    fn on_control(&mut self, control: Control) -> bool {
        match control {
            Control::SendMessage { content, reply } => {
                let message = self.manager.author_message(content, now_ms());
                let message_id = message.message_id.clone();
                let result = match self.transport.publish_message(message) {
                    Ok(()) => {
                        self.metrics.node.messages_pooled.inc();
                        Ok(message_id)
                    }
                    Err(e) => {
                        warn!(node = %self.manager.node_id(), "message broadcast failed: {e}");
                        Err(NodeError::Transport(e))
                    }
                };
                let _ = reply.send(result);
                self.update_gauges();
                false
            }
            Control::GetChain { reply } => {
                let _ = reply.send(self.manager.chain().clone());
                false
            }
            Control::GetStatus { reply } => {
                let _ = reply.send(self.manager.status());
                false
            }
            Control::Shutdown => true,
        }
    }

    /// Broadcasts locally produced blocks; failures are logged and not
    /// retried.
    fn broadcast_blocks(&self, blocks: Vec<Block>) {
        for block in blocks {
            if let Err(e) = self.transport.publish_block(block) {
                warn!(node = %self.manager.node_id(), "block broadcast failed: {e}");
            }
        }
    }

    fn arm_turn_timer(&mut self) {
        self.cancel_turn_timer();
        self.turn_timer = Some(post_after(
            self.events_tx.clone(),
            Duration::from_millis(self.manager.config().turn_duration_ms),
            || NodeEvent::TurnTimeout,
        ));
    }

    fn arm_transition_timer(&mut self) {
        self.cancel_transition_timer();
        self.transition_timer = Some(post_after(
            self.events_tx.clone(),
            Duration::from_millis(self.manager.config().transition_duration_ms),
            || NodeEvent::TransitionTimeout,
        ));
    }

    fn cancel_turn_timer(&mut self) {
        if let Some(timer) = self.turn_timer.take() {
            timer.abort();
        }
    }

    fn cancel_transition_timer(&mut self) {
        if let Some(timer) = self.transition_timer.take() {
            timer.abort();
        }
    }

    fn update_gauges(&self) {
        self.metrics
            .node
            .chain_length
            .set(self.manager.chain().length() as i64);
        self.metrics
            .node
            .pool_pending
            .set(self.manager.pool().pending_count() as i64);
    }
}

/// One-shot timer task: sleeps, then posts an event into the mailbox.
fn post_after(
    events_tx: mpsc::Sender<NodeEvent>,
    after: Duration,
    make_event: impl FnOnce() -> NodeEvent + Send + 'static,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(after).await;
        let _ = events_tx.send(make_event()).await;
    })
}

/// Pipes a broadcast topic into the node mailbox so that every external
/// input flows through the single serialized queue.
fn forward_topic<T: Clone + Send + 'static>(
    mut rx: tokio::sync::broadcast::Receiver<T>,
    events_tx: mpsc::Sender<NodeEvent>,
    wrap: impl Fn(T) -> NodeEvent + Send + 'static,
) {
    use tokio::sync::broadcast::error::RecvError;

    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(payload) => {
                    if events_tx.send(wrap(payload)).await.is_err() {
                        break; // node stopped
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "broadcast subscriber lagged; payloads dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::generate_keypair;
    use crate::transport::InProcessBus;
    use crate::types::BlockData;

    use std::collections::HashMap;

    async fn spawn_cluster(ids: &[&str]) -> Vec<NodeHandle> {
        let bus = Arc::new(InProcessBus::default());

        let mut keys = HashMap::new();
        let mut signing = Vec::new();
        for id in ids {
            let (pk, sk) = generate_keypair();
            keys.insert(id.to_string(), pk);
            signing.push(sk);
        }
        let peers: Vec<NodeId> = ids.iter().map(|s| s.to_string()).collect();

        ids.iter()
            .zip(signing)
            .map(|(id, sk)| {
                let membership = Membership::new(peers.clone(), keys.clone());
                let metrics =
                    Arc::new(MetricsRegistry::new().expect("metrics registry initialises"));
                let (handle, _task) = Node::spawn(
                    id.to_string(),
                    membership,
                    sk,
                    TurnConfig::default(),
                    bus.clone() as Arc<dyn Transport>,
                    metrics,
                );
                handle
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn message_is_committed_on_every_node_after_one_turn() {
        let handles = spawn_cluster(&["alice", "bob", "carol"]).await;

        let message_id = handles[0]
            .send_message("hi")
            .await
            .expect("broadcast submitted");
        assert!(!message_id.is_empty());

        // Past the turn boundary: alice drained, followers appended.
        tokio::time::sleep(Duration::from_millis(31_000)).await;

        for handle in &handles {
            let chain = handle.get_blockchain().await.expect("node alive");
            assert_eq!(chain.length(), 2, "node {}", handle.node_id());
            let head = chain.latest();
            assert_eq!(head.author_id, "alice");
            match &head.data {
                BlockData::ChatMessage(m) => assert_eq!(m.message_id, message_id),
                other => panic!("unexpected payload: {other:?}"),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn leadership_rotates_after_transition() {
        let handles = spawn_cluster(&["alice", "bob", "carol"]).await;

        let state = handles[1].get_state().await.expect("node alive");
        assert_eq!(state.current_leader, "alice");

        // Past turn end + transition on every node.
        tokio::time::sleep(Duration::from_millis(36_000)).await;

        for handle in &handles {
            let state = handle.get_state().await.expect("node alive");
            assert_eq!(state.current_leader, "bob", "node {}", handle.node_id());
        }

        let alice = handles[0].get_state().await.expect("node alive");
        let bob = handles[1].get_state().await.expect("node alive");
        assert_eq!(alice.phase, TurnPhase::Waiting);
        assert_eq!(bob.phase, TurnPhase::Leading);
    }

    #[tokio::test(start_paused = true)]
    async fn follower_message_survives_two_turns() {
        let handles = spawn_cluster(&["alice", "bob"]).await;

        // Authored by the follower during alice's turn.
        let message_id = handles[1]
            .send_message("hello from bob")
            .await
            .expect("broadcast submitted");

        // Two full rotations: committed by alice's drain (or bob's
        // recovery, had she missed it), never twice.
        tokio::time::sleep(Duration::from_millis(72_000)).await;

        for handle in &handles {
            let chain = handle.get_blockchain().await.expect("node alive");
            let commits = chain
                .chronological()
                .iter()
                .filter(|b| match &b.data {
                    BlockData::ChatMessage(m) => m.message_id == message_id,
                    BlockData::LostMessageRecovery { recovered_messages, .. } => {
                        recovered_messages.iter().any(|m| m.message_id == message_id)
                    }
                    _ => false,
                })
                .count();
            assert_eq!(commits, 1, "node {}", handle.node_id());

            let state = handle.get_state().await.expect("node alive");
            assert_eq!(state.pending_messages, 0);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_the_event_loop() {
        let handles = spawn_cluster(&["alice"]).await;

        handles[0].shutdown().await.expect("shutdown accepted");
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(matches!(
            handles[0].get_state().await,
            Err(NodeError::Mailbox)
        ));
    }
}
