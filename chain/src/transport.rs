//! Broadcast transport seam.
//!
//! The protocol assumes two logical broadcast topics, `messages` and
//! `blocks`, with best-effort, unordered, possibly-duplicate delivery to
//! all peers, including loopback to the publisher. [`Transport`] is the
//! narrow interface the node needs; [`InProcessBus`] implements it over
//! `tokio::sync::broadcast` channels for local clusters, the demo binary,
//! and tests. A networked deployment supplies its own implementation and
//! bridges into the same receiver types.

use std::fmt;

use tokio::sync::broadcast;

use crate::types::{Block, Message};

/// Error raised when a publish cannot be submitted to a topic.
///
/// Per the protocol's error handling, publishers log this and continue;
/// there are no retries and no acknowledgements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    topic: &'static str,
}

impl TransportError {
    pub fn new(topic: &'static str) -> Self {
        Self { topic }
    }

    /// The topic the failed publish was addressed to.
    pub fn topic(&self) -> &'static str {
        self.topic
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "broadcast failed on topic '{}'", self.topic)
    }
}

impl std::error::Error for TransportError {}

/// The two broadcast topics a node publishes to and subscribes from.
///
/// Subscriptions are independent receivers: every subscriber sees every
/// payload published after it subscribed, including the publisher's own.
pub trait Transport: Send + Sync {
    /// Broadcasts a chat message on the `messages` topic.
    fn publish_message(&self, message: Message) -> Result<(), TransportError>;

    /// Broadcasts a block on the `blocks` topic.
    fn publish_block(&self, block: Block) -> Result<(), TransportError>;

    /// Opens a subscription to the `messages` topic.
    fn subscribe_messages(&self) -> broadcast::Receiver<Message>;

    /// Opens a subscription to the `blocks` topic.
    fn subscribe_blocks(&self) -> broadcast::Receiver<Block>;
}

/// In-process broadcast bus backed by tokio channels.
#[derive(Clone)]
pub struct InProcessBus {
    messages: broadcast::Sender<Message>,
    blocks: broadcast::Sender<Block>,
}

impl InProcessBus {
    /// Creates a bus whose topics buffer up to `capacity` payloads per
    /// subscriber before slow receivers start lagging.
    pub fn new(capacity: usize) -> Self {
        let (messages, _) = broadcast::channel(capacity);
        let (blocks, _) = broadcast::channel(capacity);
        Self { messages, blocks }
    }
}

impl Default for InProcessBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl Transport for InProcessBus {
    fn publish_message(&self, message: Message) -> Result<(), TransportError> {
        self.messages
            .send(message)
            .map(|_| ())
            .map_err(|_| TransportError::new("messages"))
    }

    fn publish_block(&self, block: Block) -> Result<(), TransportError> {
        self.blocks
            .send(block)
            .map(|_| ())
            .map_err(|_| TransportError::new("blocks"))
    }

    fn subscribe_messages(&self) -> broadcast::Receiver<Message> {
        self.messages.subscribe()
    }

    fn subscribe_blocks(&self) -> broadcast::Receiver<Block> {
        self.blocks.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::generate_keypair;

    #[tokio::test]
    async fn all_subscribers_receive_including_publisher() {
        let bus = InProcessBus::default();
        let mut rx_a = bus.subscribe_messages();
        let mut rx_b = bus.subscribe_messages();

        let (_, sk) = generate_keypair();
        let msg = Message::create_at("hi", "alice", &sk, 1_000);
        bus.publish_message(msg.clone()).expect("subscribers exist");

        assert_eq!(rx_a.recv().await.expect("delivery"), msg);
        assert_eq!(rx_b.recv().await.expect("delivery"), msg);
    }

    #[tokio::test]
    async fn topics_are_independent() {
        let bus = InProcessBus::default();
        let mut blocks_rx = bus.subscribe_blocks();
        let _messages_rx = bus.subscribe_messages();

        let (_, sk) = generate_keypair();
        let msg = Message::create_at("hi", "alice", &sk, 1_000);
        bus.publish_message(msg).expect("messages topic live");

        let genesis = crate::types::Block::genesis();
        bus.publish_block(genesis.clone()).expect("blocks topic live");

        assert_eq!(blocks_rx.recv().await.expect("delivery"), genesis);
    }

    #[test]
    fn publish_without_subscribers_reports_failure() {
        let bus = InProcessBus::new(4);
        let (_, sk) = generate_keypair();
        let msg = Message::create_at("hi", "alice", &sk, 1_000);

        let err = bus.publish_message(msg).expect_err("no subscribers");
        assert_eq!(err.topic(), "messages");
    }
}
