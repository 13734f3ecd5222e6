//! The turn-rotation state machine.
//!
//! [`TurnManager`] is the synchronous core of a node: it owns the local
//! blockchain, the message pool, the rotation state, and the node's
//! signing key, and exposes one method per protocol event. It performs no
//! I/O and never reads the clock itself: every entry point takes an
//! explicit `now` in milliseconds, which keeps the whole state machine
//! deterministic under test. The async node loop drives it and
//! broadcasts whatever blocks it returns.
//!
//! All peers run the same machine with the same constants and the same
//! initial leader index, so their rotations stay approximately aligned
//! without any leader-election traffic. Only the current leader produces
//! blocks; followers track the rotation so their `current_leader` view
//! stays correct.

use serde::{Deserialize, Serialize};

use ed25519_dalek::SigningKey;
use tracing::{debug, info, warn};

use crate::chain::Blockchain;
use crate::pool::MessagePool;
use crate::types::{Block, BlockData, Message, NodeId};

use super::config::TurnConfig;
use super::error::NodeError;
use super::membership::Membership;
use super::turn::TurnPhase;

/// Snapshot returned by a node's `get_state` operation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeStatus {
    pub node_id: NodeId,
    pub phase: TurnPhase,
    pub current_leader: NodeId,
    pub blockchain_length: usize,
    pub pending_messages: usize,
}

/// Outcome of completing a transition: either this node took the turn
/// (carrying any recovery blocks to broadcast) or it keeps waiting.
#[derive(Debug)]
pub enum Rotation {
    Leading(Vec<Block>),
    Waiting,
}

/// Per-node rotation state machine.
pub struct TurnManager {
    node_id: NodeId,
    membership: Membership,
    signing_key: SigningKey,
    config: TurnConfig,
    leader_index: usize,
    phase: TurnPhase,
    turn_start_time: u64,
    chain: Blockchain,
    pool: MessagePool,
}

impl TurnManager {
    /// Creates a manager at the shared initial rotation state
    /// (`leader_index = 0`, phase waiting, fresh chain and pool).
    ///
    /// Call [`TurnManager::init`] once the node is ready to run; it takes
    /// the first turn if this node heads the peer list.
    pub fn new(
        node_id: impl Into<NodeId>,
        membership: Membership,
        signing_key: SigningKey,
        config: TurnConfig,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            membership,
            signing_key,
            config,
            leader_index: 0,
            phase: TurnPhase::Waiting,
            turn_start_time: 0,
            chain: Blockchain::new(),
            pool: MessagePool::new(),
        }
    }

    /// Enters the rotation: starts the first turn if this node is the
    /// initial leader. Returns blocks to broadcast (recovery, possibly).
    pub fn init(&mut self, now: u64) -> Vec<Block> {
        if self.is_leader() {
            self.start_turn(now)
        } else {
            self.phase = TurnPhase::Waiting;
            Vec::new()
        }
    }

    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    /// The peer currently authorized to produce blocks.
    pub fn current_leader(&self) -> &NodeId {
        self.membership.leader_at(self.leader_index)
    }

    /// Whether this node is the current leader.
    pub fn is_leader(&self) -> bool {
        self.current_leader() == &self.node_id
    }

    /// When this node last entered `leading`, in milliseconds since
    /// epoch; 0 if it has never led.
    pub fn turn_start_time(&self) -> u64 {
        self.turn_start_time
    }

    /// Read access to the local chain.
    pub fn chain(&self) -> &Blockchain {
        &self.chain
    }

    /// Read access to the local pool.
    pub fn pool(&self) -> &MessagePool {
        &self.pool
    }

    /// Timing parameters this node runs with.
    pub fn config(&self) -> &TurnConfig {
        &self.config
    }

    /// Authors and signs a message, adding it to the local pool.
    ///
    /// The caller broadcasts the returned message; inclusion happens at a
    /// leader's turn end, not here.
    pub fn author_message(&mut self, content: impl Into<String>, now: u64) -> Message {
        let message = Message::create_at(content, self.node_id.clone(), &self.signing_key, now);
        self.pool.add_at(message.clone(), now);
        message
    }

    /// Takes the turn: runs the recovery scan, then enters `leading`.
    ///
    /// Returns the recovery block (if the scan found anything) for
    /// broadcast; it is already appended locally and marked included.
    pub fn start_turn(&mut self, now: u64) -> Vec<Block> {
        let produced = self.recovery_scan(now);

        self.phase = TurnPhase::Leading;
        self.turn_start_time = now;
        info!(
            node = %self.node_id,
            height = self.chain.length(),
            "taking turn as leader"
        );
        produced
    }

    /// Handles the turn timeout: the leader drains its pending pool into
    /// singleton chat blocks; every node then enters the transition
    /// phase. Returns the produced blocks for broadcast.
    pub fn on_turn_timeout(&mut self, now: u64) -> Vec<Block> {
        let produced = if self.phase == TurnPhase::Leading && self.is_leader() {
            self.publish_pending_messages(now)
        } else {
            Vec::new()
        };

        self.phase = TurnPhase::Transition;
        produced
    }

    /// Handles the transition timeout: advances the rotation and takes
    /// the turn if it now points at this node.
    pub fn complete_transition(&mut self, now: u64) -> Rotation {
        self.leader_index = (self.leader_index + 1) % self.membership.len();
        debug!(
            node = %self.node_id,
            leader = %self.current_leader(),
            "rotation advanced"
        );

        if self.is_leader() {
            Rotation::Leading(self.start_turn(now))
        } else {
            self.phase = TurnPhase::Waiting;
            Rotation::Waiting
        }
    }

    /// Inbound `messages` topic handler: verify, then pool.
    pub fn handle_message(&mut self, message: Message, now: u64) -> Result<(), NodeError> {
        let Some(key) = self.membership.key_of(&message.author_id) else {
            return Err(NodeError::UnknownAuthor(message.author_id));
        };
        if !message.verify(key) {
            return Err(NodeError::BadSignature(message.author_id));
        }
        self.pool.add_at(message, now);
        Ok(())
    }

    /// Inbound `blocks` topic handler: verify signature, append, and mark
    /// any committed messages as included.
    ///
    /// Duplicate deliveries (the leader's own echo included) fail the
    /// structural check because the head has already moved, which is the
    /// idempotence the broadcast contract requires.
    pub fn handle_block(&mut self, block: Block) -> Result<(), NodeError> {
        let Some(key) = self.membership.key_of(&block.author_id) else {
            return Err(NodeError::UnknownAuthor(block.author_id));
        };
        if !block.verify_signature(key) {
            return Err(NodeError::BadSignature(block.author_id));
        }

        let committed: Vec<String> = match &block.data {
            BlockData::ChatMessage(msg) => vec![msg.message_id.clone()],
            BlockData::LostMessageRecovery { recovered_messages, .. } => recovered_messages
                .iter()
                .map(|m| m.message_id.clone())
                .collect(),
            _ => Vec::new(),
        };

        self.chain.add_block(block)?;
        for id in &committed {
            self.pool.mark_included(id);
        }
        Ok(())
    }

    /// Evicts pool entries past the retention window. Returns the count.
    pub fn cleanup(&mut self, now: u64) -> usize {
        let evicted = self
            .pool
            .cleanup_at(self.config.message_retention_ms, now);
        if evicted > 0 {
            debug!(node = %self.node_id, evicted, "pool cleanup");
        }
        evicted
    }

    /// State snapshot for the `get_state` operation.
    pub fn status(&self) -> NodeStatus {
        NodeStatus {
            node_id: self.node_id.clone(),
            phase: self.phase,
            current_leader: self.current_leader().clone(),
            blockchain_length: self.chain.length(),
            pending_messages: self.pool.pending_count(),
        }
    }

    /// Drains `pending()` into one chat block per message, in pool order.
    ///
    /// Drains everything pending, not just this turn's arrivals: a
    /// message deferred across a leader's earlier turn is published the
    /// next time that leader drains.
    fn publish_pending_messages(&mut self, now: u64) -> Vec<Block> {
        let pending: Vec<Message> = self.pool.pending().into_iter().cloned().collect();
        let mut produced = Vec::with_capacity(pending.len());

        for message in pending {
            let message_id = message.message_id.clone();
            let block = Block::next_chat(
                self.chain.latest(),
                message,
                self.node_id.clone(),
                &self.signing_key,
                now,
            );
            self.chain
                .add_block(block.clone())
                .expect("chat block was built against the current head");
            self.pool.mark_included(&message_id);
            produced.push(block);
        }

        if !produced.is_empty() {
            info!(
                node = %self.node_id,
                blocks = produced.len(),
                height = self.chain.length(),
                "published pending messages"
            );
        }
        produced
    }

    /// The lost-message recovery scan run when taking a turn.
    ///
    /// A message this node observed during the prior turn window that no
    /// witnessed block committed gets bundled into a single recovery
    /// block. The scan subtracts both the previous-turn chat commits and
    /// the pool's full inclusion set, so a message committed by any
    /// earlier leader (chat or recovery) is never re-included.
    fn recovery_scan(&mut self, now: u64) -> Vec<Block> {
        let committed = {
            let prev_blocks = self
                .chain
                .blocks_from_previous_turn(self.config.turn_duration_ms);
            Blockchain::extract_message_ids(prev_blocks)
        };

        let window_start = now
            .saturating_sub(self.config.turn_duration_ms)
            .saturating_sub(self.config.transition_duration_ms);
        let missing: Vec<Message> = self
            .pool
            .find_missing(window_start, now)
            .into_iter()
            .filter(|m| !committed.contains(&m.message_id))
            .cloned()
            .collect();

        if missing.is_empty() {
            return Vec::new();
        }

        warn!(
            node = %self.node_id,
            missing = missing.len(),
            "recovering messages absent from the previous turn"
        );

        let ids: Vec<String> = missing.iter().map(|m| m.message_id.clone()).collect();
        let note = format!("recovered {} message(s)", missing.len());
        let block = Block::next_recovery(
            self.chain.latest(),
            missing,
            note,
            self.node_id.clone(),
            &self.signing_key,
            now,
        );
        self.chain
            .add_block(block.clone())
            .expect("recovery block was built against the current head");
        for id in &ids {
            self.pool.mark_included(id);
        }
        vec![block]
    }
}
