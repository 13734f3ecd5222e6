//! Append-only blockchain with structural validation.
//!
//! The chain is an ordered `Vec<Block>` starting at genesis with the head
//! at the tail, so `chronological()` is the natural order and appends are
//! O(1). Structural validation (index continuity, `previous_hash` linkage,
//! hash recomputation) happens on every append; signature checks live on
//! the ingest path, where the producer's key is known.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{Block, BlockData};

/// Errors returned by chain mutation operations.
#[derive(Debug, PartialEq, Eq)]
pub enum ChainError {
    /// Candidate block fails index / previous-hash / hash checks against
    /// the current head. Duplicate deliveries of an already-appended block
    /// land here too, since their index no longer matches head + 1.
    InvalidBlockStructure,
    /// Replacement chain is not strictly longer than the current one.
    NotLonger,
    /// Replacement chain fails pairwise validation.
    InvalidChain,
}

impl fmt::Display for ChainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainError::InvalidBlockStructure => {
                write!(f, "block does not extend the current head")
            }
            ChainError::NotLonger => write!(f, "replacement chain is not longer"),
            ChainError::InvalidChain => write!(f, "replacement chain is not valid"),
        }
    }
}

impl std::error::Error for ChainError {}

/// Ordered block sequence, genesis first, head at the tail.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Blockchain {
    blocks: Vec<Block>,
}

impl Blockchain {
    /// Creates a chain holding only the genesis block.
    pub fn new() -> Self {
        Self {
            blocks: vec![Block::genesis()],
        }
    }

    /// Validates `block` against the current head and appends it.
    pub fn add_block(&mut self, block: Block) -> Result<(), ChainError> {
        if !block.is_valid_successor(self.latest()) {
            return Err(ChainError::InvalidBlockStructure);
        }
        self.blocks.push(block);
        Ok(())
    }

    /// The newest block. There is always at least genesis.
    pub fn latest(&self) -> &Block {
        self.blocks.last().expect("chain always holds genesis")
    }

    /// All blocks in chronological order, genesis first.
    pub fn chronological(&self) -> &[Block] {
        &self.blocks
    }

    /// Number of blocks, genesis included.
    pub fn length(&self) -> usize {
        self.blocks.len()
    }

    /// Looks up a block by its chain index.
    pub fn get_by_index(&self, index: u64) -> Option<&Block> {
        self.blocks.get(index as usize)
    }

    /// The newest `n` blocks in chronological order.
    pub fn last_n(&self, n: usize) -> &[Block] {
        let start = self.blocks.len().saturating_sub(n);
        &self.blocks[start..]
    }

    /// Blocks whose `timestamp` lies in `[start, end]`, inclusive.
    pub fn blocks_in_time_range(&self, start: u64, end: u64) -> Vec<&Block> {
        self.blocks
            .iter()
            .filter(|b| b.timestamp >= start && b.timestamp <= end)
            .collect()
    }

    /// Blocks produced within one turn duration of the head's timestamp.
    ///
    /// This is the window an incoming leader inspects during the recovery
    /// scan: everything the outgoing leader committed during its turn.
    pub fn blocks_from_previous_turn(&self, turn_duration_ms: u64) -> Vec<&Block> {
        let end = self.latest().timestamp;
        let start = end.saturating_sub(turn_duration_ms);
        self.blocks_in_time_range(start, end)
    }

    /// Collects the `message_id`s committed by `chat_message` blocks.
    pub fn extract_message_ids<'a>(blocks: impl IntoIterator<Item = &'a Block>) -> HashSet<String> {
        blocks
            .into_iter()
            .filter_map(|b| match &b.data {
                BlockData::ChatMessage(msg) => Some(msg.message_id.clone()),
                _ => None,
            })
            .collect()
    }

    /// Pairwise structural validity of the whole chain.
    pub fn is_valid(&self) -> bool {
        if self.blocks.is_empty() {
            return false;
        }
        self.blocks
            .windows(2)
            .all(|pair| pair[1].is_valid_successor(&pair[0]))
            && self.blocks[0].hash == self.blocks[0].compute_hash()
    }

    /// Replaces this chain with a strictly longer, valid one.
    ///
    /// Provided as the fork-resolution hook; nothing calls it at runtime,
    /// so two diverged nodes reject each other's blocks and do not
    /// self-heal.
    pub fn replace_chain(&mut self, new_chain: Blockchain) -> Result<(), ChainError> {
        if new_chain.length() <= self.length() {
            return Err(ChainError::NotLonger);
        }
        if !new_chain.is_valid() {
            return Err(ChainError::InvalidChain);
        }
        *self = new_chain;
        Ok(())
    }
}

impl Default for Blockchain {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::generate_keypair;
    use crate::types::Message;

    use ed25519_dalek::SigningKey;

    fn keypair() -> SigningKey {
        generate_keypair().1
    }

    fn extend_with_chat(chain: &mut Blockchain, content: &str, sk: &SigningKey, ts: u64) -> Block {
        let msg = Message::create_at(content, "alice", sk, ts);
        let block = Block::next_chat(chain.latest(), msg, "alice", sk, ts);
        chain.add_block(block.clone()).expect("block extends head");
        block
    }

    #[test]
    fn new_chain_holds_only_genesis() {
        let chain = Blockchain::new();

        assert_eq!(chain.length(), 1);
        assert_eq!(chain.latest().index, 0);
        assert!(chain.is_valid());
    }

    #[test]
    fn append_and_query_helpers() {
        let sk = keypair();
        let mut chain = Blockchain::new();
        extend_with_chat(&mut chain, "one", &sk, 100);
        extend_with_chat(&mut chain, "two", &sk, 200);
        extend_with_chat(&mut chain, "three", &sk, 300);

        assert_eq!(chain.length(), 4);
        assert_eq!(chain.latest().index, 3);
        assert_eq!(chain.get_by_index(2).map(|b| b.timestamp), Some(200));
        assert!(chain.get_by_index(9).is_none());
        assert_eq!(chain.last_n(2).len(), 2);
        assert_eq!(chain.last_n(2)[0].timestamp, 200);
        assert_eq!(chain.last_n(100).len(), 4);
        assert_eq!(chain.chronological()[0].index, 0);
    }

    #[test]
    fn time_range_filter_is_inclusive() {
        let sk = keypair();
        let mut chain = Blockchain::new();
        extend_with_chat(&mut chain, "one", &sk, 100);
        extend_with_chat(&mut chain, "two", &sk, 200);
        extend_with_chat(&mut chain, "three", &sk, 300);

        let hits = chain.blocks_in_time_range(100, 200);
        assert_eq!(hits.len(), 2);

        let prev_turn = chain.blocks_from_previous_turn(100);
        // Head at ts=300, window [200, 300].
        assert_eq!(prev_turn.len(), 2);
    }

    #[test]
    fn extract_message_ids_covers_chat_blocks_only() {
        let sk = keypair();
        let mut chain = Blockchain::new();
        let b1 = extend_with_chat(&mut chain, "one", &sk, 100);

        let recovered = vec![Message::create_at("lost", "bob", &sk, 150)];
        let recovery = Block::next_recovery(chain.latest(), recovered, "recovered 1 message(s)", "alice", &sk, 200);
        chain.add_block(recovery).expect("recovery extends head");

        let ids = Blockchain::extract_message_ids(chain.chronological());
        assert_eq!(ids.len(), 1);
        match &b1.data {
            crate::types::BlockData::ChatMessage(msg) => assert!(ids.contains(&msg.message_id)),
            _ => unreachable!(),
        }
    }

    #[test]
    fn rejects_block_not_extending_head() {
        let sk = keypair();
        let mut chain = Blockchain::new();
        let genesis = chain.latest().clone();
        extend_with_chat(&mut chain, "one", &sk, 100);

        // Built against genesis, but the head has moved on.
        let msg = Message::create_at("stale", "alice", &sk, 150);
        let stale = Block::next_chat(&genesis, msg, "alice", &sk, 150);

        assert_eq!(chain.add_block(stale), Err(ChainError::InvalidBlockStructure));
    }

    #[test]
    fn duplicate_delivery_is_rejected_on_second_append() {
        let sk = keypair();
        let mut chain = Blockchain::new();
        let block = extend_with_chat(&mut chain, "one", &sk, 100);

        assert_eq!(chain.add_block(block), Err(ChainError::InvalidBlockStructure));
        assert_eq!(chain.length(), 2);
    }

    #[test]
    fn tampering_invalidates_the_chain() {
        let sk = keypair();
        let mut chain = Blockchain::new();
        extend_with_chat(&mut chain, "one", &sk, 100);
        extend_with_chat(&mut chain, "two", &sk, 200);
        assert!(chain.is_valid());

        // Flip a byte in a middle block's payload.
        if let crate::types::BlockData::ChatMessage(msg) = &mut chain.blocks[1].data {
            msg.content = "0ne".to_string();
        }
        assert!(!chain.is_valid());
    }

    #[test]
    fn replace_chain_requires_longer_and_valid() {
        let sk = keypair();
        let mut chain = Blockchain::new();
        extend_with_chat(&mut chain, "one", &sk, 100);

        let short = Blockchain::new();
        assert_eq!(chain.clone().replace_chain(short), Err(ChainError::NotLonger));

        let mut longer = chain.clone();
        extend_with_chat(&mut longer, "two", &sk, 200);
        extend_with_chat(&mut longer, "three", &sk, 300);

        let mut corrupted = longer.clone();
        if let crate::types::BlockData::ChatMessage(msg) = &mut corrupted.blocks[2].data {
            msg.content.push('!');
        }
        assert_eq!(chain.clone().replace_chain(corrupted), Err(ChainError::InvalidChain));

        assert!(chain.replace_chain(longer).is_ok());
        assert_eq!(chain.length(), 4);
    }
}
