//! Block types, hashing, and signing.
//!
//! A [`Block`] is the atomic unit of the log: a hash-chained, signed
//! container whose payload is one of the [`BlockData`] variants. The
//! wire form carries the variant tag in a `block_type` field and the
//! payload under `data`, which is exactly how the enum serializes.
//!
//! Hashing uses a canonical encoding of the payload: the `serde_json`
//! string of the tagged variant, with fields in declaration order and
//! timestamps as integer milliseconds. The same encoding is used
//! everywhere block bytes are needed, so hashes remain stable across
//! nodes.

use serde::{Deserialize, Serialize};

use ed25519_dalek::{SigningKey, VerifyingKey};

use super::message::Message;
use super::NodeId;
use crate::crypto;

/// Author id carried by the genesis block.
pub const GENESIS_AUTHOR: &str = "genesis";

/// `previous_hash` value of the genesis block.
pub const GENESIS_PREVIOUS_HASH: &str = "0";

/// Genesis timestamp, fixed so that every node derives the identical
/// genesis hash at bootstrap. Block 1 could never link on followers if
/// each node stamped its own wall clock here.
const GENESIS_TIMESTAMP_MS: u64 = 0;

/// Typed block payload, tagged on the wire as `block_type` + `data`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "block_type", content = "data", rename_all = "snake_case")]
pub enum BlockData {
    /// Chain origin marker; carries no payload.
    Genesis,
    /// A single committed chat message.
    ChatMessage(Message),
    /// Messages a new leader witnessed but found missing from the chain.
    LostMessageRecovery {
        recovered_messages: Vec<Message>,
        note: String,
    },
    /// Explicit leader hand-off marker.
    ///
    /// Defined for the wire format and validated like any other block,
    /// but the turn state machine does not currently produce these;
    /// recovery works from timestamp windows instead.
    TurnTransition {
        from: NodeId,
        to: NodeId,
        note: String,
    },
}

impl BlockData {
    /// Returns the wire tag of this payload variant.
    pub fn block_type(&self) -> &'static str {
        match self {
            BlockData::Genesis => "genesis",
            BlockData::ChatMessage(_) => "chat_message",
            BlockData::LostMessageRecovery { .. } => "lost_message_recovery",
            BlockData::TurnTransition { .. } => "turn_transition",
        }
    }
}

/// Hash-chained, signed block.
///
/// Invariants for a well-formed chain: `index` increases by exactly 1,
/// `previous_hash` equals the prior block's `hash`, `hash` recomputes
/// from the block's own fields, and (genesis excepted) `signature`
/// verifies against the author's public key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// 0 for genesis, otherwise `prev.index + 1`.
    pub index: u64,
    /// Creation time, milliseconds since Unix epoch.
    pub timestamp: u64,
    /// Typed payload; flattens to `block_type` + `data` on the wire.
    #[serde(flatten)]
    pub data: BlockData,
    /// The prior block's `hash`, or `"0"` for genesis.
    pub previous_hash: String,
    /// SHA-256 hex over `index ∥ timestamp ∥ canonical(data) ∥
    /// previous_hash ∥ author_id`.
    pub hash: String,
    /// Producer of this block; the literal `"genesis"` for genesis.
    pub author_id: NodeId,
    /// Base64 Ed25519 signature over
    /// `index | timestamp | hash | previous_hash | author_id`;
    /// empty for genesis.
    pub signature: String,
}

impl Block {
    /// Builds the deterministic genesis block.
    pub fn genesis() -> Self {
        let data = BlockData::Genesis;
        let hash = hash_fields(
            0,
            GENESIS_TIMESTAMP_MS,
            &data,
            GENESIS_PREVIOUS_HASH,
            GENESIS_AUTHOR,
        );
        Self {
            index: 0,
            timestamp: GENESIS_TIMESTAMP_MS,
            data,
            previous_hash: GENESIS_PREVIOUS_HASH.to_string(),
            hash,
            author_id: GENESIS_AUTHOR.to_string(),
            signature: String::new(),
        }
    }

    /// Builds, hashes, and signs the successor of `prev` carrying `data`.
    ///
    /// This is the generic builder behind the typed constructors; the
    /// timestamp is explicit so block production stays deterministic for
    /// callers that already hold a clock reading.
    pub fn next(
        prev: &Block,
        data: BlockData,
        author_id: impl Into<NodeId>,
        signing_key: &SigningKey,
        timestamp: u64,
    ) -> Self {
        let author_id = author_id.into();
        let index = prev.index + 1;
        let previous_hash = prev.hash.clone();
        let hash = hash_fields(index, timestamp, &data, &previous_hash, &author_id);
        let signable = signable(index, timestamp, &hash, &previous_hash, &author_id);
        let signature = crypto::sign(signable.as_bytes(), signing_key);

        Self {
            index,
            timestamp,
            data,
            previous_hash,
            hash,
            author_id,
            signature,
        }
    }

    /// Builds a `chat_message` block committing one message.
    pub fn next_chat(
        prev: &Block,
        message: Message,
        author_id: impl Into<NodeId>,
        signing_key: &SigningKey,
        timestamp: u64,
    ) -> Self {
        Self::next(prev, BlockData::ChatMessage(message), author_id, signing_key, timestamp)
    }

    /// Builds a `lost_message_recovery` block bundling the missing set.
    pub fn next_recovery(
        prev: &Block,
        recovered_messages: Vec<Message>,
        note: impl Into<String>,
        author_id: impl Into<NodeId>,
        signing_key: &SigningKey,
        timestamp: u64,
    ) -> Self {
        let data = BlockData::LostMessageRecovery {
            recovered_messages,
            note: note.into(),
        };
        Self::next(prev, data, author_id, signing_key, timestamp)
    }

    /// Builds a `turn_transition` block authored by the outgoing leader.
    pub fn next_transition(
        prev: &Block,
        from: impl Into<NodeId>,
        to: impl Into<NodeId>,
        note: impl Into<String>,
        signing_key: &SigningKey,
        timestamp: u64,
    ) -> Self {
        let from = from.into();
        let data = BlockData::TurnTransition {
            from: from.clone(),
            to: to.into(),
            note: note.into(),
        };
        Self::next(prev, data, from, signing_key, timestamp)
    }

    /// Returns the wire tag of this block's payload.
    pub fn block_type(&self) -> &'static str {
        self.data.block_type()
    }

    /// Canonical encoding of the payload used in the hash preimage.
    ///
    /// # Panics
    ///
    /// Panics if encoding fails, which would be a programming error: all
    /// payload fields are plain serializable data.
    pub fn canonical_data(&self) -> String {
        canonical_data(&self.data)
    }

    /// Recomputes the hash from this block's fields.
    pub fn compute_hash(&self) -> String {
        hash_fields(
            self.index,
            self.timestamp,
            &self.data,
            &self.previous_hash,
            &self.author_id,
        )
    }

    /// Structural validity of this block as the successor of `prev`.
    ///
    /// Checks index continuity, `previous_hash` linkage, and that `hash`
    /// recomputes. Signature verification is deliberately separate (see
    /// [`Block::verify_signature`]) and applied on ingest paths where the
    /// producer's public key is known.
    pub fn is_valid_successor(&self, prev: &Block) -> bool {
        self.index == prev.index + 1
            && self.previous_hash == prev.hash
            && self.hash == self.compute_hash()
    }

    /// Verifies the producer signature against a public key.
    pub fn verify_signature(&self, verifying_key: &VerifyingKey) -> bool {
        let signable = signable(
            self.index,
            self.timestamp,
            &self.hash,
            &self.previous_hash,
            &self.author_id,
        );
        crypto::verify(signable.as_bytes(), &self.signature, verifying_key)
    }
}

fn canonical_data(data: &BlockData) -> String {
    serde_json::to_string(data).expect("block payload should always be serializable")
}

fn hash_fields(
    index: u64,
    timestamp: u64,
    data: &BlockData,
    previous_hash: &str,
    author_id: &str,
) -> String {
    let preimage = format!(
        "{index}{timestamp}{}{previous_hash}{author_id}",
        canonical_data(data)
    );
    crypto::sha256_hex(preimage.as_bytes())
}

fn signable(index: u64, timestamp: u64, hash: &str, previous_hash: &str, author_id: &str) -> String {
    format!("{index}|{timestamp}|{hash}|{previous_hash}|{author_id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::generate_keypair;

    fn chat_block(prev: &Block, content: &str, ts: u64) -> (Block, VerifyingKey) {
        let (pk, sk) = generate_keypair();
        let msg = Message::create_at(content, "alice", &sk, ts);
        (Block::next_chat(prev, msg, "alice", &sk, ts + 1), pk)
    }

    #[test]
    fn genesis_is_deterministic_across_nodes() {
        let a = Block::genesis();
        let b = Block::genesis();

        assert_eq!(a.hash, b.hash);
        assert_eq!(a.index, 0);
        assert_eq!(a.previous_hash, GENESIS_PREVIOUS_HASH);
        assert_eq!(a.author_id, GENESIS_AUTHOR);
        assert!(a.signature.is_empty());
        assert_eq!(a.hash, a.compute_hash());
    }

    #[test]
    fn chat_block_links_and_recomputes() {
        let genesis = Block::genesis();
        let (block, pk) = chat_block(&genesis, "hi", 1_700_000_000_000);

        assert_eq!(block.index, 1);
        assert_eq!(block.previous_hash, genesis.hash);
        assert_eq!(block.block_type(), "chat_message");
        assert!(block.is_valid_successor(&genesis));
        assert!(block.verify_signature(&pk));
    }

    #[test]
    fn tampered_payload_breaks_hash() {
        let genesis = Block::genesis();
        let (mut block, _) = chat_block(&genesis, "hi", 1_700_000_000_000);

        if let BlockData::ChatMessage(msg) = &mut block.data {
            msg.content.push('!');
        }

        assert_ne!(block.hash, block.compute_hash());
        assert!(!block.is_valid_successor(&genesis));
    }

    #[test]
    fn signature_from_other_key_is_rejected() {
        let genesis = Block::genesis();
        let (block, _) = chat_block(&genesis, "hi", 1_700_000_000_000);
        let (other_pk, _) = generate_keypair();

        assert!(!block.verify_signature(&other_pk));
    }

    #[test]
    fn recovery_block_carries_messages() {
        let (_, sk) = generate_keypair();
        let genesis = Block::genesis();
        let msgs = vec![
            Message::create_at("one", "bob", &sk, 10),
            Message::create_at("two", "carol", &sk, 11),
        ];

        let block = Block::next_recovery(&genesis, msgs.clone(), "recovered 2 message(s)", "alice", &sk, 20);

        assert_eq!(block.block_type(), "lost_message_recovery");
        match &block.data {
            BlockData::LostMessageRecovery { recovered_messages, .. } => {
                assert_eq!(recovered_messages, &msgs);
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn wire_form_tags_block_type_and_data() {
        let genesis = Block::genesis();
        let (block, _) = chat_block(&genesis, "hi", 42);

        let json = serde_json::to_value(&block).expect("block serializes");
        assert_eq!(json["block_type"], "chat_message");
        assert_eq!(json["data"]["content"], "hi");
        for field in ["index", "timestamp", "previous_hash", "hash", "author_id", "signature"] {
            assert!(json.get(field).is_some(), "missing wire field {field}");
        }

        let back: Block = serde_json::from_value(json).expect("block deserializes");
        assert_eq!(back, block);

        let genesis_json = serde_json::to_value(&genesis).expect("genesis serializes");
        assert_eq!(genesis_json["block_type"], "genesis");
    }
}
