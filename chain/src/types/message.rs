//! Signed chat messages.
//!
//! A [`Message`] is the unit of user content: an opaque string authored
//! and signed by one peer. Its `message_id` is derived from the content,
//! author, and creation timestamp, and serves as the primary key in the
//! message pool and the dedup key across blocks.

use serde::{Deserialize, Serialize};

use ed25519_dalek::{SigningKey, VerifyingKey};

use super::NodeId;
use crate::crypto;

/// Authored, signed chat payload with a stable identifier.
///
/// The signature covers `content | author_id | timestamp | message_id`
/// (pipe-delimited), so neither the payload nor the identity fields can
/// be altered without invalidating it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Opaque chat payload.
    pub content: String,
    /// Peer that authored and signed this message.
    pub author_id: NodeId,
    /// Creation time, milliseconds since Unix epoch.
    pub timestamp: u64,
    /// `sha256_hex(content ∥ author_id ∥ timestamp)`.
    pub message_id: String,
    /// Base64 Ed25519 signature over the signable string.
    pub signature: String,
}

impl Message {
    /// Creates and signs a message stamped with the current wall clock.
    pub fn create(content: impl Into<String>, author_id: impl Into<NodeId>, signing_key: &SigningKey) -> Self {
        Self::create_at(content, author_id, signing_key, super::now_ms())
    }

    /// Creates and signs a message with an explicit timestamp.
    ///
    /// The explicit timestamp keeps message construction deterministic for
    /// callers that already hold a clock reading (and for tests).
    pub fn create_at(
        content: impl Into<String>,
        author_id: impl Into<NodeId>,
        signing_key: &SigningKey,
        timestamp: u64,
    ) -> Self {
        let content = content.into();
        let author_id = author_id.into();
        let message_id = crypto::message_id(&content, &author_id, timestamp);
        let signable = signable(&content, &author_id, timestamp, &message_id);
        let signature = crypto::sign(signable.as_bytes(), signing_key);

        Self {
            content,
            author_id,
            timestamp,
            message_id,
            signature,
        }
    }

    /// Verifies the signature against the author's public key.
    ///
    /// This recomputes the signable string from the message fields, so a
    /// message whose fields were tampered with after signing fails even if
    /// the signature itself is intact.
    pub fn verify(&self, verifying_key: &VerifyingKey) -> bool {
        let signable = signable(&self.content, &self.author_id, self.timestamp, &self.message_id);
        crypto::verify(signable.as_bytes(), &self.signature, verifying_key)
    }
}

fn signable(content: &str, author_id: &str, timestamp: u64, message_id: &str) -> String {
    format!("{content}|{author_id}|{timestamp}|{message_id}")
}
