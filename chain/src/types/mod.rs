//! Core domain types shared across the node.
//!
//! This module defines the peer identifier type, the signed chat
//! [`Message`], and the hash-chained [`Block`] with its typed payload.
//! Hashes are lowercase hex SHA-256 strings and signatures are base64
//! Ed25519 strings, which is also their wire encoding.

pub mod block;
pub mod message;

pub use block::{Block, BlockData, GENESIS_AUTHOR, GENESIS_PREVIOUS_HASH};
pub use message::Message;

/// Peer identifier, as configured in the shared membership list.
///
/// Peer ids are plain strings (e.g. `"alice"`); the membership maps each
/// id to the peer's Ed25519 public key.
pub type NodeId = String;

/// Returns the current wall-clock time as milliseconds since Unix epoch.
///
/// On error (system clock before epoch) this falls back to 0.
pub fn now_ms() -> u64 {
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_millis(0))
        .as_millis() as u64
}
