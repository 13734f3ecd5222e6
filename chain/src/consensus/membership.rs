//! Fixed group membership.

use std::collections::HashMap;

use ed25519_dalek::VerifyingKey;

use crate::types::NodeId;

/// The ordered peer list plus each peer's public key.
///
/// Every node is bootstrapped with an identical `Membership`; leadership
/// is pure index arithmetic over the peer order, so agreement on this
/// value is what makes the rotation deterministic across the group.
#[derive(Clone, Debug)]
pub struct Membership {
    peers: Vec<NodeId>,
    keys: HashMap<NodeId, VerifyingKey>,
}

impl Membership {
    /// Builds a membership from the shared peer order and key map.
    pub fn new(peers: Vec<NodeId>, keys: HashMap<NodeId, VerifyingKey>) -> Self {
        Self { peers, keys }
    }

    /// The ordered peer list.
    pub fn peers(&self) -> &[NodeId] {
        &self.peers
    }

    /// Number of peers.
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// Whether the membership has no peers.
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Whether `node_id` is part of the group.
    pub fn contains(&self, node_id: &str) -> bool {
        self.peers.iter().any(|p| p == node_id)
    }

    /// The leader for a given rotation index (wraps modulo group size).
    pub fn leader_at(&self, leader_index: usize) -> &NodeId {
        &self.peers[leader_index % self.peers.len()]
    }

    /// Public key for a peer, if known.
    pub fn key_of(&self, node_id: &str) -> Option<&VerifyingKey> {
        self.keys.get(node_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::generate_keypair;

    fn membership(ids: &[&str]) -> Membership {
        let peers: Vec<NodeId> = ids.iter().map(|s| s.to_string()).collect();
        let keys = peers
            .iter()
            .map(|p| (p.clone(), generate_keypair().0))
            .collect();
        Membership::new(peers, keys)
    }

    #[test]
    fn leader_index_wraps_around() {
        let m = membership(&["alice", "bob", "carol"]);

        assert_eq!(m.leader_at(0), "alice");
        assert_eq!(m.leader_at(2), "carol");
        assert_eq!(m.leader_at(3), "alice");
        assert_eq!(m.leader_at(7), "bob");
    }

    #[test]
    fn key_lookup_and_contains() {
        let m = membership(&["alice", "bob"]);

        assert!(m.contains("alice"));
        assert!(!m.contains("mallory"));
        assert!(m.key_of("bob").is_some());
        assert!(m.key_of("mallory").is_none());
        assert_eq!(m.len(), 2);
    }
}
