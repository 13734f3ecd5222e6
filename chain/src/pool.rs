//! Per-node pool of observed messages with inclusion tracking.
//!
//! The pool is pure state: handlers feed it validly-signed messages, the
//! turn manager drains `pending()` at turn end and consults
//! `messages_in_time_range` during the recovery scan, and a periodic
//! cleanup evicts entries past the retention window. Inclusion is tracked
//! by `message_id` in a separate set so that a message committed by any
//! block the node has seen is never drained or recovered again.

use std::collections::{HashMap, HashSet};

use crate::types::{now_ms, Message};

#[derive(Clone, Debug)]
struct PoolEntry {
    message: Message,
    seen_at: u64,
}

/// Observed-message set keyed by `message_id`.
#[derive(Clone, Debug, Default)]
pub struct MessagePool {
    messages: HashMap<String, PoolEntry>,
    seen_in_blocks: HashSet<String>,
}

impl MessagePool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `message` stamped with the current wall clock.
    pub fn add(&mut self, message: Message) {
        self.add_at(message, now_ms());
    }

    /// Stores `message` with an explicit observation time.
    ///
    /// Re-adding a known id replaces the entry (and its stamp), so
    /// duplicate broadcast deliveries are idempotent.
    pub fn add_at(&mut self, message: Message, seen_at: u64) {
        self.messages
            .insert(message.message_id.clone(), PoolEntry { message, seen_at });
    }

    /// Records that a block committing `message_id` has been observed.
    pub fn mark_included(&mut self, message_id: &str) {
        self.seen_in_blocks.insert(message_id.to_string());
    }

    /// Messages not yet seen committed, ordered by `(seen_at, message_id)`.
    ///
    /// The ordering makes the turn-end drain (and hence block order)
    /// deterministic.
    pub fn pending(&self) -> Vec<&Message> {
        let mut entries: Vec<&PoolEntry> = self
            .messages
            .values()
            .filter(|e| !self.seen_in_blocks.contains(&e.message.message_id))
            .collect();
        entries.sort_by(|a, b| {
            (a.seen_at, &a.message.message_id).cmp(&(b.seen_at, &b.message.message_id))
        });
        entries.into_iter().map(|e| &e.message).collect()
    }

    /// Number of messages not yet seen committed.
    pub fn pending_count(&self) -> usize {
        self.messages
            .keys()
            .filter(|id| !self.seen_in_blocks.contains(*id))
            .count()
    }

    /// Messages observed in `[start, end]` (inclusive, by `seen_at`),
    /// ordered by `(seen_at, message_id)`.
    pub fn messages_in_time_range(&self, start: u64, end: u64) -> Vec<&Message> {
        let mut entries: Vec<&PoolEntry> = self
            .messages
            .values()
            .filter(|e| e.seen_at >= start && e.seen_at <= end)
            .collect();
        entries.sort_by(|a, b| {
            (a.seen_at, &a.message.message_id).cmp(&(b.seen_at, &b.message.message_id))
        });
        entries.into_iter().map(|e| &e.message).collect()
    }

    /// Messages observed in the window but never seen committed.
    pub fn find_missing(&self, start: u64, end: u64) -> Vec<&Message> {
        self.messages_in_time_range(start, end)
            .into_iter()
            .filter(|m| !self.seen_in_blocks.contains(&m.message_id))
            .collect()
    }

    /// Evicts entries older than the retention window, regardless of
    /// inclusion status. Returns the number of entries removed.
    pub fn cleanup(&mut self, retention_ms: u64) -> usize {
        self.cleanup_at(retention_ms, now_ms())
    }

    /// Eviction with an explicit clock reading.
    pub fn cleanup_at(&mut self, retention_ms: u64, now: u64) -> usize {
        let cutoff = now.saturating_sub(retention_ms);
        let before = self.messages.len();
        self.messages.retain(|_, e| e.seen_at >= cutoff);
        before - self.messages.len()
    }

    /// Whether the pool holds an entry for `message_id`.
    pub fn has(&self, message_id: &str) -> bool {
        self.messages.contains_key(message_id)
    }

    /// Fetches a message by id, if present.
    pub fn get(&self, message_id: &str) -> Option<&Message> {
        self.messages.get(message_id).map(|e| &e.message)
    }

    /// The set of ids this node has seen committed in blocks.
    pub fn included(&self) -> &HashSet<String> {
        &self.seen_in_blocks
    }

    /// Total entries held, committed or not.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the pool holds no entries at all.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::generate_keypair;

    use ed25519_dalek::SigningKey;

    fn keypair() -> SigningKey {
        generate_keypair().1
    }

    fn msg(content: &str, sk: &SigningKey, ts: u64) -> Message {
        Message::create_at(content, "alice", sk, ts)
    }

    #[test]
    fn add_is_idempotent_on_repeats() {
        let sk = keypair();
        let m = msg("hi", &sk, 100);
        let mut pool = MessagePool::new();

        pool.add_at(m.clone(), 100);
        pool.add_at(m.clone(), 100);

        assert_eq!(pool.len(), 1);
        assert_eq!(pool.pending_count(), 1);
        assert_eq!(pool.get(&m.message_id), Some(&m));
    }

    #[test]
    fn mark_included_removes_from_pending() {
        let sk = keypair();
        let m1 = msg("one", &sk, 100);
        let m2 = msg("two", &sk, 200);
        let mut pool = MessagePool::new();
        pool.add_at(m1.clone(), 100);
        pool.add_at(m2.clone(), 200);

        pool.mark_included(&m1.message_id);

        let pending = pool.pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].message_id, m2.message_id);
        assert_eq!(pool.pending_count(), 1);
        // The entry itself is retained until cleanup.
        assert!(pool.has(&m1.message_id));
    }

    #[test]
    fn pending_order_is_stable() {
        let sk = keypair();
        let mut pool = MessagePool::new();
        let m1 = msg("one", &sk, 1);
        let m2 = msg("two", &sk, 2);
        let m3 = msg("three", &sk, 3);
        pool.add_at(m3.clone(), 300);
        pool.add_at(m1.clone(), 100);
        pool.add_at(m2.clone(), 200);

        let ids: Vec<&str> = pool.pending().iter().map(|m| m.message_id.as_str()).collect();
        assert_eq!(ids, vec![&m1.message_id, &m2.message_id, &m3.message_id]);
    }

    #[test]
    fn time_range_and_find_missing() {
        let sk = keypair();
        let mut pool = MessagePool::new();
        let m1 = msg("one", &sk, 1);
        let m2 = msg("two", &sk, 2);
        let m3 = msg("three", &sk, 3);
        pool.add_at(m1.clone(), 100);
        pool.add_at(m2.clone(), 200);
        pool.add_at(m3.clone(), 300);

        assert_eq!(pool.messages_in_time_range(100, 200).len(), 2);

        pool.mark_included(&m1.message_id);
        let missing: Vec<&str> = pool
            .find_missing(100, 300)
            .iter()
            .map(|m| m.message_id.as_str())
            .collect();
        assert_eq!(missing, vec![&m2.message_id, &m3.message_id]);
    }

    #[test]
    fn cleanup_evicts_by_age_regardless_of_inclusion() {
        let sk = keypair();
        let mut pool = MessagePool::new();
        let old = msg("old", &sk, 1);
        let fresh = msg("fresh", &sk, 2);
        pool.add_at(old.clone(), 1_000);
        pool.add_at(fresh.clone(), 9_500);
        pool.mark_included(&old.message_id);

        let evicted = pool.cleanup_at(1_000, 10_000);

        assert_eq!(evicted, 1);
        assert!(!pool.has(&old.message_id));
        assert!(pool.has(&fresh.message_id));
    }
}
