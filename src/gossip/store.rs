// Message Store & Peer Knowledge - Gossip state
//
// The store is a grow-only set: the union of every value this node has
// ever learned, directly or via gossip. Peer knowledge is this node's
// lower-bound belief about what each peer already holds; it may
// understate reality but must never overstate it.

use crate::wire::NodeId;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;

/// Grow-only set of gossiped values
///
/// Merging is commutative, associative, and idempotent: applying the
/// same batch twice is indistinguishable from applying it once.
#[derive(Clone, Debug)]
pub struct MessageStore<T>
where
    T: Eq + Hash + Clone,
{
    values: HashSet<T>,
}

impl<T> Default for MessageStore<T>
where
    T: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self {
            values: HashSet::new(),
        }
    }
}

impl<T> MessageStore<T>
where
    T: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one value; returns true if it was new
    pub fn learn(&mut self, value: T) -> bool {
        self.values.insert(value)
    }

    /// Merge a batch of values; returns how many were new
    pub fn merge(&mut self, values: impl IntoIterator<Item = T>) -> usize {
        let before = self.values.len();
        self.values.extend(values);
        self.values.len() - before
    }

    pub fn contains(&self, value: &T) -> bool {
        self.values.contains(value)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.values.iter()
    }

    /// Snapshot of every value currently held
    pub fn snapshot(&self) -> Vec<T> {
        self.values.iter().cloned().collect()
    }
}

/// Per-peer lower bound on what each peer already knows
#[derive(Clone, Debug)]
pub struct PeerKnowledge<T>
where
    T: Eq + Hash + Clone,
{
    known: HashMap<NodeId, HashSet<T>>,
}

impl<T> Default for PeerKnowledge<T>
where
    T: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self {
            known: HashMap::new(),
        }
    }
}

impl<T> PeerKnowledge<T>
where
    T: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a peer holds one value
    pub fn saw(&mut self, peer: &NodeId, value: T) {
        self.known.entry(peer.clone()).or_default().insert(value);
    }

    /// Record that a peer holds a batch of values
    pub fn absorb(&mut self, peer: &NodeId, values: impl IntoIterator<Item = T>) {
        self.known.entry(peer.clone()).or_default().extend(values);
    }

    /// Check whether a peer is believed to hold a value
    pub fn knows(&self, peer: &NodeId, value: &T) -> bool {
        self.known
            .get(peer)
            .map(|set| set.contains(value))
            .unwrap_or(false)
    }

    /// Values in the store that a peer is not yet believed to hold
    pub fn missing_for(&self, peer: &NodeId, store: &MessageStore<T>) -> Vec<T> {
        match self.known.get(peer) {
            Some(set) => store
                .iter()
                .filter(|value| !set.contains(value))
                .cloned()
                .collect(),
            None => store.snapshot(),
        }
    }
}
