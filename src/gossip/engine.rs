// Gossip Engine - Batched anti-entropy
//
// Each tick computes, per peer, the diff between the local store and
// what that peer is believed to know, and ships the whole diff as one
// gossip batch tagged with a fresh correlation id. Acks shrink future
// diffs; a lost or reordered batch costs nothing because the next tick
// recomputes the diff from scratch. State-based, so transient peer
// unavailability needs no special handling.

use crate::gossip::store::{MessageStore, PeerKnowledge};
use crate::node::Node;
use crate::wire::{Body, NodeId};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::hash::Hash;
use std::sync::{Arc, Mutex};

struct EngineState<T>
where
    T: Eq + Hash + Clone,
{
    store: MessageStore<T>,
    knowledge: PeerKnowledge<T>,
    peers: Vec<NodeId>,
}

/// Anti-entropy engine for an ever-growing set of opaque values
///
/// Shared behind an `Arc` between message handlers and the tick task;
/// all state sits behind one mutex and no lock is held across an await.
pub struct GossipEngine<T>
where
    T: Eq + Hash + Clone,
{
    inner: Mutex<EngineState<T>>,
}

impl<T> Default for GossipEngine<T>
where
    T: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self {
            inner: Mutex::new(EngineState {
                store: MessageStore::new(),
                knowledge: PeerKnowledge::new(),
                peers: Vec::new(),
            }),
        }
    }
}

impl<T> GossipEngine<T>
where
    T: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the peer list from a topology message
    ///
    /// Topology is static thereafter unless another topology message
    /// arrives.
    pub fn set_peers(&self, peers: Vec<NodeId>) {
        self.inner.lock().unwrap().peers = peers;
    }

    pub fn peers(&self) -> Vec<NodeId> {
        self.inner.lock().unwrap().peers.clone()
    }

    /// Learn one value, optionally crediting the peer it came from
    ///
    /// Returns true if the value was new. The source already holds the
    /// value, so it is marked as known there and never re-advertised to
    /// its own origin unnecessarily.
    pub fn learn(&self, value: T, source: Option<&NodeId>) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if let Some(peer) = source {
            inner.knowledge.saw(peer, value.clone());
        }
        inner.store.learn(value)
    }

    /// Merge an inbound gossip batch from a peer
    ///
    /// Marks the sender as holding everything in the batch and returns
    /// the set to acknowledge in the `gossip_ok` reply. Idempotent:
    /// replaying the same batch changes nothing.
    pub fn absorb(&self, from: &NodeId, values: Vec<T>) -> Vec<T> {
        let mut inner = self.inner.lock().unwrap();
        inner.knowledge.absorb(from, values.iter().cloned());
        inner.store.merge(values.iter().cloned());
        values
    }

    /// Apply a gossip acknowledgement from a peer
    ///
    /// Updates knowledge only; the local store is untouched.
    pub fn acknowledge(&self, peer: &NodeId, values: Vec<T>) {
        self.inner.lock().unwrap().knowledge.absorb(peer, values);
    }

    /// Snapshot of every value currently held
    pub fn values(&self) -> Vec<T> {
        self.inner.lock().unwrap().store.snapshot()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Per-peer diffs due for the next gossip round
    pub fn pending_batches(&self) -> Vec<(NodeId, Vec<T>)> {
        let inner = self.inner.lock().unwrap();
        inner
            .peers
            .iter()
            .filter_map(|peer| {
                let diff = inner.knowledge.missing_for(peer, &inner.store);
                if diff.is_empty() {
                    None
                } else {
                    Some((peer.clone(), diff))
                }
            })
            .collect()
    }
}

impl<T> GossipEngine<T>
where
    T: Eq + Hash + Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Run one gossip round: one batched RPC per peer with a diff
    ///
    /// Every batch carries a fresh correlation id; the `gossip_ok`
    /// reply acknowledges what the peer now holds. A timeout is simply
    /// dropped, the next round retries the recomputed diff.
    pub async fn gossip_round(self: &Arc<Self>, node: &Arc<Node>) {
        for (peer, batch) in self.pending_batches() {
            let engine = self.clone();
            let node = node.clone();
            tokio::spawn(async move {
                let payload = match serde_json::to_value(&batch) {
                    Ok(payload) => payload,
                    Err(err) => {
                        tracing::warn!(%err, "unserializable gossip batch");
                        return;
                    }
                };
                let body = Body::new("gossip").with("message", payload);
                match node.rpc(peer.clone(), body).await {
                    Ok(reply) if reply.kind == "gossip_ok" => {
                        let acked = reply
                            .field("message")
                            .cloned()
                            .and_then(|v| serde_json::from_value(v).ok())
                            .unwrap_or(batch);
                        engine.acknowledge(&peer, acked);
                    }
                    Ok(reply) => {
                        tracing::debug!(
                            %peer,
                            kind = %reply.kind,
                            "gossip unacknowledged, retrying next round"
                        );
                    }
                    Err(err) => {
                        tracing::debug!(%peer, %err, "gossip send failed");
                    }
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted(mut values: Vec<u64>) -> Vec<u64> {
        values.sort_unstable();
        values
    }

    #[test]
    fn test_learn_marks_source_as_knowing() {
        let engine = GossipEngine::new();
        let peer = NodeId::from("n2");
        engine.set_peers(vec![peer.clone()]);

        assert!(engine.learn(7, Some(&peer)));
        // The origin already holds the value, so nothing is due for it.
        assert!(engine.pending_batches().is_empty());
    }

    #[test]
    fn test_learn_without_source_schedules_all_peers() {
        let engine = GossipEngine::new();
        let n2 = NodeId::from("n2");
        let n3 = NodeId::from("n3");
        engine.set_peers(vec![n2.clone(), n3.clone()]);

        engine.learn(7, None);
        let batches = engine.pending_batches();
        assert_eq!(batches.len(), 2);
        for (_, batch) in batches {
            assert_eq!(batch, vec![7]);
        }
    }

    #[test]
    fn test_absorb_is_idempotent() {
        let engine = GossipEngine::new();
        let peer = NodeId::from("n2");

        let ack = engine.absorb(&peer, vec![1, 2, 3]);
        assert_eq!(sorted(ack), vec![1, 2, 3]);
        assert_eq!(engine.len(), 3);

        engine.absorb(&peer, vec![1, 2, 3]);
        assert_eq!(engine.len(), 3);
        assert_eq!(sorted(engine.values()), vec![1, 2, 3]);
    }

    #[test]
    fn test_acknowledge_shrinks_future_batches() {
        let engine = GossipEngine::new();
        let peer = NodeId::from("n2");
        engine.set_peers(vec![peer.clone()]);

        engine.learn(1, None);
        engine.learn(2, None);
        assert_eq!(sorted(engine.pending_batches().remove(0).1), vec![1, 2]);

        engine.acknowledge(&peer, vec![1]);
        assert_eq!(engine.pending_batches().remove(0).1, vec![2]);

        engine.acknowledge(&peer, vec![2]);
        assert!(engine.pending_batches().is_empty());
    }

    #[test]
    fn test_acknowledge_never_touches_store() {
        let engine: GossipEngine<u64> = GossipEngine::new();
        engine.acknowledge(&NodeId::from("n2"), vec![9, 10]);
        assert!(engine.is_empty());
    }
}
