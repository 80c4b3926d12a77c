// Gossip module - HOW STATE SPREADS
// Grow-only message store, per-peer knowledge, and batched anti-entropy

mod engine;
mod store;

pub use engine::GossipEngine;
pub use store::{MessageStore, PeerKnowledge};
