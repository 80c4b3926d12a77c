// meshline - Line-delimited distributed protocol nodes
//
// A framework for nodes that read one structured message per input line
// and write one per output line, with correlated asynchronous RPC, an
// internal event queue for ticks and shutdown, gossip-based anti-entropy
// replication, and a vector-clock causality primitive.

pub mod clock;
pub mod gossip;
pub mod node;
pub mod wire;

pub use clock::VectorClock;
pub use gossip::{GossipEngine, MessageStore, PeerKnowledge};
pub use node::{Handler, Node, NodeConfig, NodeError, Runtime, TickHandler};
pub use wire::{Body, Envelope, ErrorCode, NodeId, ProtocolError};
