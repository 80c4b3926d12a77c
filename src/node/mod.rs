// Node module - THE RUNTIME
// Dispatcher loop, handler registry, event injection, and correlated RPC

mod event;
mod handler;
mod rpc;
mod runtime;
mod state;

pub use event::Event;
pub use handler::{Handler, TickHandler};
pub use rpc::PendingTable;
pub use runtime::{Node, NodeConfig, NodeError, Runtime};
pub use state::NodeState;
