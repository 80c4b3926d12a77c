// Wire module - THE WIRE
// Envelope/body data model and line-oriented transport plumbing

mod envelope;
mod transport;

pub use envelope::{Body, Envelope, ErrorCode, NodeId};
pub use transport::{decode_line, encode_line, LineWriter, ProtocolError};
