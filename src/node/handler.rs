// Handlers - Type-keyed message processing
//
// A handler owns the processing of one message type. Failures are
// returned as values and converted into protocol error replies at the
// dispatch boundary; they never unwind into the runtime loop.

use crate::node::{Node, NodeError};
use crate::wire::Envelope;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

/// Processes inbound envelopes of one registered type
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, node: Arc<Node>, req: Envelope) -> Result<(), NodeError>;
}

#[async_trait]
impl<F, Fut> Handler for F
where
    F: Fn(Arc<Node>, Envelope) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), NodeError>> + Send + 'static,
{
    async fn handle(&self, node: Arc<Node>, req: Envelope) -> Result<(), NodeError> {
        (self)(node, req).await
    }
}

/// Invoked on every periodic tick from the event queue
#[async_trait]
pub trait TickHandler: Send + Sync {
    async fn tick(&self, node: Arc<Node>);
}

#[async_trait]
impl<F, Fut> TickHandler for F
where
    F: Fn(Arc<Node>) -> Fut + Send + Sync,
    Fut: Future<Output = ()> + Send + 'static,
{
    async fn tick(&self, node: Arc<Node>) {
        (self)(node).await
    }
}
