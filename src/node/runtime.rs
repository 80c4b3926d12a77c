// Node Runtime - The dispatcher
//
// Owns the handler registry and node state, merges transport input with
// the internal event queue, and routes each inbound envelope either to
// the pending-RPC table (replies) or to a type-keyed handler. Replies
// are resolved inline on the loop; everything else runs on a bounded
// pool of spawned workers so one slow handler cannot block the rest.

use crate::node::event::{spawn_ticker, Event};
use crate::node::handler::{Handler, TickHandler};
use crate::node::rpc::PendingTable;
use crate::node::state::NodeState;
use crate::wire::{decode_line, Body, Envelope, ErrorCode, LineWriter, NodeId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, RwLock};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;

/// Node-level errors
///
/// Handler failures are carried as values to the dispatch boundary and
/// surfaced to the sender as `error` replies when a reply is owed.
#[derive(Error, Debug)]
pub enum NodeError {
    #[error("node has not been initialized")]
    NotInitialized,

    #[error("node was already initialized")]
    AlreadyInitialized,

    #[error("cannot reply to a message without a msg_id")]
    NoReplyAddress,

    #[error("outbound transport closed")]
    OutboundClosed,

    #[error("reply channel dropped before resolution")]
    ReplyDropped,

    #[error("missing field `{0}` in message body")]
    MissingField(&'static str),

    #[error("{0}")]
    Handler(String),
}

/// Configuration for a node runtime
#[derive(Clone, Debug)]
pub struct NodeConfig {
    /// Gossip tick interval
    pub tick_interval: Duration,
    /// Deadline for each in-flight RPC
    pub rpc_timeout: Duration,
    /// Maximum concurrently dispatched handlers
    pub max_inflight: usize,
    /// Capacity of the event queue and outbound channel
    pub queue_capacity: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(100),
            rpc_timeout: Duration::from_millis(1000),
            max_inflight: 64,
            queue_capacity: 1024,
        }
    }
}

impl NodeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    pub fn with_rpc_timeout(mut self, timeout: Duration) -> Self {
        self.rpc_timeout = timeout;
        self
    }

    pub fn with_max_inflight(mut self, max: usize) -> Self {
        self.max_inflight = max;
        self
    }
}

/// A protocol node: registry, identity, and send/RPC primitives
///
/// Shared behind an `Arc` between the runtime loop, dispatched handler
/// workers, and background tickers. All mutable state lives behind
/// exclusive-access guards.
pub struct Node {
    pub(crate) config: NodeConfig,
    pub(crate) pending: PendingTable,
    pub(crate) next_msg_id: AtomicU64,
    state: OnceLock<NodeState>,
    handlers: RwLock<HashMap<String, Arc<dyn Handler>>>,
    tick_handler: RwLock<Option<Arc<dyn TickHandler>>>,
    outbound: LineWriter,
    events: mpsc::Sender<Event>,
    stopped: Arc<AtomicBool>,
}

impl Node {
    /// This node's id (empty until `init` has been processed)
    pub fn id(&self) -> NodeId {
        self.state
            .get()
            .map(|s| s.node_id().clone())
            .unwrap_or_default()
    }

    /// Every node in the cluster (empty until `init`)
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.state
            .get()
            .map(|s| s.node_ids().to_vec())
            .unwrap_or_default()
    }

    /// Every node in the cluster except this one
    pub fn other_nodes(&self) -> Vec<NodeId> {
        self.state.get().map(NodeState::other_nodes).unwrap_or_default()
    }

    /// Check whether `init` has been processed
    pub fn is_initialized(&self) -> bool {
        self.state.get().is_some()
    }

    /// Register the handler for a message type (last registration wins)
    ///
    /// Registration is a setup-time operation; steady-state dispatch only
    /// reads the registry.
    pub fn on(&self, kind: impl Into<String>, handler: impl Handler + 'static) {
        self.handlers
            .write()
            .unwrap()
            .insert(kind.into(), Arc::new(handler));
    }

    /// Register the handler invoked on every periodic tick
    pub fn on_tick(&self, handler: impl TickHandler + 'static) {
        *self.tick_handler.write().unwrap() = Some(Arc::new(handler));
    }

    /// Cooperatively halt the background ticker
    ///
    /// In-flight RPCs and the runtime loop are unaffected; loop
    /// termination is driven by end-of-input on the transport.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Relaxed);
    }

    /// Send a one-way message to a peer
    pub async fn send(&self, dest: impl Into<NodeId>, body: Body) -> Result<(), NodeError> {
        if !self.is_initialized() {
            return Err(NodeError::NotInitialized);
        }
        let envelope = Envelope::new(self.id(), dest.into(), body);
        self.outbound
            .deliver(envelope)
            .await
            .map_err(|_| NodeError::OutboundClosed)
    }

    /// Reply to a request, echoing its msg_id as `in_reply_to`
    pub async fn reply(&self, req: &Envelope, mut body: Body) -> Result<(), NodeError> {
        let msg_id = req.body.msg_id.ok_or(NodeError::NoReplyAddress)?;
        body.in_reply_to = Some(msg_id);
        self.send(req.src.clone(), body).await
    }

    fn handler_for(&self, kind: &str) -> Option<Arc<dyn Handler>> {
        self.handlers.read().unwrap().get(kind).cloned()
    }

    pub(crate) fn tick_handler(&self) -> Option<Arc<dyn TickHandler>> {
        self.tick_handler.read().unwrap().clone()
    }

    /// Resolve a correlated reply against the pending-RPC table
    ///
    /// Unknown or already-resolved correlation ids are discarded
    /// silently; error-typed bodies resolve the slot as an error-valued
    /// result, not a fault.
    pub(crate) fn resolve_reply(&self, envelope: Envelope) {
        let Some(msg_id) = envelope.body.in_reply_to else {
            return;
        };
        if !self.pending.resolve(msg_id, envelope.body) {
            tracing::debug!(in_reply_to = msg_id, "discarding reply with no pending rpc");
        }
    }

    /// Dispatch one non-reply envelope
    ///
    /// Handler faults are caught here: when the request carried a
    /// msg_id the sender gets a code-13 error reply, otherwise the
    /// failure is logged and suppressed.
    pub(crate) async fn dispatch(self: Arc<Self>, envelope: Envelope) {
        let kind = envelope.body.kind.clone();

        let result = if kind == "init" {
            self.handle_init(&envelope).await
        } else if !self.is_initialized() {
            tracing::error!(%kind, "message arrived before init, shutting down");
            let _ = self.events.send(Event::Shutdown).await;
            return;
        } else {
            match self.handler_for(&kind) {
                Some(handler) => handler.handle(self.clone(), envelope.clone()).await,
                None => {
                    tracing::warn!(%kind, "no handler registered for message type");
                    if envelope.body.msg_id.is_some() {
                        let body = Body::error(
                            ErrorCode::NotSupported,
                            format!("unsupported request type {kind}"),
                        );
                        let _ = self.reply(&envelope, body).await;
                    }
                    return;
                }
            }
        };

        if let Err(err) = result {
            tracing::warn!(%kind, %err, "handler failed");
            if envelope.body.msg_id.is_some() {
                let body = Body::error(ErrorCode::Crash, err.to_string());
                let _ = self.reply(&envelope, body).await;
            }
        }
    }

    /// Handle the reserved `init` lifecycle message
    async fn handle_init(self: &Arc<Self>, req: &Envelope) -> Result<(), NodeError> {
        let node_id = req
            .body
            .field("node_id")
            .and_then(serde_json::Value::as_str)
            .map(NodeId::from)
            .ok_or(NodeError::MissingField("node_id"))?;
        let node_ids = req
            .body
            .field("node_ids")
            .and_then(serde_json::Value::as_array)
            .ok_or(NodeError::MissingField("node_ids"))?
            .iter()
            .filter_map(serde_json::Value::as_str)
            .map(NodeId::from)
            .collect();

        self.state
            .set(NodeState::new(node_id.clone(), node_ids))
            .map_err(|_| NodeError::AlreadyInitialized)?;
        tracing::info!(node_id = %node_id, "node initialized");

        // Optional user init hook, run after state is in place and
        // before init_ok is emitted.
        if let Some(hook) = self.handler_for("init") {
            hook.handle(self.clone(), req.clone()).await?;
        }

        self.reply(req, Body::new("init_ok")).await
    }
}

/// The runtime loop: transport input merged with injected events
///
/// Owns the event queue receiver and the reader/writer/ticker tasks.
/// Generic over the I/O halves so tests can drive a node through
/// in-memory pipes.
pub struct Runtime {
    node: Arc<Node>,
    events: mpsc::Sender<Event>,
    events_rx: mpsc::Receiver<Event>,
    inflight: Arc<Semaphore>,
}

impl Runtime {
    /// Create a runtime writing protocol output to the given sink
    pub fn new<W>(config: NodeConfig, writer: W) -> Self
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (events, events_rx) = mpsc::channel(config.queue_capacity);
        let (outbound, _writer_task) = LineWriter::spawn(writer, config.queue_capacity);
        let inflight = Arc::new(Semaphore::new(config.max_inflight));

        let node = Arc::new(Node {
            config,
            pending: PendingTable::new(),
            next_msg_id: AtomicU64::new(0),
            state: OnceLock::new(),
            handlers: RwLock::new(HashMap::new()),
            tick_handler: RwLock::new(None),
            outbound,
            events: events.clone(),
            stopped: Arc::new(AtomicBool::new(false)),
        });

        Self {
            node,
            events,
            events_rx,
            inflight,
        }
    }

    /// Create a runtime over standard output
    pub fn stdio(config: NodeConfig) -> Self {
        Self::new(config, tokio::io::stdout())
    }

    /// Handle to the node, for handler registration and RPC issuing
    pub fn node(&self) -> Arc<Node> {
        self.node.clone()
    }

    /// Run the dispatcher loop until end of input
    ///
    /// The loop itself never blocks on handler work. Replies are
    /// resolved inline (a table lookup and a one-shot send); other
    /// messages are handed to spawned workers that acquire a pool
    /// permit before dispatching, so a saturated pool queues work
    /// without ever starving the replies that would drain it. `init`
    /// is the one message dispatched inline: state must be installed
    /// before any pipelined follow-up message is examined.
    pub async fn run<R>(mut self, input: R) -> Result<(), NodeError>
    where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        let reader = spawn_reader(input, self.events.clone());
        let _ticker = spawn_ticker(
            self.node.config.tick_interval,
            self.node.stopped.clone(),
            self.events.clone(),
        );

        while let Some(event) = self.events_rx.recv().await {
            match event {
                Event::Message(envelope) if envelope.body.in_reply_to.is_some() => {
                    self.node.resolve_reply(envelope);
                }
                Event::Message(envelope) if envelope.body.kind == "init" => {
                    self.node.clone().dispatch(envelope).await;
                }
                Event::Message(envelope) => {
                    let node = self.node.clone();
                    let inflight = self.inflight.clone();
                    tokio::spawn(async move {
                        let Ok(_permit) = inflight.acquire_owned().await else {
                            return;
                        };
                        node.dispatch(envelope).await;
                    });
                }
                Event::Tick => {
                    if let Some(handler) = self.node.tick_handler() {
                        let node = self.node.clone();
                        tokio::spawn(async move { handler.tick(node).await });
                    }
                }
                Event::Shutdown => break,
            }
        }

        self.node.stop();
        reader.abort();
        Ok(())
    }
}

/// Spawn the transport reader feeding the event queue
///
/// Malformed lines are logged and skipped without corrupting subsequent
/// processing; end of input injects shutdown.
fn spawn_reader<R>(input: R, events: mpsc::Sender<Event>) -> JoinHandle<()>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = input.lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match decode_line(&line) {
                        Ok(envelope) => {
                            tracing::debug!(
                                src = %envelope.src,
                                kind = %envelope.body.kind,
                                "received"
                            );
                            if events.send(Event::Message(envelope)).await.is_err() {
                                return;
                            }
                        }
                        Err(err) => tracing::warn!(%err, "skipping malformed input line"),
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    tracing::error!(%err, "transport read failed");
                    break;
                }
            }
        }
        let _ = events.send(Event::Shutdown).await;
    })
}
