// Node binary - Reserved handler wiring over stdio
//
// Registers the workload handlers (echo, generate, broadcast, read,
// topology, gossip) and runs the dispatcher over standard input and
// output. Diagnostics go to stderr; stdout carries protocol lines only.

use meshline::{Body, Envelope, GossipEngine, Node, NodeConfig, NodeError, NodeId, Runtime};
use serde_json::Value;
use std::sync::Arc;
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let runtime = Runtime::stdio(NodeConfig::default());
    let node = runtime.node();
    let engine: Arc<GossipEngine<u64>> = Arc::new(GossipEngine::new());

    node.on("echo", |node: Arc<Node>, req: Envelope| async move {
        let echo = req.body.field("echo").cloned().unwrap_or(Value::Null);
        node.reply(&req, Body::new("echo_ok").with("echo", echo)).await
    });

    node.on("generate", |node: Arc<Node>, req: Envelope| async move {
        let id = format!("{}-{}", node.id(), node.next_msg_id());
        node.reply(&req, Body::new("generate_ok").with("id", id)).await
    });

    let broadcast_engine = engine.clone();
    node.on("broadcast", move |node: Arc<Node>, req: Envelope| {
        let engine = broadcast_engine.clone();
        async move {
            let message = req
                .body
                .field("message")
                .and_then(Value::as_u64)
                .ok_or(NodeError::MissingField("message"))?;
            if engine.learn(message, Some(&req.src)) {
                tracing::debug!(message, "learned new value");
            }
            node.reply(&req, Body::new("broadcast_ok")).await
        }
    });

    let read_engine = engine.clone();
    node.on("read", move |node: Arc<Node>, req: Envelope| {
        let engine = read_engine.clone();
        async move {
            node.reply(&req, Body::new("read_ok").with("messages", engine.values()))
                .await
        }
    });

    let topology_engine = engine.clone();
    node.on("topology", move |node: Arc<Node>, req: Envelope| {
        let engine = topology_engine.clone();
        async move {
            let topology = req
                .body
                .field("topology")
                .and_then(Value::as_object)
                .ok_or(NodeError::MissingField("topology"))?;
            let peers: Vec<NodeId> = topology
                .get(node.id().as_str())
                .and_then(Value::as_array)
                .map(|list| {
                    list.iter()
                        .filter_map(Value::as_str)
                        .map(NodeId::from)
                        .collect()
                })
                .unwrap_or_default();
            tracing::info!(peers = peers.len(), "topology installed");
            engine.set_peers(peers);
            node.reply(&req, Body::new("topology_ok")).await
        }
    });

    let gossip_engine = engine.clone();
    node.on("gossip", move |node: Arc<Node>, req: Envelope| {
        let engine = gossip_engine.clone();
        async move {
            let batch: Vec<u64> = req
                .body
                .field("message")
                .cloned()
                .and_then(|v| serde_json::from_value(v).ok())
                .ok_or(NodeError::MissingField("message"))?;
            let ack = engine.absorb(&req.src, batch);
            node.reply(&req, Body::new("gossip_ok").with("message", ack))
                .await
        }
    });

    let tick_engine = engine.clone();
    node.on_tick(move |node: Arc<Node>| {
        let engine = tick_engine.clone();
        async move {
            engine.gossip_round(&node).await;
        }
    });

    let stdin = BufReader::new(tokio::io::stdin());
    if let Err(err) = runtime.run(stdin).await {
        tracing::error!(%err, "runtime failed");
        std::process::exit(1);
    }
}
