// Correlated RPC - In-flight request tracking
//
// Every outgoing request that expects a reply parks a one-shot slot in
// the pending table, keyed by its msg_id. Whichever of {reply, deadline}
// removes the entry first wins; the loser observes an absent entry and
// is a no-op. The table never retains a resolved entry.

use crate::node::{Node, NodeError};
use crate::wire::{Body, ErrorCode, NodeId};
use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Mutex;
use tokio::sync::oneshot;
use tokio::time;

/// Table of in-flight RPCs awaiting exactly one resolution each
#[derive(Default)]
pub struct PendingTable {
    slots: Mutex<HashMap<u64, oneshot::Sender<Body>>>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Park a slot for the given correlation id
    pub(crate) fn register(&self, msg_id: u64) -> oneshot::Receiver<Body> {
        let (tx, rx) = oneshot::channel();
        self.slots.lock().unwrap().insert(msg_id, tx);
        rx
    }

    /// Resolve a pending RPC with a reply body
    ///
    /// Returns false if the entry was already resolved or never existed;
    /// the caller treats that as a silent no-op. Check-then-remove is
    /// atomic under the table lock.
    pub(crate) fn resolve(&self, msg_id: u64, body: Body) -> bool {
        let sender = self.slots.lock().unwrap().remove(&msg_id);
        match sender {
            Some(tx) => {
                // The receiver may have been dropped by a caller that
                // already gave up; still counts as resolved.
                let _ = tx.send(body);
                true
            }
            None => false,
        }
    }

    /// Remove an entry without resolving it (deadline path)
    pub(crate) fn abandon(&self, msg_id: u64) -> bool {
        self.slots.lock().unwrap().remove(&msg_id).is_some()
    }

    /// Number of RPCs currently in flight
    pub fn len(&self) -> usize {
        self.slots.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Node {
    /// Allocate a fresh monotonic message id
    ///
    /// Atomic across concurrent callers; ids are never reused and are
    /// shared by all outgoing requests and RPCs.
    pub fn next_msg_id(&self) -> u64 {
        self.next_msg_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Issue a request and suspend until its reply or the deadline
    ///
    /// The returned body may itself be error-typed: a remote `error`
    /// reply or the locally synthesized timeout both come back as
    /// values, never as faults. `Err` is reserved for local transport
    /// failure.
    pub async fn rpc(&self, dest: impl Into<NodeId>, mut body: Body) -> Result<Body, NodeError> {
        let dest = dest.into();
        let msg_id = self.next_msg_id();
        body.msg_id = Some(msg_id);

        let mut rx = self.pending.register(msg_id);
        if let Err(err) = self.send(dest.clone(), body).await {
            self.pending.abandon(msg_id);
            return Err(err);
        }

        match time::timeout(self.config.rpc_timeout, &mut rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(NodeError::ReplyDropped),
            Err(_elapsed) => {
                if self.pending.abandon(msg_id) {
                    tracing::debug!(%dest, msg_id, "rpc timed out");
                    let mut timeout_body = Body::error(ErrorCode::Timeout, "RPC request timed out");
                    timeout_body.in_reply_to = Some(msg_id);
                    Ok(timeout_body)
                } else {
                    // The reply beat the deadline to the table; collect it.
                    rx.await.map_err(|_| NodeError::ReplyDropped)
                }
            }
        }
    }

    /// Re-issue an RPC until a non-error reply arrives
    ///
    /// Each attempt allocates a fresh msg_id; receivers must tolerate
    /// at-least-once delivery.
    pub async fn retry_rpc(&self, dest: impl Into<NodeId>, body: Body) -> Result<Body, NodeError> {
        let dest = dest.into();
        loop {
            let reply = self.rpc(dest.clone(), body.clone()).await?;
            if !reply.is_error() {
                return Ok(reply);
            }
            tracing::debug!(%dest, kind = %body.kind, "retrying rpc after error reply");
        }
    }

    /// Number of RPCs currently awaiting resolution
    pub fn pending_rpcs(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_is_exactly_once() {
        let table = PendingTable::new();
        let rx = table.register(7);

        assert!(table.resolve(7, Body::new("echo_ok")));
        assert!(!table.resolve(7, Body::new("echo_ok")));
        assert!(table.is_empty());

        let delivered = rx.blocking_recv().unwrap();
        assert_eq!(delivered.kind, "echo_ok");
    }

    #[test]
    fn test_abandon_beats_late_reply() {
        let table = PendingTable::new();
        let _rx = table.register(3);

        assert!(table.abandon(3));
        assert!(!table.resolve(3, Body::new("late")));
        assert!(!table.abandon(3));
    }

    #[test]
    fn test_resolve_unknown_id_is_noop() {
        let table = PendingTable::new();
        assert!(!table.resolve(99, Body::new("stray")));
    }
}
