// Node State - Identity assigned at init
//
// The `init` message fixes the node id and the cluster roster exactly
// once; everything downstream reads them immutably.

use crate::wire::NodeId;

/// Identity and cluster membership of a running node
#[derive(Clone, Debug, Default)]
pub struct NodeState {
    node_id: NodeId,
    node_ids: Vec<NodeId>,
}

impl NodeState {
    /// Create the state from the `init` payload
    pub fn new(node_id: NodeId, node_ids: Vec<NodeId>) -> Self {
        Self { node_id, node_ids }
    }

    /// This node's id
    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    /// Every node in the cluster, including this one
    pub fn node_ids(&self) -> &[NodeId] {
        &self.node_ids
    }

    /// Every node in the cluster except this one
    pub fn other_nodes(&self) -> Vec<NodeId> {
        self.node_ids
            .iter()
            .filter(|id| **id != self.node_id)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_other_nodes_excludes_self() {
        let state = NodeState::new(
            NodeId::from("n1"),
            vec![NodeId::from("n1"), NodeId::from("n2"), NodeId::from("n3")],
        );
        assert_eq!(
            state.other_nodes(),
            vec![NodeId::from("n2"), NodeId::from("n3")]
        );
    }
}
