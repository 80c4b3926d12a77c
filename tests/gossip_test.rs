// Gossip Tests
// Anti-entropy convergence over simulated peer graphs. Rounds are
// driven by hand: each round computes every engine's pending batches,
// delivers them, and routes the acknowledgements back.

use meshline::{GossipEngine, NodeId};
use std::collections::HashMap;

fn sorted(mut values: Vec<u64>) -> Vec<u64> {
    values.sort_unstable();
    values
}

/// Deliver every pending batch once and apply the acks, as one tick
/// on every node would.
fn run_round(engines: &HashMap<NodeId, GossipEngine<u64>>) {
    let ids: Vec<NodeId> = engines.keys().cloned().collect();
    let mut deliveries = Vec::new();
    for id in &ids {
        for (peer, batch) in engines[id].pending_batches() {
            deliveries.push((id.clone(), peer, batch));
        }
    }
    for (from, to, batch) in deliveries {
        let ack = engines[&to].absorb(&from, batch);
        engines[&from].acknowledge(&to, ack);
    }
}

fn cluster(topology: Vec<(&str, Vec<&str>)>) -> HashMap<NodeId, GossipEngine<u64>> {
    let mut engines = HashMap::new();
    for (id, peers) in topology {
        let engine = GossipEngine::new();
        engine.set_peers(peers.into_iter().map(NodeId::from).collect());
        engines.insert(NodeId::from(id), engine);
    }
    engines
}

// ============================================================================
// CONVERGENCE
// ============================================================================

#[test]
fn test_star_topology_converges_in_two_rounds() {
    // Node A with peers {B, C} learns "m1"; after two gossip rounds
    // both B and C hold it.
    let engines = cluster(vec![
        ("a", vec!["b", "c"]),
        ("b", vec!["a"]),
        ("c", vec!["a"]),
    ]);
    engines[&NodeId::from("a")].learn(1, None);

    run_round(&engines);
    run_round(&engines);

    assert_eq!(engines[&NodeId::from("b")].values(), vec![1]);
    assert_eq!(engines[&NodeId::from("c")].values(), vec![1]);
}

#[test]
fn test_chain_topology_converges_within_diameter_rounds() {
    let engines = cluster(vec![
        ("n1", vec!["n2"]),
        ("n2", vec!["n1", "n3"]),
        ("n3", vec!["n2", "n4"]),
        ("n4", vec!["n3"]),
    ]);
    engines[&NodeId::from("n1")].learn(7, None);
    engines[&NodeId::from("n4")].learn(8, None);

    // Graph diameter is 3; one extra round for slack.
    for _ in 0..4 {
        run_round(&engines);
    }

    for engine in engines.values() {
        assert_eq!(sorted(engine.values()), vec![7, 8]);
    }
}

#[test]
fn test_quiescence_after_convergence() {
    let engines = cluster(vec![("n1", vec!["n2"]), ("n2", vec!["n1"])]);
    engines[&NodeId::from("n1")].learn(1, None);

    run_round(&engines);
    run_round(&engines);

    // Fully acknowledged on both sides: nothing left to send.
    for engine in engines.values() {
        assert!(engine.pending_batches().is_empty());
    }
}

// ============================================================================
// LOSS AND REORDERING
// ============================================================================

#[test]
fn test_dropped_batch_is_retried_next_round() {
    let engines = cluster(vec![("n1", vec!["n2"]), ("n2", vec!["n1"])]);
    let n1 = NodeId::from("n1");
    let n2 = NodeId::from("n2");
    engines[&n1].learn(5, None);

    // Round one: the batch is computed but lost in transit, so no
    // absorb and no ack happen.
    let lost = engines[&n1].pending_batches();
    assert_eq!(lost, vec![(n2.clone(), vec![5])]);

    // Next round recomputes the identical diff from scratch.
    let retried = engines[&n1].pending_batches();
    assert_eq!(retried, vec![(n2.clone(), vec![5])]);

    run_round(&engines);
    assert_eq!(engines[&n2].values(), vec![5]);
}

#[test]
fn test_duplicate_delivery_changes_nothing() {
    let engines = cluster(vec![("n1", vec!["n2"]), ("n2", vec!["n1"])]);
    let n1 = NodeId::from("n1");
    let n2 = NodeId::from("n2");
    engines[&n1].learn(5, None);

    let batch = engines[&n1].pending_batches().remove(0).1;
    engines[&n2].absorb(&n1, batch.clone());
    engines[&n2].absorb(&n1, batch);

    assert_eq!(engines[&n2].values(), vec![5]);
    // n2 learned the value from n1, so n2 never gossips it back.
    assert!(engines[&n2].pending_batches().is_empty());
}
