// Vector Clock Tests
// Causality ordering properties. Comparison here verifies UNION
// semantics: components present in either operand participate, with
// absent keys counting as zero.

use meshline::VectorClock;

fn clock(entries: &[(&str, u64)]) -> VectorClock {
    let mut vc = VectorClock::new();
    for (process, count) in entries {
        for _ in 0..*count {
            vc.increment(process);
        }
    }
    vc
}

// ============================================================================
// COUNTER INVARIANTS
// ============================================================================

#[test]
fn test_counters_never_decrease() {
    let mut vc = VectorClock::new();
    let mut last = 0;
    for _ in 0..100 {
        vc.increment("p1");
        let current = vc.get("p1");
        assert!(current > last);
        last = current;
    }
}

#[test]
fn test_merge_never_decreases_any_component() {
    let mut vc = clock(&[("p1", 5), ("p2", 2)]);
    vc.merge(&clock(&[("p1", 1), ("p2", 9), ("p3", 3)]));

    assert_eq!(vc.get("p1"), 5);
    assert_eq!(vc.get("p2"), 9);
    assert_eq!(vc.get("p3"), 3);
}

// ============================================================================
// MERGE CONVERGENCE
// ============================================================================

#[test]
fn test_merge_is_order_independent() {
    let a = clock(&[("p1", 3), ("p2", 1)]);
    let b = clock(&[("p2", 4), ("p3", 2)]);

    let mut ab = a.clone();
    ab.merge(&b);
    let mut ba = b.clone();
    ba.merge(&a);

    assert_eq!(ab, ba);
}

// ============================================================================
// PARTIAL ORDER
// ============================================================================

#[test]
fn test_happens_before_is_irreflexive() {
    let vc = clock(&[("p1", 2), ("p2", 1)]);
    assert!(!vc.happens_before(&vc));
}

#[test]
fn test_happens_before_is_antisymmetric() {
    let a = clock(&[("p1", 1)]);
    let b = clock(&[("p1", 2), ("p2", 1)]);

    assert!(a.happens_before(&b));
    assert!(!b.happens_before(&a));
}

#[test]
fn test_union_semantics_sees_right_only_process() {
    // A process present only in the right operand must still be
    // considered: {p1:1} < {p1:1, p2:1}.
    let a = clock(&[("p1", 1)]);
    let b = clock(&[("p1", 1), ("p2", 1)]);

    assert!(a.happens_before(&b));
    assert!(!a.is_concurrent(&b));
}

#[test]
fn test_concurrent_iff_neither_dominates() {
    let a = clock(&[("p1", 2), ("p2", 1)]);
    let b = clock(&[("p1", 1), ("p2", 2)]);

    assert!(a.is_concurrent(&b));
    assert!(b.is_concurrent(&a));
    assert!(!a.happens_before(&b));
    assert!(!b.happens_before(&a));
    assert_ne!(a, b);
}

#[test]
fn test_equal_clocks_are_not_concurrent() {
    let a = clock(&[("p1", 2), ("p2", 1)]);
    let b = clock(&[("p1", 2), ("p2", 1)]);

    assert_eq!(a, b);
    assert!(!a.is_concurrent(&b));
    assert!(!a.happens_before(&b));
}

#[test]
fn test_disjoint_nonempty_clocks_are_concurrent() {
    let a = clock(&[("p1", 1)]);
    let b = clock(&[("p2", 1)]);

    assert!(a.is_concurrent(&b));
}
