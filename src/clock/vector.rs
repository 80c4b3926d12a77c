// Vector Clock - Per-process counter vectors
//
// Establishes a partial causal order between events across processes.
// A process bumps its own component on every local event and merges in
// foreign clocks when messages arrive. Comparison runs over the union of
// the keys of both operands, so a process present only on one side still
// participates with an implicit count of zero.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

/// Vector clock mapping a process name to its event counter
///
/// An absent process is equivalent to a counter of zero. Counters only
/// ever grow: `increment` bumps the owner's own component and `merge`
/// takes the pointwise maximum, so no component ever decreases.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct VectorClock {
    counts: HashMap<String, u64>,
}

impl VectorClock {
    /// Create an empty clock (all components zero)
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment the counter for a process (creates it at 1 if absent)
    pub fn increment(&mut self, process: &str) {
        *self.counts.entry(process.to_string()).or_insert(0) += 1;
    }

    /// Get the counter for a process (0 if absent)
    pub fn get(&self, process: &str) -> u64 {
        self.counts.get(process).copied().unwrap_or(0)
    }

    /// Merge another clock into this one (pointwise maximum)
    ///
    /// This is the only way foreign processes' counters enter the local
    /// clock, and it covers keys absent locally.
    pub fn merge(&mut self, other: &VectorClock) {
        for (process, &count) in &other.counts {
            let entry = self.counts.entry(process.clone()).or_insert(0);
            if *entry < count {
                *entry = count;
            }
        }
    }

    /// Number of processes with a non-zero counter
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Check whether no process has ticked yet
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Check whether this clock strictly happens-before another
    ///
    /// True iff every component is <= the other's and at least one is
    /// strictly smaller.
    pub fn happens_before(&self, other: &VectorClock) -> bool {
        self.compare(other) == Some(Ordering::Less)
    }

    /// Check whether two clocks are causally concurrent
    ///
    /// True iff neither happens-before the other and they are not equal.
    pub fn is_concurrent(&self, other: &VectorClock) -> bool {
        self.compare(other).is_none()
    }

    /// Compare two clocks component-wise over the union of their keys
    ///
    /// `None` means the clocks are concurrent: one side is ahead on some
    /// process and behind on another.
    fn compare(&self, other: &VectorClock) -> Option<Ordering> {
        let mut lesser = false;
        let mut greater = false;

        let union = self
            .counts
            .keys()
            .chain(other.counts.keys().filter(|p| !self.counts.contains_key(p.as_str())));

        for process in union {
            let ours = self.get(process);
            let theirs = other.get(process);
            if ours < theirs {
                lesser = true;
            } else if ours > theirs {
                greater = true;
            }
            if lesser && greater {
                return None;
            }
        }

        match (lesser, greater) {
            (false, false) => Some(Ordering::Equal),
            (true, false) => Some(Ordering::Less),
            (false, true) => Some(Ordering::Greater),
            (true, true) => None,
        }
    }
}

impl PartialEq for VectorClock {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other) == Some(Ordering::Equal)
    }
}

impl PartialOrd for VectorClock {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.compare(other)
    }
}

impl fmt::Display for VectorClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut entries: Vec<_> = self.counts.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        write!(f, "{{")?;
        for (i, (process, count)) in entries.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", process, count)?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clock(entries: &[(&str, u64)]) -> VectorClock {
        let mut vc = VectorClock::new();
        for (process, count) in entries {
            for _ in 0..*count {
                vc.increment(process);
            }
        }
        vc
    }

    #[test]
    fn test_increment_from_absent_starts_at_one() {
        let mut vc = VectorClock::new();
        assert_eq!(vc.get("p1"), 0);
        vc.increment("p1");
        assert_eq!(vc.get("p1"), 1);
        vc.increment("p1");
        assert_eq!(vc.get("p1"), 2);
    }

    #[test]
    fn test_merge_takes_pointwise_maximum() {
        let mut a = clock(&[("p1", 3), ("p2", 1)]);
        let b = clock(&[("p1", 1), ("p2", 4), ("p3", 2)]);
        a.merge(&b);

        assert_eq!(a.get("p1"), 3);
        assert_eq!(a.get("p2"), 4);
        assert_eq!(a.get("p3"), 2);
    }

    #[test]
    fn test_merge_covers_keys_absent_locally() {
        let mut a = VectorClock::new();
        let b = clock(&[("p9", 7)]);
        a.merge(&b);
        assert_eq!(a.get("p9"), 7);
    }

    #[test]
    fn test_absent_key_counts_as_zero_in_comparison() {
        // Union semantics: the right operand being ahead on a process
        // absent from the left must be visible to the comparison.
        let a = clock(&[("p1", 1)]);
        let b = clock(&[("p1", 1), ("p2", 1)]);

        assert!(a.happens_before(&b));
        assert!(!b.happens_before(&a));
    }

    #[test]
    fn test_merge_with_empty_is_identity() {
        let mut a = clock(&[("p1", 2), ("p2", 5)]);
        let before = a.clone();
        a.merge(&VectorClock::new());
        assert_eq!(a, before);
    }

    #[test]
    fn test_display_sorted() {
        let vc = clock(&[("p2", 1), ("p1", 2)]);
        assert_eq!(vc.to_string(), "{p1: 2, p2: 1}");
    }
}
