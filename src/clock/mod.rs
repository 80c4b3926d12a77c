// Clock module - WHO SAW WHAT FIRST
// Vector-clock causality tracking for events across processes

mod vector;

pub use vector::VectorClock;
