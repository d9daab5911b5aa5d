//! Synchronization primitives shared by the pool and the executors.
//!
//! - Lock-free latch, sequence and running-maximum helpers

pub mod atomic;

pub use atomic::{AtomicFlag, AtomicMax, AtomicSequence};
