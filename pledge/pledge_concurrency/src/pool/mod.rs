//! Worker pools backing the executor abstraction.
//!
//! - Thread pool with named workers, an optional bounded queue and statistics

pub mod thread;

pub use thread::{ThreadPool, ThreadPoolStats};
