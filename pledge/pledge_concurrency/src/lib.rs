#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

//! # Pledge Concurrency
//!
//! Execution infrastructure for the pledge future engine.
//!
//! This crate provides:
//!
//! - The `Executor` abstraction futures submit their work to
//! - A worker thread pool and an inline executor implementing it
//! - The lazily started process-wide default pool
//! - Pool configuration loading and validation
//! - Small atomic helpers shared by the above

/// Pool configuration loading, validation and merging
pub mod config;

/// Worker pools
pub mod pool;

/// Task submission, handles and the default executor
pub mod scheduler;

/// Synchronization helpers
pub mod sync;

// Re-export key types for easier access
pub use config::{ConfigError, ThreadPoolConfig};
pub use pool::thread::ThreadPool;
pub use scheduler::executor::{
    default_executor, ExecutionError, Executor, ExecutorRef, InlineExecutor, Task, TaskHandle,
    TaskStatus,
};
