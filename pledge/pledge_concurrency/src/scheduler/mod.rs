//! Task submission and tracking.
//!
//! Futures never talk to a pool directly. They hold an [`ExecutorRef`] and
//! submit boxed tasks through the [`Executor`] trait:
//!
//! - `ThreadPool` runs tasks on worker threads
//! - `InlineExecutor` runs them on the submitting thread
//! - `default_executor()` is the process-wide pool

pub mod executor;

pub use executor::{
    default_executor, ExecutionError, Executor, ExecutorRef, InlineExecutor, Task, TaskHandle,
    TaskStatus,
};
