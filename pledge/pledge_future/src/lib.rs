#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

//! # Pledge Future
//!
//! Single-assignment futures and promises that run their work and their
//! callbacks on an [`Executor`](pledge_concurrency::Executor).
//!
//! A [`Future`] is created from a computation with [`Future::of`], from an
//! existing outcome with [`Future::from_try`], or through a [`Promise`]. It
//! completes exactly once; everything else is built on top of that:
//!
//! - Callbacks (`on_complete`, `on_success`, `on_failure`) that run once on
//!   the future's executor
//! - Combinators (`map`, `flat_map`, `filter`, `recover`, `fallback_to`, ...)
//!   returning new futures
//! - Collection operations (`sequence`, `fold`, `find`, `first_completed_of`)
//! - Blocking access (`wait`, `get`, `get_or_else`) and cancellation
//!
//! [`Lazy`] is a companion cell for values computed at most once.

mod collect;
mod combinators;

/// The future cell and its callbacks
pub mod future;

/// Memoized computations
pub mod lazy;

/// The write side of a future
pub mod promise;

pub use future::Future;
pub use lazy::Lazy;
pub use promise::Promise;

// Re-export the types that appear in the public API
pub use pledge_concurrency::{default_executor, Executor, ExecutorRef, InlineExecutor, ThreadPool};
pub use pledge_core::{BoxError, FutureError, Try};
