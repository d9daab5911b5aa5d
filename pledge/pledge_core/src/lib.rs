#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

//! # Pledge Core
//!
//! Shared building blocks for the pledge workspace.
//!
//! - **error**: the failure taxonomy a future can complete with
//! - **outcome**: the `Try<T>` outcome alias and helpers that evaluate user
//!   code while capturing both returned errors and panics

pub mod error;
pub mod outcome;

pub use error::{BoxError, Cause, FutureError};
pub use outcome::{try_of, try_run, Try};
