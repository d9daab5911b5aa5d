//! Outcome of evaluating user code.
//!
//! `Try<T>` is the value a future completes with. Inspection is a plain
//! `match` over `Ok`/`Err`, with [`FutureError`] telling the failure kinds
//! apart.

use std::panic::{self, AssertUnwindSafe};

use crate::error::{BoxError, FutureError};

/// The outcome of a computation: a value or the failure that replaced it.
pub type Try<T> = std::result::Result<T, FutureError>;

/// Evaluate a fallible computation, capturing returned errors and panics.
pub fn try_of<T, E, F>(computation: F) -> Try<T>
where
    F: FnOnce() -> std::result::Result<T, E>,
    E: Into<BoxError>,
{
    match panic::catch_unwind(AssertUnwindSafe(computation)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(error)) => Err(FutureError::failure(error)),
        Err(payload) => Err(FutureError::from_panic(payload)),
    }
}

/// Evaluate an infallible computation, capturing panics.
pub fn try_run<T, F>(computation: F) -> Try<T>
where
    F: FnOnce() -> T,
{
    panic::catch_unwind(AssertUnwindSafe(computation)).map_err(FutureError::from_panic)
}
