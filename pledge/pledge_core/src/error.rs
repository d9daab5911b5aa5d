//! Error types for the pledge future engine.
//!
//! A future never throws across a combinator chain. Whatever goes wrong while
//! producing its value is stored as a [`FutureError`] and handed to every
//! reader, so the type is cheap to clone and keeps the original cause intact.

use std::any::Any;
use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Boxed error accepted from user computations.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Shared handle to the original error raised by a computation.
pub type Cause = Arc<dyn StdError + Send + Sync + 'static>;

/// The failure a future can complete with.
#[derive(Debug, Clone, Error)]
pub enum FutureError {
    /// The computation, or a function applied by a combinator, returned an error
    #[error("{0}")]
    Failed(Cause),

    /// User code panicked while producing the value
    #[error("computation panicked: {0}")]
    Panicked(String),

    /// The future was cancelled before it completed
    #[error("future was cancelled")]
    Cancelled,

    /// A filter rejected the value, so there is nothing to return
    #[error("no such element: predicate did not hold")]
    Empty,

    /// The executor refused to run the computation
    #[error("task rejected by executor: {0}")]
    Rejected(String),

    /// A timed wait elapsed before the future completed
    #[error("future not completed after {0:?}")]
    Timeout(Duration),

    /// A promise was completed a second time
    #[error("promise already completed")]
    AlreadyCompleted,
}

impl FutureError {
    /// Wrap an arbitrary error as the cause of a failed future.
    pub fn failure(error: impl Into<BoxError>) -> Self {
        Self::Failed(Arc::from(error.into()))
    }

    /// Build a failure from the payload of a caught panic.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(message) = payload.downcast_ref::<&str>() {
            (*message).to_string()
        } else if let Some(message) = payload.downcast_ref::<String>() {
            message.clone()
        } else {
            "<unknown panic>".to_string()
        };
        Self::Panicked(message)
    }

    /// The original error, if this failure came from user code returning one.
    pub fn root_cause(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        match self {
            Self::Failed(cause) => Some(cause.as_ref()),
            _ => None,
        }
    }

    /// Downcast the original error to a concrete type.
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        self.root_cause().and_then(|cause| cause.downcast_ref::<E>())
    }

    /// Whether this is the outcome of a successful `cancel()`.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Whether this marks a filtered-out value rather than a real failure.
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}
