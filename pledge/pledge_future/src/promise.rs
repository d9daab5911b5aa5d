//! Write handle for a future completed from outside its computation.

use std::fmt;

use pledge_concurrency::{default_executor, ExecutorRef};
use pledge_core::{FutureError, Try};

use crate::future::Future;

/// Exclusive write handle to a future's result.
///
/// The paired [`Future`] is obtained with [`future`](Promise::future); it
/// observes whatever the promise is completed with. Only the first
/// completion takes effect.
pub struct Promise<T> {
    future: Future<T>,
}

impl<T> Promise<T>
where
    T: Clone + Send + 'static,
{
    /// A pending promise whose future runs callbacks on the default executor.
    pub fn make() -> Self {
        Self::make_on(default_executor())
    }

    /// A pending promise whose future runs callbacks on `executor`.
    pub fn make_on(executor: ExecutorRef) -> Self {
        Self {
            future: Future::pending(executor),
        }
    }

    /// A promise already completed with `value`.
    pub fn successful(value: T) -> Self {
        Self {
            future: Future::successful(value),
        }
    }

    /// A promise already completed with `error`.
    pub fn failed(error: FutureError) -> Self {
        Self {
            future: Future::failed(error),
        }
    }

    /// The future paired with this promise.
    pub fn future(&self) -> Future<T> {
        self.future.clone()
    }

    /// Whether the promise has been completed.
    pub fn is_completed(&self) -> bool {
        self.future.is_completed()
    }

    /// Complete with `outcome`.
    ///
    /// Fails with [`FutureError::AlreadyCompleted`] if the promise was
    /// completed before; the earlier outcome is kept.
    pub fn complete(&self, outcome: Try<T>) -> Result<(), FutureError> {
        if self.future.try_complete(outcome) {
            Ok(())
        } else {
            Err(FutureError::AlreadyCompleted)
        }
    }

    /// Complete with a value. See [`complete`](Promise::complete).
    pub fn success(&self, value: T) -> Result<(), FutureError> {
        self.complete(Ok(value))
    }

    /// Complete with a failure. See [`complete`](Promise::complete).
    pub fn failure(&self, error: FutureError) -> Result<(), FutureError> {
        self.complete(Err(error))
    }

    /// Complete with `outcome` unless already completed; returns whether it took effect.
    pub fn try_complete(&self, outcome: Try<T>) -> bool {
        self.future.try_complete(outcome)
    }

    /// Complete with a value unless already completed.
    pub fn try_success(&self, value: T) -> bool {
        self.try_complete(Ok(value))
    }

    /// Complete with a failure unless already completed.
    pub fn try_failure(&self, error: FutureError) -> bool {
        self.try_complete(Err(error))
    }

    /// Complete with the eventual outcome of `other`.
    pub fn complete_with(&self, other: &Future<T>) -> &Self {
        let target = self.future.clone();
        other.on_complete(move |outcome| {
            target.try_complete(outcome);
        });
        self
    }
}

impl<T: fmt::Debug> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("future", &self.future)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pledge_concurrency::InlineExecutor;
    use std::sync::Arc;

    #[test]
    fn test_second_completion_is_rejected() {
        let promise = Promise::make_on(Arc::new(InlineExecutor::new()));

        assert!(promise.success(15).is_ok());
        assert!(matches!(
            promise.success(16),
            Err(FutureError::AlreadyCompleted)
        ));
        assert!(!promise.try_failure(FutureError::Cancelled));
        assert_eq!(promise.future().get().unwrap(), 15);
    }

    #[test]
    fn test_complete_with_adopts_other() {
        let promise = Promise::make();
        let source = Future::successful("adopted");

        promise.complete_with(&source);
        assert_eq!(promise.future().get().unwrap(), "adopted");
    }

    #[test]
    fn test_already_completed_constructors() {
        let ok = Promise::successful("success!");
        assert!(ok.is_completed());
        assert_eq!(ok.future().get().unwrap(), "success!");

        let failed = Promise::<u8>::failed(FutureError::failure("nope"));
        assert!(failed.future().is_failure());
    }
}
