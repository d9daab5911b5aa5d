//! Derived futures.
//!
//! Every combinator returns a new future on the source's executor. The new
//! future subscribes to its source with `on_complete` and is completed from
//! that callback, so user functions run as executor tasks and a panic in
//! one of them becomes the derived future's failure.

use pledge_core::{try_of, try_run, BoxError, FutureError, Try};

use crate::future::Future;

impl<T> Future<T>
where
    T: Clone + Send + 'static,
{
    fn derive<U, F>(&self, on_outcome: F) -> Future<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(Try<T>, Future<U>) + Send + 'static,
    {
        let target = Future::pending(self.executor().clone());
        let completer = target.clone();
        self.on_complete(move |outcome| on_outcome(outcome, completer));
        target
    }

    /// Transform the value once it is available.
    ///
    /// A failure of the source propagates unchanged without calling `f`.
    pub fn map<U, F>(&self, f: F) -> Future<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        self.derive(move |outcome, target| {
            target.try_complete(outcome.and_then(|value| try_run(|| f(value))));
        })
    }

    /// Transform the value with a fallible function.
    pub fn map_try<U, E, F>(&self, f: F) -> Future<U>
    where
        U: Clone + Send + 'static,
        E: Into<BoxError>,
        F: FnOnce(T) -> Result<U, E> + Send + 'static,
    {
        self.derive(move |outcome, target| {
            target.try_complete(outcome.and_then(|value| try_of(|| f(value))));
        })
    }

    /// Chain a dependent asynchronous step.
    ///
    /// `f` is only called once the source has a value, so nested
    /// `flat_map`s run their steps one after another.
    pub fn flat_map<U, F>(&self, f: F) -> Future<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> Future<U> + Send + 'static,
    {
        self.derive(move |outcome, target| {
            match outcome.and_then(|value| try_run(|| f(value))) {
                Ok(next) => {
                    next.on_complete(move |outcome| {
                        target.try_complete(outcome);
                    });
                }
                Err(error) => {
                    target.try_complete(Err(error));
                }
            }
        })
    }

    /// Keep the value only if `predicate` holds, otherwise complete with
    /// [`FutureError::Empty`].
    pub fn filter<P>(&self, predicate: P) -> Future<T>
    where
        P: FnOnce(&T) -> bool + Send + 'static,
    {
        self.derive(move |outcome, target| {
            let filtered = outcome.and_then(|value| match try_run(|| predicate(&value)) {
                Ok(true) => Ok(value),
                Ok(false) => Err(FutureError::Empty),
                Err(error) => Err(error),
            });
            target.try_complete(filtered);
        })
    }

    /// Replace a failure with the value computed by `handler`.
    ///
    /// The handler runs on the executor of this future. A panicking handler
    /// yields its own failure; a success passes through untouched.
    pub fn recover<F>(&self, handler: F) -> Future<T>
    where
        F: FnOnce(FutureError) -> T + Send + 'static,
    {
        self.derive(move |outcome, target| {
            let recovered = match outcome {
                Ok(value) => Ok(value),
                Err(error) => try_run(|| handler(error)),
            };
            target.try_complete(recovered);
        })
    }

    /// Replace a failure with the eventual outcome of another future.
    pub fn recover_with<F>(&self, handler: F) -> Future<T>
    where
        F: FnOnce(FutureError) -> Future<T> + Send + 'static,
    {
        self.derive(move |outcome, target| match outcome {
            Ok(value) => {
                target.try_complete(Ok(value));
            }
            Err(error) => match try_run(|| handler(error)) {
                Ok(next) => {
                    next.on_complete(move |outcome| {
                        target.try_complete(outcome);
                    });
                }
                Err(error) => {
                    target.try_complete(Err(error));
                }
            },
        })
    }

    /// On failure, use the value of `other` instead.
    ///
    /// If `other` fails as well, the result keeps this future's original
    /// failure rather than the fallback's.
    pub fn fallback_to(&self, other: &Future<T>) -> Future<T> {
        let fallback = other.clone();
        self.derive(move |outcome, target| match outcome {
            Ok(value) => {
                target.try_complete(Ok(value));
            }
            Err(original) => {
                fallback.on_complete(move |alternative| {
                    target.try_complete(alternative.or(Err(original)));
                });
            }
        })
    }

    /// Block until completion, then apply `f` to the outcome.
    pub fn transform<U, F>(&self, f: F) -> U
    where
        F: FnOnce(Try<T>) -> U,
    {
        f(self.get())
    }

    /// Apply `f` to the outcome once available, as a new future.
    pub fn transform_value<U, F>(&self, f: F) -> Future<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(Try<T>) -> Try<U> + Send + 'static,
    {
        self.derive(move |outcome, target| {
            target.try_complete(try_run(|| f(outcome)).and_then(|transformed| transformed));
        })
    }

    /// Pair this value with the value of `other`.
    ///
    /// Fails with the first failure, checking this future before `other`.
    pub fn zip<U>(&self, other: &Future<U>) -> Future<(T, U)>
    where
        U: Clone + Send + 'static,
    {
        let right = other.clone();
        self.derive(move |outcome, target| match outcome {
            Ok(left) => {
                right.on_complete(move |outcome| {
                    target.try_complete(outcome.map(|right| (left, right)));
                });
            }
            Err(error) => {
                target.try_complete(Err(error));
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pledge_concurrency::{ExecutorRef, InlineExecutor};
    use std::sync::Arc;

    fn inline() -> ExecutorRef {
        Arc::new(InlineExecutor::new())
    }

    #[test]
    fn test_derived_future_keeps_executor() {
        let executor = inline();
        let source = Future::of_on(executor.clone(), || 2);
        let derived = source.map(|v| v * 10);

        assert!(Arc::ptr_eq(derived.executor(), &executor));
        // Inline execution completes the whole chain synchronously
        assert_eq!(derived.value().unwrap().unwrap(), 20);
    }

    #[test]
    fn test_map_try_error_becomes_failure() {
        let source = Future::of_on(inline(), || "12x".to_string());
        let parsed = source.map_try(|s| s.parse::<u32>());

        let error = parsed.get().unwrap_err();
        assert!(error.downcast_ref::<std::num::ParseIntError>().is_some());
    }

    #[test]
    fn test_filter_panic_is_failure() {
        let source = Future::of_on(inline(), || 1);
        let filtered = source.filter(|_| panic!("predicate exploded"));

        assert!(filtered.is_failure());
        assert!(matches!(filtered.get(), Err(FutureError::Panicked(_))));
    }

    #[test]
    fn test_transform_value_flattens() {
        let source = Future::of_on(inline(), || 9);
        let failed = source.transform_value(|_| Err::<u8, _>(FutureError::failure("rejected")));

        assert_eq!(failed.get().unwrap_err().to_string(), "rejected");
    }

    #[test]
    fn test_zip_reports_first_failure() {
        let left = Future::of_on(inline(), || 1);
        let right = Future::<u8>::failed(FutureError::failure("right side"));

        let zipped = left.zip(&right);
        assert_eq!(zipped.get().unwrap_err().to_string(), "right side");

        let ok = left.zip(&Future::successful("b"));
        assert_eq!(ok.get().unwrap(), (1, "b"));
    }
}
