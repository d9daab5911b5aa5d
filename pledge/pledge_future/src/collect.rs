//! Operations over collections of futures.
//!
//! None of these block. Each subscribes to every input and completes its
//! result from whichever callback settles it first; later callbacks find the
//! result already completed and do nothing.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use log::trace;
use parking_lot::Mutex;
use pledge_concurrency::{default_executor, ExecutorRef};
use pledge_core::{try_run, FutureError};

use crate::future::Future;

impl<T> Future<T>
where
    T: Clone + Send + 'static,
{
    /// Collect the values of `futures` in input order.
    ///
    /// Fails as soon as any input fails, with the first failure observed.
    pub fn sequence<I>(futures: I) -> Future<Vec<T>>
    where
        I: IntoIterator<Item = Future<T>>,
    {
        Self::sequence_on(default_executor(), futures)
    }

    /// [`sequence`](Future::sequence) with callbacks on `executor`.
    pub fn sequence_on<I>(executor: ExecutorRef, futures: I) -> Future<Vec<T>>
    where
        I: IntoIterator<Item = Future<T>>,
    {
        let futures: Vec<Future<T>> = futures.into_iter().collect();
        let target = Future::pending(executor);

        if futures.is_empty() {
            target.try_complete(Ok(Vec::new()));
            return target;
        }

        let slots: Arc<Mutex<Vec<Option<T>>>> =
            Arc::new(Mutex::new(futures.iter().map(|_| None).collect()));
        let remaining = Arc::new(AtomicUsize::new(futures.len()));

        for (index, future) in futures.iter().enumerate() {
            let slots = Arc::clone(&slots);
            let remaining = Arc::clone(&remaining);
            let target = target.clone();
            future.on_complete(move |outcome| match outcome {
                Ok(value) => {
                    slots.lock()[index] = Some(value);
                    if remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
                        let values = slots.lock().drain(..).flatten().collect();
                        target.try_complete(Ok(values));
                    }
                }
                Err(error) => {
                    trace!("Input {} failed, failing the sequence", index);
                    target.try_complete(Err(error));
                }
            });
        }

        target
    }

    /// Left fold of the values of `futures`, starting from `zero`.
    ///
    /// Waits for every input; any failure fails the fold.
    pub fn fold<U, I, F>(futures: I, zero: U, combine: F) -> Future<U>
    where
        U: Clone + Send + 'static,
        I: IntoIterator<Item = Future<T>>,
        F: FnMut(U, T) -> U + Send + 'static,
    {
        Self::fold_on(default_executor(), futures, zero, combine)
    }

    /// [`fold`](Future::fold) running `combine` on `executor`.
    pub fn fold_on<U, I, F>(executor: ExecutorRef, futures: I, zero: U, combine: F) -> Future<U>
    where
        U: Clone + Send + 'static,
        I: IntoIterator<Item = Future<T>>,
        F: FnMut(U, T) -> U + Send + 'static,
    {
        Self::sequence_on(executor, futures)
            .map(move |values| values.into_iter().fold(zero, combine))
    }

    /// The first value, by completion order, satisfying `predicate`.
    ///
    /// Completes with `None` once every input has completed without a match;
    /// failed inputs never match.
    pub fn find<I, P>(futures: I, predicate: P) -> Future<Option<T>>
    where
        I: IntoIterator<Item = Future<T>>,
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Self::find_on(default_executor(), futures, predicate)
    }

    /// [`find`](Future::find) with callbacks on `executor`.
    pub fn find_on<I, P>(executor: ExecutorRef, futures: I, predicate: P) -> Future<Option<T>>
    where
        I: IntoIterator<Item = Future<T>>,
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let futures: Vec<Future<T>> = futures.into_iter().collect();
        let target = Future::pending(executor);

        if futures.is_empty() {
            target.try_complete(Ok(None));
            return target;
        }

        let predicate = Arc::new(predicate);
        let remaining = Arc::new(AtomicUsize::new(futures.len()));

        for future in &futures {
            let predicate = Arc::clone(&predicate);
            let remaining = Arc::clone(&remaining);
            let target = target.clone();
            future.on_complete(move |outcome| {
                if let Ok(value) = outcome {
                    if !target.is_completed() && matches!(try_run(|| predicate(&value)), Ok(true))
                    {
                        target.try_complete(Ok(Some(value)));
                    }
                }
                if remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
                    target.try_complete(Ok(None));
                }
            });
        }

        target
    }

    /// Adopt the outcome of whichever input completes first.
    ///
    /// An empty input completes with [`FutureError::Empty`].
    pub fn first_completed_of<I>(futures: I) -> Future<T>
    where
        I: IntoIterator<Item = Future<T>>,
    {
        Self::first_completed_of_on(default_executor(), futures)
    }

    /// [`first_completed_of`](Future::first_completed_of) with callbacks on `executor`.
    pub fn first_completed_of_on<I>(executor: ExecutorRef, futures: I) -> Future<T>
    where
        I: IntoIterator<Item = Future<T>>,
    {
        let target = Future::pending(executor);
        let mut any = false;

        for future in futures {
            any = true;
            let target = target.clone();
            future.on_complete(move |outcome| {
                target.try_complete(outcome);
            });
        }

        if !any {
            target.try_complete(Err(FutureError::Empty));
        }
        target
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pledge_concurrency::InlineExecutor;

    fn inline() -> ExecutorRef {
        Arc::new(InlineExecutor::new())
    }

    #[test]
    fn test_sequence_of_nothing() {
        let empty: Vec<Future<u8>> = Vec::new();
        assert_eq!(Future::sequence_on(inline(), empty).get().unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_sequence_keeps_input_order() {
        let executor = inline();
        let first = Future::<u32>::pending(executor.clone());
        let second = Future::<u32>::pending(executor.clone());

        let all = Future::sequence_on(executor, vec![first.clone(), second.clone()]);

        // Completion order is the reverse of input order
        second.try_complete(Ok(2));
        assert!(!all.is_completed());
        first.try_complete(Ok(1));

        assert_eq!(all.get().unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_sequence_first_failure_wins() {
        let executor = inline();
        let a = Future::<u32>::pending(executor.clone());
        let b = Future::<u32>::pending(executor.clone());
        let all = Future::sequence_on(executor, vec![a.clone(), b.clone()]);

        b.try_complete(Err(FutureError::failure("b failed")));
        a.try_complete(Err(FutureError::failure("a failed")));

        assert_eq!(all.get().unwrap_err().to_string(), "b failed");
    }

    #[test]
    fn test_find_follows_completion_order() {
        let executor = inline();
        let a = Future::<u32>::pending(executor.clone());
        let b = Future::<u32>::pending(executor.clone());
        let found = Future::find_on(executor, vec![a.clone(), b.clone()], |v| *v > 10);

        b.try_complete(Ok(20));
        a.try_complete(Ok(30));

        assert_eq!(found.get().unwrap(), Some(20));
    }

    #[test]
    fn test_find_ignores_failures() {
        let executor = inline();
        let inputs = vec![
            Future::of_on(executor.clone(), || 3),
            Future::failed(FutureError::failure("skip me")),
        ];

        let found = Future::find_on(executor, inputs, |v| *v == 3);
        assert_eq!(found.get().unwrap(), Some(3));
    }

    #[test]
    fn test_first_completed_of_nothing_is_empty() {
        let none: Vec<Future<u8>> = Vec::new();
        let first = Future::first_completed_of_on(inline(), none);
        assert!(matches!(first.get(), Err(FutureError::Empty)));
    }
}
