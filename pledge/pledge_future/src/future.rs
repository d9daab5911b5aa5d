//! The single-assignment future cell.
//!
//! A [`Future`] is a cheap handle to shared state that starts out pending
//! and is completed exactly once, either by the computation scheduled with
//! [`Future::of`] or through a [`Promise`](crate::Promise). Readers block on
//! a condition variable; callbacks registered while pending are drained at
//! the transition and handed to the future's executor.

use std::fmt;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use log::{debug, error, trace, warn};
use parking_lot::{Condvar, Mutex};
use pledge_concurrency::{default_executor, ExecutorRef, Task, TaskHandle};
use pledge_core::{try_of, try_run, BoxError, FutureError, Try};

/// Callback waiting for the outcome.
type Callback<T> = Box<dyn FnOnce(Try<T>) + Send + 'static>;

enum State<T> {
    Pending(Vec<Callback<T>>),
    Completed(Try<T>),
}

struct Inner<T> {
    executor: ExecutorRef,
    state: Mutex<State<T>>,
    completed: Condvar,
    task: Mutex<Option<TaskHandle>>,
}

/// A value that becomes available asynchronously.
///
/// Cloning a `Future` yields another handle to the same cell; use
/// [`ptr_eq`](Future::ptr_eq) to compare identity.
pub struct Future<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Future<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Future<T> {
    /// Whether both handles refer to the same cell.
    pub fn ptr_eq(&self, other: &Future<T>) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// The executor this future runs its callbacks on.
    pub fn executor(&self) -> &ExecutorRef {
        &self.inner.executor
    }

    /// Whether the future has left the pending state.
    pub fn is_completed(&self) -> bool {
        matches!(*self.inner.state.lock(), State::Completed(_))
    }

    /// Whether the future completed with a value.
    pub fn is_success(&self) -> bool {
        matches!(*self.inner.state.lock(), State::Completed(Ok(_)))
    }

    /// Whether the future completed with a failure.
    ///
    /// A value rejected by [`filter`](Future::filter) is not a failure; see
    /// [`is_empty`](Future::is_empty).
    pub fn is_failure(&self) -> bool {
        match &*self.inner.state.lock() {
            State::Completed(Err(error)) => !error.is_empty(),
            _ => false,
        }
    }

    /// The failure this future completed with, if it has.
    pub fn cause(&self) -> Option<FutureError> {
        match &*self.inner.state.lock() {
            State::Completed(Err(error)) => Some(error.clone()),
            _ => None,
        }
    }

    /// Block until the future completes.
    pub fn wait(&self) -> &Self {
        let mut state = self.inner.state.lock();
        while let State::Pending(_) = *state {
            self.inner.completed.wait(&mut state);
        }
        self
    }

    /// Block until the future completes or `timeout` elapses.
    pub fn wait_timeout(&self, timeout: Duration) -> Result<&Self, FutureError> {
        let deadline = Instant::now() + timeout;
        let mut state = self.inner.state.lock();
        while let State::Pending(_) = *state {
            let waited = self.inner.completed.wait_until(&mut state, deadline);
            if waited.timed_out() && matches!(*state, State::Pending(_)) {
                return Err(FutureError::Timeout(timeout));
            }
        }
        Ok(self)
    }

    /// Block until completion, then report whether there is no value.
    ///
    /// True for filtered-out results and for every failure. Unlike the other
    /// state queries this one blocks; a pending future is never reported as
    /// empty.
    pub fn is_empty(&self) -> bool {
        self.wait();
        !self.is_success()
    }
}

impl<T> Future<T>
where
    T: Clone + Send + 'static,
{
    pub(crate) fn pending(executor: ExecutorRef) -> Self {
        Self {
            inner: Arc::new(Inner {
                executor,
                state: Mutex::new(State::Pending(Vec::new())),
                completed: Condvar::new(),
                task: Mutex::new(None),
            }),
        }
    }

    fn completed(executor: ExecutorRef, outcome: Try<T>) -> Self {
        Self {
            inner: Arc::new(Inner {
                executor,
                state: Mutex::new(State::Completed(outcome)),
                completed: Condvar::new(),
                task: Mutex::new(None),
            }),
        }
    }

    /// Run `computation` on the default executor.
    ///
    /// A panic inside the computation completes the future with
    /// [`FutureError::Panicked`].
    pub fn of<F>(computation: F) -> Self
    where
        F: FnOnce() -> T + Send + 'static,
    {
        Self::of_on(default_executor(), computation)
    }

    /// Run `computation` on `executor`.
    pub fn of_on<F>(executor: ExecutorRef, computation: F) -> Self
    where
        F: FnOnce() -> T + Send + 'static,
    {
        Self::schedule(executor, move || try_run(computation))
    }

    /// Run a fallible `computation` on the default executor.
    ///
    /// An `Err` completes the future with [`FutureError::Failed`] carrying
    /// the original error.
    pub fn try_of<F, E>(computation: F) -> Self
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        E: Into<BoxError>,
    {
        Self::try_of_on(default_executor(), computation)
    }

    /// Run a fallible `computation` on `executor`.
    pub fn try_of_on<F, E>(executor: ExecutorRef, computation: F) -> Self
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        E: Into<BoxError>,
    {
        Self::schedule(executor, move || try_of(computation))
    }

    fn schedule<F>(executor: ExecutorRef, evaluate: F) -> Self
    where
        F: FnOnce() -> Try<T> + Send + 'static,
    {
        let future = Self::pending(executor);
        let producer = future.clone();
        let task: Task = Box::new(move || {
            if producer.is_completed() {
                trace!("Skipping computation of an already completed future");
                return;
            }
            if !producer.try_complete(evaluate()) {
                debug!("Computation finished after the future was completed; result discarded");
            }
        });

        match future.inner.executor.submit(task) {
            Ok(handle) => *future.inner.task.lock() = Some(handle),
            Err(e) => {
                warn!(
                    "Executor '{}' rejected a computation: {}",
                    future.inner.executor.name(),
                    e
                );
                future.try_complete(Err(FutureError::Rejected(e.to_string())));
            }
        }
        future
    }

    /// An already successful future; nothing is scheduled.
    pub fn successful(value: T) -> Self {
        Self::from_try(Ok(value))
    }

    /// An already failed future; nothing is scheduled.
    pub fn failed(error: FutureError) -> Self {
        Self::from_try(Err(error))
    }

    /// A future with exactly the given outcome; nothing is scheduled.
    pub fn from_try(outcome: Try<T>) -> Self {
        Self::completed(default_executor(), outcome)
    }

    /// Adopt the result of a plain thread by joining it on `executor`.
    ///
    /// A panic in the thread completes the future with
    /// [`FutureError::Panicked`].
    pub fn from_join_handle(executor: ExecutorRef, handle: JoinHandle<T>) -> Self {
        Self::schedule(executor, move || {
            handle.join().map_err(FutureError::from_panic)
        })
    }

    /// Non-blocking snapshot of the outcome, `None` while pending.
    ///
    /// Inspecting a future that has not finished yet sees `None`; call
    /// [`wait`](Future::wait) first when the outcome must be known.
    pub fn value(&self) -> Option<Try<T>> {
        match &*self.inner.state.lock() {
            State::Completed(outcome) => Some(outcome.clone()),
            State::Pending(_) => None,
        }
    }

    /// Block until completion and return the outcome.
    pub fn get(&self) -> Try<T> {
        let mut state = self.inner.state.lock();
        loop {
            if let State::Completed(outcome) = &*state {
                return outcome.clone();
            }
            self.inner.completed.wait(&mut state);
        }
    }

    /// Block until completion; the value, or `default` if there is none.
    pub fn get_or_else(&self, default: T) -> T {
        self.get().unwrap_or(default)
    }

    /// Block until completion or `timeout`, whichever comes first.
    pub fn get_timeout(&self, timeout: Duration) -> Try<T> {
        self.wait_timeout(timeout)?;
        self.get()
    }

    /// Register a callback run once with the outcome.
    ///
    /// The callback is submitted to the future's executor when the future
    /// completes, or right away if it already has. Returns this very future.
    pub fn on_complete<F>(&self, callback: F) -> &Self
    where
        F: FnOnce(Try<T>) + Send + 'static,
    {
        let outcome = {
            let mut state = self.inner.state.lock();
            match &mut *state {
                State::Pending(callbacks) => {
                    callbacks.push(Box::new(callback));
                    return self;
                }
                State::Completed(outcome) => outcome.clone(),
            }
        };
        self.dispatch(Box::new(callback), outcome);
        self
    }

    /// Register a callback run with the value if the future succeeds.
    pub fn on_success<F>(&self, callback: F) -> &Self
    where
        F: FnOnce(T) + Send + 'static,
    {
        self.on_complete(move |outcome| {
            if let Ok(value) = outcome {
                callback(value);
            }
        })
    }

    /// Register a callback run with the failure if the future does not succeed.
    pub fn on_failure<F>(&self, callback: F) -> &Self
    where
        F: FnOnce(FutureError) + Send + 'static,
    {
        self.on_complete(move |outcome| {
            if let Err(error) = outcome {
                callback(error);
            }
        })
    }

    /// Alias of [`on_success`](Future::on_success) for side effects.
    pub fn for_each<F>(&self, action: F) -> &Self
    where
        F: FnOnce(T) + Send + 'static,
    {
        self.on_success(action)
    }

    /// Cancel a pending future.
    ///
    /// Completes it with [`FutureError::Cancelled`] and keeps its computation
    /// from starting if it is still queued. A computation that is already
    /// running is left to finish; its result is discarded. Returns `false`
    /// if the future had already completed.
    pub fn cancel(&self) -> bool {
        if !self.try_complete(Err(FutureError::Cancelled)) {
            return false;
        }
        if let Some(handle) = self.inner.task.lock().as_ref() {
            if handle.cancel() {
                debug!("Cancelled queued task {}", handle.id());
            }
        }
        true
    }

    /// Whether the future was completed by [`cancel`](Future::cancel).
    pub fn is_cancelled(&self) -> bool {
        matches!(
            *self.inner.state.lock(),
            State::Completed(Err(FutureError::Cancelled))
        )
    }

    /// Complete the cell unless it already is. Returns whether this call won.
    pub(crate) fn try_complete(&self, outcome: Try<T>) -> bool {
        let callbacks = {
            let mut state = self.inner.state.lock();
            let callbacks = match &mut *state {
                State::Completed(_) => return false,
                State::Pending(callbacks) => std::mem::take(callbacks),
            };
            *state = State::Completed(outcome.clone());
            callbacks
        };
        self.inner.completed.notify_all();

        if !callbacks.is_empty() {
            trace!("Dispatching {} completion callbacks", callbacks.len());
        }
        for callback in callbacks {
            self.dispatch(callback, outcome.clone());
        }
        true
    }

    fn dispatch(&self, callback: Callback<T>, outcome: Try<T>) {
        // Shared with the task so a rejected submission can still run it here
        let slot = Arc::new(Mutex::new(Some((callback, outcome))));
        let queued = Arc::clone(&slot);
        let task: Task = Box::new(move || {
            let entry = queued.lock().take();
            if let Some((callback, outcome)) = entry {
                callback(outcome);
            }
        });

        if let Err(e) = self.inner.executor.submit(task) {
            warn!(
                "Executor '{}' rejected a completion callback ({}); running it inline",
                self.inner.executor.name(),
                e
            );
            let entry = slot.lock().take();
            if let Some((callback, outcome)) = entry {
                // Must not unwind into the completing thread or skip later callbacks
                if let Err(panicked) = try_run(move || callback(outcome)) {
                    error!("Inline completion callback failed: {}", panicked);
                }
            }
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Future<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.inner.state.lock() {
            State::Pending(callbacks) => f
                .debug_struct("Future")
                .field("state", &"Pending")
                .field("callbacks", &callbacks.len())
                .finish(),
            State::Completed(outcome) => f
                .debug_struct("Future")
                .field("state", &"Completed")
                .field("outcome", outcome)
                .finish(),
        }
    }
}
