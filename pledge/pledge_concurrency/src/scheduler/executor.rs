//! The executor abstraction futures schedule their work on.
//!
//! An [`Executor`] accepts a boxed task and runs it eventually, handing back
//! a [`TaskHandle`] that tracks the task and lets it be cancelled while it is
//! still queued. Two implementations ship with the crate: the worker
//! [`ThreadPool`](crate::pool::ThreadPool) and the [`InlineExecutor`], which
//! runs the task on the submitting thread.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, error, info, trace};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use pledge_core::FutureError;
use thiserror::Error;

use crate::config::{ConfigError, ThreadPoolConfig};
use crate::pool::thread::ThreadPool;
use crate::sync::atomic::AtomicSequence;

/// A unit of work accepted by an executor.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Shared, type-erased executor reference.
pub type ExecutorRef = Arc<dyn Executor>;

/// Error types for scheduling failures
#[derive(Error, Debug)]
pub enum ExecutionError {
    /// The executor no longer accepts tasks
    #[error("executor is shutting down")]
    ShuttingDown,

    /// The bounded task queue is full
    #[error("executor queue is full")]
    QueueFull,

    /// A worker thread could not be started
    #[error("failed to spawn worker thread: {0}")]
    SpawnFailed(String),

    /// The executor configuration is invalid
    #[error("invalid executor configuration: {0}")]
    Config(#[from] ConfigError),

    /// The task did not reach a final status in time
    #[error("task {0} did not finish within {1:?}")]
    Timeout(u64, Duration),
}

/// Status of a submitted task
#[derive(Debug, Clone, PartialEq)]
pub enum TaskStatus {
    /// Task is waiting to be executed
    Pending,

    /// Task is currently running
    Running,

    /// Task ran to completion
    Completed,

    /// Task panicked
    Failed(String),

    /// Task was cancelled before it started
    Cancelled,
}

impl TaskStatus {
    /// Whether the task will not change status again.
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed(_) | TaskStatus::Cancelled
        )
    }
}

/// A handle to a submitted task
#[derive(Debug, Clone)]
pub struct TaskHandle {
    /// Identifier assigned by the executor
    id: u64,

    /// Status shared with the worker running the task
    status: Arc<Mutex<TaskStatus>>,

    /// Time when the task was submitted
    created_at: Instant,
}

impl TaskHandle {
    pub(crate) fn new(id: u64) -> Self {
        Self {
            id,
            status: Arc::new(Mutex::new(TaskStatus::Pending)),
            created_at: Instant::now(),
        }
    }

    /// Get the task ID
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Get the current status of the task
    pub fn status(&self) -> TaskStatus {
        self.status.lock().clone()
    }

    /// Get the time since the task was submitted
    pub fn elapsed(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Cancel the task if it has not started yet.
    ///
    /// A running task cannot be interrupted; in that case this returns false
    /// and the task runs to completion.
    pub fn cancel(&self) -> bool {
        let mut status = self.status.lock();
        if *status == TaskStatus::Pending {
            *status = TaskStatus::Cancelled;
            debug!("Task {} cancelled before start", self.id);
            true
        } else {
            false
        }
    }

    /// Wait for the task to reach a final status
    pub fn wait_with_timeout(&self, timeout: Duration) -> Result<TaskStatus, ExecutionError> {
        let start = Instant::now();

        while start.elapsed() < timeout {
            let status = self.status();
            if status.is_final() {
                return Ok(status);
            }
            std::thread::sleep(Duration::from_millis(5));
        }

        Err(ExecutionError::Timeout(self.id, timeout))
    }

    /// Run `task` under this handle, unless it was cancelled while queued.
    pub(crate) fn run(&self, task: Task) -> TaskStatus {
        {
            let mut status = self.status.lock();
            if *status != TaskStatus::Pending {
                trace!("Task {}: skipped ({:?})", self.id, *status);
                return status.clone();
            }
            *status = TaskStatus::Running;
        }

        let outcome = match panic::catch_unwind(AssertUnwindSafe(task)) {
            Ok(()) => TaskStatus::Completed,
            Err(payload) => {
                let message = FutureError::from_panic(payload).to_string();
                error!("Task {}: {}", self.id, message);
                TaskStatus::Failed(message)
            }
        };

        *self.status.lock() = outcome.clone();
        outcome
    }
}

/// Something that runs tasks asynchronously, eventually.
pub trait Executor: Send + Sync {
    /// Submit a task for execution.
    ///
    /// Returns immediately with a handle to the task, or an error if the
    /// task was not accepted. A rejected task is dropped without running.
    fn submit(&self, task: Task) -> Result<TaskHandle, ExecutionError>;

    /// Name used in diagnostics.
    fn name(&self) -> &str;
}

/// Runs every task immediately on the submitting thread.
#[derive(Debug, Default)]
pub struct InlineExecutor {
    next_task_id: AtomicSequence,
}

impl InlineExecutor {
    /// Create a new inline executor
    pub fn new() -> Self {
        Self::default()
    }
}

impl Executor for InlineExecutor {
    fn submit(&self, task: Task) -> Result<TaskHandle, ExecutionError> {
        let handle = TaskHandle::new(self.next_task_id.next());
        handle.run(task);
        Ok(handle)
    }

    fn name(&self) -> &str {
        "inline"
    }
}

static DEFAULT_EXECUTOR: Lazy<ExecutorRef> = Lazy::new(|| {
    let config = ThreadPoolConfig::from_env();
    match ThreadPool::with_config(config) {
        Ok(pool) => {
            info!(
                "Default executor started with {} workers",
                pool.worker_count()
            );
            Arc::new(pool)
        }
        Err(e) => {
            error!("Failed to start default pool ({}); running tasks inline", e);
            Arc::new(InlineExecutor::new())
        }
    }
});

/// The process-wide pool used when no executor is given explicitly.
pub fn default_executor() -> ExecutorRef {
    Arc::clone(&DEFAULT_EXECUTOR)
}
