//! Worker thread pool.
//!
//! The pool is the default backing for futures: every computation and every
//! completion callback becomes a task on its queue.

use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use log::{debug, info, trace};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::config::ThreadPoolConfig;
use crate::scheduler::executor::{ExecutionError, Executor, Task, TaskHandle, TaskStatus};
use crate::sync::atomic::{AtomicFlag, AtomicMax, AtomicSequence};

/// Statistics about the thread pool
#[derive(Debug, Default, Clone)]
pub struct ThreadPoolStats {
    /// Number of tasks accepted
    pub tasks_queued: usize,

    /// Number of tasks that ran to completion
    pub tasks_completed: usize,

    /// Number of tasks that panicked
    pub tasks_panicked: usize,

    /// Number of tasks cancelled while queued
    pub tasks_cancelled: usize,

    /// Total task execution time (microseconds)
    pub total_execution_time_us: u64,

    /// Total queue wait time (microseconds)
    pub total_queue_time_us: u64,

    /// Maximum task execution time (microseconds)
    pub max_execution_time_us: u64,
}

/// Task waiting in the queue
struct QueuedTask {
    func: Task,
    handle: TaskHandle,
    enqueued_at: Instant,
}

/// Counters shared between the pool and its workers
#[derive(Default)]
struct PoolCounters {
    tasks_queued: AtomicUsize,
    tasks_completed: AtomicUsize,
    tasks_panicked: AtomicUsize,
    tasks_cancelled: AtomicUsize,
    total_execution_time_us: AtomicU64,
    total_queue_time_us: AtomicU64,
    max_execution_time_us: AtomicMax,
}

/// Worker context holding shared state for the worker loop
struct WorkerContext {
    receiver: Receiver<QueuedTask>,
    shutdown_flag: Arc<AtomicFlag>,
    collect_stats: bool,
    counters: Arc<PoolCounters>,
}

/// A pool of named worker threads consuming a shared task queue
pub struct ThreadPool {
    /// Channel for sending tasks to worker threads
    task_sender: Sender<QueuedTask>,

    /// Worker threads
    workers: Vec<JoinHandle<()>>,

    /// Set once the pool stops accepting tasks
    is_shutting_down: Arc<AtomicFlag>,

    /// Statistics counters
    counters: Arc<PoolCounters>,

    /// Configuration
    config: ThreadPoolConfig,

    /// Source of task identifiers
    next_task_id: AtomicSequence,
}

impl ThreadPool {
    /// Create a pool with `threads` workers and the default configuration otherwise
    pub fn new(threads: usize) -> Result<Self, ExecutionError> {
        Self::with_config(ThreadPoolConfig::with_threads(threads))
    }

    /// Create a new thread pool with the specified configuration
    pub fn with_config(config: ThreadPoolConfig) -> Result<Self, ExecutionError> {
        config.validate()?;

        let (task_sender, task_receiver) = match config.queue_size {
            Some(size) => bounded(size),
            None => unbounded(),
        };
        let is_shutting_down = Arc::new(AtomicFlag::new(false));
        let counters = Arc::new(PoolCounters::default());

        info!(
            "Creating thread pool '{}' with {} workers (queue size: {:?})",
            config.thread_name_prefix, config.worker_threads, config.queue_size
        );

        let mut workers = Vec::with_capacity(config.worker_threads);

        for id in 0..config.worker_threads {
            let ctx = WorkerContext {
                receiver: task_receiver.clone(),
                shutdown_flag: Arc::clone(&is_shutting_down),
                collect_stats: config.collect_stats,
                counters: Arc::clone(&counters),
            };

            let spawned = thread::Builder::new()
                .name(format!("{}-{}", config.thread_name_prefix, id))
                .spawn(move || Self::worker_loop(id, ctx));

            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    // Workers already started exit once the sender is dropped
                    is_shutting_down.try_set();
                    return Err(ExecutionError::SpawnFailed(e.to_string()));
                }
            }
        }

        Ok(Self {
            task_sender,
            workers,
            is_shutting_down,
            counters,
            config,
            next_task_id: AtomicSequence::new(1),
        })
    }

    /// Worker thread main loop
    fn worker_loop(id: usize, ctx: WorkerContext) {
        debug!("Worker {}: Starting", id);

        loop {
            // Wake up every 100ms to notice a shutdown on an idle queue
            match ctx.receiver.recv_timeout(Duration::from_millis(100)) {
                Ok(task) => Self::run_task(id, &ctx, task),
                Err(RecvTimeoutError::Timeout) => {
                    if ctx.shutdown_flag.is_set() {
                        break;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        debug!("Worker {}: Shutting down", id);
    }

    fn run_task(id: usize, ctx: &WorkerContext, task: QueuedTask) {
        let queue_time = task.enqueued_at.elapsed();
        let task_id = task.handle.id();

        trace!(
            "Worker {}: Executing task {} (queue time: {:.2}ms)",
            id,
            task_id,
            queue_time.as_micros() as f64 / 1000.0
        );

        let exec_start = Instant::now();
        let status = task.handle.run(task.func);
        let exec_time = exec_start.elapsed();

        if !ctx.collect_stats {
            return;
        }

        let counters = &ctx.counters;
        match status {
            TaskStatus::Completed => {
                counters.tasks_completed.fetch_add(1, Ordering::Relaxed);
            }
            TaskStatus::Failed(_) => {
                counters.tasks_panicked.fetch_add(1, Ordering::Relaxed);
            }
            TaskStatus::Cancelled => {
                counters.tasks_cancelled.fetch_add(1, Ordering::Relaxed);
                return;
            }
            TaskStatus::Pending | TaskStatus::Running => {}
        }

        let exec_time_us = exec_time.as_micros() as u64;
        counters
            .total_queue_time_us
            .fetch_add(queue_time.as_micros() as u64, Ordering::Relaxed);
        counters
            .total_execution_time_us
            .fetch_add(exec_time_us, Ordering::Relaxed);
        counters.max_execution_time_us.observe(exec_time_us);

        trace!(
            "Worker {}: Task {} finished in {:.2}ms",
            id,
            task_id,
            exec_time.as_micros() as f64 / 1000.0
        );
    }

    fn enqueue(&self, task: Task, block: bool) -> Result<TaskHandle, ExecutionError> {
        if self.is_shutting_down.is_set() {
            return Err(ExecutionError::ShuttingDown);
        }

        let handle = TaskHandle::new(self.next_task_id.next());
        let queued = QueuedTask {
            func: task,
            handle: handle.clone(),
            enqueued_at: Instant::now(),
        };

        let sent = if block {
            self.task_sender
                .send(queued)
                .map_err(|_| ExecutionError::ShuttingDown)
        } else {
            self.task_sender.try_send(queued).map_err(|e| match e {
                TrySendError::Full(_) => ExecutionError::QueueFull,
                TrySendError::Disconnected(_) => ExecutionError::ShuttingDown,
            })
        };

        sent?;
        if self.config.collect_stats {
            self.counters.tasks_queued.fetch_add(1, Ordering::Relaxed);
        }
        Ok(handle)
    }

    /// Submit a closure, failing fast when a bounded queue is full
    pub fn execute<F>(&self, f: F) -> Result<TaskHandle, ExecutionError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.enqueue(Box::new(f), false)
    }

    /// Submit a closure and block until the queue accepts it
    pub fn execute_blocking<F>(&self, f: F) -> Result<TaskHandle, ExecutionError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.enqueue(Box::new(f), true)
    }

    /// Get current statistics for the thread pool
    pub fn get_stats(&self) -> ThreadPoolStats {
        if !self.config.collect_stats {
            return ThreadPoolStats::default();
        }

        let counters = &self.counters;
        ThreadPoolStats {
            tasks_queued: counters.tasks_queued.load(Ordering::Relaxed),
            tasks_completed: counters.tasks_completed.load(Ordering::Relaxed),
            tasks_panicked: counters.tasks_panicked.load(Ordering::Relaxed),
            tasks_cancelled: counters.tasks_cancelled.load(Ordering::Relaxed),
            total_execution_time_us: counters.total_execution_time_us.load(Ordering::Relaxed),
            total_queue_time_us: counters.total_queue_time_us.load(Ordering::Relaxed),
            max_execution_time_us: counters.max_execution_time_us.get(),
        }
    }

    /// Stop accepting tasks; queued tasks still run before the workers exit
    pub fn shutdown(&self) {
        if self.is_shutting_down.try_set() {
            info!("Shutting down thread pool '{}'", self.config.thread_name_prefix);
        }
    }

    /// Shut down the thread pool and wait for workers to finish
    pub fn shutdown_and_join(mut self) {
        self.shutdown();

        for worker in self.workers.drain(..) {
            if let Err(e) = worker.join() {
                log::error!("Worker thread panicked during shutdown: {:?}", e);
            }
        }

        info!("Thread pool '{}' shutdown complete", self.config.thread_name_prefix);
    }

    /// Get the number of worker threads
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Check if the thread pool is shutting down
    pub fn is_shutting_down(&self) -> bool {
        self.is_shutting_down.is_set()
    }

    /// The configuration this pool was built from
    pub fn config(&self) -> &ThreadPoolConfig {
        &self.config
    }
}

impl Executor for ThreadPool {
    fn submit(&self, task: Task) -> Result<TaskHandle, ExecutionError> {
        self.enqueue(task, false)
    }

    fn name(&self) -> &str {
        &self.config.thread_name_prefix
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown();
        // Dropping the sender disconnects the queue; workers drain it and exit
        debug!("Thread pool dropped - workers exit once the queue is drained");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    const WAIT: Duration = Duration::from_secs(5);

    #[test]
    fn test_thread_pool_basic() {
        let pool = ThreadPool::new(4).unwrap();

        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();

        let handle = pool
            .execute(move || {
                counter_clone.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        assert_eq!(handle.wait_with_timeout(WAIT).unwrap(), TaskStatus::Completed);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_thread_pool_multiple_tasks() {
        let pool = ThreadPool::new(2).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let counter = counter.clone();
                pool.execute(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(10));
                })
                .unwrap()
            })
            .collect();

        for handle in handles {
            handle.wait_with_timeout(WAIT).unwrap();
        }

        assert_eq!(counter.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn test_worker_threads_are_named() {
        let config = ThreadPoolConfig {
            thread_name_prefix: "named".to_string(),
            ..ThreadPoolConfig::with_threads(1)
        };
        let pool = ThreadPool::with_config(config).unwrap();
        let name = Arc::new(Mutex::new(String::new()));
        let name_clone = name.clone();

        pool.execute(move || {
            *name_clone.lock().unwrap() = thread::current().name().unwrap_or("").to_string();
        })
        .unwrap()
        .wait_with_timeout(WAIT)
        .unwrap();

        assert_eq!(*name.lock().unwrap(), "named-0");
        assert_eq!(pool.name(), "named");
    }

    #[test]
    fn test_thread_pool_panic_handling() {
        let pool = ThreadPool::new(1).unwrap();

        let flag = Arc::new(AtomicBool::new(false));
        let flag_clone = flag.clone();

        pool.execute(|| panic!("This task should panic")).unwrap();

        // The worker survives and runs the next task
        let handle = pool
            .execute(move || flag_clone.store(true, Ordering::SeqCst))
            .unwrap();
        handle.wait_with_timeout(WAIT).unwrap();

        assert!(flag.load(Ordering::SeqCst));
        assert_eq!(pool.get_stats().tasks_panicked, 1);
    }

    #[test]
    fn test_cancel_queued_task() {
        let pool = ThreadPool::new(1).unwrap();
        let barrier = Arc::new(Mutex::new(()));
        let lock = barrier.lock().unwrap();

        let barrier_clone = barrier.clone();
        pool.execute(move || {
            let _lock = barrier_clone.lock().unwrap();
        })
        .unwrap();

        let ran = Arc::new(AtomicBool::new(false));
        let ran_clone = ran.clone();
        let queued = pool
            .execute(move || ran_clone.store(true, Ordering::SeqCst))
            .unwrap();

        assert!(queued.cancel());
        drop(lock);

        assert_eq!(queued.wait_with_timeout(WAIT).unwrap(), TaskStatus::Cancelled);
        let sentinel = pool.execute(|| {}).unwrap();
        sentinel.wait_with_timeout(WAIT).unwrap();
        assert!(!ran.load(Ordering::SeqCst));
        assert_eq!(pool.get_stats().tasks_cancelled, 1);
    }

    #[test]
    fn test_thread_pool_shutdown() {
        let pool = ThreadPool::new(2).unwrap();
        let barrier = Arc::new(Mutex::new(()));
        let lock = barrier.lock().unwrap();

        let barrier_clone = barrier.clone();
        let blocked = pool
            .execute(move || {
                let _lock = barrier_clone.lock().unwrap();
            })
            .unwrap();

        pool.shutdown();

        let result = pool.execute(|| {});
        assert!(matches!(result, Err(ExecutionError::ShuttingDown)));
        assert!(pool.is_shutting_down());

        // Tasks accepted before shutdown still run
        drop(lock);
        assert_eq!(blocked.wait_with_timeout(WAIT).unwrap(), TaskStatus::Completed);
        pool.shutdown_and_join();
    }

    #[test]
    fn test_thread_pool_stats() {
        let pool = ThreadPool::new(1).unwrap();

        let mut handles = Vec::new();
        for _ in 0..5 {
            handles.push(
                pool.execute(|| thread::sleep(Duration::from_millis(10)))
                    .unwrap(),
            );
        }
        handles.push(pool.execute(|| panic!("This task should panic")).unwrap());

        for handle in &handles {
            handle.wait_with_timeout(WAIT).unwrap();
        }
        // Counters are updated right after the status; let the worker catch up
        pool.execute(|| {}).unwrap().wait_with_timeout(WAIT).unwrap();
        thread::sleep(Duration::from_millis(20));

        let stats = pool.get_stats();
        assert_eq!(stats.tasks_queued, 7);
        assert_eq!(stats.tasks_completed, 6);
        assert_eq!(stats.tasks_panicked, 1);
        assert!(stats.total_execution_time_us > 0);
        assert!(stats.max_execution_time_us >= 10_000);
    }

    #[test]
    fn test_thread_pool_queue_full() {
        let config = ThreadPoolConfig {
            worker_threads: 1,
            queue_size: Some(1),
            thread_name_prefix: "test".to_string(),
            collect_stats: true,
        };

        let pool = ThreadPool::with_config(config).unwrap();

        let barrier = Arc::new(Mutex::new(()));
        let lock = barrier.lock().unwrap();

        let barrier_clone = barrier.clone();
        let running = pool
            .execute(move || {
                let _lock = barrier_clone.lock().unwrap();
            })
            .unwrap();

        // Wait for the worker to take the blocking task off the queue
        while running.status() != TaskStatus::Running {
            thread::sleep(Duration::from_millis(1));
        }

        pool.execute(|| {}).unwrap();

        let result = pool.execute(|| {});
        assert!(matches!(result, Err(ExecutionError::QueueFull)));

        drop(lock);
    }

    #[test]
    fn test_execute_blocking_waits_for_room() {
        let config = ThreadPoolConfig {
            worker_threads: 1,
            queue_size: Some(1),
            thread_name_prefix: "blocking".to_string(),
            collect_stats: true,
        };

        let pool = ThreadPool::with_config(config).unwrap();

        let released = Arc::new(AtomicBool::new(false));

        let released_clone = released.clone();
        let running = pool
            .execute(move || {
                while !released_clone.load(Ordering::SeqCst) {
                    thread::sleep(Duration::from_millis(1));
                }
            })
            .unwrap();

        while running.status() != TaskStatus::Running {
            thread::sleep(Duration::from_millis(1));
        }

        // Fill the only queue slot
        pool.execute(|| {}).unwrap();
        assert!(matches!(pool.execute(|| {}), Err(ExecutionError::QueueFull)));

        // Free the worker a little later, from another thread
        let releaser = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            released.store(true, Ordering::SeqCst);
        });

        let ran = Arc::new(AtomicBool::new(false));
        let ran_clone = ran.clone();
        let handle = pool
            .execute_blocking(move || ran_clone.store(true, Ordering::SeqCst))
            .unwrap();

        assert_eq!(handle.wait_with_timeout(WAIT).unwrap(), TaskStatus::Completed);
        assert!(ran.load(Ordering::SeqCst));
        releaser.join().unwrap();
    }

    #[test]
    fn test_invalid_config() {
        let result = ThreadPool::new(0);
        assert!(matches!(result, Err(ExecutionError::Config(_))));
    }
}
