//! Worker pool for background task execution.
//!
//! A bounded rayon pool with cooperative cancellation and a single explicit
//! hop back to the dispatcher thread for continuations.
//!
//! # Example
//!
//! ```
//! use vitrine_core::{Dispatcher, ThreadPool, ThreadPoolConfig};
//! use std::time::Duration;
//!
//! let dispatcher = Dispatcher::new();
//! let pool = ThreadPool::new(ThreadPoolConfig::with_threads(2)).unwrap();
//!
//! let result = std::sync::Arc::new(parking_lot::Mutex::new(None));
//! let result_clone = result.clone();
//! pool.spawn_with_callback(
//!     || (1..=10).sum::<i32>(),
//!     &dispatcher.handle(),
//!     move |sum| *result_clone.lock() = Some(sum),
//! );
//!
//! dispatcher.process_until(Duration::from_secs(5), || result.lock().is_some());
//! assert_eq!(*result.lock(), Some(55));
//! ```
//!
//! # Cancellation
//!
//! Tasks receive a [`CancellationToken`] and are expected to poll it. A
//! cancelled token never stops a running closure by force.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use rayon::{ThreadPool as RayonThreadPool, ThreadPoolBuilder};

use crate::dispatcher::DispatcherHandle;
use crate::error::{CoreError, CoreResult};
use crate::logging::targets;

/// A cancellation token for cooperative task cancellation.
///
/// Clones share state: cancelling one cancels all of them.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if cancellation has been requested.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }
}

/// Configuration for creating a thread pool.
#[derive(Debug, Clone)]
pub struct ThreadPoolConfig {
    /// Number of worker threads. `None` means one per CPU core.
    pub num_threads: Option<usize>,
    /// Name prefix for worker threads; the index is appended.
    pub thread_name: String,
    /// Stack size for worker threads in bytes.
    pub stack_size: Option<usize>,
}

impl Default for ThreadPoolConfig {
    fn default() -> Self {
        Self {
            num_threads: None,
            thread_name: "vitrine-worker".to_string(),
            stack_size: None,
        }
    }
}

impl ThreadPoolConfig {
    pub fn with_threads(num_threads: usize) -> Self {
        Self {
            num_threads: Some(num_threads),
            ..Default::default()
        }
    }
}

/// A bounded pool of worker threads whose results come back through a
/// [`Dispatcher`](crate::Dispatcher).
pub struct ThreadPool {
    pool: RayonThreadPool,
    active_tasks: Arc<AtomicUsize>,
}

impl ThreadPool {
    pub fn new(config: ThreadPoolConfig) -> CoreResult<Self> {
        let name = config.thread_name;
        let mut builder = ThreadPoolBuilder::new().thread_name(move |index| format!("{name}-{index}"));

        if let Some(num_threads) = config.num_threads {
            builder = builder.num_threads(num_threads);
        }
        if let Some(stack_size) = config.stack_size {
            builder = builder.stack_size(stack_size);
        }

        let pool = builder
            .build()
            .map_err(|e| CoreError::ThreadPool(e.to_string()))?;
        tracing::debug!(target: targets::THREADPOOL, threads = pool.current_num_threads(), "worker pool started");

        Ok(Self {
            pool,
            active_tasks: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn num_threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Tasks queued or running whose results have not been posted yet.
    pub fn active_tasks(&self) -> usize {
        self.active_tasks.load(Ordering::Acquire)
    }

    /// Run `task` on a worker and deliver its result to the dispatcher thread.
    ///
    /// `callback` runs on the dispatcher that `dispatcher` belongs to, the
    /// next time it processes its queue. If that dispatcher has been dropped
    /// the result is discarded.
    pub fn spawn_with_callback<F, T, C>(&self, task: F, dispatcher: &DispatcherHandle, callback: C)
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
        C: FnOnce(T) + Send + 'static,
    {
        self.active_tasks.fetch_add(1, Ordering::AcqRel);
        let active_tasks = self.active_tasks.clone();
        let dispatcher = dispatcher.clone();

        self.pool.spawn(move || {
            let result = task();
            if dispatcher.post(move || callback(result)).is_err() {
                tracing::debug!(target: targets::THREADPOOL, "dispatcher closed, dropping task result");
            }
            active_tasks.fetch_sub(1, Ordering::AcqRel);
        });
    }
}

impl std::fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadPool")
            .field("num_threads", &self.num_threads())
            .field("active_tasks", &self.active_tasks())
            .finish()
    }
}

static_assertions::assert_impl_all!(ThreadPool: Send, Sync);
static_assertions::assert_impl_all!(CancellationToken: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::Dispatcher;
    use parking_lot::Mutex;
    use std::time::{Duration, Instant};

    fn wait_idle(pool: &ThreadPool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while pool.active_tasks() > 0 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_num_threads() {
        let pool = ThreadPool::new(ThreadPoolConfig::with_threads(3)).unwrap();
        assert_eq!(pool.num_threads(), 3);
    }

    #[test]
    fn test_cancellation_is_shared_by_clones() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_task_observes_cancellation() {
        let dispatcher = Dispatcher::new();
        let pool = ThreadPool::new(ThreadPoolConfig::with_threads(1)).unwrap();
        let token = CancellationToken::new();
        let observed = Arc::new(Mutex::new(None));

        let worker_token = token.clone();
        let observed_clone = observed.clone();
        token.cancel();
        pool.spawn_with_callback(
            move || worker_token.is_cancelled(),
            &dispatcher.handle(),
            move |cancelled| *observed_clone.lock() = Some(cancelled),
        );

        assert!(dispatcher.process_until(Duration::from_secs(5), || observed.lock().is_some()));
        assert_eq!(*observed.lock(), Some(true));
    }

    #[test]
    fn test_callbacks_for_many_tasks() {
        let dispatcher = Dispatcher::new();
        let pool = ThreadPool::new(ThreadPoolConfig::with_threads(4)).unwrap();
        let results = Arc::new(Mutex::new(Vec::new()));

        for i in 0..10 {
            let results = results.clone();
            pool.spawn_with_callback(move || i * 2, &dispatcher.handle(), move |v| results.lock().push(v));
        }

        assert!(dispatcher.process_until(Duration::from_secs(5), || results.lock().len() == 10));
        let mut values = results.lock().clone();
        values.sort_unstable();
        assert_eq!(values, (0..10).map(|i| i * 2).collect::<Vec<_>>());
        wait_idle(&pool);
        assert_eq!(pool.active_tasks(), 0);
    }

    #[test]
    fn test_callback_runs_on_dispatcher_thread() {
        let dispatcher = Dispatcher::new();
        let pool = ThreadPool::new(ThreadPoolConfig::with_threads(2)).unwrap();
        let owner = std::thread::current().id();
        let observed = Arc::new(Mutex::new(None));

        let observed_clone = observed.clone();
        pool.spawn_with_callback(
            || std::thread::current().id(),
            &dispatcher.handle(),
            move |worker| {
                *observed_clone.lock() = Some((worker, std::thread::current().id()));
            },
        );

        assert!(dispatcher.process_until(Duration::from_secs(5), || observed.lock().is_some()));
        let (worker, callback_thread) = observed.lock().unwrap();
        assert_ne!(worker, owner);
        assert_eq!(callback_thread, owner);
    }

    #[test]
    fn test_callback_dropped_when_dispatcher_gone() {
        let pool = ThreadPool::new(ThreadPoolConfig::with_threads(1)).unwrap();
        let handle = Dispatcher::new().handle();
        let ran = Arc::new(AtomicBool::new(false));

        let ran_clone = ran.clone();
        pool.spawn_with_callback(|| (), &handle, move |_| ran_clone.store(true, Ordering::SeqCst));

        wait_idle(&pool);
        assert_eq!(pool.active_tasks(), 0);
        assert!(!ran.load(Ordering::SeqCst));
    }
}
