//! Single-threaded cooperative dispatcher.
//!
//! A [`Dispatcher`] owns a FIFO queue of closures. Any thread may post work
//! through a cloned [`DispatcherHandle`]; only the thread that created the
//! dispatcher drains the queue. All tree and controller state lives on that
//! thread, so continuations posted here can touch it without extra ordering.
//!
//! ```
//! use vitrine_core::Dispatcher;
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! let dispatcher = Dispatcher::new();
//! let handle = dispatcher.handle();
//! let hits = Arc::new(AtomicUsize::new(0));
//!
//! let hits_clone = hits.clone();
//! std::thread::spawn(move || {
//!     handle.post(move || { hits_clone.fetch_add(1, Ordering::SeqCst); }).unwrap();
//! })
//! .join()
//! .unwrap();
//!
//! assert_eq!(dispatcher.process_pending(), 1);
//! assert_eq!(hits.load(Ordering::SeqCst), 1);
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};

use crate::error::{CoreError, CoreResult};
use crate::logging::targets;
use crate::thread_check::ThreadAffinity;

/// A unique identifier for a posted task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    /// Get the raw u64 value of this task ID.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

fn next_task_id() -> TaskId {
    TaskId(NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed))
}

type BoxedTask = Box<dyn FnOnce() + Send + 'static>;

struct QueuedTask {
    id: TaskId,
    task: BoxedTask,
}

/// The owning side of the queue. Not `Clone`; lives on the dispatcher thread.
pub struct Dispatcher {
    sender: Sender<QueuedTask>,
    receiver: Receiver<QueuedTask>,
    closed: Arc<AtomicBool>,
    affinity: ThreadAffinity,
}

/// A cheap, cloneable, `Send` handle used to post work to a [`Dispatcher`].
#[derive(Clone)]
pub struct DispatcherHandle {
    sender: Sender<QueuedTask>,
    closed: Arc<AtomicBool>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    /// Create a dispatcher owned by the current thread.
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self {
            sender,
            receiver,
            closed: Arc::new(AtomicBool::new(false)),
            affinity: ThreadAffinity::current(),
        }
    }

    /// Get a handle for posting work from any thread.
    pub fn handle(&self) -> DispatcherHandle {
        DispatcherHandle {
            sender: self.sender.clone(),
            closed: self.closed.clone(),
        }
    }

    /// The owner thread of this dispatcher.
    pub fn affinity(&self) -> ThreadAffinity {
        self.affinity
    }

    /// Number of tasks waiting to run.
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }

    /// Run every task that was queued when this call started, in FIFO order.
    ///
    /// Tasks posted by the running tasks wait for the next call. Returns the
    /// number of tasks run.
    ///
    /// # Panics
    ///
    /// Panics when called from a thread other than the owner.
    pub fn process_pending(&self) -> usize {
        self.affinity.check("Dispatcher::process_pending");

        let batch = self.receiver.len();
        let mut ran = 0;
        for _ in 0..batch {
            match self.receiver.try_recv() {
                Ok(queued) => {
                    self.run(queued);
                    ran += 1;
                }
                Err(_) => break,
            }
        }
        ran
    }

    /// Block until at least one task arrives or `timeout` elapses, then run
    /// everything pending. Returns the number of tasks run.
    pub fn wait_and_process(&self, timeout: Duration) -> usize {
        self.affinity.check("Dispatcher::wait_and_process");

        match self.receiver.recv_timeout(timeout) {
            Ok(queued) => {
                self.run(queued);
                1 + self.process_pending()
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => 0,
        }
    }

    /// Keep processing until `done` returns true or `timeout` elapses.
    ///
    /// Returns whether `done` was satisfied.
    pub fn process_until<F>(&self, timeout: Duration, mut done: F) -> bool
    where
        F: FnMut() -> bool,
    {
        let deadline = Instant::now() + timeout;
        loop {
            self.process_pending();
            if done() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            self.wait_and_process(deadline - now);
        }
    }

    fn run(&self, queued: QueuedTask) {
        tracing::trace!(target: targets::DISPATCHER, task_id = queued.id.as_u64(), "running task");
        (queued.task)();
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::Release);
        let dropped = self.receiver.len();
        if dropped > 0 {
            tracing::debug!(target: targets::DISPATCHER, dropped, "dispatcher dropped with pending tasks");
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("pending", &self.pending())
            .field("thread", &self.affinity.thread_id())
            .finish()
    }
}

impl DispatcherHandle {
    /// Queue `task` to run on the dispatcher thread.
    ///
    /// Fails with [`CoreError::DispatcherClosed`] once the dispatcher is gone.
    pub fn post<F>(&self, task: F) -> CoreResult<TaskId>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.is_closed() {
            return Err(CoreError::DispatcherClosed);
        }
        let id = next_task_id();
        self.sender
            .send(QueuedTask {
                id,
                task: Box::new(task),
            })
            .map_err(|_| CoreError::DispatcherClosed)?;
        tracing::trace!(target: targets::DISPATCHER, task_id = id.as_u64(), "posted task");
        Ok(id)
    }

    /// Whether the owning dispatcher has been dropped.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for DispatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatcherHandle")
            .field("closed", &self.is_closed())
            .finish()
    }
}

static_assertions::assert_impl_all!(DispatcherHandle: Send, Sync, Clone);
static_assertions::assert_impl_all!(Dispatcher: Send);

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_fifo_order() {
        let dispatcher = Dispatcher::new();
        let handle = dispatcher.handle();
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..5 {
            let order = order.clone();
            handle.post(move || order.lock().push(i)).unwrap();
        }

        assert_eq!(dispatcher.pending(), 5);
        assert_eq!(dispatcher.process_pending(), 5);
        assert_eq!(*order.lock(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_task_ids_increase() {
        let dispatcher = Dispatcher::new();
        let handle = dispatcher.handle();
        let a = handle.post(|| {}).unwrap();
        let b = handle.post(|| {}).unwrap();
        assert!(b > a);
    }

    #[test]
    fn test_reposted_task_waits_for_next_batch() {
        let dispatcher = Dispatcher::new();
        let handle = dispatcher.handle();
        let hits = Arc::new(Mutex::new(0));

        let inner_handle = handle.clone();
        let hits_clone = hits.clone();
        handle
            .post(move || {
                let hits_inner = hits_clone.clone();
                inner_handle.post(move || *hits_inner.lock() += 1).unwrap();
            })
            .unwrap();

        assert_eq!(dispatcher.process_pending(), 1);
        assert_eq!(*hits.lock(), 0);
        assert_eq!(dispatcher.process_pending(), 1);
        assert_eq!(*hits.lock(), 1);
    }

    #[test]
    fn test_wait_and_process_receives_from_worker() {
        let dispatcher = Dispatcher::new();
        let handle = dispatcher.handle();
        let received = Arc::new(Mutex::new(None));

        let received_clone = received.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            handle.post(move || *received_clone.lock() = Some(7)).unwrap();
        });

        let done = dispatcher.process_until(Duration::from_secs(5), || received.lock().is_some());
        assert!(done);
        assert_eq!(*received.lock(), Some(7));
    }

    #[test]
    fn test_wait_and_process_times_out() {
        let dispatcher = Dispatcher::new();
        assert_eq!(dispatcher.wait_and_process(Duration::from_millis(5)), 0);
    }

    #[test]
    fn test_post_after_drop_fails() {
        let handle = Dispatcher::new().handle();
        assert!(handle.is_closed());
        assert_eq!(handle.post(|| {}), Err(CoreError::DispatcherClosed));
    }

    #[test]
    fn test_process_off_thread_panics() {
        let dispatcher = Arc::new(Mutex::new(Dispatcher::new()));
        let result = std::thread::spawn(move || {
            dispatcher.lock().process_pending();
        })
        .join();
        assert!(result.is_err());
    }
}
