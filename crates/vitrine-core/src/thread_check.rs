//! Dispatcher-thread ownership checks.
//!
//! Tree and controller state belong to the thread that owns the
//! [`Dispatcher`](crate::Dispatcher). A [`ThreadAffinity`] remembers that
//! thread; [`check`](ThreadAffinity::check) panics when an operation runs
//! anywhere else and [`debug_check`](ThreadAffinity::debug_check) does the
//! same in debug builds only.
//!
//! ```
//! use vitrine_core::Dispatcher;
//!
//! let dispatcher = Dispatcher::new();
//! let owner = dispatcher.affinity();
//! owner.check("rename_box");
//!
//! let off_thread = std::thread::spawn(move || owner.is_same_thread()).join().unwrap();
//! assert!(!off_thread);
//! ```

use std::thread::ThreadId;

/// The thread some state is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadAffinity {
    owner: ThreadId,
}

impl ThreadAffinity {
    /// Bind to the calling thread.
    #[inline]
    pub fn current() -> Self {
        Self {
            owner: std::thread::current().id(),
        }
    }

    /// The owning thread.
    #[inline]
    pub fn thread_id(&self) -> ThreadId {
        self.owner
    }

    #[inline]
    pub fn is_same_thread(&self) -> bool {
        std::thread::current().id() == self.owner
    }

    /// Panic unless called on the owning thread. Active in every build.
    ///
    /// `operation` names what was attempted and appears in the panic message.
    #[inline]
    pub fn check(&self, operation: &str) {
        if !self.is_same_thread() {
            self.violation(operation);
        }
    }

    /// [`check`](Self::check) in debug builds, nothing in release builds.
    #[inline]
    pub fn debug_check(&self, operation: &str) {
        #[cfg(debug_assertions)]
        self.check(operation);
        #[cfg(not(debug_assertions))]
        let _ = operation;
    }

    #[cold]
    #[inline(never)]
    fn violation(&self, operation: &str) -> ! {
        let current = std::thread::current();
        panic!(
            "{operation} called on thread {:?} ({:?}) but this state belongs to dispatcher thread {:?}; \
             post the call through DispatcherHandle::post or deliver worker results with \
             ThreadPool::spawn_with_callback",
            current.name().unwrap_or("<unnamed>"),
            current.id(),
            self.owner,
        )
    }
}
