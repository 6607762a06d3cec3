//! Core runtime for Vitrine.
//!
//! This crate provides the plumbing the collection engine is built on:
//!
//! - **Signal/Slot System**: Type-safe multi-slot notification
//! - **Dispatcher**: A single owner thread that runs posted continuations
//! - **Thread Pool**: Bounded background workers with cooperative cancellation
//! - **Thread Checks**: Affinity assertions for dispatcher-owned state
//!
//! # Signal/Slot Example
//!
//! ```
//! use vitrine_core::Signal;
//!
//! let box_added = Signal::<i64>::new();
//!
//! let conn_id = box_added.connect(|id| {
//!     println!("Box {} added", id);
//! });
//!
//! box_added.emit(42);
//! box_added.disconnect(conn_id);
//! ```

mod dispatcher;
mod error;
pub mod logging;
pub mod signal;
pub mod thread_check;
pub mod threadpool;

pub use dispatcher::{Dispatcher, DispatcherHandle, TaskId};
pub use error::{CoreError, CoreResult};
pub use logging::{PerfSpan, TreeStyle};
pub use signal::{ConnectionId, Signal};
pub use thread_check::ThreadAffinity;
pub use threadpool::{CancellationToken, ThreadPool, ThreadPoolConfig};
