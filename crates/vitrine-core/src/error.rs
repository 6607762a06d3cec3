//! Error types for the Vitrine runtime.

use thiserror::Error;

/// Errors raised by the dispatcher and the worker pool.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// The rayon pool could not be built.
    #[error("failed to build worker pool: {0}")]
    ThreadPool(String),

    /// The dispatcher that owned the queue has been dropped.
    #[error("dispatcher has shut down")]
    DispatcherClosed,
}

/// A specialized Result type for runtime operations.
pub type CoreResult<T> = std::result::Result<T, CoreError>;
