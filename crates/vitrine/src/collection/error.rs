//! Collection controller errors.

use thiserror::Error;

use crate::model::TreeError;
use crate::store::{BoxId, StoreError};

/// Failures reported by the [`CollectionTreeController`](super::CollectionTreeController).
///
/// Only [`Storage`](Self::Storage) can leave the store ahead of the tree, and
/// even then the tree is not modified: every store write precedes the
/// matching tree mutation.
#[derive(Debug, Error)]
pub enum CollectionError {
    /// The targeted box or membership no longer exists. Refresh and retry.
    #[error("stale reference: {what}")]
    StaleReference { what: String },

    /// The move would place a box inside its own subtree.
    #[error("moving {moved} under {target} would create a cycle")]
    CycleViolation { moved: BoxId, target: BoxId },

    /// The operation does not apply to this kind of node.
    #[error("expected a {expected} node, found {found}")]
    KindMismatch { expected: &'static str, found: &'static str },

    /// The tree projector rejected the call.
    #[error(transparent)]
    Precondition(#[from] TreeError),

    /// The store failed.
    #[error(transparent)]
    Storage(#[from] StoreError),

    /// The operation is declared but not implemented.
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),
}

/// Result type for controller operations.
pub type CollectionResult<T> = std::result::Result<T, CollectionError>;
