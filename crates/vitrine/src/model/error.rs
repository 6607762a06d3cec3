//! Tree projection errors.

use thiserror::Error;

use super::projector::NodeId;

/// Error returned by a [`TreeDataSource`](super::TreeDataSource).
pub type SourceError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Precondition failures raised by the tree projector.
#[derive(Debug, Error)]
pub enum TreeError {
    /// The handle does not name a live node (freed, or from another tree).
    #[error("unknown tree node {0:?}")]
    UnknownNode(NodeId),

    /// Children were requested from a node whose object cannot have any.
    #[error("tree node {0:?} does not allow children")]
    NoChildren(NodeId),

    /// The data source failed to produce a child list.
    #[error("data source failed: {0}")]
    Source(#[source] SourceError),
}

/// Result type for projector operations.
pub type TreeResult<T> = std::result::Result<T, TreeError>;
