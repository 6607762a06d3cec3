//! Observer interface for projected trees.

use std::sync::atomic::{AtomicU64, Ordering};

use super::projector::NodeId;

/// Identity of a [`TreeProjector`](super::TreeProjector), as seen by listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProjectorId(u64);

static NEXT_PROJECTOR_ID: AtomicU64 = AtomicU64::new(1);

impl ProjectorId {
    pub(crate) fn next() -> Self {
        Self(NEXT_PROJECTOR_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw u64 value of this ID.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// Receives structural changes from a tree projector.
///
/// Intervals are inclusive and index into `parent`'s child list. Callbacks
/// run on the thread that mutated the underlying collection, with no
/// projector lock held, so listeners may query the projector.
pub trait TreeListener: Send + Sync {
    /// Children `start..=end` of `parent` were inserted.
    fn nodes_inserted(&self, source: ProjectorId, parent: NodeId, start: usize, end: usize);

    /// Children `start..=end` of `parent` were removed.
    ///
    /// `removed` still resolves through the projector for the duration of
    /// this call and is freed afterwards.
    fn nodes_removed(&self, source: ProjectorId, parent: NodeId, start: usize, end: usize, removed: &[NodeId]);

    /// The objects wrapped by the children of `parent` at `indices` changed.
    fn nodes_changed(&self, source: ProjectorId, parent: NodeId, indices: &[usize]);

    /// The whole tree was rebuilt; `root` is the new root, if any.
    fn structure_changed(&self, source: ProjectorId, root: Option<NodeId>) {
        let _ = (source, root);
    }
}
