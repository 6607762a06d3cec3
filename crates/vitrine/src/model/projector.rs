//! Lazy, event-driven tree projection.
//!
//! [`TreeProjector`] wraps objects supplied by a [`TreeDataSource`] in nodes
//! addressed by [`NodeId`]. A node's children are fetched the first time they
//! are asked for; from then on the projector follows the child list's
//! [`ListEvent`]s and turns each one into exactly one structural event for
//! its listeners. The exception is a change that flips whether a realized
//! node allows children: its old children are reported removed first. Nothing is ever rebuilt wholesale except by
//! [`TreeProjector::set_source`].
//!
//! # Locking
//!
//! The node graph sits behind one mutex. It is never held while a listener
//! runs or while [`TreeDataSource::children`] loads a list, so either may
//! call back into the projector. Realizing a node keeps it held while
//! connecting to the new child list and snapshotting it. Lists release their
//! own lock before emitting, so an event racing a realization waits for the
//! install and then applies to the installed children.
//!
//! Child lists are expected to be mutated from the thread that drives the
//! projector. A mutation made on another thread while a node is being
//! realized can show up both in the snapshot and as an event.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use slotmap::{SlotMap, new_key_type};
use vitrine_core::logging::targets;
use vitrine_core::{ConnectionId, PerfSpan, Signal};

use super::error::{SourceError, TreeError, TreeResult};
use super::listener::{ProjectorId, TreeListener};
use super::observable::{ListEvent, ObservableList};

new_key_type! {
    /// Handle to a node of a [`TreeProjector`].
    ///
    /// Handles are versioned: once a node is freed its handle never resolves
    /// again, even if the slot is reused.
    pub struct NodeId;
}

/// Supplies the objects a [`TreeProjector`] wraps.
pub trait TreeDataSource<T>: Send + Sync {
    /// Whether `object` can have children at all.
    ///
    /// May be called with the node graph locked; must not call back into
    /// the projector.
    fn allows_children(&self, object: &T) -> bool;

    /// The live child list of `object`.
    ///
    /// Only called for objects that allow children, at most once per node.
    fn children(&self, object: &T) -> Result<Arc<dyn ObservableList<T>>, SourceError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct GraphId(u64);

static NEXT_GRAPH_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone)]
enum GraphEvent {
    Inserted {
        parent: NodeId,
        start: usize,
        end: usize,
    },
    Removed {
        parent: NodeId,
        start: usize,
        end: usize,
        removed: Vec<NodeId>,
    },
    Changed {
        parent: NodeId,
        indices: Vec<usize>,
    },
    Rebuilt {
        root: Option<NodeId>,
    },
}

#[derive(Debug, Clone)]
struct GraphNotice {
    source: GraphId,
    event: GraphEvent,
}

struct Subscription<T> {
    list: Arc<dyn ObservableList<T>>,
    connection: ConnectionId,
}

impl<T: 'static> Subscription<T> {
    fn dispose(self) {
        self.list.events().disconnect(self.connection);
    }
}

struct NodeState<T> {
    object: T,
    parent: Option<NodeId>,
    allows_children: bool,
    children: Option<Vec<NodeId>>,
    subscription: Option<Subscription<T>>,
}

impl<T> NodeState<T> {
    fn new(object: T, parent: Option<NodeId>, allows_children: bool) -> Self {
        Self {
            object,
            parent,
            allows_children,
            children: None,
            subscription: None,
        }
    }
}

struct Graph<T> {
    nodes: SlotMap<NodeId, NodeState<T>>,
    root: Option<NodeId>,
}

impl<T> Graph<T> {
    fn realized_children(&self, node: NodeId) -> Option<&Vec<NodeId>> {
        self.nodes.get(node)?.children.as_ref()
    }

    /// Remove `id` and everything below it, collecting their subscriptions.
    fn free_subtree(&mut self, id: NodeId, subscriptions: &mut Vec<Subscription<T>>) -> usize {
        let mut freed = 0;
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if let Some(node) = self.nodes.remove(next) {
                freed += 1;
                subscriptions.extend(node.subscription);
                stack.extend(node.children.into_iter().flatten());
            }
        }
        freed
    }
}

struct Shared<T> {
    id: GraphId,
    source: Arc<dyn TreeDataSource<T>>,
    graph: Mutex<Graph<T>>,
    events: Signal<GraphNotice>,
}

impl<T: Clone + Send + Sync + 'static> Shared<T> {
    fn emit(&self, event: GraphEvent) {
        self.events.emit(GraphNotice { source: self.id, event });
    }

    fn flags(&self, objects: &[T]) -> Vec<bool> {
        objects.iter().map(|object| self.source.allows_children(object)).collect()
    }

    fn handle_list_event(&self, parent: NodeId, event: &ListEvent<T>) {
        match event {
            ListEvent::IntervalAdded { start, end, items } => self.insert_children(parent, *start, *end, items),
            ListEvent::IntervalRemoved { start, end } => self.remove_children(parent, *start, *end),
            ListEvent::ContentsChanged { start, end, items } => self.change_children(parent, *start, *end, items),
        }
    }

    fn insert_children(&self, parent: NodeId, start: usize, end: usize, items: &[T]) {
        let flags = self.flags(items);
        {
            let mut graph = self.graph.lock();
            let Some(len) = graph.realized_children(parent).map(Vec::len) else {
                tracing::trace!(target: targets::MODEL, ?parent, "insert on unrealized node ignored");
                return;
            };
            if start > end || start > len || end - start + 1 != items.len() {
                tracing::warn!(target: targets::MODEL, ?parent, start, end, len, "inconsistent insert event dropped");
                return;
            }

            let ids: Vec<NodeId> = items
                .iter()
                .zip(flags)
                .map(|(object, allows)| graph.nodes.insert(NodeState::new(object.clone(), Some(parent), allows)))
                .collect();
            if let Some(children) = graph.nodes.get_mut(parent).and_then(|node| node.children.as_mut()) {
                children.splice(start..start, ids);
            }
        }

        tracing::debug!(target: targets::MODEL, ?parent, start, end, "nodes inserted");
        self.emit(GraphEvent::Inserted { parent, start, end });
    }

    fn remove_children(&self, parent: NodeId, start: usize, end: usize) {
        let removed: Vec<NodeId> = {
            let mut graph = self.graph.lock();
            let Some(children) = graph.nodes.get_mut(parent).and_then(|node| node.children.as_mut()) else {
                tracing::trace!(target: targets::MODEL, ?parent, "remove on unrealized node ignored");
                return;
            };
            if start > end || end >= children.len() {
                let len = children.len();
                tracing::warn!(target: targets::MODEL, ?parent, start, end, len, "inconsistent remove event dropped");
                return;
            }
            let removed = children.drain(start..=end).collect();
            removed
        };

        tracing::debug!(target: targets::MODEL, ?parent, start, end, "nodes removed");
        self.emit(GraphEvent::Removed {
            parent,
            start,
            end,
            removed: removed.clone(),
        });

        let mut subscriptions = Vec::new();
        let freed = {
            let mut graph = self.graph.lock();
            let freed: usize = removed
                .iter()
                .map(|&id| graph.free_subtree(id, &mut subscriptions))
                .sum();
            freed
        };
        tracing::trace!(target: targets::MODEL, freed, disposed = subscriptions.len(), "freed detached subtrees");
        for subscription in subscriptions {
            subscription.dispose();
        }
    }

    fn change_children(&self, parent: NodeId, start: usize, end: usize, items: &[T]) {
        let flags = self.flags(items);
        let mut detached = Vec::new();
        let mut subscriptions = Vec::new();
        {
            let mut graph = self.graph.lock();
            let Some(children) = graph.realized_children(parent).cloned() else {
                tracing::trace!(target: targets::MODEL, ?parent, "change on unrealized node ignored");
                return;
            };
            if start > end || end >= children.len() || end - start + 1 != items.len() {
                let len = children.len();
                tracing::warn!(target: targets::MODEL, ?parent, start, end, len, "inconsistent change event dropped");
                return;
            }

            for (offset, (object, allows)) in items.iter().zip(flags).enumerate() {
                let id = children[start + offset];
                if let Some(node) = graph.nodes.get_mut(id) {
                    node.object = object.clone();
                    if node.allows_children != allows {
                        node.allows_children = allows;
                        subscriptions.extend(node.subscription.take());
                        if let Some(stale) = node.children.take().filter(|stale| !stale.is_empty()) {
                            detached.push((id, stale));
                        }
                    }
                }
            }
        }

        // Detached children stay resolvable until their removal is delivered.
        for (id, stale) in &detached {
            tracing::debug!(target: targets::MODEL, node = ?id, count = stale.len(), "children dropped by kind change");
            self.emit(GraphEvent::Removed {
                parent: *id,
                start: 0,
                end: stale.len() - 1,
                removed: stale.clone(),
            });
        }
        if !detached.is_empty() {
            let mut graph = self.graph.lock();
            for child in detached.into_iter().flat_map(|(_, stale)| stale) {
                graph.free_subtree(child, &mut subscriptions);
            }
        }
        for subscription in subscriptions {
            subscription.dispose();
        }

        self.emit(GraphEvent::Changed {
            parent,
            indices: (start..=end).collect(),
        });
    }

    fn clear(&self, new_root: Option<T>) -> Option<NodeId> {
        let allows = new_root.as_ref().map(|object| self.source.allows_children(object));
        let (subscriptions, root) = {
            let mut graph = self.graph.lock();
            let subscriptions: Vec<_> = graph.nodes.drain().filter_map(|(_, node)| node.subscription).collect();
            let root = new_root
                .zip(allows)
                .map(|(object, allows)| graph.nodes.insert(NodeState::new(object, None, allows)));
            graph.root = root;
            (subscriptions, root)
        };
        for subscription in subscriptions {
            subscription.dispose();
        }
        root
    }
}

/// A mutable, observable, lazily realized tree.
pub struct TreeProjector<T: 'static> {
    id: ProjectorId,
    shared: Arc<Shared<T>>,
    listeners: Mutex<HashMap<usize, ConnectionId>>,
}

impl<T: Clone + Send + Sync + 'static> TreeProjector<T> {
    /// Create an empty projector over `source`.
    pub fn new(source: Arc<dyn TreeDataSource<T>>) -> Self {
        Self {
            id: ProjectorId::next(),
            shared: Arc::new(Shared {
                id: GraphId(NEXT_GRAPH_ID.fetch_add(1, Ordering::Relaxed)),
                source,
                graph: Mutex::new(Graph {
                    nodes: SlotMap::with_key(),
                    root: None,
                }),
                events: Signal::new(),
            }),
            listeners: Mutex::new(HashMap::new()),
        }
    }

    /// This projector's identity, as reported to listeners.
    pub fn id(&self) -> ProjectorId {
        self.id
    }

    /// Rebind the tree to a new root object.
    ///
    /// Every subscription is disposed and every node freed before the new
    /// root is created. Listeners receive `structure_changed`.
    #[tracing::instrument(skip_all, target = "vitrine::model", level = "trace")]
    pub fn set_source(&self, object: Option<T>) -> Option<NodeId> {
        let root = self.shared.clear(object);
        tracing::debug!(target: targets::MODEL, ?root, "tree rebound");
        self.shared.emit(GraphEvent::Rebuilt { root });
        root
    }

    /// The root node, if a source is set.
    pub fn root(&self) -> Option<NodeId> {
        self.shared.graph.lock().root
    }

    /// The children of `node`, fetching them on first use.
    ///
    /// # Errors
    ///
    /// [`TreeError::NoChildren`] if the node's object does not allow
    /// children, [`TreeError::UnknownNode`] for a stale handle and
    /// [`TreeError::Source`] if the data source fails.
    pub fn children(&self, node: NodeId) -> TreeResult<Vec<NodeId>> {
        let object = {
            let graph = self.shared.graph.lock();
            let state = graph.nodes.get(node).ok_or(TreeError::UnknownNode(node))?;
            if !state.allows_children {
                return Err(TreeError::NoChildren(node));
            }
            if let Some(children) = &state.children {
                return Ok(children.clone());
            }
            state.object.clone()
        };
        self.realize(node, object)
    }

    fn realize(&self, node: NodeId, object: T) -> TreeResult<Vec<NodeId>> {
        let _perf = PerfSpan::new("tree_projector::realize");
        let list = self.shared.source.children(&object).map_err(TreeError::Source)?;

        // Connect, snapshot and install in one critical section so no list
        // event can reach this node between the snapshot and the install.
        let mut graph = self.shared.graph.lock();
        match graph.nodes.get(node).map(|state| state.children.clone()) {
            None => return Err(TreeError::UnknownNode(node)),
            Some(Some(children)) => return Ok(children),
            Some(None) => {}
        }

        let weak: Weak<Shared<T>> = Arc::downgrade(&self.shared);
        let connection = list.events().connect(move |event| {
            if let Some(shared) = weak.upgrade() {
                shared.handle_list_event(node, event);
            }
        });
        let snapshot = list.snapshot();
        let flags = self.shared.flags(&snapshot);

        let ids: Vec<NodeId> = snapshot
            .into_iter()
            .zip(flags)
            .map(|(child, allows)| graph.nodes.insert(NodeState::new(child, Some(node), allows)))
            .collect();
        if let Some(state) = graph.nodes.get_mut(node) {
            state.children = Some(ids.clone());
            state.subscription = Some(Subscription { list, connection });
        }
        tracing::debug!(target: targets::MODEL, ?node, count = ids.len(), "node realized");
        Ok(ids)
    }

    /// A copy of the object `node` wraps.
    pub fn wrapped_object(&self, node: NodeId) -> TreeResult<T> {
        let graph = self.shared.graph.lock();
        graph
            .nodes
            .get(node)
            .map(|state| state.object.clone())
            .ok_or(TreeError::UnknownNode(node))
    }

    /// The parent of `node`; `None` for the root.
    pub fn parent(&self, node: NodeId) -> TreeResult<Option<NodeId>> {
        let graph = self.shared.graph.lock();
        graph
            .nodes
            .get(node)
            .map(|state| state.parent)
            .ok_or(TreeError::UnknownNode(node))
    }

    /// Whether `node`'s object can have children.
    pub fn allows_children(&self, node: NodeId) -> TreeResult<bool> {
        let graph = self.shared.graph.lock();
        graph
            .nodes
            .get(node)
            .map(|state| state.allows_children)
            .ok_or(TreeError::UnknownNode(node))
    }

    /// Whether `node`'s children have been fetched. `false` for unknown nodes.
    pub fn is_realized(&self, node: NodeId) -> bool {
        self.shared.graph.lock().realized_children(node).is_some()
    }

    /// Number of children of `node`, realizing it if needed. Leaves have none.
    pub fn child_count(&self, node: NodeId) -> TreeResult<usize> {
        if !self.allows_children(node)? {
            return Ok(0);
        }
        Ok(self.children(node)?.len())
    }

    /// The child of `node` at `index`, realizing it if needed.
    pub fn child_at(&self, node: NodeId, index: usize) -> TreeResult<Option<NodeId>> {
        if !self.allows_children(node)? {
            return Ok(None);
        }
        Ok(self.children(node)?.get(index).copied())
    }

    /// Position of `node` among its parent's children.
    ///
    /// `None` for the root and for a node that has been detached but not yet
    /// freed (inside a `nodes_removed` callback).
    pub fn index_in_parent(&self, node: NodeId) -> TreeResult<Option<usize>> {
        let graph = self.shared.graph.lock();
        let state = graph.nodes.get(node).ok_or(TreeError::UnknownNode(node))?;
        Ok(state
            .parent
            .and_then(|parent| graph.realized_children(parent))
            .and_then(|siblings| siblings.iter().position(|&sibling| sibling == node)))
    }

    /// Nodes from the root down to and including `node`.
    pub fn path_from_root(&self, node: NodeId) -> TreeResult<Vec<NodeId>> {
        let graph = self.shared.graph.lock();
        let mut path = Vec::new();
        let mut current = Some(node);
        while let Some(id) = current {
            let state = graph.nodes.get(id).ok_or(TreeError::UnknownNode(node))?;
            path.push(id);
            current = state.parent;
        }
        path.reverse();
        Ok(path)
    }

    /// Child indices leading from the root to `node`. Empty for the root.
    pub fn index_path(&self, node: NodeId) -> TreeResult<Vec<usize>> {
        let path = self.path_from_root(node)?;
        path.into_iter()
            .skip(1)
            .map(|id| self.index_in_parent(id)?.ok_or(TreeError::UnknownNode(id)))
            .collect()
    }

    /// Number of live nodes, realized or not.
    pub fn node_count(&self) -> usize {
        self.shared.graph.lock().nodes.len()
    }

    /// Register a listener.
    ///
    /// Registering the same listener again replaces the earlier registration.
    pub fn add_listener(&self, listener: Arc<dyn TreeListener>) {
        let key = listener_key(&listener);
        let projector = self.id;
        let connection = self.shared.events.connect(move |notice| {
            tracing::trace!(
                target: targets::MODEL,
                graph = notice.source.0,
                projector = projector.as_u64(),
                "delivering tree event"
            );
            deliver(listener.as_ref(), projector, &notice.event);
        });
        if let Some(previous) = self.listeners.lock().insert(key, connection) {
            self.shared.events.disconnect(previous);
        }
    }

    /// Detach a listener. Returns whether it was registered.
    pub fn remove_listener(&self, listener: &Arc<dyn TreeListener>) -> bool {
        let removed = self.listeners.lock().remove(&listener_key(listener));
        match removed {
            Some(connection) => self.shared.events.disconnect(connection),
            None => false,
        }
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }
}

impl<T: 'static> Drop for TreeProjector<T> {
    fn drop(&mut self) {
        let subscriptions: Vec<_> = self
            .shared
            .graph
            .lock()
            .nodes
            .drain()
            .filter_map(|(_, node)| node.subscription)
            .collect();
        for subscription in subscriptions {
            subscription.list.events().disconnect(subscription.connection);
        }
    }
}

impl<T: 'static> std::fmt::Debug for TreeProjector<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let graph = self.shared.graph.lock();
        f.debug_struct("TreeProjector")
            .field("id", &self.id)
            .field("root", &graph.root)
            .field("nodes", &graph.nodes.len())
            .finish()
    }
}

fn listener_key(listener: &Arc<dyn TreeListener>) -> usize {
    Arc::as_ptr(listener) as *const () as usize
}

fn deliver(listener: &dyn TreeListener, source: ProjectorId, event: &GraphEvent) {
    match event {
        GraphEvent::Inserted { parent, start, end } => listener.nodes_inserted(source, *parent, *start, *end),
        GraphEvent::Removed {
            parent,
            start,
            end,
            removed,
        } => listener.nodes_removed(source, *parent, *start, *end, removed),
        GraphEvent::Changed { parent, indices } => listener.nodes_changed(source, *parent, indices),
        GraphEvent::Rebuilt { root } => listener.structure_changed(source, *root),
    }
}

static_assertions::assert_impl_all!(TreeProjector<String>: Send, Sync);
