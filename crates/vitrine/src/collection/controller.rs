//! Box-specific policy over the store and the tree projector.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use vitrine_core::logging::targets;
use vitrine_core::{Dispatcher, Signal, ThreadAffinity, ThreadPool, TreeStyle};

use super::error::{CollectionError, CollectionResult};
use super::evaluator::SmartQueryEvaluator;
use super::loader::ContentLoader;
use super::node::{Category, CollectionNode, LibrarySource};
use super::source::{BoxList, BoxTreeSource};
use crate::model::{NodeId, ObservableList, ObservableVec, TreeDataSource, TreeDebug, TreeFormatOptions, TreeProjector};
use crate::store::{BoxId, BoxKind, BoxStore, CollectionBox, ExhibitId, Membership, MembershipId, ReparentOutcome};

/// Where a box may be placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Destination {
    /// The Collections category; boxes stored with no parent.
    TopLevel,
    /// Under a group box.
    Group(BoxId),
}

impl Destination {
    fn parent_id(self) -> Option<BoxId> {
        match self {
            Destination::TopLevel => None,
            Destination::Group(id) => Some(id),
        }
    }
}

/// The collection tree and every operation that edits it.
///
/// Each mutating operation validates first, writes the store second and
/// touches the tree last, so a rejected or failed call leaves the tree as it
/// was. Must be used from the thread that owns the [`Dispatcher`] it was
/// created with.
pub struct CollectionTreeController {
    store: Arc<BoxStore>,
    tree_source: Arc<BoxTreeSource>,
    projector: Arc<TreeProjector<CollectionNode>>,
    loader: ContentLoader,
    evaluator: Arc<dyn SmartQueryEvaluator>,
    free_lists: Mutex<HashMap<BoxId, Arc<ObservableVec<Membership>>>>,
    smart_lists: Mutex<HashMap<BoxId, Arc<ObservableVec<ExhibitId>>>>,
    refresh_requested: Signal<Option<BoxId>>,
    affinity: ThreadAffinity,
}

impl CollectionTreeController {
    /// Build the tree over `store`. The root is set immediately; nothing is
    /// loaded until a node is expanded.
    pub fn new(
        store: Arc<BoxStore>,
        sources: Vec<LibrarySource>,
        dispatcher: &Dispatcher,
        pool: Arc<ThreadPool>,
        evaluator: Arc<dyn SmartQueryEvaluator>,
    ) -> Self {
        let tree_source = Arc::new(BoxTreeSource::new(store.clone(), sources));
        let projector = Arc::new(TreeProjector::new(
            tree_source.clone() as Arc<dyn TreeDataSource<CollectionNode>>
        ));
        projector.set_source(Some(CollectionNode::Root));

        Self {
            store,
            tree_source,
            projector,
            loader: ContentLoader::new(pool, dispatcher.handle()),
            evaluator,
            free_lists: Mutex::new(HashMap::new()),
            smart_lists: Mutex::new(HashMap::new()),
            refresh_requested: Signal::new(),
            affinity: dispatcher.affinity(),
        }
    }

    /// The projected tree. Observers attach listeners here.
    pub fn projector(&self) -> &Arc<TreeProjector<CollectionNode>> {
        &self.projector
    }

    pub fn store(&self) -> &Arc<BoxStore> {
        &self.store
    }

    pub fn tree_source(&self) -> &Arc<BoxTreeSource> {
        &self.tree_source
    }

    /// Emitted with the affected box whenever a stale reference is detected.
    /// Receivers are expected to call [`refresh`](Self::refresh).
    pub fn refresh_requested(&self) -> &Signal<Option<BoxId>> {
        &self.refresh_requested
    }

    /// The Collections category node, parent of all top-level boxes.
    pub fn collections_node(&self) -> CollectionResult<NodeId> {
        self.category_node(Category::Collections)
    }

    /// The Sources category node.
    pub fn sources_node(&self) -> CollectionResult<NodeId> {
        self.category_node(Category::Sources)
    }

    fn category_node(&self, category: Category) -> CollectionResult<NodeId> {
        let root = self.root()?;
        let wanted = CollectionNode::Category(category);
        for child in self.projector.children(root)? {
            if self.projector.wrapped_object(child)? == wanted {
                return Ok(child);
            }
        }
        Err(self.stale(None, format!("{} category", wanted.tag())))
    }

    fn root(&self) -> CollectionResult<NodeId> {
        match self.projector.root() {
            Some(root) => Ok(root),
            None => Err(self.stale(None, "tree root".to_string())),
        }
    }

    /// Create a box of `kind` at the end of `parent`'s children.
    ///
    /// `None` places it under Collections. Any other parent must be a group.
    #[tracing::instrument(skip(self), target = "vitrine::collection", level = "trace")]
    pub fn add_box(&self, kind: BoxKind, parent: Option<NodeId>) -> CollectionResult<NodeId> {
        self.check_thread();
        let parent = match parent {
            Some(node) => node,
            None => self.collections_node()?,
        };
        let destination = self.destination(parent)?;

        // Realize first so the new row is not picked up by a fresh load and
        // then pushed a second time.
        self.projector.children(parent)?;
        let list = self.tree_source.box_list(destination.parent_id())?;

        let mut record = self.store.new_box(kind);
        record.parent_id = destination.parent_id();
        if !self.store.store(&mut record)? {
            return Err(self.stale(record.parent_id, "parent box".to_string()));
        }
        tracing::debug!(target: targets::COLLECTION, id = ?record.id, kind = record.kind.tag(), "box added");

        let index = list.push(CollectionNode::Box(record));
        self.child_node(parent, index)
    }

    /// Whether `source` may be moved under `target`.
    ///
    /// Moving to the current parent is allowed and is a no-op.
    pub fn can_move(&self, source: NodeId, target: NodeId) -> CollectionResult<bool> {
        if source == target {
            return Ok(false);
        }
        let Some(moved) = self.projector.wrapped_object(source)?.box_id() else {
            return Ok(false);
        };
        match self.destination(target) {
            Ok(Destination::TopLevel) => Ok(true),
            Ok(Destination::Group(target_id)) => {
                Ok(target_id != moved && !self.store.is_ancestor(target_id, moved)?)
            }
            Err(CollectionError::KindMismatch { .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Move `source` to the end of `target`'s children.
    ///
    /// Returns the node now wrapping the box. A move to the current parent
    /// changes nothing and returns `source` itself; any other move yields a
    /// new node.
    #[tracing::instrument(skip(self), target = "vitrine::collection", level = "trace")]
    pub fn move_box(&self, source: NodeId, target: NodeId) -> CollectionResult<NodeId> {
        self.check_thread();
        let record = self.box_of(source)?;
        let moved = self.persisted_id(&record)?;
        let destination = self.destination(target)?;
        if let Destination::Group(target_id) = destination {
            if target_id == moved || self.store.is_ancestor(target_id, moved)? {
                return Err(CollectionError::CycleViolation {
                    moved,
                    target: target_id,
                });
            }
        }

        if self.projector.parent(source)? == Some(target) {
            tracing::trace!(target: targets::COLLECTION, %moved, "move to current parent ignored");
            return Ok(source);
        }

        self.projector.children(target)?;
        let new_list = self.tree_source.box_list(destination.parent_id())?;
        let old_list = self.tree_source.loaded_box_list(record.parent_id);

        let updated = match self.store.reparent(moved, destination.parent_id())? {
            ReparentOutcome::Reparented(updated) => updated,
            ReparentOutcome::Missing => return Err(self.stale(Some(moved), format!("{moved} or its new parent"))),
            ReparentOutcome::WouldCycle => {
                return Err(CollectionError::CycleViolation {
                    moved,
                    target: destination.parent_id().unwrap_or(moved),
                });
            }
        };
        tracing::debug!(target: targets::COLLECTION, %moved, to = ?updated.parent_id, "box moved");

        if let Some(old_list) = old_list {
            if let Some(index) = position_of(&old_list, moved) {
                old_list.remove(index);
            }
        }
        let index = new_list.push(CollectionNode::Box(updated));
        self.child_node(target, index)
    }

    /// Delete the box at `node` with its whole subtree and memberships.
    #[tracing::instrument(skip(self), target = "vitrine::collection", level = "trace")]
    pub fn remove_box(&self, node: NodeId) -> CollectionResult<()> {
        self.check_thread();
        let record = self.box_of(node)?;
        let id = self.persisted_id(&record)?;
        let list = self.tree_source.loaded_box_list(record.parent_id);

        if !self.store.delete(&record)? {
            return Err(self.stale(Some(id), id.to_string()));
        }
        tracing::debug!(target: targets::COLLECTION, %id, "box removed");

        if let Some(list) = list {
            if let Some(index) = position_of(&list, id) {
                list.remove(index);
            }
        }
        self.forget_deleted()?;
        Ok(())
    }

    /// Rename the box at `node`.
    pub fn rename_box(&self, node: NodeId, name: &str) -> CollectionResult<()> {
        self.check_thread();
        let mut record = self.box_of(node)?;
        let id = self.persisted_id(&record)?;
        record.name = name.to_string();
        if !self.store.store(&mut record)? {
            return Err(self.stale(Some(id), id.to_string()));
        }

        if let Some(list) = self.tree_source.loaded_box_list(record.parent_id) {
            if let Some(index) = position_of(&list, id) {
                list.set(index, CollectionNode::Box(record));
            }
        }
        Ok(())
    }

    /// Append `exhibit` to the free list at `node`.
    pub fn add_exhibit_to_free_list(&self, node: NodeId, exhibit: ExhibitId) -> CollectionResult<Membership> {
        self.check_thread();
        let id = self.box_of_kind(node, "free_list", |kind| matches!(kind, BoxKind::FreeList))?;
        let Some(membership) = self.store.add_membership(id, exhibit)? else {
            return Err(self.stale(Some(id), id.to_string()));
        };
        tracing::debug!(target: targets::COLLECTION, %id, %exhibit, sequence = membership.sequence, "exhibit added");

        let contents = self.free_lists.lock().get(&id).cloned();
        if let Some(contents) = contents {
            contents.push(membership);
        }
        Ok(membership)
    }

    /// Remove a membership from the free list at `node`.
    pub fn remove_membership(&self, node: NodeId, membership: MembershipId) -> CollectionResult<()> {
        self.check_thread();
        let id = self.box_of_kind(node, "free_list", |kind| matches!(kind, BoxKind::FreeList))?;
        let owned = self.store.memberships(id)?.iter().any(|m| m.id == membership);
        if !owned || !self.store.remove_membership(membership)? {
            return Err(self.stale(Some(id), membership.to_string()));
        }

        let contents = self.free_lists.lock().get(&id).cloned();
        if let Some(contents) = contents {
            if let Some(index) = contents.position(|m| m.id == membership) {
                contents.remove(index);
            }
        }
        Ok(())
    }

    /// Move a membership to another position within its free list.
    pub fn reorder_membership(
        &self,
        box_id: BoxId,
        membership: MembershipId,
        new_position: usize,
    ) -> CollectionResult<()> {
        self.check_thread();
        tracing::debug!(
            target: targets::COLLECTION,
            %box_id,
            %membership,
            new_position,
            "membership reordering requested"
        );
        Err(CollectionError::Unsupported("reordering free list memberships"))
    }

    /// Live contents of the free list at `node`, ordered by sequence.
    pub fn free_list_contents(&self, node: NodeId) -> CollectionResult<Arc<ObservableVec<Membership>>> {
        self.check_thread();
        let id = self.box_of_kind(node, "free_list", |kind| matches!(kind, BoxKind::FreeList))?;
        if let Some(contents) = self.free_lists.lock().get(&id) {
            return Ok(contents.clone());
        }

        let loaded = self.store.memberships(id)?;
        let mut free_lists = self.free_lists.lock();
        let contents = free_lists
            .entry(id)
            .or_insert_with(|| Arc::new(ObservableVec::from_vec(loaded)));
        Ok(contents.clone())
    }

    /// Live matches of the smart box at `node`.
    ///
    /// Starts empty; the first call schedules an evaluation whose result is
    /// applied on the dispatcher thread.
    pub fn smart_query_contents(&self, node: NodeId) -> CollectionResult<Arc<ObservableVec<ExhibitId>>> {
        self.check_thread();
        let id = self.box_of_kind(node, "smart_query", |kind| matches!(kind, BoxKind::SmartQuery(_)))?;
        if let Some(contents) = self.smart_lists.lock().get(&id) {
            return Ok(contents.clone());
        }

        let contents = Arc::new(ObservableVec::new());
        self.smart_lists.lock().insert(id, contents.clone());
        self.reload_smart_query(node)?;
        Ok(contents)
    }

    /// Re-evaluate the smart box at `node`, superseding any evaluation in
    /// flight for it.
    pub fn reload_smart_query(&self, node: NodeId) -> CollectionResult<()> {
        self.check_thread();
        let record = self.box_of(node)?;
        let id = self.persisted_id(&record)?;
        let BoxKind::SmartQuery(query) = record.kind else {
            return Err(CollectionError::KindMismatch {
                expected: "smart_query",
                found: record.kind.tag(),
            });
        };
        let Some(contents) = self.smart_lists.lock().get(&id).cloned() else {
            // Nobody is watching; evaluate when contents are first requested.
            return Ok(());
        };

        let evaluator = self.evaluator.clone();
        self.loader.load(
            id,
            move |cancel| evaluator.evaluate(&query, cancel),
            move |result| match result {
                Ok(matches) => {
                    tracing::debug!(target: targets::COLLECTION, %id, count = matches.len(), "smart query evaluated");
                    if contents.snapshot() != matches {
                        contents.replace_all(matches);
                    }
                }
                Err(err) => {
                    tracing::warn!(target: targets::COLLECTION, %id, error = %err, "smart query evaluation failed");
                }
            },
        );
        Ok(())
    }

    /// Whether an evaluation is in flight for `box_id`.
    pub fn is_loading(&self, box_id: BoxId) -> bool {
        self.loader.is_loading(box_id)
    }

    /// Re-derive every loaded list from the store.
    ///
    /// This is the recovery path after a stale reference. Returns the number
    /// of lists that changed.
    #[tracing::instrument(skip(self), target = "vitrine::collection", level = "trace")]
    pub fn refresh(&self) -> CollectionResult<usize> {
        self.check_thread();
        let mut changed = self.tree_source.refresh()?;
        self.forget_deleted()?;

        let free_lists: Vec<_> = self
            .free_lists
            .lock()
            .iter()
            .map(|(id, contents)| (*id, contents.clone()))
            .collect();
        for (id, contents) in free_lists {
            let fresh = self.store.memberships(id)?;
            if contents.snapshot() != fresh {
                contents.replace_all(fresh);
                changed += 1;
            }
        }
        Ok(changed)
    }

    /// Render the currently realized tree.
    pub fn format_tree(&self, style: TreeStyle) -> CollectionResult<String> {
        let debug = TreeDebug::with_options(TreeFormatOptions {
            style,
            ..Default::default()
        });
        Ok(debug.format(&self.projector, CollectionNode::label)?)
    }

    fn check_thread(&self) {
        self.affinity.debug_check("CollectionTreeController");
    }

    fn stale(&self, box_id: Option<BoxId>, what: String) -> CollectionError {
        tracing::warn!(target: targets::COLLECTION, ?box_id, %what, "stale reference");
        self.refresh_requested.emit(box_id);
        CollectionError::StaleReference { what }
    }

    fn box_of(&self, node: NodeId) -> CollectionResult<CollectionBox> {
        match self.projector.wrapped_object(node)? {
            CollectionNode::Box(record) => Ok(record),
            other => Err(CollectionError::KindMismatch {
                expected: "box",
                found: other.tag(),
            }),
        }
    }

    fn box_of_kind(
        &self,
        node: NodeId,
        expected: &'static str,
        accepts: impl FnOnce(&BoxKind) -> bool,
    ) -> CollectionResult<BoxId> {
        let record = self.box_of(node)?;
        if !accepts(&record.kind) {
            return Err(CollectionError::KindMismatch {
                expected,
                found: record.kind.tag(),
            });
        }
        self.persisted_id(&record)
    }

    fn persisted_id(&self, record: &CollectionBox) -> CollectionResult<BoxId> {
        match record.id {
            Some(id) => Ok(id),
            None => Err(self.stale(None, format!("unsaved box {:?}", record.name))),
        }
    }

    fn destination(&self, node: NodeId) -> CollectionResult<Destination> {
        match self.projector.wrapped_object(node)? {
            CollectionNode::Category(Category::Collections) => Ok(Destination::TopLevel),
            CollectionNode::Box(record) if record.kind.allows_children() => {
                Ok(Destination::Group(self.persisted_id(&record)?))
            }
            other => Err(CollectionError::KindMismatch {
                expected: "group",
                found: other.tag(),
            }),
        }
    }

    fn child_node(&self, parent: NodeId, index: usize) -> CollectionResult<NodeId> {
        match self.projector.child_at(parent, index)? {
            Some(node) => Ok(node),
            None => Err(self.stale(self.projector.wrapped_object(parent)?.box_id(), "new child node".into())),
        }
    }

    fn forget_deleted(&self) -> CollectionResult<()> {
        for id in self.tree_source.prune()? {
            self.loader.cancel(id);
        }
        let cached: Vec<BoxId> = {
            let free = self.free_lists.lock();
            let smart = self.smart_lists.lock();
            free.keys().chain(smart.keys()).copied().collect()
        };
        for id in cached {
            if self.store.find(id)?.is_none() {
                self.free_lists.lock().remove(&id);
                self.smart_lists.lock().remove(&id);
                self.loader.cancel(id);
            }
        }
        Ok(())
    }
}

fn position_of(list: &BoxList, id: BoxId) -> Option<usize> {
    list.position(|node| node.box_id() == Some(id))
}

impl std::fmt::Debug for CollectionTreeController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionTreeController")
            .field("projector", &self.projector)
            .field("tree_source", &self.tree_source)
            .field("loader", &self.loader)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::EmptyEvaluator;
    use crate::model::{ProjectorId, TreeListener};
    use vitrine_core::ThreadPoolConfig;

    struct Fixture {
        _dispatcher: Dispatcher,
        controller: CollectionTreeController,
    }

    fn fixture() -> Fixture {
        let dispatcher = Dispatcher::new();
        let pool = Arc::new(ThreadPool::new(ThreadPoolConfig::with_threads(1)).unwrap());
        let store = Arc::new(BoxStore::open_in_memory().unwrap());
        let controller = CollectionTreeController::new(
            store,
            vec![LibrarySource::new("Local")],
            &dispatcher,
            pool,
            Arc::new(EmptyEvaluator),
        );
        Fixture {
            _dispatcher: dispatcher,
            controller,
        }
    }

    #[derive(Default)]
    struct Log(Mutex<Vec<String>>);

    impl TreeListener for Log {
        fn nodes_inserted(&self, _: ProjectorId, _: NodeId, start: usize, end: usize) {
            self.0.lock().push(format!("+{start}..={end}"));
        }
        fn nodes_removed(&self, _: ProjectorId, _: NodeId, start: usize, end: usize, _: &[NodeId]) {
            self.0.lock().push(format!("-{start}..={end}"));
        }
        fn nodes_changed(&self, _: ProjectorId, _: NodeId, indices: &[usize]) {
            self.0.lock().push(format!("~{indices:?}"));
        }
    }

    #[test]
    fn test_add_box_defaults() {
        let f = fixture();
        let c = &f.controller;
        let node = c.add_box(BoxKind::Group, None).unwrap();
        let record = c.box_of(node).unwrap();
        assert_eq!(record.name, "New Group");
        assert_eq!(record.parent_id, None);
        assert!(record.is_persisted());
        assert_eq!(c.projector().parent(node).unwrap(), Some(c.collections_node().unwrap()));
    }

    #[test]
    fn test_add_box_under_leaf_rejected() {
        let f = fixture();
        let c = &f.controller;
        let list = c.add_box(BoxKind::FreeList, None).unwrap();
        let before = c.store().box_count().unwrap();

        let err = c.add_box(BoxKind::Group, Some(list)).unwrap_err();
        assert!(matches!(
            err,
            CollectionError::KindMismatch {
                expected: "group",
                found: "free_list"
            }
        ));
        assert_eq!(c.store().box_count().unwrap(), before);

        let sources = c.sources_node().unwrap();
        assert!(c.add_box(BoxKind::Group, Some(sources)).is_err());
    }

    #[test]
    fn test_rename_emits_change() {
        let f = fixture();
        let c = &f.controller;
        let node = c.add_box(BoxKind::FreeList, None).unwrap();
        let log = Arc::new(Log::default());
        c.projector().add_listener(log.clone());

        c.rename_box(node, "Primers").unwrap();

        assert_eq!(*log.0.lock(), vec!["~[0]"]);
        assert_eq!(c.box_of(node).unwrap().name, "Primers");
        let id = c.box_of(node).unwrap().id.unwrap();
        assert_eq!(c.store().find(id).unwrap().unwrap().name, "Primers");
    }

    #[test]
    fn test_stale_rename_requests_refresh() {
        let f = fixture();
        let c = &f.controller;
        let node = c.add_box(BoxKind::FreeList, None).unwrap();
        let record = c.box_of(node).unwrap();
        let requested = Arc::new(Mutex::new(Vec::new()));
        let requested_clone = requested.clone();
        c.refresh_requested().connect(move |id| requested_clone.lock().push(*id));

        // Deleted behind the controller's back.
        assert!(c.store().delete(&record).unwrap());
        let err = c.rename_box(node, "Gone").unwrap_err();

        assert!(matches!(err, CollectionError::StaleReference { .. }));
        assert_eq!(*requested.lock(), vec![record.id]);
        assert_eq!(c.box_of(node).unwrap().name, "New List");

        assert_eq!(c.refresh().unwrap(), 1);
        assert!(c.projector().wrapped_object(node).is_err());
    }

    #[test]
    fn test_membership_kind_checks() {
        let f = fixture();
        let c = &f.controller;
        let group = c.add_box(BoxKind::Group, None).unwrap();
        let err = c.add_exhibit_to_free_list(group, ExhibitId(1)).unwrap_err();
        assert!(matches!(
            err,
            CollectionError::KindMismatch {
                expected: "free_list",
                found: "group"
            }
        ));
        assert!(matches!(
            c.smart_query_contents(group),
            Err(CollectionError::KindMismatch { .. })
        ));
        assert!(matches!(
            c.add_exhibit_to_free_list(c.collections_node().unwrap(), ExhibitId(1)),
            Err(CollectionError::KindMismatch { expected: "box", .. })
        ));
    }

    #[test]
    fn test_free_list_contents_follow_memberships() {
        let f = fixture();
        let c = &f.controller;
        let list = c.add_box(BoxKind::FreeList, None).unwrap();
        let first = c.add_exhibit_to_free_list(list, ExhibitId(10)).unwrap();

        let contents = c.free_list_contents(list).unwrap();
        assert_eq!(contents.snapshot(), vec![first]);

        let second = c.add_exhibit_to_free_list(list, ExhibitId(11)).unwrap();
        assert_eq!(contents.snapshot(), vec![first, second]);

        c.remove_membership(list, first.id).unwrap();
        assert_eq!(contents.snapshot(), vec![second]);
        assert!(matches!(
            c.remove_membership(list, first.id),
            Err(CollectionError::StaleReference { .. })
        ));
    }

    #[test]
    fn test_reorder_is_unsupported() {
        let f = fixture();
        let err = f
            .controller
            .reorder_membership(BoxId(1), MembershipId(1), 0)
            .unwrap_err();
        assert!(matches!(err, CollectionError::Unsupported(_)));
    }

    #[cfg(debug_assertions)]
    #[test]
    fn test_reorder_off_dispatcher_thread_panics() {
        let f = fixture();
        let controller = &f.controller;
        let result = std::thread::scope(|scope| {
            scope
                .spawn(|| controller.reorder_membership(BoxId(1), MembershipId(1), 0))
                .join()
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_can_move_rejects_non_boxes_and_leaves() {
        let f = fixture();
        let c = &f.controller;
        let group = c.add_box(BoxKind::Group, None).unwrap();
        let list = c.add_box(BoxKind::FreeList, None).unwrap();
        let collections = c.collections_node().unwrap();

        assert!(!c.can_move(collections, group).unwrap());
        assert!(!c.can_move(group, list).unwrap());
        assert!(!c.can_move(group, c.sources_node().unwrap()).unwrap());
        assert!(c.can_move(list, group).unwrap());
        assert!(c.can_move(list, collections).unwrap());
    }

    #[test]
    fn test_format_tree() {
        let f = fixture();
        let c = &f.controller;
        let group = c.add_box(BoxKind::Group, None).unwrap();
        c.rename_box(group, "Plasmids").unwrap();

        let text = c.format_tree(TreeStyle::Ascii).unwrap();
        assert_eq!(text, "Library\n+-- Sources ...\n`-- Collections\n|   `-- Plasmids ...\n");
    }
}
