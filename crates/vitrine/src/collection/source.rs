//! Child lists of the collection tree, derived from the box store.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use vitrine_core::logging::targets;

use super::node::{Category, CollectionNode, LibrarySource};
use crate::model::{ObservableList, ObservableVec, SourceError, TreeDataSource};
use crate::store::{BoxId, BoxStore, StoreResult};

/// Child list of a box-holding node.
pub(crate) type BoxList = Arc<ObservableVec<CollectionNode>>;

/// Serves the collection tree's child lists.
///
/// The root holds the two categories. Sources lists the configured library
/// sources. Collections and every group box get a list of their child boxes,
/// loaded from the store the first time it is requested and then kept in
/// sync by the controller.
pub struct BoxTreeSource {
    store: Arc<BoxStore>,
    root: Arc<ObservableVec<CollectionNode>>,
    sources: Arc<ObservableVec<CollectionNode>>,
    groups: Mutex<HashMap<Option<BoxId>, BoxList>>,
}

impl BoxTreeSource {
    pub fn new(store: Arc<BoxStore>, sources: Vec<LibrarySource>) -> Self {
        Self {
            store,
            root: Arc::new(ObservableVec::from_vec(vec![
                CollectionNode::Category(Category::Sources),
                CollectionNode::Category(Category::Collections),
            ])),
            sources: Arc::new(ObservableVec::from_vec(
                sources.into_iter().map(CollectionNode::Source).collect(),
            )),
            groups: Mutex::new(HashMap::new()),
        }
    }

    /// The child list of `parent` (`None` for Collections), loading it if needed.
    pub(crate) fn box_list(&self, parent: Option<BoxId>) -> StoreResult<BoxList> {
        if let Some(list) = self.groups.lock().get(&parent) {
            return Ok(list.clone());
        }

        let loaded = self.load(parent)?;
        let mut groups = self.groups.lock();
        let list = groups
            .entry(parent)
            .or_insert_with(|| Arc::new(ObservableVec::from_vec(loaded)));
        Ok(list.clone())
    }

    /// The child list of `parent` if it has been loaded.
    pub(crate) fn loaded_box_list(&self, parent: Option<BoxId>) -> Option<BoxList> {
        self.groups.lock().get(&parent).cloned()
    }

    /// Number of loaded box lists.
    pub fn loaded_lists(&self) -> usize {
        self.groups.lock().len()
    }

    /// Add a library source under the Sources category.
    pub fn add_library_source(&self, source: LibrarySource) {
        self.sources.push(CollectionNode::Source(source));
    }

    /// Reload every loaded box list from the store.
    ///
    /// Lists whose contents still match are left alone. Lists belonging to
    /// boxes that no longer exist are dropped. Returns how many lists
    /// changed.
    pub(crate) fn refresh(&self) -> StoreResult<usize> {
        let loaded: Vec<(Option<BoxId>, BoxList)> = self
            .groups
            .lock()
            .iter()
            .map(|(parent, list)| (*parent, list.clone()))
            .collect();

        let mut changed = 0;
        for (parent, list) in loaded {
            if let Some(id) = parent {
                if self.store.find(id)?.is_none() {
                    self.groups.lock().remove(&parent);
                    continue;
                }
            }
            let fresh = self.load(parent)?;
            if list.snapshot() != fresh {
                list.replace_all(fresh);
                changed += 1;
            }
        }
        tracing::debug!(target: targets::COLLECTION, changed, "box lists refreshed");
        Ok(changed)
    }

    /// Drop loaded lists whose box has been deleted.
    pub(crate) fn prune(&self) -> StoreResult<Vec<BoxId>> {
        let keys: Vec<BoxId> = self.groups.lock().keys().flatten().copied().collect();
        let mut pruned = Vec::new();
        for id in keys {
            if self.store.find(id)?.is_none() {
                self.groups.lock().remove(&Some(id));
                pruned.push(id);
            }
        }
        Ok(pruned)
    }

    fn load(&self, parent: Option<BoxId>) -> StoreResult<Vec<CollectionNode>> {
        let children = self.store.children(parent)?;
        tracing::trace!(target: targets::COLLECTION, ?parent, count = children.len(), "loaded box list");
        Ok(children.into_iter().map(CollectionNode::Box).collect())
    }
}

impl TreeDataSource<CollectionNode> for BoxTreeSource {
    fn allows_children(&self, object: &CollectionNode) -> bool {
        object.allows_children()
    }

    fn children(&self, object: &CollectionNode) -> Result<Arc<dyn ObservableList<CollectionNode>>, SourceError> {
        let list: Arc<dyn ObservableList<CollectionNode>> = match object {
            CollectionNode::Root => self.root.clone(),
            CollectionNode::Category(Category::Sources) => self.sources.clone(),
            CollectionNode::Category(Category::Collections) => self.box_list(None)?,
            CollectionNode::Box(record) if record.kind.allows_children() => match record.id {
                Some(id) => self.box_list(Some(id))?,
                None => return Err(format!("box {:?} has not been stored", record.name).into()),
            },
            other => return Err(format!("{} nodes have no children", other.tag()).into()),
        };
        Ok(list)
    }
}

impl std::fmt::Debug for BoxTreeSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxTreeSource")
            .field("sources", &self.sources.len())
            .field("loaded_lists", &self.loaded_lists())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::BoxKind;

    fn stored(store: &BoxStore, kind: BoxKind, parent: Option<BoxId>, name: &str) -> BoxId {
        let mut record = store.new_box(kind);
        record.parent_id = parent;
        record.name = name.to_string();
        assert!(store.store(&mut record).unwrap());
        record.id.unwrap()
    }

    fn names(list: &BoxList) -> Vec<String> {
        list.snapshot().iter().map(CollectionNode::label).collect()
    }

    #[test]
    fn test_root_and_sources() {
        let store = Arc::new(BoxStore::open_in_memory().unwrap());
        let source = BoxTreeSource::new(store, vec![LibrarySource::new("Local")]);

        let root = source.children(&CollectionNode::Root).unwrap();
        assert_eq!(
            root.snapshot(),
            vec![
                CollectionNode::Category(Category::Sources),
                CollectionNode::Category(Category::Collections),
            ]
        );
        let sources = source.children(&CollectionNode::Category(Category::Sources)).unwrap();
        assert_eq!(sources.snapshot(), vec![CollectionNode::Source(LibrarySource::new("Local"))]);

        source.add_library_source(LibrarySource::new("Shared"));
        assert_eq!(sources.len(), 2);
    }

    #[test]
    fn test_box_lists_load_once() {
        let store = Arc::new(BoxStore::open_in_memory().unwrap());
        let group = stored(&store, BoxKind::Group, None, "Plasmids");
        stored(&store, BoxKind::FreeList, Some(group), "Picks");
        let source = BoxTreeSource::new(store.clone(), Vec::new());

        assert!(source.loaded_box_list(None).is_none());
        let top = source.box_list(None).unwrap();
        assert_eq!(names(&top), vec!["Plasmids"]);
        assert!(Arc::ptr_eq(&top, &source.box_list(None).unwrap()));
        assert_eq!(names(&source.box_list(Some(group)).unwrap()), vec!["Picks"]);
        assert_eq!(source.loaded_lists(), 2);
    }

    #[test]
    fn test_leaf_has_no_children() {
        let store = Arc::new(BoxStore::open_in_memory().unwrap());
        let source = BoxTreeSource::new(store.clone(), Vec::new());
        let mut list = store.new_box(BoxKind::FreeList);
        store.store(&mut list).unwrap();

        assert!(source.children(&CollectionNode::Box(list)).is_err());
        assert!(source.children(&CollectionNode::Source(LibrarySource::new("x"))).is_err());
    }

    #[test]
    fn test_refresh_and_prune() {
        let store = Arc::new(BoxStore::open_in_memory().unwrap());
        let group = stored(&store, BoxKind::Group, None, "Group");
        let source = BoxTreeSource::new(store.clone(), Vec::new());
        let top = source.box_list(None).unwrap();
        source.box_list(Some(group)).unwrap();

        stored(&store, BoxKind::FreeList, None, "Behind the tree's back");
        assert_eq!(source.refresh().unwrap(), 1);
        assert_eq!(names(&top), vec!["Group", "Behind the tree's back"]);
        assert_eq!(source.refresh().unwrap(), 0);

        let record = store.find(group).unwrap().unwrap();
        assert!(store.delete(&record).unwrap());
        assert_eq!(source.prune().unwrap(), vec![group]);
        assert!(source.loaded_box_list(Some(group)).is_none());
    }
}
