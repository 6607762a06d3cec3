//! Observable ordered collections.
//!
//! An [`ObservableList`] is the shape every child collection takes before the
//! tree projector sees it: an ordered list that reports each mutation as a
//! [`ListEvent`] over an inclusive index interval.

use std::fmt;

use parking_lot::RwLock;
use vitrine_core::Signal;

/// A mutation of an observable list. Intervals are inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListEvent<T> {
    /// `items` now occupy `start..=end`.
    IntervalAdded { start: usize, end: usize, items: Vec<T> },
    /// The items at `start..=end` were removed.
    IntervalRemoved { start: usize, end: usize },
    /// The items at `start..=end` were replaced by `items`.
    ContentsChanged { start: usize, end: usize, items: Vec<T> },
}

impl<T> ListEvent<T> {
    /// The inclusive interval this event covers.
    pub fn interval(&self) -> (usize, usize) {
        match self {
            ListEvent::IntervalAdded { start, end, .. }
            | ListEvent::IntervalRemoved { start, end }
            | ListEvent::ContentsChanged { start, end, .. } => (*start, *end),
        }
    }
}

/// An ordered list whose mutations can be observed.
///
/// Events are emitted synchronously, after the mutation is visible through
/// [`get`](Self::get) and [`snapshot`](Self::snapshot).
pub trait ObservableList<T>: Send + Sync {
    /// Number of items.
    fn len(&self) -> usize;

    /// Whether the list has no items.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A copy of the item at `index`.
    fn get(&self, index: usize) -> Option<T>;

    /// A copy of every item, in order.
    fn snapshot(&self) -> Vec<T>;

    /// The signal carrying this list's mutations.
    fn events(&self) -> &Signal<ListEvent<T>>;
}

/// A `Vec`-backed [`ObservableList`].
///
/// Mutators take `&self`; the items sit behind a lock that is released before
/// any event is emitted, so slots may read the list freely.
///
/// ```
/// use vitrine::model::{ObservableList, ObservableVec};
/// use std::sync::Arc;
/// use parking_lot::Mutex;
///
/// let list = ObservableVec::<&'static str>::new();
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let seen_clone = seen.clone();
/// list.events().connect(move |event| {
///     seen_clone.lock().push(event.interval());
/// });
///
/// list.push("Primers");
/// list.push("Plasmids");
/// list.remove(0);
/// assert_eq!(*seen.lock(), vec![(0, 0), (1, 1), (0, 0)]);
/// assert_eq!(list.snapshot(), vec!["Plasmids"]);
/// ```
pub struct ObservableVec<T> {
    items: RwLock<Vec<T>>,
    events: Signal<ListEvent<T>>,
}

impl<T: Clone + Send + Sync + 'static> Default for ObservableVec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync + 'static> ObservableVec<T> {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::from_vec(Vec::new())
    }

    /// Creates a list holding `items`. No event is emitted.
    pub fn from_vec(items: Vec<T>) -> Self {
        Self {
            items: RwLock::new(items),
            events: Signal::new(),
        }
    }

    /// Appends an item and returns its index.
    pub fn push(&self, item: T) -> usize {
        let index = {
            let mut items = self.items.write();
            items.push(item.clone());
            items.len() - 1
        };
        self.events.emit(ListEvent::IntervalAdded {
            start: index,
            end: index,
            items: vec![item],
        });
        index
    }

    /// Inserts an item at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index > len()`.
    pub fn insert(&self, index: usize, item: T) {
        self.items.write().insert(index, item.clone());
        self.events.emit(ListEvent::IntervalAdded {
            start: index,
            end: index,
            items: vec![item],
        });
    }

    /// Removes and returns the item at `index`, or `None` if out of range.
    pub fn remove(&self, index: usize) -> Option<T> {
        let removed = {
            let mut items = self.items.write();
            if index >= items.len() {
                return None;
            }
            items.remove(index)
        };
        self.events.emit(ListEvent::IntervalRemoved {
            start: index,
            end: index,
        });
        Some(removed)
    }

    /// Replaces the item at `index`, returning the previous one.
    pub fn set(&self, index: usize, item: T) -> Option<T> {
        let previous = {
            let mut items = self.items.write();
            let slot = items.get_mut(index)?;
            std::mem::replace(slot, item.clone())
        };
        self.events.emit(ListEvent::ContentsChanged {
            start: index,
            end: index,
            items: vec![item],
        });
        Some(previous)
    }

    /// Replaces every item.
    ///
    /// Observers see the old contents removed, then the new contents added.
    pub fn replace_all(&self, new_items: Vec<T>) {
        let (old_len, new_len) = {
            let mut items = self.items.write();
            let old_len = items.len();
            *items = new_items.clone();
            (old_len, items.len())
        };
        if old_len > 0 {
            self.events.emit(ListEvent::IntervalRemoved {
                start: 0,
                end: old_len - 1,
            });
        }
        if new_len > 0 {
            self.events.emit(ListEvent::IntervalAdded {
                start: 0,
                end: new_len - 1,
                items: new_items,
            });
        }
    }

    /// Index of the first item matching `predicate`.
    pub fn position<P>(&self, predicate: P) -> Option<usize>
    where
        P: FnMut(&T) -> bool,
    {
        self.items.read().iter().position(predicate)
    }
}

impl<T: Clone + Send + Sync + 'static> ObservableList<T> for ObservableVec<T> {
    fn len(&self) -> usize {
        self.items.read().len()
    }

    fn get(&self, index: usize) -> Option<T> {
        self.items.read().get(index).cloned()
    }

    fn snapshot(&self) -> Vec<T> {
        self.items.read().clone()
    }

    fn events(&self) -> &Signal<ListEvent<T>> {
        &self.events
    }
}

impl<T: fmt::Debug + 'static> fmt::Debug for ObservableVec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableVec")
            .field("items", &*self.items.read())
            .field("observers", &self.events.connection_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn record<T: Clone + Send + Sync + 'static>(list: &ObservableVec<T>) -> Arc<Mutex<Vec<ListEvent<T>>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let events_clone = events.clone();
        list.events().connect(move |event| events_clone.lock().push(event.clone()));
        events
    }

    #[test]
    fn test_push_and_insert_emit_added() {
        let list = ObservableVec::new();
        let events = record(&list);

        assert_eq!(list.push(1), 0);
        list.insert(0, 0);

        assert_eq!(list.snapshot(), vec![0, 1]);
        assert_eq!(
            *events.lock(),
            vec![
                ListEvent::IntervalAdded { start: 0, end: 0, items: vec![1] },
                ListEvent::IntervalAdded { start: 0, end: 0, items: vec![0] },
            ]
        );
    }

    #[test]
    fn test_remove_out_of_range_is_silent() {
        let list = ObservableVec::from_vec(vec!['a']);
        let events = record(&list);

        assert_eq!(list.remove(3), None);
        assert!(events.lock().is_empty());
        assert_eq!(list.remove(0), Some('a'));
        assert_eq!(*events.lock(), vec![ListEvent::IntervalRemoved { start: 0, end: 0 }]);
    }

    #[test]
    fn test_set_emits_changed() {
        let list = ObservableVec::from_vec(vec!["a", "b"]);
        let events = record(&list);

        assert_eq!(list.set(1, "c"), Some("b"));
        assert_eq!(list.set(5, "z"), None);
        assert_eq!(
            *events.lock(),
            vec![ListEvent::ContentsChanged { start: 1, end: 1, items: vec!["c"] }]
        );
    }

    #[test]
    fn test_replace_all_emits_remove_then_add() {
        let list = ObservableVec::from_vec(vec![1, 2, 3]);
        let events = record(&list);

        list.replace_all(vec![9, 8]);
        list.replace_all(Vec::new());

        assert_eq!(
            *events.lock(),
            vec![
                ListEvent::IntervalRemoved { start: 0, end: 2 },
                ListEvent::IntervalAdded { start: 0, end: 1, items: vec![9, 8] },
                ListEvent::IntervalRemoved { start: 0, end: 1 },
            ]
        );
        assert!(list.is_empty());
    }

    #[test]
    fn test_slot_can_read_list_during_emit() {
        let list = Arc::new(ObservableVec::new());
        let lens = Arc::new(Mutex::new(Vec::new()));

        let list_clone = Arc::downgrade(&list);
        let lens_clone = lens.clone();
        list.events().connect(move |_| {
            if let Some(list) = list_clone.upgrade() {
                lens_clone.lock().push(list.len());
            }
        });

        list.push("x");
        list.push("y");
        assert_eq!(*lens.lock(), vec![1, 2]);
    }

    #[test]
    fn test_position() {
        let list = ObservableVec::from_vec(vec![3, 5, 7]);
        assert_eq!(list.position(|&v| v == 5), Some(1));
        assert_eq!(list.position(|&v| v == 4), None);
        assert_eq!(list.get(2), Some(7));
    }
}
