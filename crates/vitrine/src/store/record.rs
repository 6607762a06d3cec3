//! Persisted record types.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::{StoreError, StoreResult};

/// Row id of a box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BoxId(pub i64);

/// Opaque reference to a cataloged exhibit. Only ever used as a foreign key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExhibitId(pub i64);

/// Row id of a membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MembershipId(pub i64);

impl fmt::Display for BoxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "box#{}", self.0)
    }
}

impl fmt::Display for ExhibitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "exhibit#{}", self.0)
    }
}

impl fmt::Display for MembershipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "membership#{}", self.0)
    }
}

/// A saved filter whose matches make up a smart box.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SmartQuery {
    /// Filter text handed to the evaluator verbatim.
    pub filter: String,
}

impl SmartQuery {
    /// Create a query from filter text.
    pub fn new(filter: impl Into<String>) -> Self {
        Self { filter: filter.into() }
    }
}

/// What a box holds.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BoxKind {
    /// Pure container for other boxes.
    Group,
    /// User-ordered list of exhibits.
    FreeList,
    /// Read-only membership computed from a filter.
    SmartQuery(SmartQuery),
}

impl BoxKind {
    /// Stable name used in the `kind` column and in log output.
    pub fn tag(&self) -> &'static str {
        match self {
            BoxKind::Group => "group",
            BoxKind::FreeList => "free_list",
            BoxKind::SmartQuery(_) => "smart_query",
        }
    }

    /// Whether other boxes may be placed under a box of this kind.
    pub fn allows_children(&self) -> bool {
        matches!(self, BoxKind::Group)
    }

    pub(crate) fn to_columns(&self) -> (&'static str, Option<&str>) {
        match self {
            BoxKind::SmartQuery(query) => (self.tag(), Some(query.filter.as_str())),
            _ => (self.tag(), None),
        }
    }

    pub(crate) fn from_columns(tag: &str, filter: Option<String>) -> StoreResult<Self> {
        match tag {
            "group" => Ok(BoxKind::Group),
            "free_list" => Ok(BoxKind::FreeList),
            "smart_query" => Ok(BoxKind::SmartQuery(SmartQuery {
                filter: filter.unwrap_or_default(),
            })),
            other => Err(StoreError::InvalidKind(other.to_string())),
        }
    }
}

impl fmt::Display for BoxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A node in the user's collection hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionBox {
    /// Assigned on first successful [`BoxStore::store`](super::BoxStore::store).
    pub id: Option<BoxId>,
    /// `None` for root-level boxes.
    pub parent_id: Option<BoxId>,
    pub name: String,
    pub kind: BoxKind,
}

impl CollectionBox {
    /// Whether this box has been persisted.
    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }
}

/// An ordered link between a free-list box and an exhibit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Membership {
    pub id: MembershipId,
    pub box_id: BoxId,
    pub exhibit_id: ExhibitId,
    /// Strictly increasing per box, never reused.
    pub sequence: i64,
}

/// Names given to freshly created boxes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultNames {
    pub group: String,
    pub free_list: String,
    pub smart_query: String,
}

impl Default for DefaultNames {
    fn default() -> Self {
        Self {
            group: "New Group".to_string(),
            free_list: "New List".to_string(),
            smart_query: "New Smart Box".to_string(),
        }
    }
}

impl DefaultNames {
    /// The default name for a box of `kind`.
    pub fn for_kind(&self, kind: &BoxKind) -> &str {
        match kind {
            BoxKind::Group => &self.group,
            BoxKind::FreeList => &self.free_list,
            BoxKind::SmartQuery(_) => &self.smart_query,
        }
    }
}

/// Result of [`BoxStore::reparent`](super::BoxStore::reparent).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReparentOutcome {
    /// The row was updated; carries the box as now stored.
    Reparented(CollectionBox),
    /// The box or the target parent no longer exists.
    Missing,
    /// The target is the box itself or one of its descendants.
    WouldCycle,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_column_round_trip() {
        for kind in [BoxKind::Group, BoxKind::FreeList, BoxKind::SmartQuery(SmartQuery::new("len > 500"))] {
            let (tag, filter) = kind.to_columns();
            let back = BoxKind::from_columns(tag, filter.map(str::to_owned)).unwrap();
            assert_eq!(back, kind);
        }
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let err = BoxKind::from_columns("folder", None).unwrap_err();
        assert!(matches!(err, StoreError::InvalidKind(ref tag) if tag == "folder"));
    }

    #[test]
    fn test_only_groups_allow_children() {
        assert!(BoxKind::Group.allows_children());
        assert!(!BoxKind::FreeList.allows_children());
        assert!(!BoxKind::SmartQuery(SmartQuery::new("")).allows_children());
    }

    #[test]
    fn test_default_names() {
        let names = DefaultNames::default();
        assert_eq!(names.for_kind(&BoxKind::Group), "New Group");
        assert_eq!(names.for_kind(&BoxKind::FreeList), "New List");
    }
}
