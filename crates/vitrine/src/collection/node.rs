//! Objects shown in the collection tree.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::store::{BoxId, CollectionBox};

/// Fixed groupings directly under the tree root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Configured library sources.
    Sources,
    /// Root-level boxes.
    Collections,
}

/// A library source listed under [`Category::Sources`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LibrarySource {
    pub name: String,
}

impl LibrarySource {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// The object a collection tree node wraps.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CollectionNode {
    /// Invisible root holding the two categories.
    Root,
    Category(Category),
    Box(CollectionBox),
    Source(LibrarySource),
}

impl CollectionNode {
    /// Whether this object can have children in the tree.
    pub fn allows_children(&self) -> bool {
        match self {
            CollectionNode::Root | CollectionNode::Category(_) => true,
            CollectionNode::Box(record) => record.kind.allows_children(),
            CollectionNode::Source(_) => false,
        }
    }

    /// The wrapped box, if any.
    pub fn as_box(&self) -> Option<&CollectionBox> {
        match self {
            CollectionNode::Box(record) => Some(record),
            _ => None,
        }
    }

    /// Id of the wrapped box, if it is a persisted box.
    pub fn box_id(&self) -> Option<BoxId> {
        self.as_box().and_then(|record| record.id)
    }

    /// Short name used in errors and logs.
    pub fn tag(&self) -> &'static str {
        match self {
            CollectionNode::Root => "root",
            CollectionNode::Category(Category::Sources) => "sources",
            CollectionNode::Category(Category::Collections) => "collections",
            CollectionNode::Box(record) => record.kind.tag(),
            CollectionNode::Source(_) => "source",
        }
    }

    /// Display label.
    pub fn label(&self) -> String {
        match self {
            CollectionNode::Root => "Library".to_string(),
            CollectionNode::Category(Category::Sources) => "Sources".to_string(),
            CollectionNode::Category(Category::Collections) => "Collections".to_string(),
            CollectionNode::Box(record) => record.name.clone(),
            CollectionNode::Source(source) => source.name.clone(),
        }
    }
}

impl fmt::Display for CollectionNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}
