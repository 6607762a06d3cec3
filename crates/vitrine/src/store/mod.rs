//! Persistence of boxes and memberships.
//!
//! [`BoxStore`] owns one SQLite connection and answers the hierarchy queries
//! the collection controller needs. It has no knowledge of the in-memory tree.

mod box_store;
mod error;
mod record;

pub use box_store::{BoxStore, StoreOptions};
pub use error::{StoreError, StoreResult};
pub use record::{
    BoxId, BoxKind, CollectionBox, DefaultNames, ExhibitId, Membership, MembershipId, ReparentOutcome, SmartQuery,
};
