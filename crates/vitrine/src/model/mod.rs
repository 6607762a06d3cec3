//! Observable lists and the lazy tree projected from them.
//!
//! The pieces fit together like this:
//!
//! - an [`ObservableList`] reports every mutation as a [`ListEvent`];
//! - a [`TreeDataSource`] hands out one such list per expandable object;
//! - a [`TreeProjector`] wraps those objects in nodes, fetches child lists on
//!   demand, and forwards each list mutation to its [`TreeListener`]s.

mod debug;
mod error;
mod listener;
mod observable;
mod projector;

pub use debug::{TreeDebug, TreeFormatOptions};
pub use error::{SourceError, TreeError, TreeResult};
pub use listener::{ProjectorId, TreeListener};
pub use observable::{ListEvent, ObservableList, ObservableVec};
pub use projector::{NodeId, TreeDataSource, TreeProjector};
