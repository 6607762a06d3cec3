//! Vitrine - hierarchical collection boxes for a sequence library.
//!
//! Boxes are user-made folders (groups), hand-curated exhibit lists (free
//! lists) and saved filters (smart boxes). They are stored in SQLite and
//! shown as a lazily expanded tree that reports every edit as a minimal
//! insert, remove or change event.
//!
//! # Example
//!
//! ```no_run
//! use vitrine::store::{BoxKind, ExhibitId};
//! use vitrine::{Library, LibraryConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let library = Library::open(LibraryConfig::default())?;
//!     let controller = library.controller();
//!
//!     let plasmids = controller.add_box(BoxKind::Group, None)?;
//!     controller.rename_box(plasmids, "Plasmids")?;
//!     let picks = controller.add_box(BoxKind::FreeList, Some(plasmids))?;
//!     controller.add_exhibit_to_free_list(picks, ExhibitId(42))?;
//!     Ok(())
//! }
//! ```

pub mod collection;
pub mod config;
pub mod model;
pub mod store;

mod library;

pub use collection::{CollectionError, CollectionResult, CollectionTreeController};
pub use config::{ConfigError, LibraryConfig};
pub use library::{Library, LibraryError, LibraryResult};

pub use vitrine_core::{
    CancellationToken, CoreError, CoreResult, Dispatcher, DispatcherHandle, Signal, ThreadAffinity, ThreadPool,
    ThreadPoolConfig, TreeStyle, logging,
};
