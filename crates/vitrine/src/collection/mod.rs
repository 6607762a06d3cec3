//! The collection tree: boxes, categories and library sources.
//!
//! [`CollectionTreeController`] is the only writer. It checks kind and cycle
//! rules, persists through the [`BoxStore`](crate::store::BoxStore), and then
//! edits the child lists served by [`BoxTreeSource`], which the projector
//! turns into tree events.

mod controller;
mod error;
mod evaluator;
mod loader;
mod node;
mod source;

pub use controller::CollectionTreeController;
pub use error::{CollectionError, CollectionResult};
pub use evaluator::{EmptyEvaluator, EvaluatorError, SmartQueryEvaluator};
pub use loader::ContentLoader;
pub use node::{Category, CollectionNode, LibrarySource};
pub use source::BoxTreeSource;
