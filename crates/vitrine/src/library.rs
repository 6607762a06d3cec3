//! The composition root: store, worker pool, dispatcher and controller.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use vitrine_core::logging::targets;
use vitrine_core::{CoreError, Dispatcher, ThreadPool};

use crate::collection::{CollectionTreeController, EmptyEvaluator, SmartQueryEvaluator};
use crate::config::{ConfigError, LibraryConfig};
use crate::store::{BoxStore, StoreError};

/// Errors from assembling a [`Library`].
#[derive(Debug, Error)]
pub enum LibraryError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Result type for library assembly.
pub type LibraryResult<T> = std::result::Result<T, LibraryError>;

/// A ready-to-use collection library.
///
/// The thread that opens the library owns its dispatcher and must be the one
/// that calls into the controller and pumps the queue.
pub struct Library {
    controller: CollectionTreeController,
    pool: Arc<ThreadPool>,
    dispatcher: Dispatcher,
    config: LibraryConfig,
}

impl Library {
    /// Open a library whose smart boxes match nothing.
    pub fn open(config: LibraryConfig) -> LibraryResult<Self> {
        Self::open_with_evaluator(config, Arc::new(EmptyEvaluator))
    }

    /// Open a library using `evaluator` for smart boxes.
    pub fn open_with_evaluator(
        config: LibraryConfig,
        evaluator: Arc<dyn SmartQueryEvaluator>,
    ) -> LibraryResult<Self> {
        let store = match &config.database_path {
            Some(path) => BoxStore::open(path, config.store_options())?,
            None => {
                let conn = rusqlite::Connection::open_in_memory().map_err(StoreError::from)?;
                BoxStore::with_options(conn, config.store_options())?
            }
        };
        let dispatcher = Dispatcher::new();
        let pool = Arc::new(ThreadPool::new(config.pool_config())?);
        let controller = CollectionTreeController::new(
            Arc::new(store),
            config.library_sources(),
            &dispatcher,
            pool.clone(),
            evaluator,
        );
        tracing::info!(
            target: targets::COLLECTION,
            database = ?config.database_path,
            workers = pool.num_threads(),
            "library opened"
        );

        Ok(Self {
            controller,
            pool,
            dispatcher,
            config,
        })
    }

    /// Read a TOML configuration file and open the library it describes.
    pub fn open_from_file(path: impl AsRef<std::path::Path>) -> LibraryResult<Self> {
        Self::open(LibraryConfig::load_toml(path)?)
    }

    pub fn controller(&self) -> &CollectionTreeController {
        &self.controller
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn pool(&self) -> &Arc<ThreadPool> {
        &self.pool
    }

    pub fn config(&self) -> &LibraryConfig {
        &self.config
    }

    /// Run continuations posted by finished background work.
    pub fn process_pending(&self) -> usize {
        self.dispatcher.process_pending()
    }

    /// Pump the dispatcher until `done` holds or `timeout` passes.
    pub fn process_until<F>(&self, timeout: Duration, done: F) -> bool
    where
        F: FnMut() -> bool,
    {
        self.dispatcher.process_until(timeout, done)
    }
}

impl std::fmt::Debug for Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Library")
            .field("config", &self.config)
            .field("dispatcher", &self.dispatcher)
            .field("pool", &self.pool)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::BoxKind;

    #[test]
    fn test_in_memory_library() {
        let library = Library::open(LibraryConfig {
            worker_threads: 1,
            sources: vec!["Local".into()],
            ..Default::default()
        })
        .unwrap();

        let controller = library.controller();
        let group = controller.add_box(BoxKind::Group, None).unwrap();
        assert_eq!(controller.projector().wrapped_object(group).unwrap().label(), "New Group");
        assert_eq!(library.pool().num_threads(), 1);
        assert_eq!(library.process_pending(), 0);
    }

    #[test]
    fn test_library_reopens_database() {
        let dir = tempfile::tempdir().unwrap();
        let config = LibraryConfig {
            database_path: Some(dir.path().join("nested").join("boxes.sqlite")),
            worker_threads: 1,
            ..Default::default()
        };

        {
            let library = Library::open(config.clone()).unwrap();
            library.controller().add_box(BoxKind::FreeList, None).unwrap();
        }

        let library = Library::open(config).unwrap();
        let controller = library.controller();
        let collections = controller.collections_node().unwrap();
        assert_eq!(controller.projector().child_count(collections).unwrap(), 1);
    }

    #[test]
    fn test_open_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("library.toml");
        std::fs::write(&path, "worker_threads = 1\nsources = [\"Bench\"]\n").unwrap();

        let library = Library::open_from_file(&path).unwrap();
        let controller = library.controller();
        let sources = controller.sources_node().unwrap();
        assert_eq!(controller.projector().child_count(sources).unwrap(), 1);
    }
}
