//! Library configuration.
//!
//! ```toml
//! database_path = "library/boxes.sqlite"
//! worker_threads = 4
//! max_ancestor_walk = 10000
//! sources = ["Local", "Shared drive"]
//!
//! [default_names]
//! group = "New Folder"
//! ```
//!
//! Every key is optional.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use vitrine_core::ThreadPoolConfig;
use vitrine_core::logging::targets;

use crate::collection::LibrarySource;
use crate::store::{DefaultNames, StoreOptions};

/// Errors from reading or writing a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access config file {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Settings for a [`Library`](crate::Library).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// SQLite file holding boxes. `None` keeps everything in memory.
    pub database_path: Option<PathBuf>,
    /// Worker pool size. `0` uses one thread per CPU.
    pub worker_threads: usize,
    /// Name prefix for worker threads.
    pub worker_thread_name: String,
    /// Extra bound on ancestor walks, on top of the box count.
    pub max_ancestor_walk: Option<usize>,
    /// Library sources listed under the Sources category.
    pub sources: Vec<String>,
    /// Names given to new boxes.
    pub default_names: DefaultNames,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            worker_threads: 0,
            worker_thread_name: "vitrine-worker".to_string(),
            max_ancestor_walk: None,
            sources: Vec::new(),
            default_names: DefaultNames::default(),
        }
    }
}

impl LibraryConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Read a configuration file.
    ///
    /// A relative `database_path` is resolved against the file's directory.
    pub fn load_toml(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&text)?;

        if let (Some(db), Some(dir)) = (config.database_path.as_mut(), path.parent()) {
            if db.is_relative() {
                *db = dir.join(&*db);
            }
        }
        tracing::debug!(target: targets::CONFIG, path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Serialize to TOML text.
    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Write the configuration to `path`, replacing it atomically.
    pub fn save_toml(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        let path = path.as_ref();
        let text = self.to_toml_string()?;
        let io_error = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        let staging = path.with_extension("toml.tmp");
        let mut file = fs::File::create(&staging).map_err(io_error)?;
        file.write_all(text.as_bytes()).map_err(io_error)?;
        file.sync_all().map_err(io_error)?;
        drop(file);
        fs::rename(&staging, path).map_err(io_error)?;

        tracing::debug!(target: targets::CONFIG, path = %path.display(), "configuration saved");
        Ok(())
    }

    /// Options for the box store.
    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            max_ancestor_walk: self.max_ancestor_walk,
            default_names: self.default_names.clone(),
        }
    }

    /// Options for the worker pool.
    pub fn pool_config(&self) -> ThreadPoolConfig {
        ThreadPoolConfig {
            num_threads: (self.worker_threads > 0).then_some(self.worker_threads),
            thread_name: self.worker_thread_name.clone(),
            ..ThreadPoolConfig::default()
        }
    }

    /// The configured library sources.
    pub fn library_sources(&self) -> Vec<LibrarySource> {
        self.sources.iter().cloned().map(LibrarySource::new).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = LibraryConfig::from_toml_str("").unwrap();
        assert_eq!(config, LibraryConfig::default());
        assert_eq!(config.store_options().default_names.group, "New Group");
    }

    #[test]
    fn test_partial_config() {
        let config = LibraryConfig::from_toml_str(
            r#"
            worker_threads = 2
            sources = ["Local"]

            [default_names]
            free_list = "Picks"
            "#,
        )
        .unwrap();

        assert_eq!(config.worker_threads, 2);
        assert_eq!(config.library_sources(), vec![LibrarySource::new("Local")]);
        assert_eq!(config.default_names.free_list, "Picks");
        assert_eq!(config.default_names.group, "New Group");
        assert_eq!(config.pool_config().num_threads, Some(2));
        assert_eq!(LibraryConfig::default().pool_config().num_threads, None);
    }

    #[test]
    fn test_invalid_config() {
        let err = LibraryConfig::from_toml_str("worker_threads = \"many\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("library.toml");
        let config = LibraryConfig {
            database_path: Some(PathBuf::from("boxes.sqlite")),
            max_ancestor_walk: Some(64),
            ..Default::default()
        };

        config.save_toml(&path).unwrap();
        let loaded = LibraryConfig::load_toml(&path).unwrap();

        assert_eq!(loaded.database_path, Some(dir.path().join("boxes.sqlite")));
        assert_eq!(loaded.max_ancestor_walk, Some(64));
        assert!(!path.with_extension("toml.tmp").exists());
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = LibraryConfig::load_toml(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
