//! The engine registry.
//!
//! An [`IndexManager`] owns every engine stored under one data directory (one
//! sub-directory per index) plus the named federations over them. It is an
//! ordinary value: create as many as needed, each with its own configuration.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;
use rayon::ThreadPool;

use crate::config::ManagerConfig;
use crate::error::{PikeError, Result};
use crate::federation::{FederationCoordinator, build_pool};
use crate::index::IndexEngine;
use crate::index::manifest::MANIFEST_FILE;

/// The indexes stored under one data directory.
///
/// # Example
///
/// ```
/// use pike::config::ManagerConfig;
/// use pike::document::document::Document;
/// use pike::manager::IndexManager;
/// use pike::query::QueryDefinition;
///
/// # fn main() -> pike::error::Result<()> {
/// let dir = tempfile::TempDir::new()?;
/// let manager = IndexManager::open(ManagerConfig {
///     data_directory: dir.path().to_path_buf(),
///     thread_pool_size: Some(1),
///     ..ManagerConfig::default()
/// })?;
///
/// let engine = manager.get_or_create("notes")?;
/// engine.write(&[Document::with_id("n1")])?;
/// assert_eq!(manager.list(), vec!["notes"]);
/// assert_eq!(engine.search(&QueryDefinition::new())?.total_hits, 1);
/// manager.close();
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct IndexManager {
    config: ManagerConfig,
    pool: Arc<ThreadPool>,
    engines: RwLock<BTreeMap<String, Arc<IndexEngine>>>,
    federations: RwLock<BTreeMap<String, Arc<FederationCoordinator>>>,
}

/// Index names become directory names.
fn validate_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if !valid {
        return Err(PikeError::index(format!("Invalid index name: {name:?}")));
    }
    Ok(())
}

impl IndexManager {
    /// Open the data directory and every index found in it.
    pub fn open(config: ManagerConfig) -> Result<Self> {
        config.validate()?;
        std::fs::create_dir_all(&config.data_directory)?;
        let pool = build_pool(config.thread_pool_size)?;

        let mut engines = BTreeMap::new();
        let mut entries = std::fs::read_dir(&config.data_directory)?
            .collect::<std::io::Result<Vec<_>>>()?;
        entries.sort_by_key(|entry| entry.file_name());
        for entry in entries {
            let path = entry.path();
            if !path.join(MANIFEST_FILE).is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            let engine = IndexEngine::open_in_dir(name.clone(), &path, config.engine.clone())?;
            engines.insert(name, Arc::new(engine));
        }

        log::info!(
            "opened {} indexes under {}",
            engines.len(),
            config.data_directory.display()
        );
        Ok(IndexManager {
            config,
            pool,
            engines: RwLock::new(engines),
            federations: RwLock::new(BTreeMap::new()),
        })
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    fn index_path(&self, name: &str) -> PathBuf {
        self.config.data_directory.join(name)
    }

    /// The open engine named `name`.
    pub fn get(&self, name: &str) -> Option<Arc<IndexEngine>> {
        self.engines.read().get(name).cloned()
    }

    /// The engine named `name`, created empty on first use.
    pub fn get_or_create(&self, name: &str) -> Result<Arc<IndexEngine>> {
        if let Some(engine) = self.get(name) {
            return Ok(engine);
        }
        validate_name(name)?;

        let mut engines = self.engines.write();
        if let Some(engine) = engines.get(name) {
            return Ok(Arc::clone(engine));
        }
        let engine = Arc::new(IndexEngine::open_in_dir(
            name,
            self.index_path(name),
            self.config.engine.clone(),
        )?);
        log::info!("created index {name}");
        engines.insert(name.to_string(), Arc::clone(&engine));
        Ok(engine)
    }

    /// Names of the open indexes, sorted.
    pub fn list(&self) -> Vec<String> {
        self.engines.read().keys().cloned().collect()
    }

    /// Close an index, remove it from every federation and delete its files.
    /// Returns whether it existed.
    pub fn delete(&self, name: &str) -> Result<bool> {
        let Some(engine) = self.engines.write().remove(name) else {
            return Ok(false);
        };
        for federation in self.federations.read().values() {
            federation.unregister(name);
        }
        engine.close();

        let path = self.index_path(name);
        if path.exists() {
            std::fs::remove_dir_all(&path)?;
        }
        log::info!("deleted index {name}");
        Ok(true)
    }

    /// The federation named `name`, created empty on first use.
    pub fn federation(&self, name: &str) -> Arc<FederationCoordinator> {
        if let Some(federation) = self.federations.read().get(name) {
            return Arc::clone(federation);
        }
        let mut federations = self.federations.write();
        Arc::clone(
            federations
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(FederationCoordinator::new(name, Arc::clone(&self.pool)))),
        )
    }

    /// Forget a federation. Its engines stay open.
    pub fn remove_federation(&self, name: &str) -> bool {
        self.federations.write().remove(name).is_some()
    }

    /// Close every engine.
    pub fn close(&self) {
        for engine in self.engines.read().values() {
            engine.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::document::Document;
    use crate::query::QueryDefinition;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> ManagerConfig {
        ManagerConfig {
            data_directory: dir.path().to_path_buf(),
            thread_pool_size: Some(2),
            ..ManagerConfig::default()
        }
    }

    #[test]
    fn test_reopen_existing_indexes() {
        let dir = TempDir::new().unwrap();
        {
            let manager = IndexManager::open(config(&dir)).unwrap();
            let engine = manager.get_or_create("books").unwrap();
            engine.write(&[Document::with_id("1")]).unwrap();
            manager.get_or_create("films").unwrap();
            assert!(manager.get_or_create("../escape").is_err());
        }

        let manager = IndexManager::open(config(&dir)).unwrap();
        assert_eq!(manager.list(), vec!["books", "films"]);
        let result = manager
            .get("books")
            .unwrap()
            .search(&QueryDefinition::new())
            .unwrap();
        assert_eq!(result.total_hits, 1);
    }

    #[test]
    fn test_delete_unregisters_and_removes_files() {
        let dir = TempDir::new().unwrap();
        let manager = IndexManager::open(config(&dir)).unwrap();
        let engine = manager.get_or_create("tmp").unwrap();
        let federation = manager.federation("all");
        federation.register(engine).unwrap();
        assert!(Arc::ptr_eq(&federation, &manager.federation("all")));

        assert!(manager.delete("tmp").unwrap());
        assert!(!manager.delete("tmp").unwrap());
        assert!(federation.engine_names().is_empty());
        assert!(!dir.path().join("tmp").exists());
    }
}
