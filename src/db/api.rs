//! Engine handle - opens the configured store and hands out the version
//! manager and presentation API.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, info};

use crate::db::config::{BackendKind, Config, ConfigError};
use crate::model::{Branch, Commit, Repository, Tag};
use crate::presentation::VersioningApi;
use crate::store::{Backend, GitStore, GitStoreOptions, MemoryStore, RecordStore, Records, StoreError};
use crate::version::{VersionError, VersionManager};

pub type SagaResult<T> = Result<T, SagaError>;

#[derive(Debug, Error)]
pub enum SagaError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Version(#[from] VersionError),

    #[error("store not found: {0}")]
    NotFound(PathBuf),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl From<StoreError> for SagaError {
    fn from(e: StoreError) -> Self {
        SagaError::Version(VersionError::Store(e))
    }
}

impl SagaError {
    pub fn is_not_found(&self) -> bool {
        match self {
            SagaError::NotFound(_) => true,
            SagaError::Version(e) => e.is_not_found(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SagaStats {
    pub backend: &'static str,
    pub repositories: usize,
    pub branches: usize,
    pub commits: usize,
    pub tags: usize,
}

pub struct Saga {
    config: Config,
    manager: VersionManager<Backend>,
    /// keeps an ephemeral store's directory alive; dropped after `manager`
    scratch: Option<TempDir>,
}

impl Saga {
    /// Open or create a git-backed store at `path`.
    pub fn open(path: impl AsRef<Path>) -> SagaResult<Self> {
        Self::open_with_config(Config::new(path.as_ref()))
    }

    pub fn open_with_config(config: Config) -> SagaResult<Self> {
        config.validate()?;

        let backend = match config.store.backend {
            BackendKind::Memory => Backend::Memory(MemoryStore::new()?),
            BackendKind::Git => {
                let path = &config.store.path;
                if !config.store.create_if_missing && !path.exists() {
                    return Err(SagaError::NotFound(path.clone()));
                }
                let options = GitStoreOptions::new(path)
                    .create_if_missing(config.store.create_if_missing)
                    .signature(config.store.signature());
                Backend::Git(GitStore::open(options)?)
            }
        };

        info!(backend = backend.name(), path = %config.store.path.display(), "opened saga");
        Ok(Self {
            manager: VersionManager::with_options(backend, config.versioning.clone()),
            config,
            scratch: None,
        })
    }

    /// Git-backed store in a temporary directory, removed on drop.
    pub fn ephemeral() -> SagaResult<Self> {
        let dir = TempDir::new()?;
        let mut saga = Self::open_with_config(Config::new(dir.path().join("saga")))?;
        saga.scratch = Some(dir);
        Ok(saga)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn manager(&self) -> &VersionManager<Backend> {
        &self.manager
    }

    pub fn api(&self) -> VersioningApi<'_, Backend> {
        VersioningApi::new(&self.manager)
    }

    pub fn stats(&self) -> SagaResult<SagaStats> {
        let backend = self.manager.store().name();
        let stats = self.manager.store().read(|r| -> Result<SagaStats, StoreError> {
            Ok(SagaStats {
                backend,
                repositories: r.all::<Repository>()?.len(),
                branches: r.all::<Branch>()?.len(),
                commits: r.all::<Commit>()?.len(),
                tags: r.all::<Tag>()?.len(),
            })
        })?;
        Ok(stats)
    }

    pub fn close(self) -> SagaResult<()> {
        self.manager.close()?;
        debug!(backend = self.manager.store().name(), "closed saga");
        Ok(())
    }
}

impl std::fmt::Debug for Saga {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Saga")
            .field("backend", &self.manager.store().name())
            .field("path", &self.config.store.path)
            .field("ephemeral", &self.scratch.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::{NewCommit, NewRepository};
    use serde_json::json;

    #[test]
    fn test_ephemeral_round_trip() {
        let saga = Saga::ephemeral().unwrap();
        let repo = saga
            .manager()
            .create_repository(NewRepository::new("Hero").initial_snapshot(json!({ "level": 1 })))
            .unwrap();
        saga.api().level_up(&repo.id, "main", json!({ "level": 2 }), None).unwrap();

        let stats = saga.stats().unwrap();
        assert_eq!(stats.backend, "git");
        assert_eq!((stats.repositories, stats.branches, stats.commits), (1, 1, 2));
        saga.close().unwrap();
    }

    #[test]
    fn test_reopen_sees_history() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store");

        let repo_id = {
            let saga = Saga::open(&path).unwrap();
            let repo = saga.manager().create_repository(NewRepository::new("Hero")).unwrap();
            saga.manager()
                .create_commit(&repo.id, "main", NewCommit::new("first", json!({ "level": 1 })))
                .unwrap();
            saga.close().unwrap();
            repo.id
        };

        let saga = Saga::open(&path).unwrap();
        let history = saga.manager().get_commit_history(&repo_id, Some("main"), None).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].commit_message, "first");
    }

    #[test]
    fn test_memory_backend_and_missing_store() {
        let saga = Saga::open_with_config(Config::in_memory()).unwrap();
        assert_eq!(saga.stats().unwrap().backend, "memory");

        let dir = TempDir::new().unwrap();
        let config = Config::new(dir.path().join("absent")).create_if_missing(false);
        let err = Saga::open_with_config(config).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let err = Saga::open_with_config(Config::in_memory().history_limit(0)).unwrap_err();
        assert!(matches!(err, SagaError::Config(ConfigError::Invalid(_))));
    }
}
