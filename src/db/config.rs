//! Engine configuration, loadable from TOML.
//!
//! ```toml
//! [store]
//! backend = "git"
//! path = ".saga"
//! author_name = "Saga"
//!
//! [versioning]
//! default_branch = "main"
//! history_limit = 50
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::storage::GitSignature;
use crate::version::VersionOptions;

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Memory,
    #[default]
    Git,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: BackendKind,
    /// git store directory
    pub path: PathBuf,
    pub create_if_missing: bool,
    pub author_name: String,
    pub author_email: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        let signature = GitSignature::default();
        Self {
            backend: BackendKind::default(),
            path: PathBuf::from(".saga"),
            create_if_missing: true,
            author_name: signature.name,
            author_email: signature.email,
        }
    }
}

impl StoreConfig {
    pub fn signature(&self) -> GitSignature {
        GitSignature::new(self.author_name.as_str(), self.author_email.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub versioning: VersionOptions,
}

impl Config {
    /// Git-backed configuration at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let mut config = Self::default();
        config.store.path = path.into();
        config
    }

    pub fn in_memory() -> Self {
        Self::default().backend(BackendKind::Memory)
    }

    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.versioning.default_branch.trim().is_empty() {
            return Err(ConfigError::Invalid("versioning.default_branch is empty".into()));
        }
        if self.versioning.level_field.is_empty() {
            return Err(ConfigError::Invalid("versioning.level_field is empty".into()));
        }
        if self.versioning.history_limit == 0 {
            return Err(ConfigError::Invalid("versioning.history_limit must be positive".into()));
        }
        if self.store.backend == BackendKind::Git && self.store.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("store.path is empty".into()));
        }
        Ok(())
    }

    pub fn backend(mut self, backend: BackendKind) -> Self {
        self.store.backend = backend;
        self
    }

    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store.path = path.into();
        self
    }

    pub fn create_if_missing(mut self, value: bool) -> Self {
        self.store.create_if_missing = value;
        self
    }

    pub fn author(mut self, name: impl Into<String>, email: impl Into<String>) -> Self {
        self.store.author_name = name.into();
        self.store.author_email = email.into();
        self
    }

    pub fn default_branch(mut self, name: impl Into<String>) -> Self {
        self.versioning.default_branch = name.into();
        self
    }

    pub fn history_limit(mut self, limit: usize) -> Self {
        self.versioning.history_limit = limit;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.store.backend, BackendKind::Git);
        assert_eq!(config.store.path, PathBuf::from(".saga"));
        assert!(config.store.create_if_missing);
        assert_eq!(config.store.author_name, "Saga");
        assert_eq!(config.versioning, VersionOptions::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml_str(
            r#"
            [store]
            backend = "memory"

            [versioning]
            default_branch = "trunk"
            "#,
        )
        .unwrap();

        assert_eq!(config.store.backend, BackendKind::Memory);
        assert_eq!(config.store.path, PathBuf::from(".saga"));
        assert_eq!(config.versioning.default_branch, "trunk");
        assert_eq!(config.versioning.history_limit, 50);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            Config::from_toml_str("[store]\nbackend = \"sqlite\""),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            Config::from_toml_str("[versioning]\nhistory_limit = 0"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("saga.toml");
        std::fs::write(&path, "[store]\npath = \"data\"\nauthor_name = \"Ana\"\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.store.path, PathBuf::from("data"));
        assert_eq!(config.store.signature().name, "Ana");

        let missing = Config::from_file(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(missing, ConfigError::Read { .. }));
    }

    #[test]
    fn test_builder() {
        let config = Config::new("/tmp/saga")
            .create_if_missing(false)
            .author("Ana", "ana@example.com")
            .default_branch("trunk")
            .history_limit(10);
        assert_eq!(config.store.path, PathBuf::from("/tmp/saga"));
        assert!(!config.store.create_if_missing);
        assert_eq!(config.store.signature().email, "ana@example.com");
        assert_eq!(config.versioning.history_limit, 10);
        assert_eq!(Config::in_memory().store.backend, BackendKind::Memory);
    }
}
