//! Storage layer error types

use std::path::PathBuf;

use thiserror::Error;

use crate::storage::types::{InvalidNameError, RowKey, TableName};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    #[error("row not found: table={table}, key={key}")]
    RowNotFound { table: TableName, key: RowKey },

    #[error("table not found: {0}")]
    TableNotFound(TableName),

    /// duplicate key on insert
    #[error("row already exists: table={table}, key={key}")]
    RowAlreadyExists { table: TableName, key: RowKey },

    #[error("table already exists: {0}")]
    TableAlreadyExists(TableName),

    #[error("invalid name: {0}")]
    InvalidName(#[from] InvalidNameError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("ref not found: {0}")]
    RefNotFound(String),

    #[error("corrupted data at {path}: {reason}")]
    CorruptedData { path: PathBuf, reason: String },

    #[error("store not initialized: {0}")]
    NotInitialized(PathBuf),

    #[error("store is empty: no commits found")]
    EmptyRepository,

    #[error("storage commit not found: {0}")]
    CommitNotFound(String),

    #[error("unexpected entry type at {path}: expected {expected}, found {found}")]
    UnexpectedEntryType {
        path: PathBuf,
        expected: String,
        found: String,
    },

    #[error("branch already exists: {0}")]
    BranchAlreadyExists(String),

    /// compare-and-swap on a ref lost against another writer
    #[error("concurrent modification: branch {branch} was updated by another transaction")]
    ConcurrentModification { branch: String },

    /// row payload is not a JSON object
    #[error("invalid row: {0}")]
    InvalidRow(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StorageError::RowNotFound { .. }
                | StorageError::TableNotFound(_)
                | StorageError::RefNotFound(_)
                | StorageError::CommitNotFound(_)
        )
    }

    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            StorageError::RowAlreadyExists { .. }
                | StorageError::TableAlreadyExists(_)
                | StorageError::ConcurrentModification { .. }
        )
    }

    pub fn is_retriable(&self) -> bool {
        matches!(self, StorageError::ConcurrentModification { .. })
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let not_found = StorageError::TableNotFound(TableName::new("commits").unwrap());
        assert!(not_found.is_not_found());
        assert!(!not_found.is_conflict());

        let duplicate = StorageError::RowAlreadyExists {
            table: TableName::new("commits").unwrap(),
            key: RowKey::new("abc").unwrap(),
        };
        assert!(!duplicate.is_not_found());
        assert!(duplicate.is_conflict());
        assert!(!duplicate.is_retriable());

        let raced = StorageError::ConcurrentModification {
            branch: "main".to_string(),
        };
        assert!(raced.is_retriable());
    }
}
