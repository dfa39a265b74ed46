//! Persistence boundary errors.

use thiserror::Error;

use crate::storage::{InvalidNameError, StorageError};
use crate::transaction::TransactionError;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// another writer committed first; the write was discarded as a whole
    #[error("write conflict: {0}")]
    Conflict(String),

    #[error("record encoding error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid record key: {0}")]
    InvalidKey(#[from] InvalidNameError),

    #[error("store error: {0}")]
    Internal(String),
}

impl From<TransactionError> for StoreError {
    fn from(err: TransactionError) -> Self {
        match err {
            TransactionError::Storage(e) => StoreError::Storage(e),
            conflict @ TransactionError::Conflict { .. } => StoreError::Conflict(conflict.to_string()),
            TransactionError::Internal(msg) => StoreError::Internal(msg),
        }
    }
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::Storage(e) if e.is_not_found())
    }

    /// insert hit an existing key
    pub fn is_duplicate(&self) -> bool {
        matches!(self, StoreError::Storage(StorageError::RowAlreadyExists { .. }))
    }

    pub fn is_conflict(&self) -> bool {
        match self {
            StoreError::Conflict(_) => true,
            StoreError::Storage(e) => e.is_conflict(),
            _ => false,
        }
    }

    pub fn is_retriable(&self) -> bool {
        match self {
            StoreError::Conflict(_) => true,
            StoreError::Storage(e) => e.is_retriable(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{RowKey, TableName};

    #[test]
    fn test_transaction_errors_flatten() {
        let dup = StorageError::RowAlreadyExists {
            table: TableName::new("commits").unwrap(),
            key: RowKey::new("abc").unwrap(),
        };
        let err = StoreError::from(TransactionError::Storage(dup));
        assert!(err.is_duplicate());
        assert!(!err.is_retriable());

        let err = StoreError::from(TransactionError::Conflict {
            tx_id: "tx1".to_string(),
            branch: "main".to_string(),
        });
        assert!(err.is_conflict());
        assert!(err.is_retriable());
    }
}
