//! Transaction error types.

use thiserror::Error;

use crate::storage::StorageError;

pub type TransactionResult<T> = Result<T, TransactionError>;

#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// `main` moved between begin and commit; the whole transaction was discarded
    #[error("transaction {tx_id} conflicts with a concurrent commit on {branch}")]
    Conflict { tx_id: String, branch: String },

    #[error("internal transaction error: {0}")]
    Internal(String),
}

impl TransactionError {
    /// Retrying the same work in a new transaction may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransactionError::Conflict { .. } => true,
            TransactionError::Storage(e) => e.is_retriable(),
            TransactionError::Internal(_) => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, TransactionError::Storage(e) if e.is_not_found())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_retryable() {
        let conflict = TransactionError::Conflict {
            tx_id: "tx001".to_string(),
            branch: "main".to_string(),
        };
        assert!(conflict.is_retryable());

        let internal = TransactionError::Internal("boom".to_string());
        assert!(!internal.is_retryable());

        let raced = TransactionError::from(StorageError::ConcurrentModification {
            branch: "main".to_string(),
        });
        assert!(raced.is_retryable());
    }
}
