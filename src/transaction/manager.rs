//! Transaction manager.
//!
//! Creates transactions, tracks the active ones, serializes commits to `main`
//! and removes branches left behind by transactions that never finished.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};
use ulid::Ulid;

use crate::storage::{CommitId, GitRepository};
use crate::transaction::context::{Transaction, TransactionMetadata, TxActive};
use crate::transaction::error::TransactionResult;

/// Cloning shares the same manager.
#[derive(Clone)]
pub struct TransactionManager {
    inner: Arc<TransactionManagerInner>,
}

struct TransactionManagerInner {
    repo: GitRepository,
    active: RwLock<HashMap<String, TransactionMetadata>>,
    commit_lock: Mutex<()>,
}

impl TransactionManager {
    pub fn new(repo: GitRepository) -> Self {
        Self {
            inner: Arc::new(TransactionManagerInner {
                repo,
                active: RwLock::new(HashMap::new()),
                commit_lock: Mutex::new(()),
            }),
        }
    }

    pub fn repo(&self) -> &GitRepository {
        &self.inner.repo
    }

    /// Fork a `tx/{ulid}` branch from the current tip of `main`.
    pub fn begin(&self) -> TransactionResult<Transaction<TxActive>> {
        let tx_id = Ulid::new().to_string().to_lowercase();
        let base_commit = self.inner.repo.head()?;
        let branch = self.inner.repo.create_transaction_branch(&tx_id, base_commit)?;

        let tx = Transaction::new(self.inner.repo.clone(), tx_id.clone(), branch, base_commit);
        self.inner.active.write().insert(tx_id.clone(), tx.metadata.clone());

        debug!(tx = %tx_id, base = %base_commit.short(), "transaction started");
        Ok(tx)
    }

    pub fn active_count(&self) -> usize {
        self.inner.active.read().len()
    }

    pub fn is_active(&self, tx_id: &str) -> bool {
        self.inner.active.read().contains_key(tx_id)
    }

    fn mark_completed(&self, tx_id: &str) {
        self.inner.active.write().remove(tx_id);
    }

    /// Commit under the manager's commit lock, so in-process commits never
    /// race each other on `main`.
    pub fn commit_transaction(&self, tx: Transaction<TxActive>) -> TransactionResult<CommitId> {
        let _guard = self.inner.commit_lock.lock();
        let tx_id = tx.id().to_string();

        let result = tx.commit();
        self.mark_completed(&tx_id);

        Ok(result?.final_commit())
    }

    pub fn rollback_transaction(&self, tx: Transaction<TxActive>) {
        let tx_id = tx.id().to_string();
        tx.rollback();
        self.mark_completed(&tx_id);
    }

    /// Delete `tx/` branches with no active transaction behind them.
    pub fn cleanup_abandoned(&self) -> TransactionResult<usize> {
        let active: HashSet<String> = self.inner.active.read().keys().cloned().collect();
        let cleaned = self.inner.repo.cleanup_transaction_branches(&active)?;
        if cleaned > 0 {
            warn!(count = cleaned, "removed abandoned transaction branches");
        }
        Ok(cleaned)
    }

    /// Run `f` in a new transaction: commit on `Ok`, roll back on `Err`.
    pub fn with_transaction<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Transaction<TxActive>) -> Result<T, E>,
        E: From<crate::transaction::TransactionError>,
    {
        let mut tx = self.begin()?;

        match f(&mut tx) {
            Ok(value) => {
                self.commit_transaction(tx)?;
                Ok(value)
            }
            Err(e) => {
                self.rollback_transaction(tx);
                Err(e)
            }
        }
    }

    pub fn head(&self) -> TransactionResult<CommitId> {
        Ok(self.inner.repo.head()?)
    }
}

impl std::fmt::Debug for TransactionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionManager")
            .field("active_count", &self.active_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{GitSignature, Row, RowKey, TableName};
    use crate::transaction::TransactionError;
    use serde_json::json;
    use tempfile::TempDir;

    fn setup() -> (TempDir, TransactionManager, TableName) {
        let dir = TempDir::new().unwrap();
        let items = TableName::new("items").unwrap();
        let repo = GitRepository::init(dir.path(), GitSignature::default(), &[items.clone()]).unwrap();
        (dir, TransactionManager::new(repo), items)
    }

    fn row(key: &str) -> Row {
        Row::from_value(RowKey::new(key).unwrap(), json!({ "name": key })).unwrap()
    }

    #[test]
    fn test_begin_and_commit() {
        let (_dir, manager, items) = setup();

        let mut tx = manager.begin().unwrap();
        assert!(manager.is_active(tx.id()));
        tx.insert(&items, row("a1")).unwrap();

        let head = manager.commit_transaction(tx).unwrap();
        assert_eq!(manager.active_count(), 0);
        assert_eq!(manager.head().unwrap(), head);
        assert_eq!(manager.repo().scan_table(&items, head).unwrap().len(), 1);
    }

    #[test]
    fn test_with_transaction_rolls_back_on_error() {
        let (_dir, manager, items) = setup();
        let before = manager.head().unwrap();

        let result: Result<(), TransactionError> = manager.with_transaction(|tx| {
            tx.insert(&items, row("a1"))?;
            Err(TransactionError::Internal("abort".to_string()))
        });

        assert!(result.is_err());
        assert_eq!(manager.head().unwrap(), before);
        assert_eq!(manager.active_count(), 0);
        assert!(manager.repo().list_transaction_branches().unwrap().is_empty());
    }

    #[test]
    fn test_failed_commit_is_not_left_active() {
        let (_dir, manager, items) = setup();
        let mut first = manager.begin().unwrap();
        let mut second = manager.begin().unwrap();
        first.insert(&items, row("a1")).unwrap();
        second.insert(&items, row("b1")).unwrap();

        manager.commit_transaction(first).unwrap();
        assert!(manager.commit_transaction(second).is_err());
        assert_eq!(manager.active_count(), 0);
    }

    #[test]
    fn test_cleanup_abandoned_keeps_active() {
        let (_dir, manager, _items) = setup();
        let head = manager.head().unwrap();
        manager.repo().create_transaction_branch("abandoned", head).unwrap();
        let live = manager.begin().unwrap();

        assert_eq!(manager.cleanup_abandoned().unwrap(), 1);
        let remaining = manager.repo().list_transaction_branches().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].transaction_id(), Some(live.id()));

        manager.rollback_transaction(live);
    }
}
