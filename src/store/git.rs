//! Git-backed record store.
//!
//! Reads pin the current tip of `main`. A write runs inside one storage
//! transaction: rows land on a `tx/` branch and `main` is fast-forwarded onto
//! it only when the closure succeeds.

use std::path::PathBuf;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::storage::{CommitId, GitRepository, GitSignature, Row, RowKey, TableName};
use crate::store::error::{StoreError, StoreResult};
use crate::store::{default_tables, RecordStore, StoreRead, StoreWrite};
use crate::transaction::{Transaction, TransactionManager, TxActive};

#[derive(Debug, Clone)]
pub struct GitStoreOptions {
    pub path: PathBuf,
    pub create_if_missing: bool,
    pub signature: GitSignature,
}

impl GitStoreOptions {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            create_if_missing: true,
            signature: GitSignature::default(),
        }
    }

    pub fn create_if_missing(mut self, create: bool) -> Self {
        self.create_if_missing = create;
        self
    }

    pub fn signature(mut self, signature: GitSignature) -> Self {
        self.signature = signature;
        self
    }
}

pub struct GitStore {
    manager: TransactionManager,
    /// one write unit at a time per process
    write_lock: Mutex<()>,
}

impl GitStore {
    pub fn open(options: GitStoreOptions) -> StoreResult<Self> {
        let tables = default_tables()?;
        let repo = if options.create_if_missing {
            GitRepository::open_or_init(&options.path, options.signature, &tables)?
        } else {
            GitRepository::open(&options.path, options.signature, &tables)?
        };

        let store = Self {
            manager: TransactionManager::new(repo),
            write_lock: Mutex::new(()),
        };
        store.manager.cleanup_abandoned()?;

        info!(path = %options.path.display(), "opened git store");
        Ok(store)
    }

    pub fn repository(&self) -> &GitRepository {
        self.manager.repo()
    }

    /// Current tip of `main`.
    pub fn head(&self) -> StoreResult<CommitId> {
        Ok(self.manager.head()?)
    }
}

impl std::fmt::Debug for GitStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitStore")
            .field("path", &self.manager.repo().path())
            .finish()
    }
}

/// Read view pinned at one storage commit.
struct GitSnapshot<'a> {
    repo: &'a GitRepository,
    at: CommitId,
}

impl StoreRead for GitSnapshot<'_> {
    fn get(&self, table: &TableName, key: &RowKey) -> StoreResult<Option<Row>> {
        Ok(self.repo.read_row(table, key, self.at)?)
    }

    fn scan(&self, table: &TableName) -> StoreResult<Vec<Row>> {
        Ok(self.repo.scan_table(table, self.at)?)
    }
}

impl StoreRead for Transaction<TxActive> {
    fn get(&self, table: &TableName, key: &RowKey) -> StoreResult<Option<Row>> {
        Ok(self.read(table, key)?)
    }

    fn scan(&self, table: &TableName) -> StoreResult<Vec<Row>> {
        Ok(Transaction::scan(self, table)?)
    }
}

impl StoreWrite for Transaction<TxActive> {
    fn insert(&mut self, table: &TableName, row: Row) -> StoreResult<()> {
        Ok(Transaction::insert(self, table, row)?)
    }

    fn upsert(&mut self, table: &TableName, row: Row) -> StoreResult<()> {
        Ok(Transaction::upsert(self, table, row)?)
    }

    fn delete(&mut self, table: &TableName, key: &RowKey) -> StoreResult<()> {
        Ok(Transaction::delete(self, table, key)?)
    }
}

impl RecordStore for GitStore {
    fn read<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&dyn StoreRead) -> Result<T, E>,
        E: From<StoreError>,
    {
        let at = self.head()?;
        f(&GitSnapshot {
            repo: self.manager.repo(),
            at,
        })
    }

    fn write<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn StoreWrite) -> Result<T, E>,
        E: From<StoreError>,
    {
        let _guard = self.write_lock.lock();
        let mut tx = self.manager.begin().map_err(StoreError::from)?;

        match f(&mut tx) {
            Ok(value) if tx.has_writes() => {
                let head = self.manager.commit_transaction(tx).map_err(StoreError::from)?;
                debug!(head = %head.short(), "git store write committed");
                Ok(value)
            }
            Ok(value) => {
                self.manager.rollback_transaction(tx);
                Ok(value)
            }
            Err(e) => {
                self.manager.rollback_transaction(tx);
                Err(e)
            }
        }
    }

    fn close(&self) -> StoreResult<()> {
        self.manager.cleanup_abandoned()?;
        debug!(path = %self.manager.repo().path().display(), "closed git store");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tables;
    use serde_json::json;
    use tempfile::TempDir;

    fn open(dir: &TempDir) -> GitStore {
        GitStore::open(GitStoreOptions::new(dir.path().join("store"))).unwrap()
    }

    fn tags() -> TableName {
        TableName::new(tables::TAGS).unwrap()
    }

    fn row(key: &str) -> Row {
        Row::from_value(RowKey::new(key).unwrap(), json!({ "tag_name": key })).unwrap()
    }

    #[test]
    fn test_write_is_atomic() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir);
        let before = store.head().unwrap();

        let result: StoreResult<()> = store.write(|w| {
            w.insert(&tags(), row("t1"))?;
            w.insert(&tags(), row("t1"))
        });
        assert!(result.unwrap_err().is_duplicate());
        assert_eq!(store.head().unwrap(), before);
        assert!(store.read(|r| r.scan(&tags())).unwrap().is_empty());

        store
            .write(|w| {
                w.insert(&tags(), row("t1"))?;
                w.insert(&tags(), row("t2"))
            })
            .unwrap();
        assert_eq!(store.read(|r| r.scan(&tags())).unwrap().len(), 2);
        assert!(store.repository().list_transaction_branches().unwrap().is_empty());
    }

    #[test]
    fn test_read_only_write_does_not_move_main() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir);
        let before = store.head().unwrap();

        let count = store.write(|w| -> StoreResult<usize> { Ok(w.scan(&tags())?.len()) }).unwrap();
        assert_eq!(count, 0);
        assert_eq!(store.head().unwrap(), before);
    }

    #[test]
    fn test_reopen_sees_committed_rows_and_cleans_branches() {
        let dir = TempDir::new().unwrap();
        {
            let store = open(&dir);
            store.write(|w| w.insert(&tags(), row("t1"))).unwrap();
            let head = store.head().unwrap();
            store.repository().create_transaction_branch("crashed", head).unwrap();
        }

        let store = open(&dir);
        assert!(store.repository().list_transaction_branches().unwrap().is_empty());
        assert_eq!(store.read(|r| r.scan(&tags())).unwrap().len(), 1);
        store.close().unwrap();
    }

    #[test]
    fn test_open_without_create_fails_on_missing_store() {
        let dir = TempDir::new().unwrap();
        let options = GitStoreOptions::new(dir.path().join("absent")).create_if_missing(false);
        let err = GitStore::open(options).unwrap_err();
        assert!(matches!(err, StoreError::Storage(crate::storage::StorageError::NotInitialized(_))));
    }
}
