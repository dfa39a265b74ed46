//! Thread-safe wrapper around `git2::Repository`.
//!
//! All git access in the crate goes through [`GitRepository`]. Row operations
//! take the commit to build on and return the new commit; they never move a
//! ref themselves, that is left to the transaction layer.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use git2::{Repository, RepositoryInitOptions};
use parking_lot::Mutex;
use tracing::debug;

use crate::storage::blob::{self, Row};
use crate::storage::commit::{self, CommitBuilder, CommitMessage};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::refs::RefManager;
use crate::storage::tree::{TreeHandle, TreeMutator};
use crate::storage::types::{BranchName, CommitId, GitSignature, RowKey, TableName};

/// Shared handle to a git-backed row store. Cloning is cheap.
#[derive(Clone)]
pub struct GitRepository {
    inner: Arc<GitRepositoryInner>,
}

struct GitRepositoryInner {
    // git2::Repository is Send but not Sync, so every access is exclusive
    repo: Mutex<Repository>,
    path: PathBuf,
    signature: GitSignature,
}

impl GitRepository {
    fn wrap(repo: Repository, path: &Path, signature: GitSignature) -> Self {
        Self {
            inner: Arc::new(GitRepositoryInner {
                repo: Mutex::new(repo),
                path: path.to_path_buf(),
                signature,
            }),
        }
    }

    /// Open an existing store and make sure every table in `tables` exists.
    pub fn open(path: impl AsRef<Path>, signature: GitSignature, tables: &[TableName]) -> StorageResult<Self> {
        let path = path.as_ref();
        let repo = Repository::open(path).map_err(|_| StorageError::NotInitialized(path.to_path_buf()))?;

        let storage = Self::wrap(repo, path, signature);
        storage.ensure_tables(tables)?;
        Ok(storage)
    }

    /// Initialize a new store with `main` checked out and the given tables.
    pub fn init(path: impl AsRef<Path>, signature: GitSignature, tables: &[TableName]) -> StorageResult<Self> {
        let path = path.as_ref();
        let mut opts = RepositoryInitOptions::new();
        opts.initial_head(BranchName::MAIN).mkpath(true);
        let repo = Repository::init_opts(path, &opts)?;

        let storage = Self::wrap(repo, path, signature);
        storage.with_repo(|repo| {
            let commit_id = commit::create_initial_commit(repo, &storage.inner.signature, tables)?;
            RefManager::init_main_branch(repo, commit_id)?;
            debug!(path = %path.display(), commit = %commit_id.short(), "initialized store");
            Ok(())
        })?;

        Ok(storage)
    }

    pub fn open_or_init(path: impl AsRef<Path>, signature: GitSignature, tables: &[TableName]) -> StorageResult<Self> {
        let path = path.as_ref();
        if Repository::open(path).is_ok() {
            Self::open(path, signature, tables)
        } else {
            Self::init(path, signature, tables)
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Run `f` with exclusive access to the underlying repository.
    fn with_repo<F, T>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&Repository) -> StorageResult<T>,
    {
        let repo = self.inner.repo.lock();
        f(&repo)
    }

    /// Add any table missing from `main` in a single storage commit.
    fn ensure_tables(&self, tables: &[TableName]) -> StorageResult<()> {
        self.with_repo(|repo| {
            let head = RefManager::resolve_branch(repo, &BranchName::main())?;
            let tree = commit::get_tree_at_commit(repo, head)?;
            let missing: Vec<&TableName> = tables.iter().filter(|t| !tree.table_exists(t)).collect();
            if missing.is_empty() {
                return Ok(());
            }

            let mut mutator = TreeMutator::from_tree(repo, &tree)?;
            for table in &missing {
                mutator.create_table(table)?;
            }
            let tree_id = mutator.write()?;
            let names: Vec<TableName> = missing.into_iter().cloned().collect();

            let new_head = CommitBuilder::new(repo)
                .tree(tree_id)
                .parent(head)
                .message(CommitMessage::initialize(&names))
                .signature(self.inner.signature.clone())
                .commit()?;
            RefManager::update_branch_if_unchanged(repo, &BranchName::main(), head, new_head)
        })
    }

    /// Tip of `main`, the committed state of the store.
    pub fn head(&self) -> StorageResult<CommitId> {
        self.with_repo(RefManager::head_commit)
    }

    pub fn read_row(&self, table: &TableName, key: &RowKey, at: CommitId) -> StorageResult<Option<Row>> {
        self.with_repo(|repo| {
            let tree = commit::get_tree_at_commit(repo, at)?;
            read_row_in(repo, &tree, table, key)
        })
    }

    /// Read every row of a table. Loads the whole table into memory.
    pub fn scan_table(&self, table: &TableName, at: CommitId) -> StorageResult<Vec<Row>> {
        self.with_repo(|repo| {
            let tree = commit::get_tree_at_commit(repo, at)?;
            let keys = tree.list_rows(repo, table)?;

            let mut rows = Vec::with_capacity(keys.len());
            for key in keys {
                let row = read_row_in(repo, &tree, table, &key)?.ok_or_else(|| StorageError::RowNotFound {
                    table: table.clone(),
                    key: key.clone(),
                })?;
                rows.push(row);
            }
            Ok(rows)
        })
    }

    /// Insert a row that must not exist yet. Returns the new commit.
    pub fn insert_row(&self, table: &TableName, row: Row, at: CommitId, tx_id: Option<&str>) -> StorageResult<CommitId> {
        self.with_repo(|repo| {
            let tree = commit::get_tree_at_commit(repo, at)?;
            if tree.row_exists(repo, table, &row.key)? {
                return Err(StorageError::RowAlreadyExists {
                    table: table.clone(),
                    key: row.key.clone(),
                });
            }

            let message = CommitMessage::insert(table.as_str(), row.key.as_str(), tx_id);
            self.write_row(repo, &tree, table, &row, at, message)
        })
    }

    /// Insert or overwrite a row. Returns the new commit.
    pub fn upsert_row(&self, table: &TableName, row: Row, at: CommitId, tx_id: Option<&str>) -> StorageResult<CommitId> {
        self.with_repo(|repo| {
            let tree = commit::get_tree_at_commit(repo, at)?;
            let message = if tree.row_exists(repo, table, &row.key)? {
                CommitMessage::update(table.as_str(), row.key.as_str(), tx_id)
            } else {
                CommitMessage::insert(table.as_str(), row.key.as_str(), tx_id)
            };
            self.write_row(repo, &tree, table, &row, at, message)
        })
    }

    /// Delete an existing row. Returns the new commit.
    pub fn delete_row(&self, table: &TableName, key: &RowKey, at: CommitId, tx_id: Option<&str>) -> StorageResult<CommitId> {
        self.with_repo(|repo| {
            let tree = commit::get_tree_at_commit(repo, at)?;
            let mut mutator = TreeMutator::from_tree(repo, &tree)?;
            mutator.delete_row(table, key)?;
            let tree_id = mutator.write()?;

            CommitBuilder::new(repo)
                .tree(tree_id)
                .parent(at)
                .message(CommitMessage::delete(table.as_str(), key.as_str(), tx_id))
                .signature(self.inner.signature.clone())
                .commit()
        })
    }

    fn write_row(
        &self,
        repo: &Repository,
        tree: &TreeHandle<'_>,
        table: &TableName,
        row: &Row,
        at: CommitId,
        message: String,
    ) -> StorageResult<CommitId> {
        let blob_id = blob::write_blob(repo, row)?;
        let mut mutator = TreeMutator::from_tree(repo, tree)?;
        mutator.upsert_row(table, &row.key, blob_id)?;
        let tree_id = mutator.write()?;

        CommitBuilder::new(repo)
            .tree(tree_id)
            .parent(at)
            .message(message)
            .signature(self.inner.signature.clone())
            .commit()
    }

    pub fn update_branch(&self, branch: &BranchName, target: CommitId) -> StorageResult<()> {
        self.with_repo(|repo| RefManager::update_branch(repo, branch, target))
    }

    pub fn create_transaction_branch(&self, tx_id: &str, base: CommitId) -> StorageResult<BranchName> {
        self.with_repo(|repo| RefManager::create_transaction_branch(repo, tx_id, base))
    }

    pub fn delete_transaction_branch(&self, tx_id: &str) -> StorageResult<()> {
        self.with_repo(|repo| RefManager::delete_transaction_branch(repo, tx_id))
    }

    pub fn list_transaction_branches(&self) -> StorageResult<Vec<BranchName>> {
        self.with_repo(RefManager::list_transaction_branches)
    }

    pub fn cleanup_transaction_branches(&self, active: &HashSet<String>) -> StorageResult<usize> {
        self.with_repo(|repo| RefManager::cleanup_abandoned_transactions(repo, active))
    }

    /// Move `main` onto the tip of `tx_branch`, provided `main` is still at
    /// `expected_main`. Returns the new tip of `main`.
    pub fn fast_forward_main(&self, tx_branch: &BranchName, expected_main: CommitId) -> StorageResult<CommitId> {
        self.with_repo(|repo| {
            let tx_commit = RefManager::resolve_branch(repo, tx_branch)?;
            if tx_commit != expected_main {
                RefManager::update_branch_if_unchanged(repo, &BranchName::main(), expected_main, tx_commit)?;
            } else if RefManager::resolve_branch(repo, &BranchName::main())? != expected_main {
                // nothing written, but main moved on; report it like any other race
                return Err(StorageError::ConcurrentModification {
                    branch: BranchName::MAIN.to_string(),
                });
            }
            Ok(tx_commit)
        })
    }
}

impl std::fmt::Debug for GitRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitRepository").field("path", &self.inner.path).finish()
    }
}

fn read_row_in<'r>(repo: &'r Repository, tree: &TreeHandle<'r>, table: &TableName, key: &RowKey) -> StorageResult<Option<Row>> {
    let Some(blob_id) = tree.get_row_blob_id(repo, table, key)? else {
        return Ok(None);
    };

    let bytes = blob::read_blob(repo, blob_id)?;
    Ok(Some(blob::deserialize_row(&bytes, key)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn tables() -> Vec<TableName> {
        vec![TableName::new("items").unwrap()]
    }

    fn setup() -> (TempDir, GitRepository) {
        let dir = TempDir::new().unwrap();
        let repo = GitRepository::init(dir.path(), GitSignature::default(), &tables()).unwrap();
        (dir, repo)
    }

    fn row(key: &str, value: i64) -> Row {
        Row::from_value(RowKey::new(key).unwrap(), json!({ "value": value })).unwrap()
    }

    #[test]
    fn test_init_and_reopen() {
        let dir = TempDir::new().unwrap();
        let repo = GitRepository::init(dir.path(), GitSignature::default(), &tables()).unwrap();
        let head = repo.head().unwrap();
        drop(repo);

        let repo = GitRepository::open_or_init(dir.path(), GitSignature::default(), &tables()).unwrap();
        assert_eq!(repo.head().unwrap(), head);
        assert!(repo.scan_table(&tables()[0], head).unwrap().is_empty());
    }

    #[test]
    fn test_open_adds_missing_tables() {
        let dir = TempDir::new().unwrap();
        let repo = GitRepository::init(dir.path(), GitSignature::default(), &tables()).unwrap();
        let first_head = repo.head().unwrap();
        drop(repo);

        let mut wanted = tables();
        wanted.push(TableName::new("tags").unwrap());
        let repo = GitRepository::open(dir.path(), GitSignature::default(), &wanted).unwrap();

        let head = repo.head().unwrap();
        assert_ne!(head, first_head);
        for table in &wanted {
            assert!(repo.scan_table(table, head).unwrap().is_empty());
        }
        assert!(repo.scan_table(&wanted[1], first_head).unwrap_err().is_not_found());

        // already complete, so reopening adds nothing
        drop(repo);
        let repo = GitRepository::open(dir.path(), GitSignature::default(), &wanted).unwrap();
        assert_eq!(repo.head().unwrap(), head);
    }

    #[test]
    fn test_open_uninitialized_fails() {
        let dir = TempDir::new().unwrap();
        let result = GitRepository::open(dir.path().join("nope"), GitSignature::default(), &[]);
        assert!(matches!(result, Err(StorageError::NotInitialized(_))));
    }

    #[test]
    fn test_row_lifecycle() {
        let (_dir, repo) = setup();
        let items = TableName::new("items").unwrap();
        let key = RowKey::new("a1").unwrap();
        let head = repo.head().unwrap();

        let head = repo.insert_row(&items, row("a1", 1), head, None).unwrap();
        let stored = repo.read_row(&items, &key, head).unwrap().unwrap();
        assert_eq!(stored.get("value"), Some(&json!(1)));

        let duplicate = repo.insert_row(&items, row("a1", 2), head, None);
        assert!(matches!(duplicate, Err(StorageError::RowAlreadyExists { .. })));

        let updated = stored.with_update(row("a1", 2).data);
        let head = repo.upsert_row(&items, updated, head, None).unwrap();
        let stored = repo.read_row(&items, &key, head).unwrap().unwrap();
        assert_eq!(stored.version, 2);

        let head = repo.delete_row(&items, &key, head, None).unwrap();
        assert!(repo.read_row(&items, &key, head).unwrap().is_none());
        assert!(repo.delete_row(&items, &key, head, None).unwrap_err().is_not_found());
    }

    #[test]
    fn test_scan_table() {
        let (_dir, repo) = setup();
        let items = TableName::new("items").unwrap();
        let mut head = repo.head().unwrap();

        for i in 0..4 {
            head = repo.insert_row(&items, row(&format!("k{}", i), i), head, None).unwrap();
        }
        assert_eq!(repo.scan_table(&items, head).unwrap().len(), 4);
    }

    #[test]
    fn test_rows_are_not_visible_on_main_until_fast_forward() {
        let (_dir, repo) = setup();
        let items = TableName::new("items").unwrap();
        let base = repo.head().unwrap();

        let branch = repo.create_transaction_branch("tx001", base).unwrap();
        let tip = repo.insert_row(&items, row("a1", 1), base, Some("tx001")).unwrap();
        repo.update_branch(&branch, tip).unwrap();
        assert!(repo.scan_table(&items, repo.head().unwrap()).unwrap().is_empty());

        assert_eq!(repo.fast_forward_main(&branch, base).unwrap(), tip);
        repo.delete_transaction_branch("tx001").unwrap();
        assert_eq!(repo.scan_table(&items, repo.head().unwrap()).unwrap().len(), 1);
    }

    #[test]
    fn test_fast_forward_detects_moved_main() {
        let (_dir, repo) = setup();
        let items = TableName::new("items").unwrap();
        let base = repo.head().unwrap();

        let branch = repo.create_transaction_branch("tx001", base).unwrap();
        let tip = repo.insert_row(&items, row("a1", 1), base, Some("tx001")).unwrap();
        repo.update_branch(&branch, tip).unwrap();

        let other = repo.insert_row(&items, row("b1", 1), base, None).unwrap();
        repo.update_branch(&BranchName::main(), other).unwrap();

        let result = repo.fast_forward_main(&branch, base);
        assert!(matches!(result, Err(StorageError::ConcurrentModification { .. })));
    }
}
