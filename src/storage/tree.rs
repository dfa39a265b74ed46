//! Tree operations.
//!
//! The root tree of every storage commit holds one directory per table, and
//! each table directory holds one `{key}.json` blob per row. `_meta` is
//! reserved and is never a table.

use std::collections::HashMap;

use git2::{FileMode, ObjectType, Repository, Tree, TreeBuilder as Git2TreeBuilder};

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::types::{BlobId, RowKey, TableName, TreeId};

/// Read-only view of the tree at one storage commit.
#[derive(Debug)]
pub struct TreeHandle<'repo> {
    tree: Tree<'repo>,
}

impl<'repo> TreeHandle<'repo> {
    pub(crate) fn new(tree: Tree<'repo>) -> Self {
        Self { tree }
    }

    pub(crate) fn inner(&self) -> &Tree<'repo> {
        &self.tree
    }

    pub fn table_exists(&self, table: &TableName) -> bool {
        self.tree
            .get_name(table.as_str())
            .map(|entry| entry.kind() == Some(ObjectType::Tree))
            .unwrap_or(false)
    }

    fn table_tree(&self, repo: &'repo Repository, table: &TableName) -> StorageResult<Tree<'repo>> {
        let entry = self
            .tree
            .get_name(table.as_str())
            .ok_or_else(|| StorageError::TableNotFound(table.clone()))?;

        if entry.kind() != Some(ObjectType::Tree) {
            return Err(StorageError::UnexpectedEntryType {
                path: table.as_str().into(),
                expected: "tree (directory)".to_string(),
                found: format!("{:?}", entry.kind()),
            });
        }

        Ok(repo.find_tree(entry.id())?)
    }

    /// list all row keys in a table
    pub fn list_rows(&self, repo: &'repo Repository, table: &TableName) -> StorageResult<Vec<RowKey>> {
        let table_tree = self.table_tree(repo, table)?;

        let keys = table_tree
            .iter()
            .filter_map(|entry| {
                if entry.kind() != Some(ObjectType::Blob) {
                    return None;
                }
                let key = entry.name()?.strip_suffix(".json")?;
                RowKey::new(key).ok()
            })
            .collect();

        Ok(keys)
    }

    pub fn get_row_blob_id(
        &self,
        repo: &'repo Repository,
        table: &TableName,
        key: &RowKey,
    ) -> StorageResult<Option<BlobId>> {
        let table_tree = self.table_tree(repo, table)?;

        let Some(entry) = table_tree.get_name(&format!("{}.json", key)) else {
            return Ok(None);
        };

        if entry.kind() != Some(ObjectType::Blob) {
            return Err(StorageError::UnexpectedEntryType {
                path: format!("{}/{}.json", table, key).into(),
                expected: "blob (file)".to_string(),
                found: format!("{:?}", entry.kind()),
            });
        }

        Ok(Some(BlobId::new(entry.id())))
    }

    pub fn row_exists(&self, repo: &'repo Repository, table: &TableName, key: &RowKey) -> StorageResult<bool> {
        Ok(self.get_row_blob_id(repo, table, key)?.is_some())
    }
}

/// Accumulates row changes against a tree and writes a new tree at the end.
///
/// The source tree is never modified.
///
/// ```ignore
/// let mut mutator = TreeMutator::from_tree(repo, &tree)?;
/// mutator.upsert_row(&commits, &key, blob_id)?;
/// mutator.delete_row(&tags, &old_key)?;
/// let new_tree_id = mutator.write()?;
/// ```
pub struct TreeMutator<'repo> {
    repo: &'repo Repository,
    root_builder: Git2TreeBuilder<'repo>,
    /// tables touched so far, table -> builder
    modified_tables: HashMap<String, Git2TreeBuilder<'repo>>,
    /// subtree ids of tables not touched yet
    original_tables: HashMap<String, git2::Oid>,
}

impl<'repo> TreeMutator<'repo> {
    pub fn from_tree(repo: &'repo Repository, tree: &TreeHandle<'_>) -> StorageResult<Self> {
        let root_builder = repo.treebuilder(Some(tree.inner()))?;

        let mut original_tables = HashMap::new();
        for entry in tree.inner().iter() {
            if entry.kind() == Some(ObjectType::Tree) {
                if let Some(name) = entry.name() {
                    original_tables.insert(name.to_string(), entry.id());
                }
            }
        }

        Ok(Self {
            repo,
            root_builder,
            modified_tables: HashMap::new(),
            original_tables,
        })
    }

    pub fn empty(repo: &'repo Repository) -> StorageResult<Self> {
        Ok(Self {
            repo,
            root_builder: repo.treebuilder(None)?,
            modified_tables: HashMap::new(),
            original_tables: HashMap::new(),
        })
    }

    fn has_table(&self, table: &str) -> bool {
        self.modified_tables.contains_key(table) || self.original_tables.contains_key(table)
    }

    fn table_builder(&mut self, table: &TableName) -> StorageResult<&mut Git2TreeBuilder<'repo>> {
        let name = table.as_str();
        if !self.has_table(name) {
            return Err(StorageError::TableNotFound(table.clone()));
        }

        if !self.modified_tables.contains_key(name) {
            let builder = match self.original_tables.get(name) {
                Some(original_id) => {
                    let original_tree = self.repo.find_tree(*original_id)?;
                    self.repo.treebuilder(Some(&original_tree))?
                }
                None => self.repo.treebuilder(None)?,
            };
            self.modified_tables.insert(name.to_string(), builder);
        }

        self.modified_tables
            .get_mut(name)
            .ok_or_else(|| StorageError::Internal(format!("no builder for table {}", name)))
    }

    /// create an empty table directory
    pub fn create_table(&mut self, table: &TableName) -> StorageResult<()> {
        if self.has_table(table.as_str()) {
            return Err(StorageError::TableAlreadyExists(table.clone()));
        }

        let empty_tree_id = self.repo.treebuilder(None)?.write()?;
        self.root_builder
            .insert(table.as_str(), empty_tree_id, FileMode::Tree.into())?;
        self.original_tables
            .insert(table.as_str().to_string(), empty_tree_id);

        Ok(())
    }

    pub fn upsert_row(&mut self, table: &TableName, key: &RowKey, blob_id: BlobId) -> StorageResult<()> {
        let builder = self.table_builder(table)?;
        builder.insert(format!("{}.json", key), blob_id.raw(), FileMode::Blob.into())?;
        Ok(())
    }

    pub fn delete_row(&mut self, table: &TableName, key: &RowKey) -> StorageResult<()> {
        let builder = self.table_builder(table)?;
        builder
            .remove(format!("{}.json", key))
            .map_err(|_| StorageError::RowNotFound {
                table: table.clone(),
                key: key.clone(),
            })?;
        Ok(())
    }

    /// write touched table trees, then the root, and return the new root id
    pub fn write(mut self) -> StorageResult<TreeId> {
        for (table_name, table_builder) in self.modified_tables {
            let table_tree_id = table_builder.write()?;
            self.root_builder
                .insert(&table_name, table_tree_id, FileMode::Tree.into())?;
        }

        Ok(TreeId::new(self.root_builder.write()?))
    }
}

/// Root tree for a fresh store: one empty directory per table plus `_meta`.
pub fn create_initial_tree(repo: &Repository, tables: &[TableName]) -> StorageResult<TreeId> {
    let mut mutator = TreeMutator::empty(repo)?;

    // `_meta` bypasses TableName validation on purpose
    let meta_tree_id = repo.treebuilder(None)?.write()?;
    mutator
        .root_builder
        .insert("_meta", meta_tree_id, FileMode::Tree.into())?;

    for table in tables {
        mutator.create_table(table)?;
    }

    mutator.write()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_repo() -> (TempDir, Repository) {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        (dir, repo)
    }

    fn handle(repo: &Repository, tree_id: TreeId) -> TreeHandle<'_> {
        TreeHandle::new(repo.find_tree(tree_id.raw()).unwrap())
    }

    fn table(name: &str) -> TableName {
        TableName::new(name).unwrap()
    }

    #[test]
    fn test_initial_tree_holds_tables_and_meta() {
        let (_dir, repo) = setup_repo();
        let tree_id = create_initial_tree(&repo, &[table("branches"), table("commits")]).unwrap();
        let tree = handle(&repo, tree_id);

        assert!(tree.table_exists(&table("branches")));
        assert!(tree.table_exists(&table("commits")));
        assert!(!tree.table_exists(&table("tags")));
        assert!(tree.inner().get_name("_meta").is_some());
        assert!(tree.list_rows(&repo, &table("commits")).unwrap().is_empty());
    }

    #[test]
    fn test_create_duplicate_table() {
        let (_dir, repo) = setup_repo();
        let tree_id = create_initial_tree(&repo, &[table("tags")]).unwrap();
        let tree = handle(&repo, tree_id);

        let mut mutator = TreeMutator::from_tree(&repo, &tree).unwrap();
        let result = mutator.create_table(&table("tags"));
        assert!(matches!(result, Err(StorageError::TableAlreadyExists(_))));
    }

    #[test]
    fn test_upsert_list_and_delete_rows() {
        let (_dir, repo) = setup_repo();
        let tags = table("tags");
        let tree_id = create_initial_tree(&repo, &[tags.clone()]).unwrap();
        let blob_id = BlobId::new(repo.blob(b"{\"_pk\":\"t1\",\"_version\":1}").unwrap());

        let tree = handle(&repo, tree_id);
        let mut mutator = TreeMutator::from_tree(&repo, &tree).unwrap();
        mutator.upsert_row(&tags, &RowKey::new("t1").unwrap(), blob_id).unwrap();
        mutator.upsert_row(&tags, &RowKey::new("t2").unwrap(), blob_id).unwrap();
        let tree_id = mutator.write().unwrap();

        let tree = handle(&repo, tree_id);
        assert_eq!(tree.list_rows(&repo, &tags).unwrap().len(), 2);
        assert!(tree.row_exists(&repo, &tags, &RowKey::new("t1").unwrap()).unwrap());

        let mut mutator = TreeMutator::from_tree(&repo, &tree).unwrap();
        mutator.delete_row(&tags, &RowKey::new("t1").unwrap()).unwrap();
        let tree_id = mutator.write().unwrap();

        let tree = handle(&repo, tree_id);
        let rows = tree.list_rows(&repo, &tags).unwrap();
        assert_eq!(rows, vec![RowKey::new("t2").unwrap()]);
    }

    #[test]
    fn test_missing_table_and_row() {
        let (_dir, repo) = setup_repo();
        let tree_id = create_initial_tree(&repo, &[table("tags")]).unwrap();
        let tree = handle(&repo, tree_id);

        let result = tree.list_rows(&repo, &table("commits"));
        assert!(matches!(result, Err(StorageError::TableNotFound(_))));

        let mut mutator = TreeMutator::from_tree(&repo, &tree).unwrap();
        let result = mutator.delete_row(&table("tags"), &RowKey::new("ghost").unwrap());
        assert!(matches!(result, Err(StorageError::RowNotFound { .. })));
    }
}
