//! Storage commit creation.
//!
//! Each row write is one git commit on a transaction branch; the transaction
//! later moves `main` onto its last commit.

use git2::Repository;

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::tree::TreeHandle;
use crate::storage::types::{CommitId, GitSignature, TableName, TreeId};

/// Fluent builder for storage commits.
pub struct CommitBuilder<'a> {
    repo: &'a Repository,
    tree_id: Option<TreeId>,
    parents: Vec<CommitId>,
    message: String,
    signature: GitSignature,
    update_ref: Option<String>,
}

impl<'a> CommitBuilder<'a> {
    pub fn new(repo: &'a Repository) -> Self {
        Self {
            repo,
            tree_id: None,
            parents: Vec::new(),
            message: String::new(),
            signature: GitSignature::default(),
            update_ref: None,
        }
    }

    pub fn tree(mut self, tree_id: TreeId) -> Self {
        self.tree_id = Some(tree_id);
        self
    }

    pub fn parent(mut self, parent: CommitId) -> Self {
        self.parents.push(parent);
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn signature(mut self, signature: GitSignature) -> Self {
        self.signature = signature;
        self
    }

    /// move a ref to the new commit as part of creating it
    pub fn update_ref(mut self, refname: impl Into<String>) -> Self {
        self.update_ref = Some(refname.into());
        self
    }

    pub fn commit(self) -> StorageResult<CommitId> {
        let tree_id = self
            .tree_id
            .ok_or_else(|| StorageError::Internal("commit requires a tree".to_string()))?;

        let tree = self.repo.find_tree(tree_id.raw())?;
        let sig = self.signature.to_git2_signature()?;

        let parent_commits: Vec<git2::Commit<'_>> = self
            .parents
            .iter()
            .map(|id| self.repo.find_commit(id.raw()))
            .collect::<Result<_, _>>()?;
        let parent_refs: Vec<&git2::Commit<'_>> = parent_commits.iter().collect();

        let oid = self.repo.commit(
            self.update_ref.as_deref(),
            &sig,
            &sig,
            &self.message,
            &tree,
            &parent_refs,
        )?;

        Ok(CommitId::new(oid))
    }
}

pub fn get_tree_at_commit(repo: &Repository, commit_id: CommitId) -> StorageResult<TreeHandle<'_>> {
    let commit = repo
        .find_commit(commit_id.raw())
        .map_err(|_| StorageError::CommitNotFound(commit_id.to_string()))?;

    Ok(TreeHandle::new(commit.tree()?))
}

/// first commit of a fresh store, with every table already present
pub fn create_initial_commit(
    repo: &Repository,
    signature: &GitSignature,
    tables: &[TableName],
) -> StorageResult<CommitId> {
    let tree_id = crate::storage::tree::create_initial_tree(repo, tables)?;

    CommitBuilder::new(repo)
        .tree(tree_id)
        .message(CommitMessage::initialize(tables))
        .signature(signature.clone())
        .update_ref("HEAD")
        .commit()
}

/// Message formats for storage commits.
pub struct CommitMessage;

impl CommitMessage {
    pub fn initialize(tables: &[TableName]) -> String {
        let names: Vec<&str> = tables.iter().map(|t| t.as_str()).collect();
        format!("[saga] Initialize store ({})", names.join(", "))
    }

    pub fn insert(table: &str, key: &str, tx_id: Option<&str>) -> String {
        Self::with_tx(format!("[INSERT] {}/{}", table, key), tx_id)
    }

    pub fn update(table: &str, key: &str, tx_id: Option<&str>) -> String {
        Self::with_tx(format!("[UPDATE] {}/{}", table, key), tx_id)
    }

    pub fn delete(table: &str, key: &str, tx_id: Option<&str>) -> String {
        Self::with_tx(format!("[DELETE] {}/{}", table, key), tx_id)
    }

    fn with_tx(message: String, tx_id: Option<&str>) -> String {
        match tx_id {
            Some(id) => format!("{} tx:{}", message, id),
            None => message,
        }
    }
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

    #[test]
    fn test_initial_commit_has_tables() {
        let (_dir, repo) = setup_repo();
        let tables = vec![TableName::new("commits").unwrap()];

        let commit_id = create_initial_commit(&repo, &GitSignature::default(), &tables).unwrap();
        let commit = repo.find_commit(commit_id.raw()).unwrap();

        assert_eq!(commit.summary(), Some("[saga] Initialize store (commits)"));
        assert_eq!(commit.parent_count(), 0);
        assert_eq!(commit.author().name(), Some("Saga"));
        assert_eq!(repo.head().unwrap().target(), Some(commit_id.raw()));

        let tree = get_tree_at_commit(&repo, commit_id).unwrap();
        assert!(tree.table_exists(&tables[0]));
    }

    #[test]
    fn test_commit_builder_links_parent() {
        let (_dir, repo) = setup_repo();
        let initial = create_initial_commit(&repo, &GitSignature::default(), &[]).unwrap();
        let tree_id = TreeId::new(repo.find_commit(initial.raw()).unwrap().tree_id());

        let second = CommitBuilder::new(&repo)
            .tree(tree_id)
            .parent(initial)
            .message("Second commit")
            .commit()
            .unwrap();

        let commit = repo.find_commit(second.raw()).unwrap();
        let parents: Vec<CommitId> = commit.parent_ids().map(CommitId::new).collect();
        assert_eq!(parents, vec![initial]);
        assert_eq!(commit.summary(), Some("Second commit"));
    }

    #[test]
    fn test_unknown_commit_has_no_tree() {
        let (_dir, repo) = setup_repo();
        let missing = CommitId::new(git2::Oid::zero());
        assert!(matches!(
            get_tree_at_commit(&repo, missing),
            Err(StorageError::CommitNotFound(_))
        ));
    }

    #[test]
    fn test_builder_without_tree_fails() {
        let (_dir, repo) = setup_repo();
        let result = CommitBuilder::new(&repo).message("no tree").commit();
        assert!(matches!(result, Err(StorageError::Internal(_))));
    }

    #[test]
    fn test_commit_messages() {
        assert_eq!(
            CommitMessage::insert("commits", "abc", Some("tx001")),
            "[INSERT] commits/abc tx:tx001"
        );
        assert_eq!(CommitMessage::delete("tags", "t1", None), "[DELETE] tags/t1");
    }
}
