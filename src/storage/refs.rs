//! Ref management for the object storage.
//!
//! `main` holds the committed state of the store. Each open write transaction
//! owns a `tx/{id}` branch forked from `main`; committing moves `main` onto the
//! tip of that branch with a compare-and-swap, then deletes the branch.

use std::collections::HashSet;

use git2::{BranchType, ErrorCode, Repository};

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::types::{BranchName, CommitId};

pub struct RefManager;

impl RefManager {
    pub fn resolve_branch(repo: &Repository, branch: &BranchName) -> StorageResult<CommitId> {
        let reference = repo
            .find_reference(&branch.as_ref_path())
            .map_err(|_| StorageError::RefNotFound(branch.to_string()))?;

        let commit = reference
            .peel_to_commit()
            .map_err(|_| StorageError::RefNotFound(branch.to_string()))?;

        Ok(CommitId::new(commit.id()))
    }

    pub fn head_commit(repo: &Repository) -> StorageResult<CommitId> {
        let head = repo.head().map_err(|e| {
            if e.code() == ErrorCode::UnbornBranch {
                StorageError::EmptyRepository
            } else {
                StorageError::Git(e)
            }
        })?;

        Ok(CommitId::new(head.peel_to_commit()?.id()))
    }

    pub fn branch_exists(repo: &Repository, branch: &BranchName) -> bool {
        repo.find_reference(&branch.as_ref_path()).is_ok()
    }

    pub fn create_branch(repo: &Repository, branch: &BranchName, target: CommitId) -> StorageResult<()> {
        if Self::branch_exists(repo, branch) {
            return Err(StorageError::BranchAlreadyExists(branch.to_string()));
        }

        let commit = repo.find_commit(target.raw())?;
        repo.branch(branch.as_str(), &commit, false)?;
        Ok(())
    }

    /// Unconditional move. Only transaction branches, which have a single
    /// owner, are moved this way.
    pub fn update_branch(repo: &Repository, branch: &BranchName, target: CommitId) -> StorageResult<()> {
        let mut reference = repo
            .find_reference(&branch.as_ref_path())
            .map_err(|_| StorageError::RefNotFound(branch.to_string()))?;

        reference.set_target(target.raw(), &format!("saga: move to {}", target.short()))?;
        Ok(())
    }

    /// Move `branch` to `new_target` only if it still points at `expected`.
    ///
    /// The check and the move happen inside libgit2's ref lock, so a writer in
    /// another process cannot slip in between them.
    pub fn update_branch_if_unchanged(
        repo: &Repository,
        branch: &BranchName,
        expected: CommitId,
        new_target: CommitId,
    ) -> StorageResult<()> {
        let current = Self::resolve_branch(repo, branch)?;
        if current != expected {
            return Err(StorageError::ConcurrentModification {
                branch: branch.to_string(),
            });
        }

        repo.reference_matching(
            &branch.as_ref_path(),
            new_target.raw(),
            true,
            expected.raw(),
            &format!("saga: fast-forward to {}", new_target.short()),
        )
        .map_err(|e| match e.code() {
            ErrorCode::Modified | ErrorCode::Locked => StorageError::ConcurrentModification {
                branch: branch.to_string(),
            },
            _ => StorageError::Git(e),
        })?;

        Ok(())
    }

    pub fn delete_branch(repo: &Repository, branch: &BranchName) -> StorageResult<()> {
        let mut git_branch = repo
            .find_branch(branch.as_str(), BranchType::Local)
            .map_err(|_| StorageError::RefNotFound(branch.to_string()))?;

        git_branch.delete()?;
        Ok(())
    }

    pub fn list_transaction_branches(repo: &Repository) -> StorageResult<Vec<BranchName>> {
        let mut result = Vec::new();
        for entry in repo.branches(Some(BranchType::Local))? {
            let (branch, _) = entry?;
            let Some(name) = branch.name()? else {
                continue;
            };
            if name.starts_with(BranchName::TX_PREFIX) {
                if let Ok(branch_name) = BranchName::new(name) {
                    result.push(branch_name);
                }
            }
        }
        Ok(result)
    }

    pub fn create_transaction_branch(repo: &Repository, tx_id: &str, base: CommitId) -> StorageResult<BranchName> {
        let branch = BranchName::for_transaction(tx_id);
        Self::create_branch(repo, &branch, base)?;
        Ok(branch)
    }

    pub fn delete_transaction_branch(repo: &Repository, tx_id: &str) -> StorageResult<()> {
        Self::delete_branch(repo, &BranchName::for_transaction(tx_id))
    }

    /// Delete `tx/` branches left behind by transactions that never finished,
    /// e.g. after a crash. Ids in `active` are kept.
    pub fn cleanup_abandoned_transactions(repo: &Repository, active: &HashSet<String>) -> StorageResult<usize> {
        let mut deleted = 0;

        for branch in Self::list_transaction_branches(repo)? {
            let Some(tx_id) = branch.transaction_id() else {
                continue;
            };
            if active.contains(tx_id) {
                continue;
            }
            if Self::delete_transaction_branch(repo, tx_id).is_ok() {
                deleted += 1;
            }
        }

        Ok(deleted)
    }

    /// Make sure `main` exists and HEAD points at it.
    pub fn init_main_branch(repo: &Repository, initial_commit: CommitId) -> StorageResult<()> {
        let main = BranchName::main();

        if !Self::branch_exists(repo, &main) {
            Self::create_branch(repo, &main, initial_commit)?;
        }

        repo.set_head(&main.as_ref_path())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::commit::{create_initial_commit, CommitBuilder};
    use crate::storage::types::{GitSignature, TreeId};
    use tempfile::TempDir;

    fn setup_repo_with_commit() -> (TempDir, Repository, CommitId) {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let commit_id = create_initial_commit(&repo, &GitSignature::default(), &[]).unwrap();
        RefManager::init_main_branch(&repo, commit_id).unwrap();
        (dir, repo, commit_id)
    }

    fn child_of(repo: &Repository, parent: CommitId) -> CommitId {
        let tree_id = TreeId::new(repo.find_commit(parent.raw()).unwrap().tree_id());
        CommitBuilder::new(repo)
            .tree(tree_id)
            .parent(parent)
            .message("child")
            .commit()
            .unwrap()
    }

    #[test]
    fn test_head_is_main() {
        let (_dir, repo, expected) = setup_repo_with_commit();
        assert_eq!(RefManager::head_commit(&repo).unwrap(), expected);
        assert_eq!(
            RefManager::resolve_branch(&repo, &BranchName::main()).unwrap(),
            expected
        );
    }

    #[test]
    fn test_duplicate_branch_error() {
        let (_dir, repo, base) = setup_repo_with_commit();
        let branch = BranchName::for_transaction("tx001");

        RefManager::create_branch(&repo, &branch, base).unwrap();
        let result = RefManager::create_branch(&repo, &branch, base);
        assert!(matches!(result, Err(StorageError::BranchAlreadyExists(_))));
    }

    #[test]
    fn test_cleanup_keeps_active_transactions() {
        let (_dir, repo, base) = setup_repo_with_commit();
        RefManager::create_transaction_branch(&repo, "tx001", base).unwrap();
        RefManager::create_transaction_branch(&repo, "tx002", base).unwrap();
        assert_eq!(RefManager::list_transaction_branches(&repo).unwrap().len(), 2);

        let active: HashSet<String> = ["tx002".to_string()].into_iter().collect();
        let deleted = RefManager::cleanup_abandoned_transactions(&repo, &active).unwrap();
        assert_eq!(deleted, 1);

        let remaining = RefManager::list_transaction_branches(&repo).unwrap();
        assert_eq!(remaining, vec![BranchName::for_transaction("tx002")]);
    }

    #[test]
    fn test_update_branch_if_unchanged() {
        let (_dir, repo, first) = setup_repo_with_commit();
        let second = child_of(&repo, first);
        let main = BranchName::main();

        RefManager::update_branch_if_unchanged(&repo, &main, first, second).unwrap();
        assert_eq!(RefManager::resolve_branch(&repo, &main).unwrap(), second);

        let result = RefManager::update_branch_if_unchanged(&repo, &main, first, second);
        assert!(matches!(result, Err(StorageError::ConcurrentModification { .. })));
    }
}
