//! Version engine errors.

use thiserror::Error;

use crate::store::StoreError;

pub type VersionResult<T> = Result<T, VersionError>;

#[derive(Debug, Error)]
pub enum VersionError {
    #[error("repository not found: {0}")]
    RepositoryNotFound(String),

    #[error("branch '{branch}' not found in repository {repository_id}")]
    BranchNotFound { repository_id: String, branch: String },

    #[error("commit not found: {0}")]
    CommitNotFound(String),

    #[error("branch '{branch}' already exists in repository {repository_id}")]
    DuplicateBranchName { repository_id: String, branch: String },

    #[error("tag '{tag}' already exists in repository {repository_id}")]
    DuplicateTagName { repository_id: String, tag: String },

    /// a different commit already owns this hash; nothing was written
    #[error("commit hash collision on {0}")]
    HashCollision(String),

    #[error("branch '{branch}' was merged into '{merged_into}' and accepts no new commits")]
    BranchMerged { branch: String, merged_into: String },

    #[error("invalid name: {0}")]
    InvalidName(String),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl VersionError {
    pub fn is_not_found(&self) -> bool {
        match self {
            VersionError::RepositoryNotFound(_)
            | VersionError::BranchNotFound { .. }
            | VersionError::CommitNotFound(_) => true,
            VersionError::Store(e) => e.is_not_found(),
            _ => false,
        }
    }

    pub fn is_conflict(&self) -> bool {
        match self {
            VersionError::DuplicateBranchName { .. }
            | VersionError::DuplicateTagName { .. }
            | VersionError::HashCollision(_)
            | VersionError::BranchMerged { .. } => true,
            VersionError::Store(e) => e.is_conflict(),
            _ => false,
        }
    }

    /// Only lost write races are worth retrying.
    pub fn is_retriable(&self) -> bool {
        matches!(self, VersionError::Store(e) if e.is_retriable())
    }
}
