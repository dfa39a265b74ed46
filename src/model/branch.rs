use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::BranchType;
use crate::store::{tables, NamedRecord, Record};

/// Named, advancing pointer into a repository's commits.
///
/// A branch is EMPTY while its head is still the inherited branch point,
/// ACTIVE once it owns commits, and MERGED after `mark_branch_merged`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub id: String,
    pub repository_id: String,
    pub branch_name: String,
    pub description: Option<String>,
    pub branch_type: BranchType,
    pub head_commit_hash: Option<String>,
    /// branch this one was created from; `None` for the default branch
    pub parent_branch: Option<String>,
    pub branch_point_hash: Option<String>,
    pub is_active: bool,
    pub is_merged: bool,
    pub merged_into: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Branch {
    pub fn new(repository_id: impl Into<String>, branch_name: impl Into<String>, branch_type: BranchType) -> Self {
        let now = Utc::now();
        Self {
            id: super::new_id(),
            repository_id: repository_id.into(),
            branch_name: branch_name.into(),
            description: None,
            branch_type,
            head_commit_hash: None,
            parent_branch: None,
            branch_point_hash: None,
            is_active: true,
            is_merged: false,
            merged_into: None,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Record for Branch {
    const TABLE: &'static str = tables::BRANCHES;

    fn key(&self) -> &str {
        &self.id
    }

    fn repository_id(&self) -> &str {
        &self.repository_id
    }
}

impl NamedRecord for Branch {
    fn name(&self) -> &str {
        &self.branch_name
    }
}
