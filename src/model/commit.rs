use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{CommitType, Snapshot};
use crate::store::{tables, Record};

/// Immutable snapshot plus lineage, keyed by its content hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commit {
    pub id: String,
    pub repository_id: String,
    /// branch active when the commit was created; never changes
    pub branch_id: String,
    pub commit_hash: String,
    /// display only, never used for lookups
    pub short_hash: String,
    pub commit_message: String,
    pub commit_type: CommitType,
    pub progress_level: u32,
    #[serde(default)]
    pub experience_points: u64,
    pub milestone: Option<String>,
    pub parent_commit_hash: Option<String>,
    pub merge_parent_hash: Option<String>,
    pub snapshot: Snapshot,
    /// stored as given; never computed
    pub changes_summary: Option<Value>,
    #[serde(default)]
    pub files_changed: Vec<String>,
    pub session_date: Option<DateTime<Utc>>,
    pub narrative_context: Option<String>,
    pub notes: Option<String>,
    /// random input to the hash, kept so the hash can be recomputed
    pub hash_nonce: String,
    /// per-repository creation ordinal, breaks timestamp ties
    pub sequence: u64,
    pub author: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Commit {
    pub fn is_merge(&self) -> bool {
        self.merge_parent_hash.is_some()
    }
}

impl Record for Commit {
    const TABLE: &'static str = tables::COMMITS;

    fn key(&self) -> &str {
        &self.commit_hash
    }

    fn repository_id(&self) -> &str {
        &self.repository_id
    }
}
