use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::{tables, Record};

/// Top-level container for one entity's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub owner: Option<String>,
    pub is_public: bool,
    pub allow_forks: bool,
    pub default_branch: String,
    /// first commit ever created here; set once, never changed
    pub genesis_commit_hash: Option<String>,
    /// commits created so far; the last one's `sequence`
    #[serde(default)]
    pub commit_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Repository {
    pub fn new(name: impl Into<String>, default_branch: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: super::new_id(),
            name: name.into(),
            description: None,
            owner: None,
            is_public: false,
            allow_forks: true,
            default_branch: default_branch.into(),
            genesis_commit_hash: None,
            commit_count: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Record for Repository {
    const TABLE: &'static str = tables::REPOSITORIES;

    fn key(&self) -> &str {
        &self.id
    }

    fn repository_id(&self) -> &str {
        &self.id
    }
}
