use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::TagType;
use crate::store::{tables, NamedRecord, Record};

/// Immutable named pointer to one commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub id: String,
    pub repository_id: String,
    pub tag_name: String,
    pub tag_type: TagType,
    pub description: Option<String>,
    pub commit_hash: String,
    pub author: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Record for Tag {
    const TABLE: &'static str = tables::TAGS;

    fn key(&self) -> &str {
        &self.id
    }

    fn repository_id(&self) -> &str {
        &self.repository_id
    }
}

impl NamedRecord for Tag {
    fn name(&self) -> &str {
        &self.tag_name
    }
}
