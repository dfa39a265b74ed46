//! Display payloads. Field names are part of the external interface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::model::{BranchType, CommitType};

pub const MERGE_EDGE_COLOR: &str = "#f59e0b";

/// Legend color for a branch type.
pub fn branch_color(branch_type: BranchType) -> &'static str {
    match branch_type {
        BranchType::Main => "#2563eb",
        BranchType::Development => "#16a34a",
        BranchType::Experimental => "#dc2626",
        BranchType::Alternate => "#7c3aed",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Commit,
    BranchCreate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<u32>,
    pub message: String,
    pub branch: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub milestone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_type: Option<CommitType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub repository_id: String,
    /// ascending by timestamp
    pub events: Vec<TimelineEvent>,
    pub branch_count: usize,
    pub commit_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    /// full commit hash
    pub id: String,
    pub label: String,
    pub title: String,
    pub branch: String,
    pub color: String,
    pub level: u32,
    pub timestamp: DateTime<Utc>,
    pub commit_type: CommitType,
    pub milestone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
    pub merge: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub dashes: bool,
    pub arrows: String,
}

impl GraphEdge {
    pub fn progression(from: &str, to: &str) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
            merge: false,
            color: None,
            dashes: false,
            arrows: "to".to_string(),
        }
    }

    pub fn merge(from: &str, to: &str) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
            merge: true,
            color: Some(MERGE_EDGE_COLOR.to_string()),
            dashes: true,
            arrows: "to".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchLegend {
    pub name: String,
    #[serde(rename = "type")]
    pub branch_type: BranchType,
    pub color: String,
    pub active: bool,
    pub merged: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Visualization {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub branches: Vec<BranchLegend>,
}

/// Choices made while levelling up. A choice counts once its key is present,
/// whatever the value; only list lengths reach the commit message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LevelUpChoices {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_spells: Option<Vec<Value>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub ability_score_improvement: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_features: Option<Vec<Value>>,
}

impl LevelUpChoices {
    /// Message fragments, in display order.
    pub fn summary(&self) -> Vec<String> {
        let mut parts = Vec::new();
        if let Some(spells) = &self.new_spells {
            parts.push(format!("Learned {} spells", spells.len()));
        }
        if self.ability_score_improvement.is_some() {
            parts.push("ASI applied".to_string());
        }
        if let Some(features) = &self.new_features {
            parts.push(format!("Gained {} features", features.len()));
        }
        parts
    }
}

// keeps an explicit `null` distinguishable from a missing key
fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}
