//! Opaque snapshot payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The full state captured by a commit.
///
/// Stored verbatim. The engine only reads a progress level, experience points
/// and class levels out of it, all for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot(Value);

impl Snapshot {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    /// Non-negative integer stored under `field`, if any.
    pub fn level(&self, field: &str) -> Option<u32> {
        self.0
            .get(field)
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok())
    }

    pub fn experience_points(&self) -> u64 {
        self.0
            .get("experience_points")
            .and_then(Value::as_u64)
            .unwrap_or(0)
    }

    /// `character_classes` as `(class, level)` pairs, in the order they were
    /// written.
    pub fn character_classes(&self) -> Vec<(String, u64)> {
        let Some(classes) = self.0.get("character_classes").and_then(Value::as_object) else {
            return Vec::new();
        };
        classes
            .iter()
            .map(|(name, level)| (name.clone(), level.as_u64().unwrap_or(0)))
            .collect()
    }
}

impl From<Value> for Snapshot {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_level_extraction() {
        let snapshot = Snapshot::new(json!({ "level": 4, "rank": -2, "name": "Hero" }));
        assert_eq!(snapshot.level("level"), Some(4));
        assert_eq!(snapshot.level("rank"), None);
        assert_eq!(snapshot.level("name"), None);
        assert_eq!(snapshot.level("missing"), None);
    }

    #[test]
    fn test_classes_and_experience() {
        let snapshot = Snapshot::new(json!({
            "experience_points": 900,
            "character_classes": { "Wizard": 2, "Fighter": 1 }
        }));
        assert_eq!(snapshot.experience_points(), 900);
        assert_eq!(
            snapshot.character_classes(),
            vec![("Wizard".to_string(), 2), ("Fighter".to_string(), 1)]
        );
        assert!(Snapshot::new(json!([1, 2])).character_classes().is_empty());
    }

    #[test]
    fn test_serializes_transparently() {
        let payload = json!({ "level": 1, "hp": 10 });
        let snapshot = Snapshot::new(payload.clone());
        assert_eq!(serde_json::to_value(&snapshot).unwrap(), payload);
    }
}
