use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::model::{Branch, BranchType, Commit, CommitType, Snapshot};
use crate::presentation::dto::{
    branch_color, BranchLegend, EventType, GraphEdge, GraphNode, LevelUpChoices, Timeline, TimelineEvent,
    Visualization,
};
use crate::store::RecordStore;
use crate::version::{NewCommit, VersionManager, VersionResult};

/// Read-only projections over a [`VersionManager`], plus the level-up helper.
pub struct VersioningApi<'m, S> {
    manager: &'m VersionManager<S>,
}

impl<'m, S: RecordStore> VersioningApi<'m, S> {
    pub fn new(manager: &'m VersionManager<S>) -> Self {
        Self { manager }
    }

    /// Commits and branch creations of a repository, oldest first.
    pub fn get_timeline(&self, repository_id: &str) -> VersionResult<Timeline> {
        let tree = self.manager.get_repository_tree(repository_id)?;
        let names = branch_names(tree.branches.iter().map(|v| &v.branch));

        let mut events: Vec<TimelineEvent> = tree
            .commits
            .iter()
            .map(|commit| TimelineEvent {
                id: commit.commit_hash.clone(),
                event_type: EventType::Commit,
                timestamp: commit.created_at,
                level: Some(commit.progress_level),
                message: commit.commit_message.clone(),
                branch: names.get(commit.branch_id.as_str()).copied().unwrap_or_default().to_string(),
                milestone: commit.milestone.clone(),
                commit_type: Some(commit.commit_type),
                short_hash: Some(commit.short_hash.clone()),
                description: None,
            })
            .collect();

        events.extend(
            tree.branches
                .iter()
                .map(|v| &v.branch)
                .filter(|b| b.branch_name != tree.repository.default_branch)
                .map(|branch| TimelineEvent {
                    id: format!("branch_{}", branch.id),
                    event_type: EventType::BranchCreate,
                    timestamp: branch.created_at,
                    level: None,
                    message: format!("Created branch: {}", branch.branch_name),
                    branch: branch.branch_name.clone(),
                    milestone: None,
                    commit_type: None,
                    short_hash: None,
                    description: branch.description.clone(),
                }),
        );

        // stable: a commit and a branch sharing an instant keep that order
        events.sort_by_key(|e| e.timestamp);

        debug!(repository = %repository_id, events = events.len(), "built timeline");
        Ok(Timeline {
            repository_id: repository_id.to_string(),
            events,
            branch_count: tree.branch_count,
            commit_count: tree.commit_count,
        })
    }

    /// Commit graph with one node per commit and one edge per parent link.
    pub fn get_visualization(&self, repository_id: &str) -> VersionResult<Visualization> {
        let tree = self.manager.get_repository_tree(repository_id)?;
        let branches: HashMap<&str, &Branch> = tree.branches.iter().map(|v| (v.branch.id.as_str(), &v.branch)).collect();
        let known: HashSet<&str> = tree.commits.iter().map(|c| c.commit_hash.as_str()).collect();

        let nodes = tree
            .commits
            .iter()
            .map(|commit| {
                let branch = branches.get(commit.branch_id.as_str());
                let branch_type = branch.map(|b| b.branch_type).unwrap_or(BranchType::Main);
                GraphNode {
                    id: commit.commit_hash.clone(),
                    label: format!("L{}: {}", commit.progress_level, commit.short_hash),
                    title: commit.commit_message.clone(),
                    branch: branch.map(|b| b.branch_name.clone()).unwrap_or_default(),
                    color: branch_color(branch_type).to_string(),
                    level: commit.progress_level,
                    timestamp: commit.created_at,
                    commit_type: commit.commit_type,
                    milestone: commit.milestone.clone(),
                }
            })
            .collect();

        let mut edges = Vec::new();
        for commit in &tree.commits {
            let to = commit.commit_hash.as_str();
            if let Some(parent) = commit.parent_commit_hash.as_deref().filter(|h| known.contains(h)) {
                edges.push(GraphEdge::progression(parent, to));
            }
            if let Some(merged) = commit.merge_parent_hash.as_deref().filter(|h| known.contains(h)) {
                edges.push(GraphEdge::merge(merged, to));
            }
        }

        let legend = tree
            .branches
            .iter()
            .map(|v| BranchLegend {
                name: v.branch.branch_name.clone(),
                branch_type: v.branch.branch_type,
                color: branch_color(v.branch.branch_type).to_string(),
                active: v.branch.is_active,
                merged: v.branch.is_merged,
            })
            .collect();

        Ok(Visualization {
            nodes,
            edges,
            branches: legend,
        })
    }

    /// Commit a new level, with a message built from the snapshot's classes
    /// and the choices made.
    pub fn level_up(
        &self,
        repository_id: &str,
        branch_name: &str,
        snapshot: impl Into<Snapshot>,
        choices: Option<&LevelUpChoices>,
    ) -> VersionResult<Commit> {
        let snapshot = snapshot.into();
        let level = snapshot.level(&self.manager.options().level_field).unwrap_or(1);
        let message = level_up_message(level, &snapshot, choices);

        let commit = NewCommit::new(message, snapshot)
            .level(level)
            .commit_type(CommitType::LevelUp)
            .milestone(format!("Level {}", level));
        self.manager.create_commit(repository_id, branch_name, commit)
    }
}

fn branch_names<'a>(branches: impl Iterator<Item = &'a Branch>) -> HashMap<&'a str, &'a str> {
    branches.map(|b| (b.id.as_str(), b.branch_name.as_str())).collect()
}

fn level_up_message(level: u32, snapshot: &Snapshot, choices: Option<&LevelUpChoices>) -> String {
    let classes: Vec<String> = snapshot
        .character_classes()
        .into_iter()
        .map(|(class, class_level)| format!("{} {}", class, class_level))
        .collect();

    let mut message = format!("Level {}", level);
    if !classes.is_empty() {
        message.push_str(": ");
        message.push_str(&classes.join(", "));
    }

    let extras = choices.map(LevelUpChoices::summary).unwrap_or_default();
    if !extras.is_empty() {
        message.push_str(" - ");
        message.push_str(&extras.join(", "));
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presentation::dto::MERGE_EDGE_COLOR;
    use crate::store::MemoryStore;
    use crate::version::{NewBranch, NewRepository, VersionError};
    use serde_json::json;

    fn manager() -> VersionManager<MemoryStore> {
        VersionManager::new(MemoryStore::new().unwrap())
    }

    fn hero(m: &VersionManager<MemoryStore>) -> String {
        m.create_repository(NewRepository::new("Hero").initial_snapshot(json!({ "level": 1 })))
            .unwrap()
            .id
    }

    #[test]
    fn test_level_up_message_and_fields() {
        let m = manager();
        let repo = hero(&m);
        let api = VersioningApi::new(&m);

        let choices = LevelUpChoices {
            new_spells: Some(vec![json!("magic missile")]),
            new_features: Some(vec![json!("arcane recovery"), json!("ritual casting")]),
            ..Default::default()
        };
        let snapshot = json!({ "level": 3, "character_classes": { "Wizard": 2, "Fighter": 1 } });
        let commit = api.level_up(&repo, "main", snapshot, Some(&choices)).unwrap();

        assert_eq!(
            commit.commit_message,
            "Level 3: Wizard 2, Fighter 1 - Learned 1 spells, Gained 2 features"
        );
        assert_eq!(commit.commit_type, CommitType::LevelUp);
        assert_eq!(commit.milestone.as_deref(), Some("Level 3"));
        assert_eq!(commit.progress_level, 3);
    }

    #[test]
    fn test_level_up_keeps_class_order_and_present_choices() {
        let m = manager();
        let repo = hero(&m);
        let choices: LevelUpChoices =
            serde_json::from_value(json!({ "new_spells": [], "ability_score_improvement": false })).unwrap();
        let snapshot = json!({ "level": 3, "character_classes": { "Wizard": 2, "Fighter": 1 } });

        let commit = VersioningApi::new(&m)
            .level_up(&repo, "main", snapshot, Some(&choices))
            .unwrap();
        assert_eq!(
            commit.commit_message,
            "Level 3: Wizard 2, Fighter 1 - Learned 0 spells, ASI applied"
        );
    }

    #[test]
    fn test_level_up_without_classes_or_choices() {
        let m = manager();
        let repo = hero(&m);
        let commit = VersioningApi::new(&m)
            .level_up(&repo, "main", json!({ "level": 2 }), None)
            .unwrap();
        assert_eq!(commit.commit_message, "Level 2");
    }

    #[test]
    fn test_timeline_merges_commits_and_branch_events() {
        let m = manager();
        let repo = hero(&m);
        let api = VersioningApi::new(&m);
        api.level_up(&repo, "main", json!({ "level": 2 }), None).unwrap();
        m.create_branch(&repo, NewBranch::new("what-if", "main").description("dark path"))
            .unwrap();
        api.level_up(&repo, "what-if", json!({ "level": 3 }), None).unwrap();

        let timeline = api.get_timeline(&repo).unwrap();
        assert_eq!(timeline.commit_count, 3);
        assert_eq!(timeline.branch_count, 2);
        assert_eq!(timeline.events.len(), 4);
        assert!(timeline.events.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));

        let created: Vec<&TimelineEvent> = timeline
            .events
            .iter()
            .filter(|e| e.event_type == EventType::BranchCreate)
            .collect();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].message, "Created branch: what-if");
        assert_eq!(created[0].description.as_deref(), Some("dark path"));

        let last = timeline.events.last().unwrap();
        assert_eq!(last.branch, "what-if");
        assert_eq!(last.level, Some(3));
    }

    #[test]
    fn test_visualization_edges_and_colors() {
        let m = manager();
        let repo = hero(&m);
        let api = VersioningApi::new(&m);
        m.create_branch(&repo, NewBranch::new("alt", "main").branch_type(BranchType::Experimental))
            .unwrap();
        let side = api.level_up(&repo, "alt", json!({ "level": 2 }), None).unwrap();
        m.mark_branch_merged(&repo, "alt", "main").unwrap();
        let merge = m
            .create_commit(&repo, "main", NewCommit::new("merge alt", json!({ "level": 2 })).merge_parent(side.commit_hash.as_str()))
            .unwrap();

        let graph = api.get_visualization(&repo).unwrap();
        assert_eq!(graph.nodes.len(), 3);
        assert_eq!(graph.edges.len(), 3);

        let side_node = graph.nodes.iter().find(|n| n.id == side.commit_hash).unwrap();
        assert_eq!(side_node.color, branch_color(BranchType::Experimental));
        assert_eq!(side_node.label, format!("L2: {}", side.short_hash));
        assert_eq!(side_node.branch, "alt");

        let merges: Vec<&GraphEdge> = graph.edges.iter().filter(|e| e.merge).collect();
        assert_eq!(merges.len(), 1);
        assert_eq!(merges[0].from, side.commit_hash);
        assert_eq!(merges[0].to, merge.commit_hash);
        assert_eq!(merges[0].color.as_deref(), Some(MERGE_EDGE_COLOR));

        let alt = graph.branches.iter().find(|b| b.name == "alt").unwrap();
        assert!(alt.merged && !alt.active);
    }

    #[test]
    fn test_projections_of_missing_repository_fail() {
        let m = manager();
        let api = VersioningApi::new(&m);
        assert!(matches!(api.get_timeline("nope"), Err(VersionError::RepositoryNotFound(_))));
        assert!(matches!(api.get_visualization("nope"), Err(VersionError::RepositoryNotFound(_))));
    }
}
