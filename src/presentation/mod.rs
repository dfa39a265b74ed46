//! Presentation projections.
//!
//! Turns the state held by a [`VersionManager`](crate::version::VersionManager)
//! into payloads a UI can render: a chronological timeline and a commit graph.
//! Nothing here writes, except `level_up`, which is a thin composition over
//! `create_commit`.

mod api;
mod dto;

pub use api::VersioningApi;
pub use dto::{
    branch_color, BranchLegend, EventType, GraphEdge, GraphNode, LevelUpChoices, Timeline, TimelineEvent,
    Visualization, MERGE_EDGE_COLOR,
};
