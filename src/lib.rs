//! Saga - branch-based version control for evolving records.
//!
//! Snapshots of an entity's state are committed onto branches of a
//! repository, tagged at milestones, and projected into timelines and commit
//! graphs. Records live in a transactional store; the default one keeps them
//! in a git repository where every change is a git commit.
//!
//! # Example
//!
//! ```no_run
//! use saga::db::Saga;
//! use saga::version::{NewCommit, NewRepository};
//! use serde_json::json;
//!
//! let saga = Saga::open("./my_saga").unwrap();
//! let repo = saga
//!     .manager()
//!     .create_repository(NewRepository::new("Aria").initial_snapshot(json!({ "level": 1 })))
//!     .unwrap();
//! saga.api().level_up(&repo.id, "main", json!({ "level": 2 }), None).unwrap();
//! let history = saga.manager().get_commit_history(&repo.id, Some("main"), None).unwrap();
//! assert_eq!(history.len(), 2);
//! ```

pub mod db;
pub mod model;
pub mod presentation;
pub mod storage;
pub mod store;
pub mod transaction;
pub mod version;
