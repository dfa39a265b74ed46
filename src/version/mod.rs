//! Version engine.
//!
//! Repositories hold branches; branches own commits; tags pin commits.
//!
//! ```text
//!   main:   G ── c1 ── c2
//!                 \
//!   side:          s1 ── s2        (branch point c1, s1.parent = c1)
//! ```
//!
//! A commit's hash is derived from its content and parent (see [`hasher`]),
//! and each mutating operation of [`VersionManager`] is a single atomic write
//! against the [`RecordStore`](crate::store::RecordStore).

mod error;
pub mod hasher;
mod manager;

pub use error::{VersionError, VersionResult};
pub use manager::{
    BranchView, CommitContext, CommitVerification, NewBranch, NewCommit, NewRepository, NewTag, RepositoryDeletion,
    RepositoryTree, VersionManager, VersionOptions, DEFAULT_BRANCH_DESCRIPTION, INITIAL_COMMIT_MESSAGE,
};
