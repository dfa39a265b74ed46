//! Git object storage.
//!
//! Records are persisted as rows inside a plain git repository. The upper
//! layers only see tables and rows; git2 never leaks past this module.
//!
//! ```text
//! main ──► commit ──► root tree
//!                       ├── repositories/{id}.json
//!                       ├── branches/{id}.json
//!                       ├── commits/{commit_hash}.json
//!                       └── tags/{id}.json
//! ```
//!
//! Every row write is a git commit built on top of a given parent. Refs are
//! moved separately: `main` only by a transaction fast-forward guarded by a
//! compare-and-swap, `tx/{id}` branches by their owning transaction.

mod blob;
mod commit;
mod error;
mod refs;
mod repository;
mod tree;
mod types;

pub use blob::Row;
pub use error::{StorageError, StorageResult};
pub use repository::GitRepository;
pub use types::{BranchName, CommitId, GitSignature, InvalidNameError, RowKey, TableName};
