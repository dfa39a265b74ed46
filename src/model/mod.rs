//! Versioned records.
//!
//! Plain data, no persistence behavior: each type is a [`Record`] that the
//! store layer knows how to put in a table. Commits and tags are written once
//! and never changed; repositories and branches carry the mutable pointers.
//!
//! [`Record`]: crate::store::Record

mod branch;
mod commit;
mod kinds;
mod repository;
mod snapshot;
mod tag;

pub use branch::Branch;
pub use commit::Commit;
pub use kinds::{BranchType, CommitType, ParseKindError, TagType};
pub use repository::Repository;
pub use snapshot::Snapshot;
pub use tag::Tag;

/// New lowercase ULID for record ids.
pub(crate) fn new_id() -> String {
    ulid::Ulid::new().to_string().to_lowercase()
}
