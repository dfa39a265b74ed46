//! Persistence boundary.
//!
//! The version engine never talks to git directly. It sees a [`RecordStore`]:
//! a consistent read snapshot, and an atomic write unit in which every change
//! becomes visible together or not at all.
//!
//! ```text
//!            VersionManager<S: RecordStore>
//!                 │ read(|r| ..)   write(|w| ..)
//!        ┌────────┴─────────┐
//!        ▼                  ▼
//!   MemoryStore          GitStore ── TransactionManager ── GitRepository
//! ```
//!
//! Row access inside the closures is object safe (`&dyn StoreRead`,
//! `&mut dyn StoreWrite`); typed access comes from [`Records`] and
//! [`RecordsMut`], implemented for every store view.

mod error;
mod git;
mod memory;
mod record;

pub use error::{StoreError, StoreResult};
pub use git::{GitStore, GitStoreOptions};
pub use memory::MemoryStore;
pub use record::{NamedRecord, Record, Records, RecordsMut};

use crate::storage::{Row, RowKey, TableName};

/// Table names used by the version engine.
pub mod tables {
    pub const REPOSITORIES: &str = "repositories";
    pub const BRANCHES: &str = "branches";
    /// keyed by commit hash, so a second insert of the same hash fails
    pub const COMMITS: &str = "commits";
    pub const TAGS: &str = "tags";

    pub const ALL: [&str; 4] = [REPOSITORIES, BRANCHES, COMMITS, TAGS];
}

pub(crate) fn default_tables() -> StoreResult<Vec<TableName>> {
    tables::ALL
        .iter()
        .map(|name| Ok(TableName::new(*name)?))
        .collect()
}

/// Read access to one consistent state of the store.
pub trait StoreRead {
    fn get(&self, table: &TableName, key: &RowKey) -> StoreResult<Option<Row>>;

    fn scan(&self, table: &TableName) -> StoreResult<Vec<Row>>;
}

/// Write access inside an atomic unit. Reads see the unit's own writes.
pub trait StoreWrite: StoreRead {
    /// Fails if a row with the same key exists.
    fn insert(&mut self, table: &TableName, row: Row) -> StoreResult<()>;

    fn upsert(&mut self, table: &TableName, row: Row) -> StoreResult<()>;

    /// Fails if the row does not exist.
    fn delete(&mut self, table: &TableName, key: &RowKey) -> StoreResult<()>;
}

/// A transactional record store.
pub trait RecordStore: Send + Sync {
    /// Run `f` against a snapshot no concurrent writer can change.
    fn read<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&dyn StoreRead) -> Result<T, E>,
        E: From<StoreError>;

    /// Run `f` as one atomic unit: on `Ok` all writes land together, on `Err`
    /// none of them do.
    fn write<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn StoreWrite) -> Result<T, E>,
        E: From<StoreError>;

    /// Release resources. The store stays usable; this is the shutdown hook.
    fn close(&self) -> StoreResult<()> {
        Ok(())
    }
}

/// The store selected by configuration.
#[derive(Debug)]
pub enum Backend {
    Memory(MemoryStore),
    Git(GitStore),
}

impl Backend {
    pub fn name(&self) -> &'static str {
        match self {
            Backend::Memory(_) => "memory",
            Backend::Git(_) => "git",
        }
    }
}

impl RecordStore for Backend {
    fn read<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&dyn StoreRead) -> Result<T, E>,
        E: From<StoreError>,
    {
        match self {
            Backend::Memory(store) => store.read(f),
            Backend::Git(store) => store.read(f),
        }
    }

    fn write<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn StoreWrite) -> Result<T, E>,
        E: From<StoreError>,
    {
        match self {
            Backend::Memory(store) => store.write(f),
            Backend::Git(store) => store.write(f),
        }
    }

    fn close(&self) -> StoreResult<()> {
        match self {
            Backend::Memory(store) => store.close(),
            Backend::Git(store) => store.close(),
        }
    }
}
