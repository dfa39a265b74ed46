//! In-memory record store.
//!
//! State is an immutable `Arc` snapshot. Readers clone the `Arc` and never
//! block writers; a writer stages changes on a copy-on-write clone and swaps
//! it in only when its closure succeeds.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::storage::{Row, RowKey, StorageError, TableName};
use crate::store::error::{StoreError, StoreResult};
use crate::store::{default_tables, RecordStore, StoreRead, StoreWrite};

type Table = BTreeMap<RowKey, Row>;
type Tables = BTreeMap<TableName, Arc<Table>>;

pub struct MemoryStore {
    state: RwLock<Arc<Tables>>,
    writer: Mutex<()>,
}

impl MemoryStore {
    /// Store with the version engine's tables.
    pub fn new() -> StoreResult<Self> {
        Ok(Self::with_tables(&default_tables()?))
    }

    pub fn with_tables(tables: &[TableName]) -> Self {
        let state: Tables = tables
            .iter()
            .map(|t| (t.clone(), Arc::new(Table::new())))
            .collect();

        Self {
            state: RwLock::new(Arc::new(state)),
            writer: Mutex::new(()),
        }
    }

    fn snapshot(&self) -> Arc<Tables> {
        Arc::clone(&self.state.read())
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.snapshot();
        let rows: usize = snapshot.values().map(|t| t.len()).sum();
        f.debug_struct("MemoryStore")
            .field("tables", &snapshot.len())
            .field("rows", &rows)
            .finish()
    }
}

fn table<'a>(tables: &'a Tables, name: &TableName) -> StoreResult<&'a Table> {
    tables
        .get(name)
        .map(|t| t.as_ref())
        .ok_or_else(|| StorageError::TableNotFound(name.clone()).into())
}

struct Snapshot(Arc<Tables>);

impl StoreRead for Snapshot {
    fn get(&self, table_name: &TableName, key: &RowKey) -> StoreResult<Option<Row>> {
        Ok(table(&self.0, table_name)?.get(key).cloned())
    }

    fn scan(&self, table_name: &TableName) -> StoreResult<Vec<Row>> {
        Ok(table(&self.0, table_name)?.values().cloned().collect())
    }
}

/// Changes staged by one write unit.
struct Staged {
    tables: Tables,
    writes: usize,
}

impl Staged {
    fn table_mut(&mut self, name: &TableName) -> StoreResult<&mut Table> {
        let table = self
            .tables
            .get_mut(name)
            .ok_or_else(|| StoreError::from(StorageError::TableNotFound(name.clone())))?;
        Ok(Arc::make_mut(table))
    }
}

impl StoreRead for Staged {
    fn get(&self, table_name: &TableName, key: &RowKey) -> StoreResult<Option<Row>> {
        Ok(table(&self.tables, table_name)?.get(key).cloned())
    }

    fn scan(&self, table_name: &TableName) -> StoreResult<Vec<Row>> {
        Ok(table(&self.tables, table_name)?.values().cloned().collect())
    }
}

impl StoreWrite for Staged {
    fn insert(&mut self, table_name: &TableName, row: Row) -> StoreResult<()> {
        let table = self.table_mut(table_name)?;
        if table.contains_key(&row.key) {
            return Err(StorageError::RowAlreadyExists {
                table: table_name.clone(),
                key: row.key,
            }
            .into());
        }
        table.insert(row.key.clone(), row);
        self.writes += 1;
        Ok(())
    }

    fn upsert(&mut self, table_name: &TableName, row: Row) -> StoreResult<()> {
        self.table_mut(table_name)?.insert(row.key.clone(), row);
        self.writes += 1;
        Ok(())
    }

    fn delete(&mut self, table_name: &TableName, key: &RowKey) -> StoreResult<()> {
        if self.table_mut(table_name)?.remove(key).is_none() {
            return Err(StorageError::RowNotFound {
                table: table_name.clone(),
                key: key.clone(),
            }
            .into());
        }
        self.writes += 1;
        Ok(())
    }
}

impl RecordStore for MemoryStore {
    fn read<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&dyn StoreRead) -> Result<T, E>,
        E: From<StoreError>,
    {
        f(&Snapshot(self.snapshot()))
    }

    fn write<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn StoreWrite) -> Result<T, E>,
        E: From<StoreError>,
    {
        let _writer = self.writer.lock();
        let mut staged = Staged {
            tables: (*self.snapshot()).clone(),
            writes: 0,
        };

        let value = f(&mut staged)?;
        if staged.writes > 0 {
            *self.state.write() = Arc::new(staged.tables);
            debug!(writes = staged.writes, "memory store write applied");
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Records, RecordsMut};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        id: String,
        repository_id: String,
        title: String,
    }

    impl crate::store::Record for Note {
        const TABLE: &'static str = "notes";

        fn key(&self) -> &str {
            &self.id
        }

        fn repository_id(&self) -> &str {
            &self.repository_id
        }
    }

    impl crate::store::NamedRecord for Note {
        fn name(&self) -> &str {
            &self.title
        }
    }

    fn note(id: &str, repo: &str, title: &str) -> Note {
        Note {
            id: id.to_string(),
            repository_id: repo.to_string(),
            title: title.to_string(),
        }
    }

    fn store() -> MemoryStore {
        MemoryStore::with_tables(&[TableName::new("notes").unwrap()])
    }

    #[test]
    fn test_write_then_read() {
        let store = store();
        store
            .write(|w| {
                w.create(&note("n1", "r1", "first"))?;
                w.create(&note("n2", "r2", "second"))
            })
            .unwrap();

        let (found, listed, named) = store
            .read(|r| -> StoreResult<_> {
                Ok((
                    r.fetch::<Note>("n1")?,
                    r.list_by_repository::<Note>("r1")?,
                    r.find_named::<Note>("r2", "second")?,
                ))
            })
            .unwrap();

        assert_eq!(found, Some(note("n1", "r1", "first")));
        assert_eq!(listed.len(), 1);
        assert_eq!(named.map(|n| n.id), Some("n2".to_string()));
    }

    #[test]
    fn test_failed_write_leaves_no_trace() {
        let store = store();
        let result: StoreResult<()> = store.write(|w| {
            w.create(&note("n1", "r1", "first"))?;
            w.create(&note("n1", "r1", "duplicate"))
        });

        assert!(result.unwrap_err().is_duplicate());
        let all = store.read(|r| r.all::<Note>()).unwrap();
        assert!(all.is_empty());
    }

    #[test]
    fn test_snapshot_is_stable_across_writes() {
        let store = store();
        store.write(|w| w.create(&note("n1", "r1", "first"))).unwrap();

        store
            .read(|r| -> StoreResult<()> {
                store.write(|w| w.create(&note("n2", "r1", "second")))?;
                assert_eq!(r.all::<Note>()?.len(), 1);
                Ok(())
            })
            .unwrap();

        assert_eq!(store.read(|r| r.all::<Note>()).unwrap().len(), 2);
    }

    #[test]
    fn test_save_bumps_row_version_and_remove_deletes() {
        let store = store();
        let table = TableName::new("notes").unwrap();
        let key = RowKey::new("n1").unwrap();

        store.write(|w| w.create(&note("n1", "r1", "first"))).unwrap();
        store.write(|w| w.save(&note("n1", "r1", "renamed"))).unwrap();

        let row = store.read(|r| r.get(&table, &key)).unwrap().unwrap();
        assert_eq!(row.version, 2);
        assert_eq!(row.get("title"), Some(&serde_json::json!("renamed")));

        store.write(|w| w.remove::<Note>("n1")).unwrap();
        assert!(store.read(|r| r.fetch::<Note>("n1")).unwrap().is_none());
        assert!(store.write(|w| w.remove::<Note>("n1")).unwrap_err().is_not_found());
    }

    #[test]
    fn test_unknown_table_and_unstorable_key() {
        let store = MemoryStore::with_tables(&[]);
        let err = store.read(|r| r.all::<Note>()).unwrap_err();
        assert!(err.is_not_found());

        let store = self::store();
        assert!(store.read(|r| r.fetch::<Note>("not a key")).unwrap().is_none());
    }
}
