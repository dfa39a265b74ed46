//! Typed records on top of rows.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::storage::{Row, RowKey, TableName};
use crate::store::error::StoreResult;
use crate::store::{StoreRead, StoreWrite};

/// A record persisted as one row of `TABLE`.
pub trait Record: Serialize + DeserializeOwned {
    const TABLE: &'static str;

    /// primary key: a ULID id, or the commit hash for commits
    fn key(&self) -> &str;

    fn repository_id(&self) -> &str;
}

/// A record with a name that is unique within its repository.
pub trait NamedRecord: Record {
    fn name(&self) -> &str;
}

fn table_of<R: Record>() -> StoreResult<TableName> {
    Ok(TableName::new(R::TABLE)?)
}

fn to_row<R: Record>(record: &R) -> StoreResult<Row> {
    let key = RowKey::new(record.key())?;
    Ok(Row::from_value(key, serde_json::to_value(record)?)?)
}

fn from_row<R: Record>(row: &Row) -> StoreResult<R> {
    Ok(serde_json::from_value(row.to_value())?)
}

/// Typed reads, available on every store view.
pub trait Records: StoreRead {
    /// Look a record up by primary key. A key that could never be stored
    /// resolves to `None`.
    fn fetch<R: Record>(&self, key: &str) -> StoreResult<Option<R>> {
        let Ok(key) = RowKey::new(key) else {
            return Ok(None);
        };
        self.get(&table_of::<R>()?, &key)?
            .map(|row| from_row(&row))
            .transpose()
    }

    fn all<R: Record>(&self) -> StoreResult<Vec<R>> {
        self.scan(&table_of::<R>()?)?.iter().map(from_row).collect()
    }

    fn list_by_repository<R: Record>(&self, repository_id: &str) -> StoreResult<Vec<R>> {
        self.list_where(repository_id, |_: &R| true)
    }

    fn list_where<R, P>(&self, repository_id: &str, predicate: P) -> StoreResult<Vec<R>>
    where
        R: Record,
        P: Fn(&R) -> bool,
    {
        let mut records = Vec::new();
        for row in self.scan(&table_of::<R>()?)? {
            let record: R = from_row(&row)?;
            if record.repository_id() == repository_id && predicate(&record) {
                records.push(record);
            }
        }
        Ok(records)
    }

    /// Look a record up by its unique name within a repository.
    fn find_named<R: NamedRecord>(&self, repository_id: &str, name: &str) -> StoreResult<Option<R>> {
        Ok(self
            .list_where(repository_id, |r: &R| r.name() == name)?
            .into_iter()
            .next())
    }
}

impl<S: StoreRead + ?Sized> Records for S {}

/// Typed writes, available inside a write unit.
pub trait RecordsMut: StoreWrite {
    /// Insert a new record; fails if its key is taken.
    fn create<R: Record>(&mut self, record: &R) -> StoreResult<()> {
        let row = to_row(record)?;
        self.insert(&table_of::<R>()?, row)
    }

    /// Insert or overwrite, keeping the row's creation metadata.
    fn save<R: Record>(&mut self, record: &R) -> StoreResult<()> {
        let table = table_of::<R>()?;
        let fresh = to_row(record)?;
        let row = match self.get(&table, &fresh.key)? {
            Some(existing) => existing.with_update(fresh.data),
            None => fresh,
        };
        self.upsert(&table, row)
    }

    fn remove<R: Record>(&mut self, key: &str) -> StoreResult<()> {
        let key = RowKey::new(key)?;
        self.delete(&table_of::<R>()?, &key)
    }
}

impl<S: StoreWrite + ?Sized> RecordsMut for S {}
