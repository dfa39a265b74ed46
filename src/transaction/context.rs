//! Transaction context.
//!
//! `Transaction<State>` uses typestate so that only an active transaction can
//! read or write, and a committed or aborted one cannot be used again.

use std::marker::PhantomData;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::storage::{BranchName, CommitId, GitRepository, Row, RowKey, StorageError, TableName};
use crate::transaction::error::{TransactionError, TransactionResult};

#[derive(Debug)]
pub struct TxActive;

#[derive(Debug)]
pub struct TxCommitted;

#[derive(Debug)]
pub struct TxAborted;

/// Bookkeeping shared with the manager.
#[derive(Debug, Clone)]
pub struct TransactionMetadata {
    pub tx_id: String,
    pub branch: BranchName,
    /// tip of `main` when the transaction began
    pub base_commit: CommitId,
    /// tip of the transaction branch
    pub current_commit: CommitId,
    pub started_at: DateTime<Utc>,
}

pub struct Transaction<State> {
    pub(crate) metadata: TransactionMetadata,
    pub(crate) repo: GitRepository,
    _state: PhantomData<State>,
}

impl<State> Transaction<State> {
    pub fn id(&self) -> &str {
        &self.metadata.tx_id
    }

    pub fn base_commit(&self) -> CommitId {
        self.metadata.base_commit
    }

    pub fn branch(&self) -> &BranchName {
        &self.metadata.branch
    }

    fn transition<Next>(self) -> Transaction<Next> {
        Transaction {
            metadata: self.metadata,
            repo: self.repo,
            _state: PhantomData,
        }
    }
}

impl Transaction<TxActive> {
    pub(crate) fn new(repo: GitRepository, tx_id: String, branch: BranchName, base_commit: CommitId) -> Self {
        Self {
            metadata: TransactionMetadata {
                tx_id,
                branch,
                base_commit,
                current_commit: base_commit,
                started_at: Utc::now(),
            },
            repo,
            _state: PhantomData,
        }
    }

    pub fn current_commit(&self) -> CommitId {
        self.metadata.current_commit
    }

    pub fn has_writes(&self) -> bool {
        self.metadata.current_commit != self.metadata.base_commit
    }

    /// Reads see the state at begin plus this transaction's own writes.
    pub fn read(&self, table: &TableName, key: &RowKey) -> TransactionResult<Option<Row>> {
        Ok(self.repo.read_row(table, key, self.metadata.current_commit)?)
    }

    pub fn scan(&self, table: &TableName) -> TransactionResult<Vec<Row>> {
        Ok(self.repo.scan_table(table, self.metadata.current_commit)?)
    }

    pub fn insert(&mut self, table: &TableName, row: Row) -> TransactionResult<()> {
        let next = self
            .repo
            .insert_row(table, row, self.metadata.current_commit, Some(&self.metadata.tx_id))?;
        self.advance(next)
    }

    pub fn upsert(&mut self, table: &TableName, row: Row) -> TransactionResult<()> {
        let next = self
            .repo
            .upsert_row(table, row, self.metadata.current_commit, Some(&self.metadata.tx_id))?;
        self.advance(next)
    }

    pub fn delete(&mut self, table: &TableName, key: &RowKey) -> TransactionResult<()> {
        let next = self
            .repo
            .delete_row(table, key, self.metadata.current_commit, Some(&self.metadata.tx_id))?;
        self.advance(next)
    }

    fn advance(&mut self, next: CommitId) -> TransactionResult<()> {
        self.metadata.current_commit = next;
        self.repo.update_branch(&self.metadata.branch, next)?;
        Ok(())
    }

    /// Fast-forward `main` to the transaction branch and delete the branch.
    ///
    /// Fails with [`TransactionError::Conflict`] if `main` moved since begin.
    /// The branch is deleted on both paths.
    pub fn commit(self) -> TransactionResult<Transaction<TxCommitted>> {
        let result = self.repo.fast_forward_main(&self.metadata.branch, self.metadata.base_commit);
        self.discard_branch();

        match result {
            Ok(tip) => {
                debug!(tx = %self.metadata.tx_id, commit = %tip.short(), "transaction committed");
                Ok(self.transition())
            }
            Err(StorageError::ConcurrentModification { branch }) => {
                warn!(tx = %self.metadata.tx_id, %branch, "transaction lost a race on main");
                Err(TransactionError::Conflict {
                    tx_id: self.metadata.tx_id.clone(),
                    branch,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Discard every write by deleting the transaction branch.
    pub fn rollback(self) -> Transaction<TxAborted> {
        self.discard_branch();
        debug!(tx = %self.metadata.tx_id, "transaction rolled back");
        self.transition()
    }

    fn discard_branch(&self) {
        if let Err(e) = self.repo.delete_transaction_branch(&self.metadata.tx_id) {
            // left for cleanup_abandoned
            warn!(tx = %self.metadata.tx_id, error = %e, "failed to delete transaction branch");
        }
    }
}

impl Transaction<TxCommitted> {
    /// Tip of `main` right after this transaction landed.
    pub fn final_commit(&self) -> CommitId {
        self.metadata.current_commit
    }
}

impl Transaction<TxAborted> {
    pub fn discarded_commit(&self) -> CommitId {
        self.metadata.current_commit
    }
}
