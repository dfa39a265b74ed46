//! Transactions over the git object storage.
//!
//! Each transaction gets its own `tx/{ulid}` branch forked from `main`. Row
//! writes accumulate there as ordinary storage commits, invisible to readers
//! of `main`. Commit fast-forwards `main` onto the branch tip with a
//! compare-and-swap; rollback just deletes the branch.
//!
//! ```ignore
//! let manager = TransactionManager::new(repo);
//! manager.with_transaction(|tx| {
//!     tx.insert(&commits, row)?;
//!     tx.upsert(&branches, head_row)?;
//!     Ok(())
//! })?;
//! ```

mod context;
mod error;
mod manager;

pub use context::{Transaction, TransactionMetadata, TxAborted, TxActive, TxCommitted};
pub use error::{TransactionError, TransactionResult};
pub use manager::TransactionManager;
