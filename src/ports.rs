//! Storage ports.
//! The ledger talks to its two stores only through these traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::{BalanceEntity, Transaction};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RepositoryError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate key: {0}")]
    Duplicate(String),

    #[error("Write conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound(err.to_string()),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                RepositoryError::Duplicate(db.message().to_string())
            }
            _ => RepositoryError::Database(err.to_string()),
        }
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Append-only transaction log. Lives in the private store.
#[async_trait]
pub trait TransactionRepository: Send + Sync {
    async fn exists(&self, id: &str) -> RepositoryResult<bool>;

    /// Fails with `Duplicate` if the id is already taken.
    async fn insert(&self, tx: &Transaction) -> RepositoryResult<Transaction>;

    /// Persists the terminal state and note of a record that is still pending
    /// in the store. Any other stored state yields `Conflict`.
    async fn update(&self, tx: &Transaction) -> RepositoryResult<Transaction>;

    async fn get_by_id(&self, id: &str) -> RepositoryResult<Transaction>;

    async fn list_by_actor(&self, actor_id: &str) -> RepositoryResult<Vec<Transaction>>;

    async fn list_by_counterparty(&self, counterparty_id: &str)
        -> RepositoryResult<Vec<Transaction>>;

    /// Earliest successful support transaction from `actor_id` to `counterparty_id`.
    async fn first_support(
        &self,
        counterparty_id: &str,
        actor_id: &str,
    ) -> RepositoryResult<Option<Transaction>>;

    async fn list_pending_before(&self, cutoff: DateTime<Utc>)
        -> RepositoryResult<Vec<Transaction>>;

    async fn ping(&self) -> RepositoryResult<()> {
        Ok(())
    }
}

/// Factory of scoped units of work over one balance store.
#[async_trait]
pub trait BalanceStore<E: BalanceEntity>: Send + Sync {
    async fn begin(&self) -> RepositoryResult<Box<dyn BalanceUnitOfWork<E>>>;

    async fn ping(&self) -> RepositoryResult<()> {
        Ok(())
    }
}

/// One scoped conversation with a balance store. Nothing staged through
/// `update` is durable until `commit` returns `Ok`; dropping the unit of work
/// discards staged writes.
#[async_trait]
pub trait BalanceUnitOfWork<E: BalanceEntity>: Send {
    async fn get_by_id(&mut self, id: &str) -> RepositoryResult<E>;

    /// Re-fetches the entity with the same id, overwriting every field.
    async fn reload(&mut self, entity: &mut E) -> RepositoryResult<()>;

    /// Stages a write guarded by the version the entity was read at.
    async fn update(&mut self, entity: &E) -> RepositoryResult<()>;

    /// Flushes staged writes. `Conflict` when another writer got there first.
    async fn commit(&mut self) -> RepositoryResult<()>;
}
