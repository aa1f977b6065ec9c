//! In-memory implementations of the storage ports.
//! Used by tests and by local runs without Postgres.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::domain::{BalanceEntity, Transaction, TransactionState};
use crate::ports::{
    BalanceStore, BalanceUnitOfWork, RepositoryError, RepositoryResult, TransactionRepository,
};

#[derive(Clone, Default)]
pub struct InMemoryTransactionRepository {
    records: Arc<RwLock<HashMap<String, Transaction>>>,
}

impl InMemoryTransactionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

fn newest_first(mut records: Vec<Transaction>) -> Vec<Transaction> {
    records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| a.id.cmp(&b.id)));
    records
}

#[async_trait]
impl TransactionRepository for InMemoryTransactionRepository {
    async fn exists(&self, id: &str) -> RepositoryResult<bool> {
        Ok(self.records.read().await.contains_key(id))
    }

    async fn insert(&self, tx: &Transaction) -> RepositoryResult<Transaction> {
        let mut records = self.records.write().await;
        if records.contains_key(&tx.id) {
            return Err(RepositoryError::Duplicate(tx.id.clone()));
        }
        records.insert(tx.id.clone(), tx.clone());
        Ok(tx.clone())
    }

    async fn update(&self, tx: &Transaction) -> RepositoryResult<Transaction> {
        let mut records = self.records.write().await;
        let stored = records
            .get_mut(&tx.id)
            .ok_or_else(|| RepositoryError::NotFound(tx.id.clone()))?;

        if stored.state != TransactionState::Pending {
            return Err(RepositoryError::Conflict(format!(
                "transaction {} is already {}",
                tx.id, stored.state
            )));
        }

        stored.state = tx.state;
        stored.note = tx.note.clone();
        Ok(stored.clone())
    }

    async fn get_by_id(&self, id: &str) -> RepositoryResult<Transaction> {
        self.records
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }

    async fn list_by_actor(&self, actor_id: &str) -> RepositoryResult<Vec<Transaction>> {
        let records = self.records.read().await;
        Ok(newest_first(
            records
                .values()
                .filter(|tx| tx.actor_id == actor_id)
                .cloned()
                .collect(),
        ))
    }

    async fn list_by_counterparty(
        &self,
        counterparty_id: &str,
    ) -> RepositoryResult<Vec<Transaction>> {
        let records = self.records.read().await;
        Ok(newest_first(
            records
                .values()
                .filter(|tx| tx.counterparty_id.as_deref() == Some(counterparty_id))
                .cloned()
                .collect(),
        ))
    }

    async fn first_support(
        &self,
        counterparty_id: &str,
        actor_id: &str,
    ) -> RepositoryResult<Option<Transaction>> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .filter(|tx| {
                tx.is_support()
                    && tx.state == TransactionState::Success
                    && tx.actor_id == actor_id
                    && tx.counterparty_id.as_deref() == Some(counterparty_id)
            })
            .min_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)))
            .cloned())
    }

    async fn list_pending_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> RepositoryResult<Vec<Transaction>> {
        let records = self.records.read().await;
        let mut pending: Vec<Transaction> = records
            .values()
            .filter(|tx| tx.state == TransactionState::Pending && tx.timestamp < cutoff)
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(pending)
    }
}

/// Versioned map of balance entities shared by every unit of work it hands out.
pub struct InMemoryBalanceStore<E: BalanceEntity> {
    entities: Arc<RwLock<HashMap<String, E>>>,
}

impl<E: BalanceEntity> Clone for InMemoryBalanceStore<E> {
    fn clone(&self) -> Self {
        Self {
            entities: Arc::clone(&self.entities),
        }
    }
}

impl<E: BalanceEntity> Default for InMemoryBalanceStore<E> {
    fn default() -> Self {
        Self {
            entities: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl<E: BalanceEntity> InMemoryBalanceStore<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an entity as its owning subsystem would.
    pub async fn seed(&self, entity: E) {
        self.entities
            .write()
            .await
            .insert(entity.id().to_string(), entity);
    }

    pub async fn snapshot(&self, id: &str) -> Option<E> {
        self.entities.read().await.get(id).cloned()
    }
}

#[async_trait]
impl<E: BalanceEntity> BalanceStore<E> for InMemoryBalanceStore<E> {
    async fn begin(&self) -> RepositoryResult<Box<dyn BalanceUnitOfWork<E>>> {
        Ok(Box::new(InMemoryUnitOfWork {
            entities: Arc::clone(&self.entities),
            staged: Vec::new(),
        }))
    }
}

struct InMemoryUnitOfWork<E: BalanceEntity> {
    entities: Arc<RwLock<HashMap<String, E>>>,
    staged: Vec<E>,
}

#[async_trait]
impl<E: BalanceEntity> BalanceUnitOfWork<E> for InMemoryUnitOfWork<E> {
    async fn get_by_id(&mut self, id: &str) -> RepositoryResult<E> {
        self.entities
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }

    async fn reload(&mut self, entity: &mut E) -> RepositoryResult<()> {
        let id = entity.id().to_string();
        *entity = self.get_by_id(&id).await?;
        Ok(())
    }

    async fn update(&mut self, entity: &E) -> RepositoryResult<()> {
        self.staged.retain(|staged| staged.id() != entity.id());
        self.staged.push(entity.clone());
        Ok(())
    }

    async fn commit(&mut self) -> RepositoryResult<()> {
        let mut entities = self.entities.write().await;

        for staged in &self.staged {
            let stored = entities
                .get(staged.id())
                .ok_or_else(|| RepositoryError::NotFound(staged.id().to_string()))?;
            if stored.version() != staged.version() {
                return Err(RepositoryError::Conflict(format!(
                    "{} changed since version {}",
                    staged.id(),
                    staged.version()
                )));
            }
        }

        for mut staged in self.staged.drain(..) {
            staged.set_version(staged.version() + 1);
            entities.insert(staged.id().to_string(), staged);
        }
        Ok(())
    }
}
