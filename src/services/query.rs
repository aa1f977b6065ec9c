//! Read-only access to the transaction log.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::domain::Transaction;
use crate::error::LedgerError;
use crate::ports::TransactionRepository;

#[derive(Clone)]
pub struct TransactionQueryService {
    transactions: Arc<dyn TransactionRepository>,
}

impl TransactionQueryService {
    pub fn new(transactions: Arc<dyn TransactionRepository>) -> Self {
        Self { transactions }
    }

    pub async fn get(&self, id: &str) -> Result<Transaction, LedgerError> {
        Ok(self.transactions.get_by_id(id).await?)
    }

    /// Lookup scoped to the owning actor. Someone else's transaction reads as
    /// missing so ids are not disclosed.
    pub async fn get_owned(&self, id: &str, actor_id: &str) -> Result<Transaction, LedgerError> {
        let tx = self.get(id).await?;
        if tx.actor_id != actor_id {
            return Err(LedgerError::NotFound(id.to_string()));
        }
        Ok(tx)
    }

    /// Every transaction of `actor_id`. Order is not part of the contract.
    pub async fn list_by_actor(&self, actor_id: &str) -> Result<Vec<Transaction>, LedgerError> {
        Ok(self.transactions.list_by_actor(actor_id).await?)
    }

    pub async fn list_by_counterparty(
        &self,
        counterparty_id: &str,
    ) -> Result<Vec<Transaction>, LedgerError> {
        Ok(self.transactions.list_by_counterparty(counterparty_id).await?)
    }

    /// Earliest successful support of `counterparty_id` by `actor_id`, if any.
    pub async fn first_support_transaction(
        &self,
        counterparty_id: &str,
        actor_id: &str,
    ) -> Result<Option<Transaction>, LedgerError> {
        Ok(self
            .transactions
            .first_support(counterparty_id, actor_id)
            .await?)
    }

    /// Whether the actor's first support of the channel happened strictly before `at`.
    pub async fn supported_before(
        &self,
        counterparty_id: &str,
        actor_id: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, LedgerError> {
        Ok(self
            .first_support_transaction(counterparty_id, actor_id)
            .await?
            .map_or(false, |tx| tx.timestamp < at))
    }

    /// Pending records older than `older_than`: transfers that never reached a
    /// terminal state and need reconciliation.
    pub async fn stale_pending(&self, older_than: Duration) -> Result<Vec<Transaction>, LedgerError> {
        let cutoff = Utc::now() - older_than;
        Ok(self.transactions.list_pending_before(cutoff).await?)
    }
}
