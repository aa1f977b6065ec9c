//! Postgres implementation of TransactionRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::Transaction;
use crate::ports::{RepositoryError, RepositoryResult, TransactionRepository};

const COLUMNS: &str = "id, token_type, transaction_type, actor_id, counterparty_id, \
                       amount, created_at, state, note";

/// Postgres-backed transaction log living in the private store.
#[derive(Clone)]
pub struct PostgresTransactionRepository {
    pool: PgPool,
}

impl PostgresTransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_many(
        &self,
        sql: &str,
        binds: &[&str],
    ) -> RepositoryResult<Vec<Transaction>> {
        let mut query = sqlx::query_as::<_, TransactionRow>(sql);
        for value in binds {
            query = query.bind(*value);
        }
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        rows.into_iter().map(TransactionRow::into_domain).collect()
    }
}

#[async_trait]
impl TransactionRepository for PostgresTransactionRepository {
    async fn exists(&self, id: &str) -> RepositoryResult<bool> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM transactions WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(RepositoryError::from)
    }

    async fn insert(&self, tx: &Transaction) -> RepositoryResult<Transaction> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
            INSERT INTO transactions (
                id, token_type, transaction_type, actor_id, counterparty_id,
                amount, created_at, state, note
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(&tx.id)
        .bind(tx.token_type.as_str())
        .bind(tx.transaction_type.as_str())
        .bind(&tx.actor_id)
        .bind(&tx.counterparty_id)
        .bind(&tx.amount)
        .bind(tx.timestamp)
        .bind(tx.state.as_str())
        .bind(&tx.note)
        .fetch_one(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        row.into_domain()
    }

    async fn update(&self, tx: &Transaction) -> RepositoryResult<Transaction> {
        // Only state and note are writable, and only while the stored row is pending.
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
            UPDATE transactions
            SET state = $2, note = $3, finalized_at = NOW()
            WHERE id = $1 AND state = 'pending'
            RETURNING {COLUMNS}
            "#
        ))
        .bind(&tx.id)
        .bind(tx.state.as_str())
        .bind(&tx.note)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        match row {
            Some(row) => row.into_domain(),
            None => {
                let stored = self.get_by_id(&tx.id).await?;
                Err(RepositoryError::Conflict(format!(
                    "transaction {} is already {}",
                    stored.id, stored.state
                )))
            }
        }
    }

    async fn get_by_id(&self, id: &str) -> RepositoryResult<Transaction> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {COLUMNS} FROM transactions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        row.map(TransactionRow::into_domain)
            .unwrap_or_else(|| Err(RepositoryError::NotFound(id.to_string())))
    }

    async fn list_by_actor(&self, actor_id: &str) -> RepositoryResult<Vec<Transaction>> {
        self.fetch_many(
            &format!(
                "SELECT {COLUMNS} FROM transactions WHERE actor_id = $1 ORDER BY created_at DESC, id"
            ),
            &[actor_id],
        )
        .await
    }

    async fn list_by_counterparty(
        &self,
        counterparty_id: &str,
    ) -> RepositoryResult<Vec<Transaction>> {
        self.fetch_many(
            &format!(
                "SELECT {COLUMNS} FROM transactions WHERE counterparty_id = $1 ORDER BY created_at DESC, id"
            ),
            &[counterparty_id],
        )
        .await
    }

    async fn first_support(
        &self,
        counterparty_id: &str,
        actor_id: &str,
    ) -> RepositoryResult<Option<Transaction>> {
        let mut rows = self
            .fetch_many(
                &format!(
                    r#"
                    SELECT {COLUMNS} FROM transactions
                    WHERE counterparty_id = $1
                      AND actor_id = $2
                      AND token_type = 'support_token'
                      AND transaction_type = 'withdrawal'
                      AND state = 'success'
                    ORDER BY created_at ASC, id ASC
                    LIMIT 1
                    "#
                ),
                &[counterparty_id, actor_id],
            )
            .await?;

        Ok(rows.pop())
    }

    async fn list_pending_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> RepositoryResult<Vec<Transaction>> {
        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {COLUMNS} FROM transactions WHERE state = 'pending' AND created_at < $1 ORDER BY created_at ASC"
        ))
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        rows.into_iter().map(TransactionRow::into_domain).collect()
    }

    async fn ping(&self) -> RepositoryResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(RepositoryError::from)
    }
}

/// Internal row type for SQLx. Not exposed outside the adapter.
#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: String,
    token_type: String,
    transaction_type: String,
    actor_id: String,
    counterparty_id: Option<String>,
    amount: bigdecimal::BigDecimal,
    created_at: DateTime<Utc>,
    state: String,
    note: Option<String>,
}

impl TransactionRow {
    fn into_domain(self) -> RepositoryResult<Transaction> {
        let corrupt = |e: crate::domain::DomainError| {
            RepositoryError::Corrupt(format!("transaction {}: {}", self.id, e))
        };

        Ok(Transaction {
            token_type: self.token_type.parse().map_err(corrupt)?,
            transaction_type: self.transaction_type.parse().map_err(corrupt)?,
            state: self.state.parse().map_err(corrupt)?,
            id: self.id.clone(),
            actor_id: self.actor_id,
            counterparty_id: self.counterparty_id,
            amount: self.amount,
            timestamp: self.created_at,
            note: self.note,
        })
    }
}
