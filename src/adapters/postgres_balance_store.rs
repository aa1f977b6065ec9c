//! Postgres implementation of the balance stores.
//!
//! Users live in the private database, channels in the public one. Each unit
//! of work owns one database transaction; writes are guarded by the row
//! `version` the entity was read at.

use std::marker::PhantomData;

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool, Postgres};

use crate::domain::{BalanceEntity, ChannelBalance, UserBalance};
use crate::ports::{BalanceStore, BalanceUnitOfWork, RepositoryError, RepositoryResult};

/// Row mapping for a versioned balance table.
#[async_trait]
pub trait BalanceTable: BalanceEntity + Sized {
    const TABLE: &'static str;

    async fn fetch(conn: &mut PgConnection, id: &str) -> Result<Option<Self>, sqlx::Error>;

    /// Writes the entity if the stored version still matches; returns rows affected.
    async fn write(conn: &mut PgConnection, entity: &Self) -> Result<u64, sqlx::Error>;
}

#[async_trait]
impl BalanceTable for UserBalance {
    const TABLE: &'static str = "users";

    async fn fetch(conn: &mut PgConnection, id: &str) -> Result<Option<Self>, sqlx::Error> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT user_id, support_tokens, download_tokens, version, updated_at FROM users WHERE user_id = $1",
        )
        .bind(id)
        .fetch_optional(conn)
        .await?;

        Ok(row.map(|r| UserBalance {
            user_id: r.user_id,
            support_tokens: r.support_tokens,
            download_tokens: r.download_tokens,
            version: r.version,
            updated_at: r.updated_at,
        }))
    }

    async fn write(conn: &mut PgConnection, entity: &Self) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET support_tokens = $2, download_tokens = $3, updated_at = $4, version = version + 1
            WHERE user_id = $1 AND version = $5
            "#,
        )
        .bind(&entity.user_id)
        .bind(&entity.support_tokens)
        .bind(&entity.download_tokens)
        .bind(entity.updated_at)
        .bind(entity.version)
        .execute(conn)
        .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl BalanceTable for ChannelBalance {
    const TABLE: &'static str = "channels";

    async fn fetch(conn: &mut PgConnection, id: &str) -> Result<Option<Self>, sqlx::Error> {
        let row = sqlx::query_as::<_, ChannelRow>(
            "SELECT channel_id, support_balance, version, updated_at FROM channels WHERE channel_id = $1",
        )
        .bind(id)
        .fetch_optional(conn)
        .await?;

        Ok(row.map(|r| ChannelBalance {
            channel_id: r.channel_id,
            support_balance: r.support_balance,
            version: r.version,
            updated_at: r.updated_at,
        }))
    }

    async fn write(conn: &mut PgConnection, entity: &Self) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE channels
            SET support_balance = $2, updated_at = $3, version = version + 1
            WHERE channel_id = $1 AND version = $4
            "#,
        )
        .bind(&entity.channel_id)
        .bind(&entity.support_balance)
        .bind(entity.updated_at)
        .bind(entity.version)
        .execute(conn)
        .await?;

        Ok(result.rows_affected())
    }
}

pub type PostgresUserStore = PostgresBalanceStore<UserBalance>;
pub type PostgresChannelStore = PostgresBalanceStore<ChannelBalance>;

#[derive(Clone)]
pub struct PostgresBalanceStore<E> {
    pool: PgPool,
    _entity: PhantomData<fn() -> E>,
}

impl<E: BalanceTable> PostgresBalanceStore<E> {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            _entity: PhantomData,
        }
    }
}

#[async_trait]
impl<E: BalanceTable> BalanceStore<E> for PostgresBalanceStore<E> {
    async fn begin(&self) -> RepositoryResult<Box<dyn BalanceUnitOfWork<E>>> {
        let tx = self.pool.begin().await.map_err(RepositoryError::from)?;
        Ok(Box::new(PostgresUnitOfWork {
            tx: Some(tx),
            _entity: PhantomData,
        }))
    }

    async fn ping(&self) -> RepositoryResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(RepositoryError::from)
    }
}

struct PostgresUnitOfWork<E> {
    tx: Option<sqlx::Transaction<'static, Postgres>>,
    _entity: PhantomData<fn() -> E>,
}

impl<E> PostgresUnitOfWork<E> {
    fn conn(&mut self) -> RepositoryResult<&mut PgConnection> {
        self.tx
            .as_deref_mut()
            .ok_or_else(|| RepositoryError::Database("unit of work already committed".to_string()))
    }
}

#[async_trait]
impl<E: BalanceTable> BalanceUnitOfWork<E> for PostgresUnitOfWork<E> {
    async fn get_by_id(&mut self, id: &str) -> RepositoryResult<E> {
        let conn = self.conn()?;
        E::fetch(conn, id)
            .await
            .map_err(RepositoryError::from)?
            .ok_or_else(|| RepositoryError::NotFound(format!("{} {}", E::TABLE, id)))
    }

    async fn reload(&mut self, entity: &mut E) -> RepositoryResult<()> {
        let id = entity.id().to_string();
        *entity = self.get_by_id(&id).await?;
        Ok(())
    }

    async fn update(&mut self, entity: &E) -> RepositoryResult<()> {
        let conn = self.conn()?;
        let affected = E::write(conn, entity).await.map_err(RepositoryError::from)?;
        if affected == 0 {
            return Err(RepositoryError::Conflict(format!(
                "{} {} changed since version {}",
                E::TABLE,
                entity.id(),
                entity.version()
            )));
        }
        Ok(())
    }

    async fn commit(&mut self) -> RepositoryResult<()> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| RepositoryError::Database("unit of work already committed".to_string()))?;
        tx.commit().await.map_err(RepositoryError::from)
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    user_id: String,
    support_tokens: bigdecimal::BigDecimal,
    download_tokens: bigdecimal::BigDecimal,
    version: i64,
    updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(sqlx::FromRow)]
struct ChannelRow {
    channel_id: String,
    support_balance: bigdecimal::BigDecimal,
    version: i64,
    updated_at: chrono::DateTime<chrono::Utc>,
}
