use std::path::Path;
use std::time::Duration;

use sqlx::migrate::Migrator;
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::config::Config;

/// The two independently owned databases the ledger spans.
#[derive(Clone)]
pub struct Stores {
    /// Users and the transaction log.
    pub private: PgPool,
    /// Channels.
    pub public: PgPool,
}

pub async fn create_pool(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(url)
        .await
}

pub async fn connect(config: &Config) -> Result<Stores, sqlx::Error> {
    let private = create_pool(&config.private_database_url, config.db_max_connections).await?;
    let public = create_pool(&config.public_database_url, config.db_max_connections).await?;
    Ok(Stores { private, public })
}

/// Applies `migrations/private` and `migrations/public` to their databases.
pub async fn run_migrations(stores: &Stores, root: &Path) -> anyhow::Result<()> {
    Migrator::new(root.join("private"))
        .await?
        .run(&stores.private)
        .await?;
    tracing::info!("Private store migrations completed");

    Migrator::new(root.join("public"))
        .await?
        .run(&stores.public)
        .await?;
    tracing::info!("Public store migrations completed");

    Ok(())
}
