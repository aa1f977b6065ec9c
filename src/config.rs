use anyhow::Context;
use dotenvy::dotenv;
use std::env;

use crate::observability::LogFormat;
use crate::services::LedgerConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    /// Users and the transaction log.
    pub private_database_url: String,
    /// Channels.
    pub public_database_url: String,
    pub db_max_connections: u32,
    pub ledger: LedgerConfig,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = LedgerConfig::default();

        Ok(Config {
            server_port: parse_or(&lookup, "SERVER_PORT", 3000)?,
            private_database_url: lookup("PRIVATE_DATABASE_URL")
                .context("PRIVATE_DATABASE_URL must be set")?,
            public_database_url: lookup("PUBLIC_DATABASE_URL")
                .context("PUBLIC_DATABASE_URL must be set")?,
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 5)?,
            ledger: LedgerConfig {
                max_id_attempts: parse_or(
                    &lookup,
                    "LEDGER_MAX_ID_ATTEMPTS",
                    defaults.max_id_attempts,
                )?,
                max_conflict_retries: parse_or(
                    &lookup,
                    "LEDGER_MAX_CONFLICT_RETRIES",
                    defaults.max_conflict_retries,
                )?,
            },
            log_format: match lookup("LOG_FORMAT") {
                Some(raw) => raw.parse()?,
                None => LogFormat::default(),
            },
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value '{}'", key, raw)),
        None => Ok(default),
    }
}
