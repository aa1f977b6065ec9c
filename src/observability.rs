//! Ledger observability.
//!
//! The ledger never logs through ambient globals; it reports through the
//! `LedgerObserver` it was built with. `TracingObserver` is the production
//! implementation.

use std::str::FromStr;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::domain::Transaction;
use crate::services::saga::{Leg, Step};

pub trait LedgerObserver: Send + Sync {
    fn id_collision(&self, candidate: &str);

    fn transfer_started(&self, tx: &Transaction);

    fn leg_committed(&self, tx_id: &str, leg: Leg);

    fn leg_conflict(&self, tx_id: &str, leg: Leg, attempt: usize);

    fn step_failed(&self, tx_id: &str, step: Step, error: &str);

    fn compensation_failed(&self, tx_id: &str, leg: Leg, error: &str);

    /// The terminal state could not be persisted; the record stays pending.
    fn record_left_pending(&self, tx_id: &str, error: &str);

    fn transfer_finished(&self, tx: &Transaction);
}

/// Emits every ledger event as a structured `tracing` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl LedgerObserver for TracingObserver {
    fn id_collision(&self, candidate: &str) {
        tracing::warn!(candidate = %candidate, "Transaction id already taken, regenerating");
    }

    fn transfer_started(&self, tx: &Transaction) {
        tracing::info!(
            transaction_id = %tx.id,
            actor_id = %tx.actor_id,
            counterparty_id = tx.counterparty_id.as_deref().unwrap_or("-"),
            token_type = %tx.token_type,
            transaction_type = %tx.transaction_type,
            amount = %tx.amount,
            "Transfer started"
        );
    }

    fn leg_committed(&self, tx_id: &str, leg: Leg) {
        tracing::debug!(transaction_id = %tx_id, leg = %leg, "Leg committed");
    }

    fn leg_conflict(&self, tx_id: &str, leg: Leg, attempt: usize) {
        tracing::warn!(
            transaction_id = %tx_id,
            leg = %leg,
            attempt,
            "Concurrent balance update, retrying leg"
        );
    }

    fn step_failed(&self, tx_id: &str, step: Step, error: &str) {
        tracing::error!(transaction_id = %tx_id, step = %step, error = %error, "Transfer step failed");
    }

    fn compensation_failed(&self, tx_id: &str, leg: Leg, error: &str) {
        tracing::error!(
            transaction_id = %tx_id,
            leg = %leg,
            error = %error,
            "Compensation failed, manual reconciliation required"
        );
    }

    fn record_left_pending(&self, tx_id: &str, error: &str) {
        tracing::error!(
            transaction_id = %tx_id,
            error = %error,
            "Could not persist terminal state, transaction left pending"
        );
    }

    fn transfer_finished(&self, tx: &Transaction) {
        tracing::info!(
            transaction_id = %tx.id,
            state = %tx.state,
            note = tx.note.as_deref().unwrap_or(""),
            "Transfer finished"
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => anyhow::bail!("LOG_FORMAT must be 'text' or 'json', got '{}'", other),
        }
    }
}

/// Installs the global subscriber. `RUST_LOG` overrides the default `info` filter.
pub fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}
