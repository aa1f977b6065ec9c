//! Shared fixtures: in-memory stores wrapped with scripted faults.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};

use token_ledger::adapters::{InMemoryBalanceStore, InMemoryTransactionRepository};
use token_ledger::domain::{
    BalanceEntity, ChannelBalance, TokenType, Transaction, UserBalance,
};
use token_ledger::observability::LedgerObserver;
use token_ledger::ports::{
    BalanceStore, BalanceUnitOfWork, RepositoryError, RepositoryResult, TransactionRepository,
};
use token_ledger::services::{IdGenerator, LedgerConfig, Leg, Step, TransactionLedger};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Let the write through.
    Pass,
    /// Fail without writing.
    Fail,
    /// Report an optimistic-concurrency conflict without writing.
    Conflict,
    /// Write, then report failure anyway.
    LandThenFail,
}

/// Outcomes handed out to successive writes; an empty script passes everything.
#[derive(Clone, Default)]
pub struct FaultScript(Arc<Mutex<VecDeque<Fault>>>);

impl FaultScript {
    pub fn push(&self, faults: &[Fault]) {
        self.0.lock().unwrap().extend(faults.iter().copied());
    }

    fn next(&self) -> Fault {
        self.0.lock().unwrap().pop_front().unwrap_or(Fault::Pass)
    }
}

pub struct FaultyBalanceStore<E: BalanceEntity> {
    inner: InMemoryBalanceStore<E>,
    commits: FaultScript,
}

#[async_trait]
impl<E: BalanceEntity> BalanceStore<E> for FaultyBalanceStore<E> {
    async fn begin(&self) -> RepositoryResult<Box<dyn BalanceUnitOfWork<E>>> {
        Ok(Box::new(FaultyUnitOfWork {
            inner: self.inner.begin().await?,
            commits: self.commits.clone(),
        }))
    }
}

struct FaultyUnitOfWork<E: BalanceEntity> {
    inner: Box<dyn BalanceUnitOfWork<E>>,
    commits: FaultScript,
}

#[async_trait]
impl<E: BalanceEntity> BalanceUnitOfWork<E> for FaultyUnitOfWork<E> {
    async fn get_by_id(&mut self, id: &str) -> RepositoryResult<E> {
        self.inner.get_by_id(id).await
    }

    async fn reload(&mut self, entity: &mut E) -> RepositoryResult<()> {
        self.inner.reload(entity).await
    }

    async fn update(&mut self, entity: &E) -> RepositoryResult<()> {
        self.inner.update(entity).await
    }

    async fn commit(&mut self) -> RepositoryResult<()> {
        match self.commits.next() {
            Fault::Pass => self.inner.commit().await,
            Fault::Fail => Err(RepositoryError::Database("connection reset".into())),
            Fault::Conflict => Err(RepositoryError::Conflict("injected".into())),
            Fault::LandThenFail => {
                self.inner.commit().await?;
                Err(RepositoryError::Database("ack lost".into()))
            }
        }
    }
}

pub struct FaultyTransactionRepository {
    inner: InMemoryTransactionRepository,
    updates: FaultScript,
    lookups: FaultScript,
}

#[async_trait]
impl TransactionRepository for FaultyTransactionRepository {
    async fn exists(&self, id: &str) -> RepositoryResult<bool> {
        match self.lookups.next() {
            Fault::Pass => self.inner.exists(id).await,
            _ => Err(RepositoryError::Database("log store unreachable".into())),
        }
    }

    async fn insert(&self, tx: &Transaction) -> RepositoryResult<Transaction> {
        self.inner.insert(tx).await
    }

    async fn update(&self, tx: &Transaction) -> RepositoryResult<Transaction> {
        match self.updates.next() {
            Fault::Pass => self.inner.update(tx).await,
            Fault::Fail => Err(RepositoryError::Database("connection reset".into())),
            Fault::Conflict => Err(RepositoryError::Conflict("injected".into())),
            Fault::LandThenFail => {
                self.inner.update(tx).await?;
                Err(RepositoryError::Database("ack lost".into()))
            }
        }
    }

    async fn get_by_id(&self, id: &str) -> RepositoryResult<Transaction> {
        self.inner.get_by_id(id).await
    }

    async fn list_by_actor(&self, actor_id: &str) -> RepositoryResult<Vec<Transaction>> {
        self.inner.list_by_actor(actor_id).await
    }

    async fn list_by_counterparty(
        &self,
        counterparty_id: &str,
    ) -> RepositoryResult<Vec<Transaction>> {
        self.inner.list_by_counterparty(counterparty_id).await
    }

    async fn first_support(
        &self,
        counterparty_id: &str,
        actor_id: &str,
    ) -> RepositoryResult<Option<Transaction>> {
        self.inner.first_support(counterparty_id, actor_id).await
    }

    async fn list_pending_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> RepositoryResult<Vec<Transaction>> {
        self.inner.list_pending_before(cutoff).await
    }
}

/// Hands out the scripted ids in order, then falls back to `fallback-N`.
#[derive(Default)]
pub struct SequenceIds {
    ids: Mutex<VecDeque<String>>,
    issued: Mutex<usize>,
}

impl SequenceIds {
    pub fn new(ids: &[&str]) -> Self {
        Self {
            ids: Mutex::new(ids.iter().map(|id| id.to_string()).collect()),
            issued: Mutex::new(0),
        }
    }
}

impl IdGenerator for SequenceIds {
    fn next_id(&self) -> String {
        let mut issued = self.issued.lock().unwrap();
        *issued += 1;
        self.ids
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| format!("fallback-{}", issued))
    }
}

/// Always returns the same id.
pub struct FixedId(pub &'static str);

impl IdGenerator for FixedId {
    fn next_id(&self) -> String {
        self.0.to_string()
    }
}

#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<String>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn saw(&self, prefix: &str) -> bool {
        self.events().iter().any(|e| e.starts_with(prefix))
    }

    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl LedgerObserver for RecordingObserver {
    fn id_collision(&self, candidate: &str) {
        self.push(format!("id_collision {}", candidate));
    }

    fn transfer_started(&self, tx: &Transaction) {
        self.push(format!("transfer_started {}", tx.id));
    }

    fn leg_committed(&self, tx_id: &str, leg: Leg) {
        self.push(format!("leg_committed {} {}", tx_id, leg));
    }

    fn leg_conflict(&self, tx_id: &str, leg: Leg, attempt: usize) {
        self.push(format!("leg_conflict {} {} {}", tx_id, leg, attempt));
    }

    fn step_failed(&self, tx_id: &str, step: Step, error: &str) {
        self.push(format!("step_failed {} {} {}", tx_id, step, error));
    }

    fn compensation_failed(&self, tx_id: &str, leg: Leg, error: &str) {
        self.push(format!("compensation_failed {} {} {}", tx_id, leg, error));
    }

    fn record_left_pending(&self, tx_id: &str, error: &str) {
        self.push(format!("record_left_pending {} {}", tx_id, error));
    }

    fn transfer_finished(&self, tx: &Transaction) {
        self.push(format!("transfer_finished {} {}", tx.id, tx.state));
    }
}

pub struct Harness {
    pub ledger: TransactionLedger,
    pub transactions: InMemoryTransactionRepository,
    pub users: InMemoryBalanceStore<UserBalance>,
    pub channels: InMemoryBalanceStore<ChannelBalance>,
    pub user_commits: FaultScript,
    pub channel_commits: FaultScript,
    pub log_updates: FaultScript,
    pub log_lookups: FaultScript,
    pub observer: Arc<RecordingObserver>,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(LedgerConfig::default(), None)
    }

    pub fn with_config(config: LedgerConfig) -> Self {
        Self::build(config, None)
    }

    pub fn with_ids(ids: Arc<dyn IdGenerator>, config: LedgerConfig) -> Self {
        Self::build(config, Some(ids))
    }

    fn build(config: LedgerConfig, ids: Option<Arc<dyn IdGenerator>>) -> Self {
        let transactions = InMemoryTransactionRepository::new();
        let users = InMemoryBalanceStore::new();
        let channels = InMemoryBalanceStore::new();
        let user_commits = FaultScript::default();
        let channel_commits = FaultScript::default();
        let log_updates = FaultScript::default();
        let log_lookups = FaultScript::default();
        let observer = Arc::new(RecordingObserver::default());

        let mut ledger = TransactionLedger::new(
            Arc::new(FaultyTransactionRepository {
                inner: transactions.clone(),
                updates: log_updates.clone(),
                lookups: log_lookups.clone(),
            }),
            Arc::new(FaultyBalanceStore {
                inner: users.clone(),
                commits: user_commits.clone(),
            }),
            Arc::new(FaultyBalanceStore {
                inner: channels.clone(),
                commits: channel_commits.clone(),
            }),
            observer.clone(),
        )
        .with_config(config);

        if let Some(ids) = ids {
            ledger = ledger.with_id_generator(ids);
        }

        Self {
            ledger,
            transactions,
            users,
            channels,
            user_commits,
            channel_commits,
            log_updates,
            log_lookups,
            observer,
        }
    }

    pub async fn seed_user(&self, user_id: &str, support: i64, download: i64) {
        self.users
            .seed(
                UserBalance::new(user_id)
                    .with_tokens(TokenType::SupportToken, BigDecimal::from(support))
                    .with_tokens(TokenType::DownloadToken, BigDecimal::from(download)),
            )
            .await;
    }

    pub async fn seed_channel(&self, channel_id: &str) {
        self.channels.seed(ChannelBalance::new(channel_id)).await;
    }

    pub async fn user(&self, user_id: &str) -> UserBalance {
        self.users.snapshot(user_id).await.unwrap()
    }

    pub async fn channel_balance(&self, channel_id: &str) -> BigDecimal {
        self.channels
            .snapshot(channel_id)
            .await
            .unwrap()
            .support_balance
    }
}
