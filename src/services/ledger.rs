//! Token transfer ledger.
//!
//! A transfer runs as a saga over two independently durable stores: the
//! channel credit commits in the public store, the actor leg commits in the
//! private store, and the transaction log records the outcome. There is no
//! shared commit. A leg that fails after earlier legs committed triggers
//! compensation of those legs in reverse order, and the record ends `Failed`
//! with a note describing what was undone.

use std::sync::Arc;

use bigdecimal::BigDecimal;
use uuid::Uuid;

use crate::domain::{
    BalanceEntity, ChannelBalance, DomainError, TokenType, Transaction, TransactionState,
    TransactionType, UserBalance,
};
use crate::error::LedgerError;
use crate::observability::LedgerObserver;
use crate::ports::{BalanceStore, RepositoryError, TransactionRepository};
use crate::services::saga::{
    failure_note, Compensation, Leg, LegError, Step, TransferPlan, INSUFFICIENT_BALANCE,
};
use crate::validation::{sanitize_string, validate_max_len, validate_required, NOTE_MAX_LEN};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Candidate ids tried before allocation gives up.
    pub max_id_attempts: usize,
    /// Extra attempts a leg gets after an optimistic-concurrency conflict.
    pub max_conflict_retries: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_id_attempts: 8,
            max_conflict_retries: 3,
        }
    }
}

pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn next_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransferRequest {
    pub actor_id: String,
    pub counterparty_id: Option<String>,
    pub token_type: TokenType,
    pub transaction_type: TransactionType,
    pub amount: BigDecimal,
}

impl TransferRequest {
    /// Spend support tokens on a channel.
    pub fn support(
        actor_id: impl Into<String>,
        channel_id: impl Into<String>,
        amount: BigDecimal,
    ) -> Self {
        Self {
            actor_id: actor_id.into(),
            counterparty_id: Some(channel_id.into()),
            token_type: TokenType::SupportToken,
            transaction_type: TransactionType::Withdrawal,
            amount,
        }
    }

    /// Spend download tokens to unlock a video.
    pub fn download(
        actor_id: impl Into<String>,
        video_id: impl Into<String>,
        amount: BigDecimal,
    ) -> Self {
        Self {
            actor_id: actor_id.into(),
            counterparty_id: Some(video_id.into()),
            token_type: TokenType::DownloadToken,
            transaction_type: TransactionType::Withdrawal,
            amount,
        }
    }

    /// Credit claimed tokens to the actor.
    pub fn claim(actor_id: impl Into<String>, token_type: TokenType, amount: BigDecimal) -> Self {
        Self {
            actor_id: actor_id.into(),
            counterparty_id: None,
            token_type,
            transaction_type: TransactionType::Deposit,
            amount,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct StoreHealth {
    pub transaction_log: bool,
    pub users: bool,
    pub channels: bool,
}

impl StoreHealth {
    pub fn is_healthy(&self) -> bool {
        self.transaction_log && self.users && self.channels
    }
}

pub struct TransactionLedger {
    transactions: Arc<dyn TransactionRepository>,
    users: Arc<dyn BalanceStore<UserBalance>>,
    channels: Arc<dyn BalanceStore<ChannelBalance>>,
    ids: Arc<dyn IdGenerator>,
    observer: Arc<dyn LedgerObserver>,
    config: LedgerConfig,
}

impl TransactionLedger {
    pub fn new(
        transactions: Arc<dyn TransactionRepository>,
        users: Arc<dyn BalanceStore<UserBalance>>,
        channels: Arc<dyn BalanceStore<ChannelBalance>>,
        observer: Arc<dyn LedgerObserver>,
    ) -> Self {
        Self {
            transactions,
            users,
            channels,
            ids: Arc::new(UuidGenerator),
            observer,
            config: LedgerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: LedgerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// Runs one transfer and returns the id of its transaction record.
    ///
    /// Every business outcome (success, insufficient funds, a failing leg)
    /// is reported through the record's state; inspect it with
    /// [`TransactionLedger::get_transaction_by_id`]. An `Err` means the
    /// request was malformed or no record could be written at all.
    pub async fn initiate_transfer(&self, request: TransferRequest) -> Result<String, LedgerError> {
        let plan = TransferPlan::for_request(
            &request.actor_id,
            request.counterparty_id.as_deref(),
            request.token_type,
            request.transaction_type,
            &request.amount,
        )?;

        let tx = self.allocate(request).await?;
        self.observer.transfer_started(&tx);

        let mut actor = None;
        if plan.requires_funds() {
            match self.check_funds(&tx).await {
                Ok(loaded) => actor = Some(loaded),
                Err(note) => return Ok(self.fail(&tx, note).await),
            }
        }

        let mut committed: Vec<Leg> = Vec::new();
        for leg in plan.legs() {
            match self.execute_leg(&tx, &plan, leg, &mut actor).await {
                Ok(()) => {
                    self.observer.leg_committed(&tx.id, leg);
                    committed.push(leg);
                }
                Err(err) => {
                    self.observer.step_failed(&tx.id, leg.into(), &err.to_string());
                    let compensations = self.compensate(&tx, &plan, &committed).await;
                    let note = failure_note(&tx, leg.into(), &err, &compensations);
                    return Ok(self.fail(&tx, note).await);
                }
            }
        }

        self.finalize_success(&tx, &plan, &committed).await;
        Ok(tx.id)
    }

    pub async fn get_transaction_by_id(&self, id: &str) -> Result<Transaction, LedgerError> {
        Ok(self.transactions.get_by_id(id).await?)
    }

    /// Operator action: closes a stuck pending record as `Cancel`.
    pub async fn cancel_pending(&self, id: &str, reason: &str) -> Result<Transaction, LedgerError> {
        let reason = sanitize_string(reason);
        validate_required("reason", &reason)?;
        validate_max_len("reason", &reason, NOTE_MAX_LEN)?;

        let mut tx = self.transactions.get_by_id(id).await?;
        tx.finalize(TransactionState::Cancel, Some(reason))?;
        let stored = self.transactions.update(&tx).await?;
        self.observer.transfer_finished(&stored);
        Ok(stored)
    }

    /// Reachability of the transaction log and both balance stores.
    pub async fn store_health(&self) -> StoreHealth {
        StoreHealth {
            transaction_log: self.transactions.ping().await.is_ok(),
            users: self.users.ping().await.is_ok(),
            channels: self.channels.ping().await.is_ok(),
        }
    }

    async fn allocate(&self, request: TransferRequest) -> Result<Transaction, LedgerError> {
        for _ in 0..self.config.max_id_attempts {
            let candidate = self.ids.next_id();
            if self.transactions.exists(&candidate).await? {
                self.observer.id_collision(&candidate);
                continue;
            }

            let tx = Transaction::pending(
                candidate,
                request.token_type,
                request.transaction_type,
                request.actor_id.clone(),
                request.counterparty_id.clone(),
                request.amount.clone(),
            );

            match self.transactions.insert(&tx).await {
                Ok(stored) => return Ok(stored),
                // Lost the check-then-insert race to another writer.
                Err(RepositoryError::Duplicate(_)) => self.observer.id_collision(&tx.id),
                Err(e) => return Err(e.into()),
            }
        }

        Err(LedgerError::IdAllocation(self.config.max_id_attempts))
    }

    /// Loads the actor and checks the pool covers the amount. `Err` carries
    /// the failure note.
    async fn check_funds(&self, tx: &Transaction) -> Result<UserBalance, String> {
        let loaded = match self.users.begin().await {
            Ok(mut uow) => uow.get_by_id(&tx.actor_id).await,
            Err(e) => Err(e),
        };

        match loaded {
            Ok(actor) if actor.has_funds(tx.token_type, &tx.amount) => Ok(actor),
            Ok(_) => Err(INSUFFICIENT_BALANCE.to_string()),
            Err(RepositoryError::NotFound(_)) => Err(format!("Actor {} not found", tx.actor_id)),
            Err(e) => Err(format!(
                "Could not read balance of actor {}: {}",
                tx.actor_id, e
            )),
        }
    }

    async fn execute_leg(
        &self,
        tx: &Transaction,
        plan: &TransferPlan,
        leg: Leg,
        actor: &mut Option<UserBalance>,
    ) -> Result<(), LegError> {
        let amount = &tx.amount;
        let token_type = tx.token_type;

        match leg {
            Leg::CounterpartyCredit => {
                let channel_id = plan.channel_id.as_deref().unwrap_or_default();
                self.mutate(self.channels.as_ref(), channel_id, None, &tx.id, leg, |channel| {
                    channel.credit(amount)
                })
                .await?;
            }
            Leg::ActorDebit => {
                let updated = self
                    .mutate(self.users.as_ref(), &tx.actor_id, actor.take(), &tx.id, leg, |user| {
                        user.debit(token_type, amount)
                    })
                    .await?;
                *actor = Some(updated);
            }
            Leg::ActorCredit => {
                let updated = self
                    .mutate(self.users.as_ref(), &tx.actor_id, actor.take(), &tx.id, leg, |user| {
                        user.credit(token_type, amount)
                    })
                    .await?;
                *actor = Some(updated);
            }
        }

        Ok(())
    }

    /// Applies `apply` to a freshly read entity and commits it in its own
    /// unit of work. A held entity is reloaded first; a version conflict
    /// restarts the leg with a new unit of work.
    async fn mutate<E, F>(
        &self,
        store: &dyn BalanceStore<E>,
        id: &str,
        held: Option<E>,
        tx_id: &str,
        leg: Leg,
        apply: F,
    ) -> Result<E, LegError>
    where
        E: BalanceEntity,
        F: Fn(&mut E) -> Result<(), DomainError> + Send + Sync,
    {
        let mut held = held;
        let mut attempt = 0;

        loop {
            attempt += 1;
            let mut uow = store.begin().await?;
            let mut entity = match held.take() {
                Some(mut entity) => {
                    uow.reload(&mut entity).await?;
                    entity
                }
                None => uow.get_by_id(id).await?,
            };

            apply(&mut entity)?;

            let written = match uow.update(&entity).await {
                Ok(()) => uow.commit().await,
                Err(e) => Err(e),
            };

            match written {
                Ok(()) => return Ok(entity),
                Err(RepositoryError::Conflict(_)) if attempt <= self.config.max_conflict_retries => {
                    self.observer.leg_conflict(tx_id, leg, attempt);
                    held = Some(entity);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Undoes committed legs, newest first.
    async fn compensate(
        &self,
        tx: &Transaction,
        plan: &TransferPlan,
        committed: &[Leg],
    ) -> Vec<Compensation> {
        let amount = &tx.amount;
        let token_type = tx.token_type;
        let mut outcomes = Vec::with_capacity(committed.len());

        for &leg in committed.iter().rev() {
            let result = match leg {
                Leg::CounterpartyCredit => {
                    let channel_id = plan.channel_id.as_deref().unwrap_or_default();
                    self.mutate(self.channels.as_ref(), channel_id, None, &tx.id, leg, |channel| {
                        channel.revert_credit(amount)
                    })
                    .await
                    .map(|_| ())
                }
                Leg::ActorDebit => self
                    .mutate(self.users.as_ref(), &tx.actor_id, None, &tx.id, leg, |user| {
                        user.credit(token_type, amount)
                    })
                    .await
                    .map(|_| ()),
                Leg::ActorCredit => self
                    .mutate(self.users.as_ref(), &tx.actor_id, None, &tx.id, leg, |user| {
                        user.debit(token_type, amount)
                    })
                    .await
                    .map(|_| ()),
            };

            if let Err(e) = &result {
                self.observer.compensation_failed(&tx.id, leg, &e.to_string());
            }
            outcomes.push(Compensation { leg, result });
        }

        outcomes
    }

    async fn finalize_success(&self, tx: &Transaction, plan: &TransferPlan, committed: &[Leg]) {
        let mut done = tx.clone();
        if let Err(e) = done.finalize(TransactionState::Success, None) {
            self.observer.record_left_pending(&tx.id, &e.to_string());
            return;
        }

        let err = match self.transactions.update(&done).await {
            Ok(stored) => {
                self.observer.transfer_finished(&stored);
                return;
            }
            Err(err) => err,
        };
        self.observer.step_failed(&tx.id, Step::Finalize, &err.to_string());

        // The write may have landed before the error surfaced; trust only a fresh read.
        match self.transactions.get_by_id(&tx.id).await {
            Ok(current) if current.state == TransactionState::Success => {
                self.observer.transfer_finished(&current);
            }
            Ok(current) if current.state.is_terminal() => {
                // Closed by someone else (an operator cancel) while legs were running.
                let compensations = self.compensate(tx, plan, committed).await;
                if compensations.iter().any(|c| c.result.is_err()) {
                    self.observer.record_left_pending(
                        &tx.id,
                        &format!("record is {} but compensation is incomplete", current.state),
                    );
                }
                self.observer.transfer_finished(&current);
            }
            Ok(_) => {
                let compensations = self.compensate(tx, plan, committed).await;
                let note = failure_note(tx, Step::Finalize, &LegError::Store(err), &compensations);
                self.fail(tx, note).await;
            }
            Err(read_err) => {
                // Outcome unknown: leave balances alone and keep the record pending.
                self.observer.record_left_pending(
                    &tx.id,
                    &format!("finalize failed ({}); re-read failed ({})", err, read_err),
                );
            }
        }
    }

    /// Records `Failed` with `note` on a fresh copy of the record and returns its id.
    async fn fail(&self, tx: &Transaction, note: String) -> String {
        let mut current = match self.transactions.get_by_id(&tx.id).await {
            Ok(current) => current,
            Err(_) => tx.clone(),
        };

        if current.state.is_terminal() {
            self.observer.transfer_finished(&current);
            return tx.id.clone();
        }

        if let Err(e) = current.finalize(TransactionState::Failed, Some(note)) {
            self.observer.record_left_pending(&tx.id, &e.to_string());
            return tx.id.clone();
        }

        match self.transactions.update(&current).await {
            Ok(stored) => self.observer.transfer_finished(&stored),
            Err(e) => self.observer.record_left_pending(&tx.id, &e.to_string()),
        }

        tx.id.clone()
    }
}
