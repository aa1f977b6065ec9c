//! Transfer legs and the failure notes written when a leg cannot complete.

use std::fmt;

use bigdecimal::BigDecimal;

use crate::domain::{DomainError, TokenType, Transaction, TransactionType};
use crate::ports::RepositoryError;
use crate::validation::{validate_id, validate_non_negative_amount, ValidationError};

pub const INSUFFICIENT_BALANCE: &str = "Insufficient balance";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Leg {
    /// Credit the channel's support balance in the public store.
    CounterpartyCredit,
    /// Take tokens from the actor in the private store.
    ActorDebit,
    /// Give tokens to the actor in the private store.
    ActorCredit,
}

impl Leg {
    pub fn as_str(&self) -> &'static str {
        match self {
            Leg::CounterpartyCredit => "counterparty_credit",
            Leg::ActorDebit => "actor_debit",
            Leg::ActorCredit => "actor_credit",
        }
    }
}

impl fmt::Display for Leg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a transfer can fail: one of its balance legs, or persisting
/// `Success` in the transaction log afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    Leg(Leg),
    Finalize,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Leg(leg) => leg.as_str(),
            Step::Finalize => "finalize",
        }
    }
}

impl From<Leg> for Step {
    fn from(leg: Leg) -> Self {
        Step::Leg(leg)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LegError {
    Store(RepositoryError),
    Rejected(DomainError),
}

impl From<RepositoryError> for LegError {
    fn from(err: RepositoryError) -> Self {
        LegError::Store(err)
    }
}

impl From<DomainError> for LegError {
    fn from(err: DomainError) -> Self {
        LegError::Rejected(err)
    }
}

impl fmt::Display for LegError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LegError::Store(e) => write!(f, "{}", e),
            LegError::Rejected(e) => write!(f, "{}", e),
        }
    }
}

/// Which balance legs a request needs, in execution order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferPlan {
    /// Channel credited before the actor leg runs.
    pub channel_id: Option<String>,
    pub actor_leg: Leg,
}

impl TransferPlan {
    /// Rejects malformed requests before anything is persisted.
    pub fn for_request(
        actor_id: &str,
        counterparty_id: Option<&str>,
        token_type: TokenType,
        transaction_type: TransactionType,
        amount: &BigDecimal,
    ) -> Result<Self, ValidationError> {
        validate_id("actor_id", actor_id)?;
        if let Some(counterparty_id) = counterparty_id {
            validate_id("counterparty_id", counterparty_id)?;
        }
        validate_non_negative_amount(amount)?;

        let plan = match (token_type, transaction_type) {
            (TokenType::SupportToken, TransactionType::Withdrawal) => {
                let channel_id = counterparty_id.ok_or_else(|| {
                    ValidationError::new(
                        "counterparty_id",
                        "support withdrawals need a channel",
                    )
                })?;
                TransferPlan {
                    channel_id: Some(channel_id.to_string()),
                    actor_leg: Leg::ActorDebit,
                }
            }
            (TokenType::DownloadToken, TransactionType::Withdrawal) => TransferPlan {
                channel_id: None,
                actor_leg: Leg::ActorDebit,
            },
            (_, TransactionType::Deposit) => TransferPlan {
                channel_id: None,
                actor_leg: Leg::ActorCredit,
            },
        };

        Ok(plan)
    }

    pub fn requires_funds(&self) -> bool {
        self.actor_leg == Leg::ActorDebit
    }

    pub fn legs(&self) -> Vec<Leg> {
        let mut legs = Vec::with_capacity(2);
        if self.channel_id.is_some() {
            legs.push(Leg::CounterpartyCredit);
        }
        legs.push(self.actor_leg);
        legs
    }
}

/// Outcome of undoing one committed leg.
#[derive(Debug, Clone, PartialEq)]
pub struct Compensation {
    pub leg: Leg,
    pub result: Result<(), LegError>,
}

/// Note for a transfer that failed at `failed`. Carries enough detail
/// (ids, amount, which legs were undone) to reconcile by hand if needed.
pub fn failure_note(
    tx: &Transaction,
    failed: Step,
    error: &LegError,
    compensations: &[Compensation],
) -> String {
    let target = tx.counterparty_id.as_deref().unwrap_or("actor account");
    let mut note = match (failed, error) {
        (
            Step::Leg(Leg::ActorDebit),
            LegError::Rejected(DomainError::InsufficientBalance { .. }),
        ) => format!(
            "{}: actor {} cannot cover {} {} for {}",
            INSUFFICIENT_BALANCE, tx.actor_id, tx.amount, tx.token_type, target
        ),
        (Step::Leg(Leg::CounterpartyCredit), _) => format!(
            "Transfer to channel {} failed while crediting {} {}: {}",
            target, tx.amount, tx.token_type, error
        ),
        (Step::Leg(Leg::ActorDebit), _) => format!(
            "Transfer to {} failed while debiting {} {} from actor {}: {}",
            target, tx.amount, tx.token_type, tx.actor_id, error
        ),
        (Step::Leg(Leg::ActorCredit), _) => format!(
            "Credit of {} {} to actor {} failed: {}",
            tx.amount, tx.token_type, tx.actor_id, error
        ),
        (Step::Finalize, _) => format!(
            "Transfer to {} failed while recording success: {}",
            target, error
        ),
    };

    for compensation in compensations {
        match &compensation.result {
            Ok(()) => note.push_str(&format!("; reverted {}", compensation.leg)),
            Err(e) => note.push_str(&format!(
                "; could not revert {} ({}), manual reconciliation required",
                compensation.leg, e
            )),
        }
    }

    note
}
