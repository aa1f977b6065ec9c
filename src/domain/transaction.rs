//! Transaction domain entity.
//! The unit of audit: one record per attempted token transfer.

use std::fmt;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::DomainError;

/// Which balance pool a transaction touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    SupportToken,
    DownloadToken,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::SupportToken => "support_token",
            TokenType::DownloadToken => "download_token",
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "support_token" => Ok(TokenType::SupportToken),
            "download_token" => Ok(TokenType::DownloadToken),
            other => Err(DomainError::Parse {
                field: "token_type",
                value: other.to_string(),
            }),
        }
    }
}

/// Direction of a transfer relative to the actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// Tokens leave the actor's pool.
    Withdrawal,
    /// Tokens are credited to the actor's pool.
    Deposit,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Withdrawal => "withdrawal",
            TransactionType::Deposit => "deposit",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "withdrawal" => Ok(TransactionType::Withdrawal),
            "deposit" => Ok(TransactionType::Deposit),
            other => Err(DomainError::Parse {
                field: "transaction_type",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionState {
    Unknown,
    Pending,
    Success,
    Cancel,
    Failed,
}

impl TransactionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionState::Unknown => "unknown",
            TransactionState::Pending => "pending",
            TransactionState::Success => "success",
            TransactionState::Cancel => "cancel",
            TransactionState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionState::Success | TransactionState::Cancel | TransactionState::Failed
        )
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionState {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unknown" => Ok(TransactionState::Unknown),
            "pending" => Ok(TransactionState::Pending),
            "success" => Ok(TransactionState::Success),
            "cancel" => Ok(TransactionState::Cancel),
            "failed" => Ok(TransactionState::Failed),
            other => Err(DomainError::Parse {
                field: "state",
                value: other.to_string(),
            }),
        }
    }
}

/// Domain entity representing a token transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub token_type: TokenType,
    pub transaction_type: TransactionType,
    pub actor_id: String,
    pub counterparty_id: Option<String>,
    pub amount: BigDecimal,
    pub timestamp: DateTime<Utc>,
    pub state: TransactionState,
    pub note: Option<String>,
}

impl Transaction {
    /// Builds a freshly allocated record in `Pending` state stamped with the current time.
    pub fn pending(
        id: String,
        token_type: TokenType,
        transaction_type: TransactionType,
        actor_id: String,
        counterparty_id: Option<String>,
        amount: BigDecimal,
    ) -> Self {
        Self {
            id,
            token_type,
            transaction_type,
            actor_id,
            counterparty_id,
            amount,
            timestamp: Utc::now(),
            state: TransactionState::Pending,
            note: None,
        }
    }

    /// Moves a pending record to a terminal state.
    ///
    /// Only `Pending -> {Success, Failed, Cancel}` is accepted. The note is
    /// dropped for `Success`.
    pub fn finalize(
        &mut self,
        state: TransactionState,
        note: Option<String>,
    ) -> Result<(), DomainError> {
        if self.state != TransactionState::Pending || !state.is_terminal() {
            return Err(DomainError::InvalidTransition {
                from: self.state,
                to: state,
            });
        }

        self.state = state;
        self.note = match state {
            TransactionState::Success => None,
            _ => note,
        };
        Ok(())
    }

    /// Support kind: a support-token withdrawal towards a channel.
    pub fn is_support(&self) -> bool {
        self.token_type == TokenType::SupportToken
            && self.transaction_type == TransactionType::Withdrawal
            && self.counterparty_id.is_some()
    }
}
