//! Balance-bearing entities owned by the private (users) and public (channels) stores.

use bigdecimal::{BigDecimal, Zero};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{DomainError, TokenType};

/// Common surface the balance stores need for optimistic concurrency.
pub trait BalanceEntity: Clone + Send + Sync + 'static {
    fn id(&self) -> &str;

    /// Version the entity was read at. Writes succeed only against this version.
    fn version(&self) -> i64;

    fn set_version(&mut self, version: i64);
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserBalance {
    pub user_id: String,
    pub support_tokens: BigDecimal,
    pub download_tokens: BigDecimal,
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

impl UserBalance {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            support_tokens: BigDecimal::zero(),
            download_tokens: BigDecimal::zero(),
            version: 0,
            updated_at: Utc::now(),
        }
    }

    pub fn with_tokens(mut self, token_type: TokenType, amount: BigDecimal) -> Self {
        *self.pool_mut(token_type) = amount;
        self
    }

    pub fn balance(&self, token_type: TokenType) -> &BigDecimal {
        match token_type {
            TokenType::SupportToken => &self.support_tokens,
            TokenType::DownloadToken => &self.download_tokens,
        }
    }

    pub fn has_funds(&self, token_type: TokenType, amount: &BigDecimal) -> bool {
        self.balance(token_type) >= amount
    }

    pub fn debit(&mut self, token_type: TokenType, amount: &BigDecimal) -> Result<(), DomainError> {
        ensure_non_negative(amount)?;
        if !self.has_funds(token_type, amount) {
            return Err(DomainError::InsufficientBalance {
                available: self.balance(token_type).clone(),
                requested: amount.clone(),
            });
        }
        let pool = self.pool_mut(token_type);
        *pool = &*pool - amount;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn credit(&mut self, token_type: TokenType, amount: &BigDecimal) -> Result<(), DomainError> {
        ensure_non_negative(amount)?;
        let pool = self.pool_mut(token_type);
        *pool = &*pool + amount;
        self.updated_at = Utc::now();
        Ok(())
    }

    fn pool_mut(&mut self, token_type: TokenType) -> &mut BigDecimal {
        match token_type {
            TokenType::SupportToken => &mut self.support_tokens,
            TokenType::DownloadToken => &mut self.download_tokens,
        }
    }
}

impl BalanceEntity for UserBalance {
    fn id(&self) -> &str {
        &self.user_id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn set_version(&mut self, version: i64) {
        self.version = version;
    }
}

/// Accumulated support a channel has received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelBalance {
    pub channel_id: String,
    pub support_balance: BigDecimal,
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

impl ChannelBalance {
    pub fn new(channel_id: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            support_balance: BigDecimal::zero(),
            version: 0,
            updated_at: Utc::now(),
        }
    }

    pub fn credit(&mut self, amount: &BigDecimal) -> Result<(), DomainError> {
        ensure_non_negative(amount)?;
        self.support_balance = &self.support_balance + amount;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Takes back a previous credit. The channel may already have spent part of
    /// it, so the balance is allowed to dip below zero.
    pub fn revert_credit(&mut self, amount: &BigDecimal) -> Result<(), DomainError> {
        ensure_non_negative(amount)?;
        self.support_balance = &self.support_balance - amount;
        self.updated_at = Utc::now();
        Ok(())
    }
}

impl BalanceEntity for ChannelBalance {
    fn id(&self) -> &str {
        &self.channel_id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn set_version(&mut self, version: i64) {
        self.version = version;
    }
}

fn ensure_non_negative(amount: &BigDecimal) -> Result<(), DomainError> {
    if amount < &BigDecimal::zero() {
        return Err(DomainError::InvalidAmount(format!(
            "{} is negative",
            amount
        )));
    }
    Ok(())
}
