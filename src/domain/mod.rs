//! Domain layer.
//! Framework-agnostic ledger entities and their invariants.

pub mod balance;
pub mod transaction;

pub use balance::{BalanceEntity, ChannelBalance, UserBalance};
pub use transaction::{TokenType, Transaction, TransactionState, TransactionType};

use bigdecimal::BigDecimal;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("Insufficient balance: available {available}, requested {requested}")]
    InsufficientBalance {
        available: BigDecimal,
        requested: BigDecimal,
    },

    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition {
        from: TransactionState,
        to: TransactionState,
    },

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Cannot parse {field}: {value}")]
    Parse { field: &'static str, value: String },
}
