//! Storage adapters implementing the ports.

pub mod memory;
pub mod postgres_balance_store;
pub mod postgres_transaction_repository;

pub use memory::{InMemoryBalanceStore, InMemoryTransactionRepository};
pub use postgres_balance_store::{PostgresChannelStore, PostgresUserStore};
pub use postgres_transaction_repository::PostgresTransactionRepository;
