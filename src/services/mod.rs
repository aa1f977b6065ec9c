pub mod ledger;
pub mod query;
pub mod saga;

pub use ledger::{
    IdGenerator, LedgerConfig, StoreHealth, TransactionLedger, TransferRequest, UuidGenerator,
};
pub use query::TransactionQueryService;
pub use saga::{Leg, Step, INSUFFICIENT_BALANCE};
