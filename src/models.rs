mod resource;
mod transaction;

pub use resource::{Account, Credit, CreditCard, Resource, ResourceKind, Status};
pub use transaction::{LedgerQuery, TransactionRecord, TransactionRequest, TransactionType};
