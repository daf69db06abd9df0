use crate::models::{LedgerQuery, TransactionRecord};
use axum::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("ledger connection unavailable")]
    Connection,
    #[error("{0}")]
    Internal(String),
}

/// Append-only store of processed transactions.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Stores the record and returns it with its id assigned.
    async fn append(&self, record: TransactionRecord) -> Result<TransactionRecord, Error>;

    /// Records matching the query, oldest first.
    async fn find(&self, query: &LedgerQuery) -> Result<Vec<TransactionRecord>, Error>;
}
