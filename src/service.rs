use crate::{
    dispatcher::Processed,
    error::ProcessError,
    models::{LedgerQuery, TransactionRecord, TransactionRequest},
    resilience::{CircuitStatus, ResilientDispatcher},
};
use axum::async_trait;

/// Everything the HTTP layer needs from the core.
#[async_trait]
pub trait TransactionService: Send + Sync {
    async fn process(&self, request: TransactionRequest) -> Result<Processed, ProcessError>;

    async fn history(&self, query: LedgerQuery) -> Result<Vec<TransactionRecord>, ProcessError>;

    fn circuits(&self) -> Vec<CircuitStatus>;

    fn reset_circuit(&self, name: &str) -> bool;
}

#[async_trait]
impl TransactionService for ResilientDispatcher {
    async fn process(&self, request: TransactionRequest) -> Result<Processed, ProcessError> {
        ResilientDispatcher::process(self, request).await
    }

    async fn history(&self, query: LedgerQuery) -> Result<Vec<TransactionRecord>, ProcessError> {
        Ok(self.dispatcher().ledger().find(&query).await?)
    }

    fn circuits(&self) -> Vec<CircuitStatus> {
        ResilientDispatcher::circuits(self)
    }

    fn reset_circuit(&self, name: &str) -> bool {
        self.reset(name)
    }
}
