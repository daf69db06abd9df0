use super::{Error, Ledger};
use crate::models::{LedgerQuery, TransactionRecord};
use axum::async_trait;
use tokio::sync::RwLock;

/// Ledger kept in process memory. Ids start at 1 and grow by one per append.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    records: RwLock<Vec<TransactionRecord>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn append(&self, mut record: TransactionRecord) -> Result<TransactionRecord, Error> {
        let mut records = self.records.write().await;
        record.id = Some(records.len() as i64 + 1);
        records.push(record.clone());

        Ok(record)
    }

    async fn find(&self, query: &LedgerQuery) -> Result<Vec<TransactionRecord>, Error> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|record| query.matches(record))
            .cloned()
            .collect())
    }
}
