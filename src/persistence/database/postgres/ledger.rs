use super::statements_cache::{self, Statement};
use crate::{
    models::{LedgerQuery, TransactionRecord},
    persistence::{Error, Ledger},
    telemetry,
};
use axum::async_trait;
use bb8_postgres::{
    bb8::{self, Pool, PooledConnection},
    tokio_postgres::{self, types::ToSql},
};
use std::{str::FromStr, time::Duration};

type Param<'a> = &'a (dyn ToSql + Sync);

#[derive(Clone)]
pub struct PostgresLedger {
    pool: Pool<statements_cache::ConnectionManager<tokio_postgres::NoTls>>,
}

impl PostgresLedger {
    pub async fn new(url: &str, pool_size: u32) -> Result<Self, Error> {
        let manager = statements_cache::ConnectionManager::new(
            tokio_postgres::Config::from_str(url)?,
            tokio_postgres::NoTls,
        );

        let pool = Pool::builder()
            .max_size(pool_size)
            .min_idle(Some(pool_size))
            .connection_customizer(Box::new(statements_cache::Cache))
            .connection_timeout(Duration::from_secs(5))
            .build(manager)
            .await?;

        Ok(Self { pool })
    }

    pub async fn connection(
        &self,
    ) -> Result<
        PooledConnection<'_, statements_cache::ConnectionManager<tokio_postgres::NoTls>>,
        Error,
    > {
        let conn = self.pool.get().await?;
        Ok(conn)
    }
}

#[async_trait]
impl Ledger for PostgresLedger {
    async fn append(&self, record: TransactionRecord) -> Result<TransactionRecord, Error> {
        let conn = self.connection().await?;

        let row = conn
            .query_one(
                conn.statements
                    .get(&Statement::Append)
                    .ok_or(Error::Internal("Statement not found".into()))?,
                &[
                    &record.transaction_type,
                    &record.origin_account_id,
                    &record.destination_account_id,
                    &record.credit_id,
                    &record.credit_card_id,
                    &record.debit_card_id,
                    &record.amount,
                    &record.commission,
                    &record.transaction_date,
                ],
            )
            .await?;

        row.try_into()
    }

    async fn find(&self, query: &LedgerQuery) -> Result<Vec<TransactionRecord>, Error> {
        let conn = self.connection().await?;

        let (statement, params): (Statement, Vec<Param>) = match query {
            LedgerQuery::ByOriginAccount(id) => (Statement::ByOriginAccount, vec![id as Param]),
            LedgerQuery::ByDestinationAccount(id) => {
                (Statement::ByDestinationAccount, vec![id as Param])
            }
            LedgerQuery::ByAccount(id) => (Statement::ByAccount, vec![id as Param]),
            LedgerQuery::ByCredit(id) => (Statement::ByCredit, vec![id as Param]),
            LedgerQuery::ByCreditCard(id) => (Statement::ByCreditCard, vec![id as Param]),
            LedgerQuery::ByDebitCard(id) => (Statement::ByDebitCard, vec![id as Param]),
            LedgerQuery::ByDateRange { from, to } => {
                (Statement::ByDateRange, vec![from as Param, to as Param])
            }
            LedgerQuery::ByType(kind) => (Statement::ByType, vec![kind as Param]),
        };

        let rows = conn
            .query(
                conn.statements
                    .get(&statement)
                    .ok_or(Error::Internal("Statement not found".into()))?,
                &params,
            )
            .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}

impl TryFrom<tokio_postgres::Row> for TransactionRecord {
    type Error = Error;

    fn try_from(row: tokio_postgres::Row) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Some(row.try_get("id")?),
            transaction_type: row.try_get("transaction_type")?,
            origin_account_id: row.try_get("origin_account_id")?,
            destination_account_id: row.try_get("destination_account_id")?,
            credit_id: row.try_get("credit_id")?,
            credit_card_id: row.try_get("credit_card_id")?,
            debit_card_id: row.try_get("debit_card_id")?,
            amount: row.try_get("amount")?,
            commission: row.try_get("commission")?,
            transaction_date: row.try_get("transaction_date")?,
        })
    }
}

impl From<bb8::RunError<tokio_postgres::Error>> for Error {
    fn from(err: bb8::RunError<tokio_postgres::Error>) -> Self {
        telemetry::error!("Postgres error: {:?}", err);

        match err {
            bb8::RunError::User(e) => Self::Internal(e.to_string()),
            bb8::RunError::TimedOut => Self::Connection,
        }
    }
}

impl From<tokio_postgres::Error> for Error {
    fn from(err: tokio_postgres::Error) -> Self {
        telemetry::error!("Postgres error: {:?}", err);

        Self::Internal(err.to_string())
    }
}
