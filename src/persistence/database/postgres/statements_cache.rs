use std::{collections::BTreeMap, ops::Deref};

use axum::async_trait;
use bb8_postgres::{
    bb8::{self, CustomizeConnection},
    tokio_postgres, PostgresConnectionManager,
};

const COLUMNS: &str = "id, transaction_type, origin_account_id, destination_account_id, \
     credit_id, credit_card_id, debit_card_id, amount, commission, transaction_date";

#[derive(Debug, Clone, Copy, Ord, PartialOrd, Eq, PartialEq)]
pub enum Statement {
    Append,
    ByOriginAccount,
    ByDestinationAccount,
    ByAccount,
    ByCredit,
    ByCreditCard,
    ByDebitCard,
    ByDateRange,
    ByType,
}

impl Statement {
    const ALL: [Self; 9] = [
        Self::Append,
        Self::ByOriginAccount,
        Self::ByDestinationAccount,
        Self::ByAccount,
        Self::ByCredit,
        Self::ByCreditCard,
        Self::ByDebitCard,
        Self::ByDateRange,
        Self::ByType,
    ];

    fn sql(&self) -> String {
        let filter = match self {
            Self::Append => {
                return format!(
                    r#"
                        INSERT INTO transactions (
                            transaction_type,
                            origin_account_id,
                            destination_account_id,
                            credit_id,
                            credit_card_id,
                            debit_card_id,
                            amount,
                            commission,
                            transaction_date
                        )
                        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                        RETURNING {};
                    "#,
                    COLUMNS
                )
            }
            Self::ByOriginAccount => "origin_account_id = $1",
            Self::ByDestinationAccount => "destination_account_id = $1",
            Self::ByAccount => "origin_account_id = $1 OR destination_account_id = $1",
            Self::ByCredit => "credit_id = $1",
            Self::ByCreditCard => "credit_card_id = $1",
            Self::ByDebitCard => "debit_card_id = $1",
            Self::ByDateRange => "transaction_date BETWEEN $1 AND $2",
            Self::ByType => "transaction_type = $1",
        };

        format!(
            "SELECT {} FROM transactions WHERE {} ORDER BY id;",
            COLUMNS, filter
        )
    }
}

#[derive(Debug)]
pub struct Cache;

#[async_trait]
impl CustomizeConnection<Connection, tokio_postgres::Error> for Cache {
    async fn on_acquire(&self, conn: &mut Connection) -> Result<(), tokio_postgres::Error> {
        for statement in Statement::ALL {
            let prepared = conn.prepare(&statement.sql()).await?;
            conn.statements.insert(statement, prepared);
        }

        Ok(())
    }
}

pub struct Connection {
    inner: tokio_postgres::Client,
    pub statements: BTreeMap<Statement, tokio_postgres::Statement>,
}

impl Connection {
    fn new(inner: tokio_postgres::Client) -> Self {
        Self {
            inner,
            statements: Default::default(),
        }
    }
}

impl Deref for Connection {
    type Target = tokio_postgres::Client;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

pub struct ConnectionManager<Tls>
where
    Tls: tokio_postgres::tls::MakeTlsConnect<tokio_postgres::Socket>,
{
    inner: PostgresConnectionManager<Tls>,
}

impl<Tls> ConnectionManager<Tls>
where
    Tls: tokio_postgres::tls::MakeTlsConnect<tokio_postgres::Socket>,
{
    pub fn new(config: tokio_postgres::Config, tls: Tls) -> Self {
        Self {
            inner: PostgresConnectionManager::new(config, tls),
        }
    }
}

#[async_trait]
impl<Tls> bb8::ManageConnection for ConnectionManager<Tls>
where
    Tls: tokio_postgres::tls::MakeTlsConnect<tokio_postgres::Socket>
        + Clone
        + Send
        + Sync
        + 'static,
    <Tls as tokio_postgres::tls::MakeTlsConnect<tokio_postgres::Socket>>::Stream: Send + Sync,
    <Tls as tokio_postgres::tls::MakeTlsConnect<tokio_postgres::Socket>>::TlsConnect: Send,
    <<Tls as tokio_postgres::tls::MakeTlsConnect<tokio_postgres::Socket>>::TlsConnect as tokio_postgres::tls::TlsConnect<tokio_postgres::Socket>>::Future: Send,
{
    type Connection = Connection;
    type Error = tokio_postgres::Error;

    async fn connect(&self) -> Result<Self::Connection, Self::Error> {
        let conn = self.inner.connect().await?;
        Ok(Connection::new(conn))
    }

    async fn is_valid(&self, conn: &mut Self::Connection) -> Result<(), Self::Error> {
        conn.simple_query("").await.map(|_| ())
    }

    fn has_broken(&self, conn: &mut Self::Connection) -> bool {
        self.inner.has_broken(&mut conn.inner)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(
        Statement::ByAccount,
        "WHERE origin_account_id = $1 OR destination_account_id = $1 ORDER BY id"
    )]
    #[case(Statement::ByDateRange, "WHERE transaction_date BETWEEN $1 AND $2 ORDER BY id")]
    fn test_query_sql(#[case] statement: Statement, #[case] expected: &str) {
        let sql = statement.sql();

        assert!(sql.starts_with("SELECT id, transaction_type"));
        assert!(sql.contains(expected), "{}", sql);
    }

    #[test]
    fn test_append_sql_returns_row() {
        let sql = Statement::Append.sql();

        assert!(sql.contains("INSERT INTO transactions"));
        assert!(sql.contains("RETURNING id, transaction_type"));
    }
}
