mod postgres;

pub use postgres::ledger::PostgresLedger;
