pub mod ledger;
mod statements_cache;
