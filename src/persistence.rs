pub mod database;
mod ledger;
pub mod memory;

pub use ledger::{Error, Ledger};
