//! `PostgreSQL` adapter for the credit ledger.

mod ledger;
mod models;
mod schema;

pub use ledger::{CreditPgPool, PostgresCreditLedger};
