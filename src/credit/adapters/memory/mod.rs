//! In-memory credit ledger.

mod ledger;

pub use ledger::InMemoryCreditLedger;
