//! Port contracts for credit accounting.

pub mod ledger;

pub use ledger::{CreditLedger, CreditLedgerError, CreditLedgerResult};
