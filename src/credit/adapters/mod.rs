//! Adapter implementations for the credit ledger port.

pub mod memory;
pub mod postgres;
