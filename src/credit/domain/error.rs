//! Error types for credit domain validation.

use thiserror::Error;

/// Errors returned while constructing or mutating credit values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CreditDomainError {
    /// Credit amounts must be positive.
    #[error("credit amount must be greater than zero")]
    ZeroAmount,

    /// The balance does not cover the requested debit.
    #[error("insufficient credits: requested {requested}, available {available}")]
    InsufficientCredits {
        /// Credits requested by the debit.
        requested: u32,
        /// Credits available at the time of the debit.
        available: u32,
    },
}
