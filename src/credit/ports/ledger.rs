//! Ledger port for atomic credit checks, deductions, grants and refunds.

use crate::credit::domain::{CreditAmount, CreditBalance, CreditCheck, UserId};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for credit ledger operations.
pub type CreditLedgerResult<T> = Result<T, CreditLedgerError>;

/// Credit ledger contract.
///
/// Every operation creates the account with the adapter's starting balance
/// when the user has never been seen before. Implementations must perform
/// [`CreditLedger::deduct`] as a single atomic conditional decrement: two
/// concurrent callers may never both succeed when the balance only covers
/// one of them.
#[async_trait]
pub trait CreditLedger: Send + Sync {
    /// Returns the current account snapshot.
    async fn balance(&self, user_id: UserId) -> CreditLedgerResult<CreditBalance>;

    /// Removes `amount` credits from the account.
    ///
    /// # Errors
    ///
    /// Returns [`CreditLedgerError::InsufficientCredits`] without modifying
    /// the balance when the account cannot cover `amount`.
    async fn deduct(&self, user_id: UserId, amount: CreditAmount)
    -> CreditLedgerResult<CreditBalance>;

    /// Adds `amount` credits to the account.
    async fn grant(&self, user_id: UserId, amount: CreditAmount)
    -> CreditLedgerResult<CreditBalance>;

    /// Returns `amount` credits taken by an earlier [`CreditLedger::deduct`]
    /// and removes them from the lifetime usage.
    async fn refund(&self, user_id: UserId, amount: CreditAmount)
    -> CreditLedgerResult<CreditBalance>;

    /// Reports whether the user has credits left and how many.
    async fn check_credits(&self, user_id: UserId) -> CreditLedgerResult<CreditCheck> {
        let account = self.balance(user_id).await?;
        Ok(CreditCheck::from(&account))
    }
}

/// Errors returned by credit ledger implementations.
#[derive(Debug, Clone, Error)]
pub enum CreditLedgerError {
    /// The account balance does not cover the requested deduction.
    #[error("user {user_id} has {available} credits, {requested} required")]
    InsufficientCredits {
        /// Account owner.
        user_id: UserId,
        /// Credits requested.
        requested: u32,
        /// Credits available when the deduction was attempted.
        available: u32,
    },

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl CreditLedgerError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
