//! Credit account balance and amount types.

use super::{CreditDomainError, UserId};
use serde::{Deserialize, Serialize};

/// Balance assigned to an account the first time it is accessed.
pub const DEFAULT_STARTING_CREDITS: u32 = 10;

/// Positive number of credits to move in a single ledger operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CreditAmount(u32);

impl CreditAmount {
    /// Creates a validated credit amount.
    ///
    /// # Errors
    ///
    /// Returns [`CreditDomainError::ZeroAmount`] when `value` is zero.
    pub const fn new(value: u32) -> Result<Self, CreditDomainError> {
        if value == 0 {
            return Err(CreditDomainError::ZeroAmount);
        }
        Ok(Self(value))
    }

    /// Returns the number of credits.
    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }
}

/// Snapshot of a user's credit account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditBalance {
    user_id: UserId,
    balance: u32,
    lifetime_used: u64,
}

impl CreditBalance {
    /// Creates a fresh account holding `starting_balance` credits.
    #[must_use]
    pub const fn new_account(user_id: UserId, starting_balance: u32) -> Self {
        Self {
            user_id,
            balance: starting_balance,
            lifetime_used: 0,
        }
    }

    /// Reconstructs an account from persisted storage.
    #[must_use]
    pub const fn from_persisted(user_id: UserId, balance: u32, lifetime_used: u64) -> Self {
        Self {
            user_id,
            balance,
            lifetime_used,
        }
    }

    /// Returns the owning user.
    #[must_use]
    pub const fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Returns the spendable balance.
    #[must_use]
    pub const fn balance(&self) -> u32 {
        self.balance
    }

    /// Returns the number of credits spent over the account lifetime.
    #[must_use]
    pub const fn lifetime_used(&self) -> u64 {
        self.lifetime_used
    }

    /// Returns `true` when the balance covers `amount`.
    #[must_use]
    pub const fn covers(&self, amount: CreditAmount) -> bool {
        self.balance >= amount.value()
    }

    /// Removes `amount` from the balance.
    ///
    /// The balance is left untouched when the debit fails.
    ///
    /// # Errors
    ///
    /// Returns [`CreditDomainError::InsufficientCredits`] when the balance is
    /// lower than `amount`.
    pub fn debit(&mut self, amount: CreditAmount) -> Result<(), CreditDomainError> {
        let Some(remaining) = self.balance.checked_sub(amount.value()) else {
            return Err(CreditDomainError::InsufficientCredits {
                requested: amount.value(),
                available: self.balance,
            });
        };
        self.balance = remaining;
        self.lifetime_used = self.lifetime_used.saturating_add(u64::from(amount.value()));
        Ok(())
    }

    /// Adds `amount` to the balance, saturating at `u32::MAX`.
    pub const fn credit(&mut self, amount: CreditAmount) {
        self.balance = self.balance.saturating_add(amount.value());
    }

    /// Returns a previously debited `amount`, reversing both the balance and
    /// the lifetime usage. Usage never drops below zero.
    pub fn refund(&mut self, amount: CreditAmount) {
        self.balance = self.balance.saturating_add(amount.value());
        self.lifetime_used = self.lifetime_used.saturating_sub(u64::from(amount.value()));
    }
}

/// Result of a credit availability check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditCheck {
    /// Whether at least one credit is available.
    pub has_credits: bool,
    /// Current spendable balance.
    pub balance: u32,
}

impl CreditCheck {
    /// Returns `true` when the checked balance covers `units` credits.
    #[must_use]
    pub const fn covers(&self, units: u32) -> bool {
        self.balance >= units
    }
}

impl From<&CreditBalance> for CreditCheck {
    fn from(account: &CreditBalance) -> Self {
        Self {
            has_credits: account.balance() > 0,
            balance: account.balance(),
        }
    }
}
