//! In-memory credit ledger for tests and local runs.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockWriteGuard};

use crate::credit::{
    domain::{CreditAmount, CreditBalance, CreditDomainError, DEFAULT_STARTING_CREDITS, UserId},
    ports::{CreditLedger, CreditLedgerError, CreditLedgerResult},
};

/// Thread-safe in-memory credit ledger.
///
/// Each mutation runs inside a single write-lock critical section, which
/// gives the same all-or-nothing guarantee as the conditional `UPDATE` used
/// by the `PostgreSQL` adapter.
#[derive(Debug, Clone)]
pub struct InMemoryCreditLedger {
    starting_balance: u32,
    accounts: Arc<RwLock<HashMap<UserId, CreditBalance>>>,
}

impl Default for InMemoryCreditLedger {
    fn default() -> Self {
        Self::new(DEFAULT_STARTING_CREDITS)
    }
}

impl InMemoryCreditLedger {
    /// Creates an empty ledger that opens accounts with `starting_balance`.
    #[must_use]
    pub fn new(starting_balance: u32) -> Self {
        Self {
            starting_balance,
            accounts: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Sets an account balance directly, creating the account if needed.
    ///
    /// Intended for fixtures; production code mutates balances only through
    /// [`CreditLedger::deduct`] and [`CreditLedger::grant`].
    ///
    /// # Errors
    ///
    /// Returns a persistence error when lock acquisition fails.
    pub fn seed(&self, user_id: UserId, balance: u32) -> CreditLedgerResult<()> {
        let mut accounts = self.write()?;
        accounts.insert(user_id, CreditBalance::new_account(user_id, balance));
        Ok(())
    }

    fn write(&self) -> CreditLedgerResult<RwLockWriteGuard<'_, HashMap<UserId, CreditBalance>>> {
        self.accounts
            .write()
            .map_err(|err| CreditLedgerError::persistence(std::io::Error::other(err.to_string())))
    }

    fn account_entry<'a>(
        &self,
        accounts: &'a mut HashMap<UserId, CreditBalance>,
        user_id: UserId,
    ) -> &'a mut CreditBalance {
        accounts
            .entry(user_id)
            .or_insert_with(|| CreditBalance::new_account(user_id, self.starting_balance))
    }
}

#[async_trait]
impl CreditLedger for InMemoryCreditLedger {
    async fn balance(&self, user_id: UserId) -> CreditLedgerResult<CreditBalance> {
        let mut accounts = self.write()?;
        Ok(*self.account_entry(&mut accounts, user_id))
    }

    async fn deduct(
        &self,
        user_id: UserId,
        amount: CreditAmount,
    ) -> CreditLedgerResult<CreditBalance> {
        let mut accounts = self.write()?;
        let account = self.account_entry(&mut accounts, user_id);
        account.debit(amount).map_err(|err| match err {
            CreditDomainError::InsufficientCredits {
                requested,
                available,
            } => CreditLedgerError::InsufficientCredits {
                user_id,
                requested,
                available,
            },
            other @ CreditDomainError::ZeroAmount => CreditLedgerError::persistence(other),
        })?;
        Ok(*account)
    }

    async fn grant(
        &self,
        user_id: UserId,
        amount: CreditAmount,
    ) -> CreditLedgerResult<CreditBalance> {
        let mut accounts = self.write()?;
        let account = self.account_entry(&mut accounts, user_id);
        account.credit(amount);
        Ok(*account)
    }

    async fn refund(
        &self,
        user_id: UserId,
        amount: CreditAmount,
    ) -> CreditLedgerResult<CreditBalance> {
        let mut accounts = self.write()?;
        let account = self.account_entry(&mut accounts, user_id);
        account.refund(amount);
        Ok(*account)
    }
}
