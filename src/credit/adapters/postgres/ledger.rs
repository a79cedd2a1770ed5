//! `PostgreSQL` credit ledger using conditional single-statement updates.

use super::{
    models::{CreditAccountRow, NewCreditAccountRow},
    schema::credit_accounts,
};
use crate::credit::{
    domain::{CreditAmount, CreditBalance, UserId},
    ports::{CreditLedger, CreditLedgerError, CreditLedgerResult},
};
use async_trait::async_trait;
use chrono::Utc;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};

/// `PostgreSQL` connection pool type used by the credit ledger.
pub type CreditPgPool = Pool<ConnectionManager<PgConnection>>;

/// `PostgreSQL`-backed credit ledger.
///
/// Deductions are a single `UPDATE … WHERE balance >= amount RETURNING …`
/// statement, so the database serialises concurrent spenders on the row
/// lock and no read-modify-write happens in application code.
#[derive(Debug, Clone)]
pub struct PostgresCreditLedger {
    pool: CreditPgPool,
    starting_balance: u32,
}

impl PostgresCreditLedger {
    /// Creates a ledger that opens accounts with `starting_balance` credits.
    #[must_use]
    pub const fn new(pool: CreditPgPool, starting_balance: u32) -> Self {
        Self {
            pool,
            starting_balance,
        }
    }

    async fn run_blocking<F, T>(&self, f: F) -> CreditLedgerResult<T>
    where
        F: FnOnce(&mut PgConnection) -> CreditLedgerResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(CreditLedgerError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(CreditLedgerError::persistence)?
    }
}

impl From<diesel::result::Error> for CreditLedgerError {
    fn from(err: diesel::result::Error) -> Self {
        Self::persistence(err)
    }
}

#[async_trait]
impl CreditLedger for PostgresCreditLedger {
    async fn balance(&self, user_id: UserId) -> CreditLedgerResult<CreditBalance> {
        let starting_balance = to_column_amount(self.starting_balance)?;
        self.run_blocking(move |connection| {
            ensure_account(connection, user_id, starting_balance)?;
            let row = load_account(connection, user_id)?;
            row_to_balance(row)
        })
        .await
    }

    async fn deduct(
        &self,
        user_id: UserId,
        amount: CreditAmount,
    ) -> CreditLedgerResult<CreditBalance> {
        let starting_balance = to_column_amount(self.starting_balance)?;
        let delta = to_column_amount(amount.value())?;
        self.run_blocking(move |connection| {
            ensure_account(connection, user_id, starting_balance)?;
            let updated = diesel::update(
                credit_accounts::table
                    .filter(credit_accounts::user_id.eq(user_id.into_inner()))
                    .filter(credit_accounts::balance.ge(delta)),
            )
            .set((
                credit_accounts::balance.eq(credit_accounts::balance - delta),
                credit_accounts::lifetime_used
                    .eq(credit_accounts::lifetime_used + i64::from(delta)),
                credit_accounts::updated_at.eq(Utc::now()),
            ))
            .returning(CreditAccountRow::as_returning())
            .get_result::<CreditAccountRow>(connection)
            .optional()
            .map_err(CreditLedgerError::persistence)?;

            if let Some(row) = updated {
                return row_to_balance(row);
            }

            let current = row_to_balance(load_account(connection, user_id)?)?;
            Err(CreditLedgerError::InsufficientCredits {
                user_id,
                requested: amount.value(),
                available: current.balance(),
            })
        })
        .await
    }

    async fn grant(
        &self,
        user_id: UserId,
        amount: CreditAmount,
    ) -> CreditLedgerResult<CreditBalance> {
        let starting_balance = to_column_amount(self.starting_balance)?;
        let delta = to_column_amount(amount.value())?;
        self.run_blocking(move |connection| {
            ensure_account(connection, user_id, starting_balance)?;
            let row = diesel::update(
                credit_accounts::table.filter(credit_accounts::user_id.eq(user_id.into_inner())),
            )
            .set((
                credit_accounts::balance.eq(credit_accounts::balance + delta),
                credit_accounts::updated_at.eq(Utc::now()),
            ))
            .returning(CreditAccountRow::as_returning())
            .get_result::<CreditAccountRow>(connection)
            .map_err(CreditLedgerError::persistence)?;
            row_to_balance(row)
        })
        .await
    }

    async fn refund(
        &self,
        user_id: UserId,
        amount: CreditAmount,
    ) -> CreditLedgerResult<CreditBalance> {
        let starting_balance = to_column_amount(self.starting_balance)?;
        self.run_blocking(move |connection| {
            connection.transaction::<_, CreditLedgerError, _>(|tx| {
                ensure_account(tx, user_id, starting_balance)?;
                let row = credit_accounts::table
                    .filter(credit_accounts::user_id.eq(user_id.into_inner()))
                    .select(CreditAccountRow::as_select())
                    .for_update()
                    .first::<CreditAccountRow>(tx)
                    .map_err(CreditLedgerError::persistence)?;
                let mut account = row_to_balance(row)?;
                account.refund(amount);

                let balance = to_column_amount(account.balance())?;
                let lifetime_used = i64::try_from(account.lifetime_used())
                    .map_err(CreditLedgerError::persistence)?;
                let updated = diesel::update(
                    credit_accounts::table
                        .filter(credit_accounts::user_id.eq(user_id.into_inner())),
                )
                .set((
                    credit_accounts::balance.eq(balance),
                    credit_accounts::lifetime_used.eq(lifetime_used),
                    credit_accounts::updated_at.eq(Utc::now()),
                ))
                .returning(CreditAccountRow::as_returning())
                .get_result::<CreditAccountRow>(tx)
                .map_err(CreditLedgerError::persistence)?;
                row_to_balance(updated)
            })
        })
        .await
    }
}

fn to_column_amount(value: u32) -> CreditLedgerResult<i32> {
    i32::try_from(value).map_err(CreditLedgerError::persistence)
}

fn ensure_account(
    connection: &mut PgConnection,
    user_id: UserId,
    starting_balance: i32,
) -> CreditLedgerResult<()> {
    let now = Utc::now();
    diesel::insert_into(credit_accounts::table)
        .values(&NewCreditAccountRow {
            user_id: user_id.into_inner(),
            balance: starting_balance,
            lifetime_used: 0,
            created_at: now,
            updated_at: now,
        })
        .on_conflict(credit_accounts::user_id)
        .do_nothing()
        .execute(connection)
        .map_err(CreditLedgerError::persistence)?;
    Ok(())
}

fn load_account(
    connection: &mut PgConnection,
    user_id: UserId,
) -> CreditLedgerResult<CreditAccountRow> {
    credit_accounts::table
        .filter(credit_accounts::user_id.eq(user_id.into_inner()))
        .select(CreditAccountRow::as_select())
        .first::<CreditAccountRow>(connection)
        .map_err(CreditLedgerError::persistence)
}

fn row_to_balance(row: CreditAccountRow) -> CreditLedgerResult<CreditBalance> {
    let balance = u32::try_from(row.balance).map_err(CreditLedgerError::persistence)?;
    let lifetime_used = u64::try_from(row.lifetime_used).map_err(CreditLedgerError::persistence)?;
    Ok(CreditBalance::from_persisted(
        UserId::from_uuid(row.user_id),
        balance,
        lifetime_used,
    ))
}
