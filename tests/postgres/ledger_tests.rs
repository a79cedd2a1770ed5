//! `PostgreSQL` credit ledger tests.

use std::sync::Arc;

use super::helpers::{BoxError, TemporaryDatabase};
use photoshoot::credit::{
    adapters::postgres::PostgresCreditLedger,
    domain::{CreditAmount, UserId},
    ports::{CreditLedger, CreditLedgerError},
};
use rstest::rstest;

#[rstest]
#[ignore = "requires PHOTOSHOOT_TEST_DATABASE_URL"]
#[tokio::test(flavor = "multi_thread")]
async fn first_lookup_opens_account_with_starting_balance() -> Result<(), BoxError> {
    let database = TemporaryDatabase::create().await?;
    let ledger = PostgresCreditLedger::new(database.pool(1)?, 10);
    let user_id = UserId::new();

    let opened = ledger.balance(user_id).await?;
    let again = ledger.balance(user_id).await?;

    assert_eq!(opened.balance(), 10);
    assert_eq!(opened.lifetime_used(), 0);
    assert_eq!(again, opened);
    Ok(())
}

#[rstest]
#[ignore = "requires PHOTOSHOOT_TEST_DATABASE_URL"]
#[tokio::test(flavor = "multi_thread")]
async fn deduction_beyond_balance_leaves_account_unchanged() -> Result<(), BoxError> {
    let database = TemporaryDatabase::create().await?;
    let ledger = PostgresCreditLedger::new(database.pool(1)?, 2);
    let user_id = UserId::new();

    let result = ledger.deduct(user_id, CreditAmount::new(3)?).await;

    assert!(matches!(
        result,
        Err(CreditLedgerError::InsufficientCredits {
            requested: 3,
            available: 2,
            ..
        })
    ));
    assert_eq!(ledger.balance(user_id).await?.balance(), 2);
    Ok(())
}

#[rstest]
#[ignore = "requires PHOTOSHOOT_TEST_DATABASE_URL"]
#[tokio::test(flavor = "multi_thread")]
async fn concurrent_deductions_never_overdraw() -> Result<(), BoxError> {
    let database = TemporaryDatabase::create().await?;
    let ledger = Arc::new(PostgresCreditLedger::new(database.pool(4)?, 10));
    let user_id = UserId::new();
    let amount = CreditAmount::new(3)?;
    ledger.balance(user_id).await?;

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let shared = Arc::clone(&ledger);
            tokio::spawn(async move { shared.deduct(user_id, amount).await })
        })
        .collect();
    let mut succeeded = 0_u32;
    for handle in handles {
        if handle.await?.is_ok() {
            succeeded += 1;
        }
    }

    let balance = ledger.balance(user_id).await?;
    assert_eq!(succeeded, 3);
    assert_eq!(balance.balance(), 1);
    assert_eq!(balance.lifetime_used(), 9);
    Ok(())
}

#[rstest]
#[ignore = "requires PHOTOSHOOT_TEST_DATABASE_URL"]
#[tokio::test(flavor = "multi_thread")]
async fn grant_restores_credits() -> Result<(), BoxError> {
    let database = TemporaryDatabase::create().await?;
    let ledger = PostgresCreditLedger::new(database.pool(1)?, 5);
    let user_id = UserId::new();
    ledger.deduct(user_id, CreditAmount::new(4)?).await?;

    let restored = ledger.grant(user_id, CreditAmount::new(4)?).await?;

    assert_eq!(restored.balance(), 5);
    Ok(())
}

#[rstest]
#[ignore = "requires PHOTOSHOOT_TEST_DATABASE_URL"]
#[tokio::test(flavor = "multi_thread")]
async fn refund_reverses_balance_and_lifetime_usage() -> Result<(), BoxError> {
    let database = TemporaryDatabase::create().await?;
    let ledger = PostgresCreditLedger::new(database.pool(1)?, 5);
    let user_id = UserId::new();
    ledger.deduct(user_id, CreditAmount::new(1)?).await?;
    ledger.deduct(user_id, CreditAmount::new(3)?).await?;

    let refunded = ledger.refund(user_id, CreditAmount::new(3)?).await?;

    assert_eq!(refunded.balance(), 4);
    assert_eq!(refunded.lifetime_used(), 1);
    assert_eq!(ledger.balance(user_id).await?, refunded);
    Ok(())
}
