//! Concurrent submissions against a single credit balance.

use std::sync::Arc;

use super::helpers::{PROMPT, Pipeline, pipeline};
use photoshoot::credit::{
    adapters::memory::InMemoryCreditLedger,
    domain::{CreditAmount, UserId},
    ports::{CreditLedger, CreditLedgerError},
};
use photoshoot::generation::services::{SubmitBatchError, SubmitBatchRequest};
use rstest::rstest;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn concurrent_submissions_never_overdraw(pipeline: Pipeline) -> Result<(), eyre::Report> {
    let user_id = UserId::new();
    pipeline.ledger.seed(user_id, 5)?;
    let orchestrator = pipeline.orchestrator();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let submitter = orchestrator.clone();
            tokio::spawn(async move {
                submitter
                    .submit(SubmitBatchRequest::new(user_id, PROMPT, 3))
                    .await
            })
        })
        .collect();
    let mut accepted = 0_u32;
    let mut rejected = 0_u32;
    for handle in handles {
        match handle.await? {
            Ok(_) => accepted += 1,
            Err(SubmitBatchError::InsufficientCredits { requested: 3, .. }) => rejected += 1,
            Err(other) => return Err(other.into()),
        }
    }

    eyre::ensure!(accepted == 1, "expected one accepted batch, got {accepted}");
    eyre::ensure!(rejected == 3, "expected three rejections, got {rejected}");
    let balance = pipeline.ledger.balance(user_id).await?;
    eyre::ensure!(balance.balance() == 2, "expected 2 credits left");
    eyre::ensure!(
        pipeline.queue.pending()?.len() == 1,
        "only the accepted batch is queued"
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn concurrent_deductions_respect_balance() -> Result<(), eyre::Report> {
    let ledger = Arc::new(InMemoryCreditLedger::default());
    let user_id = UserId::new();
    ledger.seed(user_id, 10)?;
    let amount = CreditAmount::new(3)?;

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let shared = Arc::clone(&ledger);
            tokio::spawn(async move { shared.deduct(user_id, amount).await })
        })
        .collect();
    let mut succeeded = 0_u32;
    for handle in handles {
        match handle.await? {
            Ok(_) => succeeded += 1,
            Err(CreditLedgerError::InsufficientCredits { available, .. }) => {
                eyre::ensure!(available < 3, "rejected while {available} credits remained");
            }
            Err(other) => return Err(other.into()),
        }
    }

    eyre::ensure!(succeeded == 3, "expected 3 deductions, got {succeeded}");
    let balance = ledger.balance(user_id).await?;
    eyre::ensure!(balance.balance() == 1, "expected 1 credit left");
    eyre::ensure!(balance.lifetime_used() == 9, "expected 9 credits used");
    Ok(())
}
