//! Configuration-driven wiring of the production services.

use std::collections::HashMap;
use std::time::Duration;

use super::helpers::{BoxError, PROMPT, TemporaryDatabase};
use mockable::DefaultClock;
use photoshoot::config::GenerationConfig;
use photoshoot::credit::{domain::UserId, ports::CreditLedger};
use photoshoot::deployment::PostgresDeployment;
use photoshoot::generation::{
    adapters::postgres::{PostgresGenerationQueue, PostgresGenerationTaskRepository},
    domain::{GenerationDomainError, GenerationStatus},
    ports::{GenerationQueue, GenerationTaskRepository},
    services::{SubmitBatchError, SubmitBatchRequest},
};
use rstest::rstest;

fn config_for(database: &TemporaryDatabase) -> Result<GenerationConfig, BoxError> {
    let vars = HashMap::from([
        ("DATABASE_URL", database.url().to_owned()),
        ("DB_POOL_SIZE", "2".to_owned()),
        ("OPENAI_API_KEY", "sk-test".to_owned()),
        ("STORAGE_URL", "https://project.supabase.test".to_owned()),
        ("STORAGE_SERVICE_KEY", "service-key".to_owned()),
        ("MAX_VARIANTS", "2".to_owned()),
        ("STARTING_CREDITS", "4".to_owned()),
        ("STALE_AFTER_SECS", "0".to_owned()),
        ("POLL_INTERVAL_SECS", "7".to_owned()),
        ("POLL_TIMEOUT_SECS", "90".to_owned()),
    ]);
    Ok(GenerationConfig::from_lookup(|name| vars.get(name).cloned())?)
}

#[rstest]
#[ignore = "requires PHOTOSHOOT_TEST_DATABASE_URL"]
#[tokio::test(flavor = "multi_thread")]
async fn configured_limits_govern_submissions() -> Result<(), BoxError> {
    let database = TemporaryDatabase::create().await?;
    let deployment = PostgresDeployment::connect(config_for(&database)?)?;
    let orchestrator = deployment.orchestrator();
    let user_id = UserId::new();

    let too_many = orchestrator
        .submit(SubmitBatchRequest::new(user_id, PROMPT, 3))
        .await;
    let accepted = orchestrator
        .submit(SubmitBatchRequest::new(user_id, PROMPT, 2))
        .await?;

    assert!(matches!(
        too_many,
        Err(SubmitBatchError::Domain(
            GenerationDomainError::VariantCountOutOfRange {
                requested: 3,
                max: 2
            }
        ))
    ));
    assert_eq!(accepted.remaining_balance, 2);
    let account = deployment.ledger().balance(user_id).await?;
    assert_eq!(account.balance(), 2);
    assert_eq!(account.lifetime_used(), 2);
    Ok(())
}

#[rstest]
#[ignore = "requires PHOTOSHOOT_TEST_DATABASE_URL"]
#[tokio::test(flavor = "multi_thread")]
async fn poller_uses_configured_cadence() -> Result<(), BoxError> {
    let database = TemporaryDatabase::create().await?;
    let deployment = PostgresDeployment::connect(config_for(&database)?)?;

    let poller = deployment.poller();

    assert_eq!(poller.interval(), Duration::from_secs(7));
    assert_eq!(poller.timeout(), Duration::from_secs(90));
    Ok(())
}

#[rstest]
#[ignore = "requires PHOTOSHOOT_TEST_DATABASE_URL"]
#[tokio::test(flavor = "multi_thread")]
async fn stalled_processing_task_is_requeued() -> Result<(), BoxError> {
    let database = TemporaryDatabase::create().await?;
    let deployment = PostgresDeployment::connect(config_for(&database)?)?;
    let pool = database.pool(1)?;
    let tasks = PostgresGenerationTaskRepository::new(pool.clone());
    let queue = PostgresGenerationQueue::new(pool);
    let submission = deployment
        .orchestrator()
        .submit(SubmitBatchRequest::new(UserId::new(), PROMPT, 2))
        .await?;
    let first = *submission
        .task_ids
        .first()
        .ok_or("batch should hold two tasks")?;
    assert_eq!(queue.dequeue().await?, Some(first));
    let mut claimed = tasks.find_by_id(first).await?.ok_or("task should exist")?;
    claimed.start(&DefaultClock)?;
    tasks.update(&claimed).await?;
    tokio::time::sleep(Duration::from_millis(20)).await;

    let stalled = tasks
        .find_stalled(chrono::Utc::now())
        .await?
        .into_iter()
        .map(|task| (task.id(), task.status()))
        .collect::<Vec<_>>();
    let recovered = deployment.processor().recover_stalled().await?;

    assert!(stalled.contains(&(first, GenerationStatus::Processing)));
    assert_eq!(recovered, vec![first]);
    assert_eq!(queue.dequeue().await?, Some(first));
    assert_eq!(queue.dequeue().await?, None);
    Ok(())
}
