//! `PostgreSQL` work queue tests.

use super::helpers::{BoxError, TemporaryDatabase, pending_batch};
use photoshoot::credit::domain::UserId;
use photoshoot::generation::{
    adapters::postgres::{PostgresGenerationQueue, PostgresGenerationTaskRepository},
    domain::GenerationTask,
    ports::{GenerationQueue, GenerationTaskRepository},
};
use rstest::rstest;

#[rstest]
#[ignore = "requires PHOTOSHOOT_TEST_DATABASE_URL"]
#[tokio::test(flavor = "multi_thread")]
async fn queue_delivers_each_task_once_in_order() -> Result<(), BoxError> {
    let database = TemporaryDatabase::create().await?;
    let pool = database.pool(2)?;
    let tasks_repo = PostgresGenerationTaskRepository::new(pool.clone());
    let queue = PostgresGenerationQueue::new(pool);
    let tasks = pending_batch(UserId::new(), 2)?;
    tasks_repo.store_batch(&tasks).await?;
    let ids: Vec<_> = tasks.iter().map(GenerationTask::id).collect();

    for id in &ids {
        queue.enqueue(*id).await?;
        queue.enqueue(*id).await?;
    }
    let mut delivered = Vec::new();
    while let Some(id) = queue.dequeue().await? {
        delivered.push(id);
    }

    assert_eq!(delivered, ids);
    Ok(())
}
