//! Database-side photoshoot synchronisation tests.

use super::helpers::{BoxError, TemporaryDatabase, pending_batch};
use mockable::DefaultClock;
use photoshoot::credit::domain::UserId;
use photoshoot::generation::{
    adapters::postgres::{PostgresGenerationTaskRepository, PostgresResultRepository},
    domain::{
        GenerationStatus, GenerationTask, LegacyLink, PersistedResultData, ResultId,
        ResultRecord, VariationGroupId,
    },
    ports::{GenerationTaskRepository, ResultRepository},
};
use rstest::rstest;

struct SyncContext {
    tasks: PostgresGenerationTaskRepository,
    results: PostgresResultRepository,
    _database: TemporaryDatabase,
}

async fn sync_context() -> Result<SyncContext, BoxError> {
    let database = TemporaryDatabase::create().await?;
    let pool = database.pool(2)?;
    Ok(SyncContext {
        tasks: PostgresGenerationTaskRepository::new(pool.clone()),
        results: PostgresResultRepository::new(pool),
        _database: database,
    })
}

fn legacy_record(task: &GenerationTask, link: LegacyLink) -> ResultRecord {
    let created_at = ResultRecord::for_task(task, &DefaultClock).created_at();
    ResultRecord::from_persisted(PersistedResultData {
        id: ResultId::new(),
        user_id: task.user_id(),
        task_id: None,
        legacy_links: vec![link],
        prompt: task.prompt().as_str().to_owned(),
        reference_urls: Vec::new(),
        status: GenerationStatus::Pending,
        result_image_url: None,
        error_message: None,
        created_at,
        updated_at: created_at,
    })
}

async fn reload(context: &SyncContext, id: ResultId) -> Result<ResultRecord, BoxError> {
    context
        .results
        .find_by_id(id)
        .await?
        .ok_or_else(|| format!("result {id} vanished").into())
}

#[rstest]
#[ignore = "requires PHOTOSHOOT_TEST_DATABASE_URL"]
#[tokio::test(flavor = "multi_thread")]
async fn task_writes_reach_every_link_scheme() -> Result<(), BoxError> {
    let context = sync_context().await?;
    let tasks = pending_batch(UserId::new(), 2)?;
    context.tasks.store_batch(&tasks).await?;
    let (Some(first), Some(second)) = (tasks.first(), tasks.get(1)) else {
        return Err("batch should hold two tasks".into());
    };
    let canonical = ResultRecord::for_task(second, &DefaultClock);
    let by_batch = legacy_record(
        second,
        LegacyLink::Batch {
            batch_id: second.batch_id(),
            batch_index: second.batch_index(),
        },
    );
    let by_group = legacy_record(
        second,
        LegacyLink::VariationGroup {
            group_id: VariationGroupId::from(second.batch_id()),
            variation_index: second.batch_index(),
        },
    );
    let sibling = ResultRecord::for_task(first, &DefaultClock);
    context
        .results
        .store_many(&[
            canonical.clone(),
            by_batch.clone(),
            by_group.clone(),
            sibling.clone(),
        ])
        .await?;

    let mut task = second.clone();
    task.start(&DefaultClock)?;
    context.tasks.update(&task).await?;
    task.complete("https://assets.test/public/1.png", &DefaultClock)?;
    context.tasks.update(&task).await?;

    for id in [canonical.id(), by_batch.id(), by_group.id()] {
        let synced = reload(&context, id).await?;
        assert_eq!(synced.status(), GenerationStatus::Completed);
        assert_eq!(
            synced.result_image_url(),
            Some("https://assets.test/public/1.png")
        );
        assert_eq!(synced.task_id(), Some(task.id()));
    }
    let untouched = reload(&context, sibling.id()).await?;
    assert_eq!(untouched.status(), GenerationStatus::Pending);
    assert!(untouched.result_image_url().is_none());
    Ok(())
}

#[rstest]
#[ignore = "requires PHOTOSHOOT_TEST_DATABASE_URL"]
#[tokio::test(flavor = "multi_thread")]
async fn failure_keeps_earlier_image_url() -> Result<(), BoxError> {
    let context = sync_context().await?;
    let tasks = pending_batch(UserId::new(), 1)?;
    context.tasks.store_batch(&tasks).await?;
    let mut task = tasks
        .into_iter()
        .next()
        .ok_or("batch should hold one task")?;
    let placeholder = ResultRecord::for_task(&task, &DefaultClock);
    let earlier = ResultRecord::from_persisted(PersistedResultData {
        id: placeholder.id(),
        user_id: placeholder.user_id(),
        task_id: placeholder.task_id(),
        legacy_links: Vec::new(),
        prompt: placeholder.prompt().to_owned(),
        reference_urls: Vec::new(),
        status: GenerationStatus::Pending,
        result_image_url: Some("https://assets.test/public/earlier.png".to_owned()),
        error_message: None,
        created_at: placeholder.created_at(),
        updated_at: placeholder.updated_at(),
    });
    context.results.store(&earlier).await?;

    task.fail("generation timed out", &DefaultClock)?;
    context.tasks.update(&task).await?;

    let synced = reload(&context, earlier.id()).await?;
    assert_eq!(synced.status(), GenerationStatus::Failed);
    assert_eq!(
        synced.result_image_url(),
        Some("https://assets.test/public/earlier.png")
    );
    assert_eq!(synced.error_message(), Some("generation timed out"));
    Ok(())
}

#[rstest]
#[ignore = "requires PHOTOSHOOT_TEST_DATABASE_URL"]
#[tokio::test(flavor = "multi_thread")]
async fn terminal_tasks_reject_further_writes() -> Result<(), BoxError> {
    let context = sync_context().await?;
    let tasks = pending_batch(UserId::new(), 1)?;
    context.tasks.store_batch(&tasks).await?;
    let pending = tasks
        .into_iter()
        .next()
        .ok_or("batch should hold one task")?;
    let mut finished = pending.clone();
    finished.fail("boom", &DefaultClock)?;
    context.tasks.update(&finished).await?;

    let mut late = pending;
    late.start(&DefaultClock)?;
    let result = context.tasks.update(&late).await;

    assert!(result.is_err());
    let stored = context
        .tasks
        .find_by_id(finished.id())
        .await?
        .ok_or("task vanished")?;
    assert_eq!(stored.status(), GenerationStatus::Failed);
    Ok(())
}

#[rstest]
#[ignore = "requires PHOTOSHOOT_TEST_DATABASE_URL"]
#[tokio::test(flavor = "multi_thread")]
async fn rows_with_both_legacy_links_keep_them_across_updates() -> Result<(), BoxError> {
    let context = sync_context().await?;
    let tasks = pending_batch(UserId::new(), 1)?;
    context.tasks.store_batch(&tasks).await?;
    let task = tasks.first().ok_or("batch should hold one task")?;
    let by_batch = LegacyLink::Batch {
        batch_id: task.batch_id(),
        batch_index: task.batch_index(),
    };
    let by_group = LegacyLink::VariationGroup {
        group_id: VariationGroupId::from(task.batch_id()),
        variation_index: task.batch_index(),
    };
    let links = vec![by_batch, by_group];
    let base = legacy_record(task, by_batch);
    let record = ResultRecord::from_persisted(PersistedResultData {
        id: base.id(),
        user_id: base.user_id(),
        task_id: None,
        legacy_links: links.clone(),
        prompt: base.prompt().to_owned(),
        reference_urls: Vec::new(),
        status: GenerationStatus::Pending,
        result_image_url: None,
        error_message: None,
        created_at: base.created_at(),
        updated_at: base.updated_at(),
    });
    context.results.store(&record).await?;

    let mut stored = reload(&context, record.id()).await?;
    assert_eq!(stored.legacy_links(), links.as_slice());
    assert!(stored.mirror(task, &DefaultClock));
    context.results.update(&stored).await?;

    let updated = reload(&context, record.id()).await?;
    assert_eq!(updated.task_id(), Some(task.id()));
    assert_eq!(updated.legacy_links(), links.as_slice());
    Ok(())
}
