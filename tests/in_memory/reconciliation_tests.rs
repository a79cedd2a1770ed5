//! Result record synchronisation across link schemes.

use std::sync::Arc;
use std::time::Duration;

use super::helpers::{PROMPT, Pipeline, pipeline};
use mockable::DefaultClock;
use photoshoot::credit::domain::UserId;
use photoshoot::generation::{
    domain::{
        GenerationStatus, GenerationTask, LegacyLink, PersistedResultData, ResultId,
        ResultRecord, VariationGroupId,
    },
    ports::{GenerationTaskRepository, ResultRepository},
    services::{RepairOutcome, ResultReconciler, SubmitBatchRequest},
};
use rstest::rstest;

fn legacy_record(task: &GenerationTask, link: LegacyLink) -> ResultRecord {
    let created_at = ResultRecord::for_task(task, &DefaultClock).created_at();
    ResultRecord::from_persisted(PersistedResultData {
        id: ResultId::new(),
        user_id: task.user_id(),
        task_id: None,
        legacy_links: vec![link],
        prompt: task.prompt().as_str().to_owned(),
        reference_urls: task.reference_urls().to_vec(),
        status: GenerationStatus::Pending,
        result_image_url: None,
        error_message: None,
        created_at,
        updated_at: created_at,
    })
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn legacy_records_follow_their_tasks(pipeline: Pipeline) -> Result<(), eyre::Report> {
    let submission = pipeline
        .orchestrator()
        .submit(SubmitBatchRequest::new(UserId::new(), PROMPT, 2))
        .await?;
    let tasks = pipeline.tasks.find_by_batch(submission.batch_id).await?;
    let (Some(first), Some(second)) = (tasks.first(), tasks.get(1)) else {
        return Err(eyre::eyre!("expected two tasks"));
    };
    let by_batch = legacy_record(
        first,
        LegacyLink::Batch {
            batch_id: first.batch_id(),
            batch_index: first.batch_index(),
        },
    );
    let by_group = legacy_record(
        second,
        LegacyLink::VariationGroup {
            group_id: VariationGroupId::from(second.batch_id()),
            variation_index: second.batch_index(),
        },
    );
    pipeline
        .results
        .store_many(&[by_batch.clone(), by_group.clone()])
        .await?;

    pipeline
        .worker(Duration::from_secs(5))
        .run_until_idle()
        .await;

    for (record_id, task_id) in [(by_batch.id(), first.id()), (by_group.id(), second.id())] {
        let record = pipeline
            .results
            .find_by_id(record_id)
            .await?
            .ok_or_else(|| eyre::eyre!("record vanished"))?;
        let task = pipeline
            .tasks
            .find_by_id(task_id)
            .await?
            .ok_or_else(|| eyre::eyre!("task vanished"))?;
        eyre::ensure!(record.task_id() == Some(task_id), "canonical link not filled");
        eyre::ensure!(record.status() == GenerationStatus::Completed, "status not mirrored");
        eyre::ensure!(
            record.result_image_url() == task.result_image_url(),
            "URL not mirrored"
        );
    }
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn repair_and_backfill_fix_drifted_records(pipeline: Pipeline) -> Result<(), eyre::Report> {
    let submission = pipeline
        .orchestrator()
        .submit(SubmitBatchRequest::new(UserId::new(), PROMPT, 1))
        .await?;
    pipeline
        .worker(Duration::from_secs(5))
        .run_until_idle()
        .await;
    let task = pipeline
        .tasks
        .find_by_batch(submission.batch_id)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| eyre::eyre!("missing task"))?;
    let stale = legacy_record(
        &task,
        LegacyLink::Batch {
            batch_id: task.batch_id(),
            batch_index: task.batch_index(),
        },
    );
    let other_stale = legacy_record(
        &task,
        LegacyLink::VariationGroup {
            group_id: VariationGroupId::from(task.batch_id()),
            variation_index: task.batch_index(),
        },
    );
    pipeline
        .results
        .store_many(&[stale.clone(), other_stale.clone()])
        .await?;
    let reconciler = ResultReconciler::new(
        Arc::clone(&pipeline.raw_tasks),
        Arc::clone(&pipeline.results),
        Arc::clone(&pipeline.clock),
    );

    let repaired = reconciler.repair(stale.id()).await?;
    let backfilled = reconciler.backfill_legacy_links().await?;

    eyre::ensure!(repaired == RepairOutcome::Updated, "expected repair, got {repaired:?}");
    eyre::ensure!(backfilled == 1, "expected one backfilled record, got {backfilled}");
    eyre::ensure!(
        pipeline.results.find_legacy_only().await?.is_empty(),
        "legacy-only records remain"
    );
    let fixed = pipeline
        .results
        .find_by_id(other_stale.id())
        .await?
        .ok_or_else(|| eyre::eyre!("record vanished"))?;
    eyre::ensure!(
        fixed.result_image_url() == task.result_image_url(),
        "backfill did not mirror the URL"
    );
    Ok(())
}
