//! End-to-end batch flows over the in-memory deployment.

use std::time::Duration;

use super::helpers::{PROMPT, Pipeline, pipeline};
use photoshoot::credit::{domain::UserId, ports::CreditLedger};
use photoshoot::generation::{
    adapters::memory::ScriptedGeneration,
    domain::{GenerationStatus, ImageSize, ReferenceImage},
    ports::{GeneratedImage, GenerationQueue, GenerationTaskRepository},
    services::{BatchPoller, PollOutcome, SubmitBatchRequest, TaskOutcome},
};
use rstest::rstest;
use tokio_util::sync::CancellationToken;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn three_variant_batch_runs_to_completion(pipeline: Pipeline) -> Result<(), eyre::Report> {
    let user_id = UserId::new();
    let request = SubmitBatchRequest::new(user_id, PROMPT, 3)
        .with_reference(ReferenceImage::url("https://cdn.test/sneaker.png")?)
        .with_size(ImageSize::Square);
    pipeline
        .assets
        .seed_remote("https://cdn.test/sneaker.png", b"reference".to_vec())?;

    let submission = pipeline.orchestrator().submit(request).await?;
    let reports = pipeline.worker(Duration::from_secs(5)).run_until_idle().await;

    eyre::ensure!(reports.len() == 3, "expected 3 reports, got {}", reports.len());
    let tasks = pipeline.tasks.find_by_batch(submission.batch_id).await?;
    for task in &tasks {
        eyre::ensure!(
            task.status() == GenerationStatus::Completed,
            "task {} ended {}",
            task.batch_index(),
            task.status()
        );
        eyre::ensure!(task.result_image_url().is_some(), "completed task lacks URL");
    }
    let records = pipeline.results.snapshot()?;
    eyre::ensure!(records.len() == 3, "expected 3 result records");
    for record in &records {
        let task = tasks
            .iter()
            .find(|task| Some(task.id()) == record.task_id())
            .ok_or_else(|| eyre::eyre!("record not linked to a batch task"))?;
        eyre::ensure!(record.status() == task.status(), "record status drifted");
        eyre::ensure!(
            record.result_image_url() == task.result_image_url(),
            "record URL drifted"
        );
    }
    let requests = pipeline.generator.requests()?;
    eyre::ensure!(
        requests.iter().all(|request| request.references.len() == 1),
        "every generation should receive the reference image"
    );
    let balance = pipeline.ledger.balance(user_id).await?;
    eyre::ensure!(balance.balance() == 7, "expected 7 credits left");
    eyre::ensure!(balance.lifetime_used() == 3, "expected 3 credits used");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn timed_out_variant_fails_alone(pipeline: Pipeline) -> Result<(), eyre::Report> {
    let user_id = UserId::new();
    let submission = pipeline
        .orchestrator()
        .submit(SubmitBatchRequest::new(user_id, PROMPT, 3))
        .await?;
    pipeline
        .generator
        .push(ScriptedGeneration::Images(vec![GeneratedImage::png(
            b"first".to_vec(),
        )]))?;
    pipeline.generator.push(ScriptedGeneration::Stall)?;

    let reports = pipeline
        .worker(Duration::from_millis(50))
        .run_until_idle()
        .await;

    let statuses: Vec<GenerationStatus> = pipeline
        .tasks
        .find_by_batch(submission.batch_id)
        .await?
        .iter()
        .map(|task| task.status())
        .collect();
    eyre::ensure!(
        statuses
            == [
                GenerationStatus::Completed,
                GenerationStatus::Failed,
                GenerationStatus::Completed
            ],
        "unexpected statuses {statuses:?}"
    );
    let timed_out = reports
        .iter()
        .find_map(|report| match &report.outcome {
            TaskOutcome::Failed { message, .. } => Some(message.clone()),
            _ => None,
        })
        .ok_or_else(|| eyre::eyre!("expected one failed report"))?;
    eyre::ensure!(timed_out.contains("timed out"), "unexpected message {timed_out}");
    let balance = pipeline.ledger.balance(user_id).await?;
    eyre::ensure!(balance.balance() == 7, "failed variants are not refunded");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn background_worker_finishes_batch_while_client_polls(
    pipeline: Pipeline,
) -> Result<(), eyre::Report> {
    let submission = pipeline
        .orchestrator()
        .submit(SubmitBatchRequest::new(UserId::new(), PROMPT, 2))
        .await?;
    let shutdown = CancellationToken::new();
    let worker = pipeline.worker(Duration::from_secs(5));
    let worker_token = shutdown.clone();
    let handle = tokio::spawn(async move { worker.run(worker_token).await });

    let outcome = BatchPoller::new(pipeline.progress())
        .with_interval(Duration::from_millis(5))
        .with_timeout(Duration::from_secs(10))
        .watch(submission.batch_id, |_| {})
        .await?;
    shutdown.cancel();
    handle.await?;

    let PollOutcome::Finished(progress) = outcome else {
        return Err(eyre::eyre!("batch did not finish: {outcome:?}"));
    };
    eyre::ensure!(progress.completed == 2, "expected both variants completed");
    eyre::ensure!(progress.percent() == 100, "expected full progress");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn duplicate_delivery_does_not_rerun_finished_task(
    pipeline: Pipeline,
) -> Result<(), eyre::Report> {
    let submission = pipeline
        .orchestrator()
        .submit(SubmitBatchRequest::new(UserId::new(), PROMPT, 1))
        .await?;
    let worker = pipeline.worker(Duration::from_secs(5));
    worker.run_until_idle().await;
    let first = *submission
        .task_ids
        .first()
        .ok_or_else(|| eyre::eyre!("missing task"))?;
    let before = pipeline
        .tasks
        .find_by_id(first)
        .await?
        .ok_or_else(|| eyre::eyre!("missing task"))?;

    pipeline.queue.enqueue(first).await?;
    let reports = worker.run_until_idle().await;

    let outcome = reports
        .first()
        .map(|report| report.outcome.clone())
        .ok_or_else(|| eyre::eyre!("expected a report for the redelivered task"))?;
    eyre::ensure!(
        outcome
            == TaskOutcome::AlreadyTerminal {
                task_id: first,
                status: GenerationStatus::Completed,
            },
        "unexpected outcome {outcome:?}"
    );
    let after = pipeline
        .tasks
        .find_by_id(first)
        .await?
        .ok_or_else(|| eyre::eyre!("missing task"))?;
    eyre::ensure!(after == before, "terminal task was rewritten");
    eyre::ensure!(
        pipeline.generator.requests()?.len() == 1,
        "generator should run once"
    );
    Ok(())
}
