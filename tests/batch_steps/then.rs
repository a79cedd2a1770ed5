//! Then steps for batch generation BDD scenarios.

use super::world::{BatchWorld, run_async};
use photoshoot::credit::ports::CreditLedger;
use photoshoot::generation::{
    domain::GenerationStatus,
    services::{SubmitBatchError, TaskOutcome},
};
use rstest_bdd_macros::then;

#[then("the batch holds {count:usize} pending tasks sharing one batch identifier")]
fn batch_holds_pending_tasks(world: &BatchWorld, count: usize) -> Result<(), eyre::Report> {
    let submission = world.submission()?;
    let tasks = world.batch_tasks()?;

    if tasks.len() != count {
        return Err(eyre::eyre!("expected {count} tasks, found {}", tasks.len()));
    }
    for (position, task) in tasks.iter().enumerate() {
        if task.batch_id() != submission.batch_id {
            return Err(eyre::eyre!("task {} left the batch", task.id()));
        }
        if usize::try_from(task.batch_index().value())? != position {
            return Err(eyre::eyre!("task {} is out of position", task.id()));
        }
        if task.status() != GenerationStatus::Pending {
            return Err(eyre::eyre!("task {} is {}", task.id(), task.status()));
        }
    }
    Ok(())
}

#[then("the user has {credits:u32} credits left")]
fn user_has_credits_left(world: &BatchWorld, credits: u32) -> Result<(), eyre::Report> {
    let balance = run_async(world.ledger.balance(world.user_id))?;
    if balance.balance() != credits {
        return Err(eyre::eyre!(
            "expected {credits} credits, found {}",
            balance.balance()
        ));
    }
    Ok(())
}

#[then("every task in the batch is completed")]
fn every_task_completed(world: &BatchWorld) -> Result<(), eyre::Report> {
    for task in world.batch_tasks()? {
        if task.status() != GenerationStatus::Completed {
            return Err(eyre::eyre!(
                "task {} ended {}",
                task.batch_index(),
                task.status()
            ));
        }
        if task.result_image_url().is_none() {
            return Err(eyre::eyre!("task {} lacks an image", task.batch_index()));
        }
    }
    Ok(())
}

#[then("every result record mirrors its task")]
fn result_records_mirror_tasks(world: &BatchWorld) -> Result<(), eyre::Report> {
    let tasks = world.batch_tasks()?;
    let records = world.results.snapshot()?;

    for task in &tasks {
        let record = records
            .iter()
            .find(|record| record.task_id() == Some(task.id()))
            .ok_or_else(|| eyre::eyre!("task {} has no result record", task.id()))?;
        if record.status() != task.status() || record.result_image_url() != task.result_image_url()
        {
            return Err(eyre::eyre!("result record for task {} drifted", task.id()));
        }
    }
    Ok(())
}

#[then("the batch progress reports {percent:u32} percent")]
fn batch_progress_reports(world: &BatchWorld, percent: u32) -> Result<(), eyre::Report> {
    let batch_id = world.submission()?.batch_id;
    let progress = run_async(world.progress().status(batch_id))?;

    if progress.percent() != percent || !progress.is_finished() {
        return Err(eyre::eyre!("unexpected progress {progress:?}"));
    }
    Ok(())
}

#[then("the submission is rejected for insufficient credits")]
fn submission_rejected(world: &BatchWorld) -> Result<(), eyre::Report> {
    let result = world
        .last_submission
        .as_ref()
        .ok_or_else(|| eyre::eyre!("missing submission in scenario world"))?;

    if !matches!(result, Err(SubmitBatchError::InsufficientCredits { .. })) {
        return Err(eyre::eyre!(
            "expected insufficient credits error, got {result:?}"
        ));
    }
    Ok(())
}

#[then("no generation task exists for the user")]
fn no_task_exists(world: &BatchWorld) -> Result<(), eyre::Report> {
    if !world.queue.pending()?.is_empty() {
        return Err(eyre::eyre!("a task was queued for a rejected batch"));
    }
    let records = world.results.snapshot()?;
    if records.iter().any(|record| record.user_id() == world.user_id) {
        return Err(eyre::eyre!("a result record exists for a rejected batch"));
    }
    Ok(())
}

#[then(r#"the batch statuses are "{statuses}""#)]
fn batch_statuses_are(world: &BatchWorld, statuses: String) -> Result<(), eyre::Report> {
    let actual: Vec<&str> = world
        .batch_tasks()?
        .iter()
        .map(|task| task.status().as_str())
        .collect();
    let expected: Vec<&str> = statuses.split(',').map(str::trim).collect();

    if actual != expected {
        return Err(eyre::eyre!("expected statuses {expected:?}, got {actual:?}"));
    }
    Ok(())
}

#[then("the duplicate invocation reports an already finished task")]
fn duplicate_reports_finished(world: &BatchWorld) -> Result<(), eyre::Report> {
    let invocation = world
        .last_invocation
        .as_ref()
        .ok_or_else(|| eyre::eyre!("missing invocation in scenario world"))?;
    let report = invocation
        .as_ref()
        .map_err(|err| eyre::eyre!("invocation failed: {err}"))?;

    if !matches!(
        report.outcome,
        TaskOutcome::AlreadyTerminal {
            status: GenerationStatus::Completed,
            ..
        }
    ) {
        return Err(eyre::eyre!("expected already terminal outcome, got {report:?}"));
    }
    Ok(())
}

#[then("the image generator was called {calls:usize} times")]
fn generator_called(world: &BatchWorld, calls: usize) -> Result<(), eyre::Report> {
    let requests = world.generator.requests()?;
    if requests.len() != calls {
        return Err(eyre::eyre!(
            "expected {calls} generator calls, got {}",
            requests.len()
        ));
    }
    Ok(())
}
