//! When steps for batch generation BDD scenarios.

use super::world::{BatchWorld, run_async};
use eyre::WrapErr;
use photoshoot::generation::{
    domain::{ImageSize, ReferenceImage},
    services::SubmitBatchRequest,
};
use rstest_bdd_macros::when;

const REFERENCE_URL: &str = "https://cdn.test/products/sneaker.jpg";

#[when(
    r#"the user submits "{prompt}" for {variants:u32} square variants with one reference image"#
)]
fn submit_square_batch_with_reference(
    world: &mut BatchWorld,
    prompt: String,
    variants: u32,
) -> Result<(), eyre::Report> {
    world
        .assets
        .seed_remote(REFERENCE_URL, b"reference-photo".to_vec())
        .wrap_err("seed reference image")?;
    let request = SubmitBatchRequest::new(world.user_id, prompt, variants)
        .with_reference(ReferenceImage::url(REFERENCE_URL).wrap_err("build reference")?)
        .with_size(ImageSize::Square);
    world.last_submission = Some(run_async(world.orchestrator().submit(request)));
    Ok(())
}

#[when(r#"the user submits "{prompt}" for {variants:u32} variants"#)]
fn submit_batch(world: &mut BatchWorld, prompt: String, variants: u32) {
    let request = SubmitBatchRequest::new(world.user_id, prompt, variants);
    world.last_submission = Some(run_async(world.orchestrator().submit(request)));
}

#[when("the generation worker drains the queue")]
fn drain_queue(world: &mut BatchWorld) {
    run_async(world.worker().run_until_idle());
}

#[when("the third variant is processed before the others")]
fn process_third_variant_first(world: &mut BatchWorld) -> Result<(), eyre::Report> {
    let third = *world
        .submission()?
        .task_ids
        .get(2)
        .ok_or_else(|| eyre::eyre!("batch has no third variant"))?;
    world.last_invocation = Some(run_async(world.processor().process(third)));
    Ok(())
}

#[when("the first variant is processed again")]
fn process_first_variant_again(world: &mut BatchWorld) -> Result<(), eyre::Report> {
    let first = *world
        .submission()?
        .task_ids
        .first()
        .ok_or_else(|| eyre::eyre!("batch has no first variant"))?;
    world.last_invocation = Some(run_async(world.processor().process(first)));
    Ok(())
}
