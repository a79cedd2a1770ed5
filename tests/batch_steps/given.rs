//! Given steps for batch generation BDD scenarios.

use super::world::BatchWorld;
use eyre::WrapErr;
use photoshoot::generation::{adapters::memory::ScriptedGeneration, ports::GeneratedImage};
use rstest_bdd_macros::given;

#[given("a user with {credits:u32} credits")]
fn user_with_credits(world: &mut BatchWorld, credits: u32) -> Result<(), eyre::Report> {
    world
        .ledger
        .seed(world.user_id, credits)
        .wrap_err("seed scenario user balance")
}

#[given("the image generator stalls on the second variant")]
fn generator_stalls_on_second_variant(world: &mut BatchWorld) -> Result<(), eyre::Report> {
    world
        .generator
        .push(ScriptedGeneration::Images(vec![GeneratedImage::png(
            b"first-variant".to_vec(),
        )]))
        .wrap_err("script first generation")?;
    world
        .generator
        .push(ScriptedGeneration::Stall)
        .wrap_err("script stalled generation")
}
