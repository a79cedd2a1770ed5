//! Scripted in-memory image generator.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::generation::ports::{
    GeneratedImage, GenerationRequest, ImageGenerator, ImageGeneratorError, ImageGeneratorResult,
};

/// Scripted behaviour for one generator call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedGeneration {
    /// Return the given images.
    Images(Vec<GeneratedImage>),
    /// Fail with the given error.
    Fail(ImageGeneratorError),
    /// Never answer; the caller's timeout decides the outcome.
    Stall,
}

/// In-memory generator that replays scripted behaviour in call order.
///
/// Once the script is exhausted every call succeeds with a small
/// deterministic PNG payload derived from the prompt and call number.
#[derive(Debug, Clone, Default)]
pub struct InMemoryImageGenerator {
    state: Arc<Mutex<GeneratorState>>,
}

#[derive(Debug, Default)]
struct GeneratorState {
    script: VecDeque<ScriptedGeneration>,
    requests: Vec<GenerationRequest>,
}

impl InMemoryImageGenerator {
    /// Creates a generator with an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a behaviour to the script.
    ///
    /// # Errors
    ///
    /// Returns a transport error when lock acquisition fails.
    pub fn push(&self, behaviour: ScriptedGeneration) -> ImageGeneratorResult<()> {
        self.lock()?.script.push_back(behaviour);
        Ok(())
    }

    /// Returns every request received so far, in call order.
    ///
    /// # Errors
    ///
    /// Returns a transport error when lock acquisition fails.
    pub fn requests(&self) -> ImageGeneratorResult<Vec<GenerationRequest>> {
        Ok(self.lock()?.requests.clone())
    }

    fn lock(&self) -> ImageGeneratorResult<MutexGuard<'_, GeneratorState>> {
        self.state
            .lock()
            .map_err(|err| ImageGeneratorError::Transport(err.to_string()))
    }
}

fn default_images(request: &GenerationRequest, call: usize) -> Vec<GeneratedImage> {
    (0..request.variants.max(1))
        .map(|variant| {
            let payload = format!("png:{call}:{variant}:{}", request.prompt);
            GeneratedImage::png(payload.into_bytes())
        })
        .collect()
}

#[async_trait]
impl ImageGenerator for InMemoryImageGenerator {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> ImageGeneratorResult<Vec<GeneratedImage>> {
        let behaviour = {
            let mut state = self.lock()?;
            state.requests.push(request.clone());
            let call = state.requests.len();
            state
                .script
                .pop_front()
                .unwrap_or_else(|| ScriptedGeneration::Images(default_images(request, call)))
        };

        match behaviour {
            ScriptedGeneration::Images(images) => Ok(images),
            ScriptedGeneration::Fail(error) => Err(error),
            ScriptedGeneration::Stall => {
                std::future::pending::<()>().await;
                Err(ImageGeneratorError::EmptyResponse)
            }
        }
    }
}
