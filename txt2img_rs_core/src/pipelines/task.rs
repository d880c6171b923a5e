use std::sync::Arc;

use tokio::{runtime::Handle, sync::OwnedSemaphorePermit, task::JoinHandle};
use tracing::{error, warn};

use crate::error::{GenerationError, GenerationResult};

use super::{GeneratedImage, Pipeline};

/// A generation running on the blocking thread pool.
#[derive(Debug)]
pub struct GenerationTask {
    handle: JoinHandle<GenerationResult<GeneratedImage>>,
}

impl GenerationTask {
    /// Wait for the generation to finish. A panic inside the stages is reported as
    /// [`GenerationError::Task`].
    pub async fn wait(self) -> GenerationResult<GeneratedImage> {
        self.handle
            .await
            .map_err(|e| GenerationError::Task(e.to_string()))?
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Pipeline {
    /// Start generating an image for `prompt` in the background.
    ///
    /// Must be called from within a tokio runtime. Fails immediately with
    /// [`GenerationError::Busy`] if another generation is in flight.
    pub fn spawn(self: &Arc<Self>, prompt: impl Into<String>) -> GenerationResult<GenerationTask> {
        let runtime = Handle::try_current().map_err(|e| GenerationError::Task(e.to_string()))?;
        let permit = self.acquire()?;
        let pipeline = Arc::clone(self);
        let prompt = prompt.into();
        let handle = runtime.spawn_blocking(move || {
            let _permit = permit;
            pipeline.run(&prompt)
        });
        Ok(GenerationTask { handle })
    }

    fn acquire(&self) -> GenerationResult<OwnedSemaphorePermit> {
        Arc::clone(&self.in_flight)
            .try_acquire_owned()
            .map_err(|_| GenerationError::Busy)
    }

    /// Generate an image for `prompt` and hand it to `on_complete`.
    ///
    /// `on_complete` is called exactly once, with `None` if the request was rejected, any stage
    /// failed, or the runtime shut down before the work ran. The failure itself is logged.
    pub fn generate_image<F>(self: &Arc<Self>, prompt: impl Into<String>, on_complete: F)
    where
        F: FnOnce(Option<GeneratedImage>) + Send + 'static,
    {
        let completion = Completion(Some(on_complete));

        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                error!("image generation needs a tokio runtime: {e}");
                return completion.finish(None);
            }
        };

        let permit = match self.acquire() {
            Ok(permit) => permit,
            Err(e) => {
                warn!("image generation rejected: {e}");
                return completion.finish(None);
            }
        };

        // Dropping the closure unrun (runtime shutdown) or a panicking stage reports `None`.
        let pipeline = Arc::clone(self);
        let prompt = prompt.into();
        runtime.spawn_blocking(move || {
            let _permit = permit;
            let image = match pipeline.run(&prompt) {
                Ok(image) => Some(image),
                Err(e) => {
                    error!("image generation failed: {e}");
                    None
                }
            };
            completion.finish(image);
        });
    }
}

/// Calls the wrapped callback exactly once, with `None` if it is dropped unfinished.
struct Completion<F: FnOnce(Option<GeneratedImage>)>(Option<F>);

impl<F: FnOnce(Option<GeneratedImage>)> Completion<F> {
    fn finish(mut self, image: Option<GeneratedImage>) {
        if let Some(on_complete) = self.0.take() {
            on_complete(image);
        }
    }
}

impl<F: FnOnce(Option<GeneratedImage>)> Drop for Completion<F> {
    fn drop(&mut self) {
        if let Some(on_complete) = self.0.take() {
            warn!("image generation was abandoned before completing");
            on_complete(None);
        }
    }
}
