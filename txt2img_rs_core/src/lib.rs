//! Core crate for interacting with txt2img_rs.
//!
//! A [`Pipeline`] owns the tokenizer and the three model handles (text encoder, UNet, VAE
//! decoder) and turns a prompt into a PNG.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use txt2img_rs_core::{ModelSource, Pipeline, TokenSource};
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let pipeline = Arc::new(Pipeline::load(
//!     ModelSource::from_local_dir("stable-diffusion"),
//!     false,
//!     TokenSource::None,
//!     None,
//! )?);
//!
//! let image = pipeline.spawn("A beautiful landscape")?.wait().await?;
//! image.save("image.png")?;
//! # Ok(())
//! # }
//! ```

mod error;
mod models;
mod pipelines;
mod tokenizer;
mod util;

pub use error::{GenerationError, GenerationResult, ImageEncodeError, LoadError, LoadResult};
pub use models::{
    FeatureModel, Features, LinearTextEncoder, ModelWeights, TextEncoderConfig,
    LAST_HIDDEN_STATE, TEXT_INPUT,
};
pub use pipelines::{
    decode, synthesize, ComponentName, GeneratedImage, GenerationParams, GenerationTask,
    ImageEncoder, Pipeline, PipelineComponents, PngEncoder, LATENT_ALPHA, LATENT_BETA,
};
pub use tokenizer::{SpecialToken, Tokenizer, CLS_ROLE, SEP_ROLE};
pub use txt2img_rs_common::{ModelSource, TokenSource};
