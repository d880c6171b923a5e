mod decode;
mod image_encoder;
mod latents;
mod task;
mod text;

use std::{collections::HashMap, fmt::Display, sync::Arc};

use serde::Deserialize;
use tokio::sync::Semaphore;
use tracing::{debug, info};

use txt2img_rs_common::{FileData, FileLoader, ModelSource, NiceProgressBar, TokenSource};

use crate::{
    error::{GenerationError, GenerationResult, LoadError, LoadResult},
    models::{FeatureModel, LinearTextEncoder, ModelWeights, TextEncoderConfig},
    tokenizer::Tokenizer,
    util::{default_device, read_json},
};

pub use decode::decode;
pub use image_encoder::{GeneratedImage, ImageEncoder, PngEncoder};
pub use latents::{synthesize, LATENT_ALPHA, LATENT_BETA};
pub use task::GenerationTask;

const PIPELINE_CLASS_NAME: &str = "StableDiffusionPipeline";
const DEFAULT_SEQ_LEN: usize = 77;

fn default_size() -> u32 {
    512
}

/// Output image size. Fixed for the lifetime of a [`Pipeline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct GenerationParams {
    #[serde(default = "default_size")]
    pub width: u32,
    #[serde(default = "default_size")]
    pub height: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            width: default_size(),
            height: default_size(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ComponentName {
    Tokenizer,
    TextEncoder,
    Unet,
    VaeDecoder,
}

impl Display for ComponentName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tokenizer => write!(f, "tokenizer"),
            Self::TextEncoder => write!(f, "text_encoder"),
            Self::Unet => write!(f, "unet"),
            Self::VaeDecoder => write!(f, "vae_decoder"),
        }
    }
}

impl ComponentName {
    const ALL: [ComponentName; 4] = [
        Self::Tokenizer,
        Self::TextEncoder,
        Self::Unet,
        Self::VaeDecoder,
    ];

    fn required_files(&self) -> &'static [&'static str] {
        match self {
            Self::Tokenizer => &["vocab.json", "merges.txt", "special_tokens_map.json"],
            Self::TextEncoder => &["config.json", "model.safetensors"],
            Self::Unet | Self::VaeDecoder => &["model.safetensors"],
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
struct ModelIndex {
    #[serde(rename = "_class_name")]
    name: String,
    #[serde(flatten)]
    params: GenerationParams,
}

/// Everything a [`Pipeline`] owns. Build this directly to run the pipeline with custom models.
pub struct PipelineComponents {
    pub tokenizer: Tokenizer,
    pub text_encoder: Arc<dyn FeatureModel>,
    /// Sequence length of the text encoder input.
    pub seq_len: usize,
    pub unet: ModelWeights,
    pub vae_decoder: ModelWeights,
    pub image_encoder: Arc<dyn ImageEncoder>,
}

impl PipelineComponents {
    /// Components with a 77 token text input and PNG output.
    pub fn new(
        tokenizer: Tokenizer,
        text_encoder: Arc<dyn FeatureModel>,
        unet: ModelWeights,
        vae_decoder: ModelWeights,
    ) -> Self {
        Self {
            tokenizer,
            text_encoder,
            seq_len: DEFAULT_SEQ_LEN,
            unet,
            vae_decoder,
            image_encoder: Arc::new(PngEncoder),
        }
    }

    pub fn with_seq_len(mut self, seq_len: usize) -> Self {
        self.seq_len = seq_len;
        self
    }

    pub fn with_image_encoder(mut self, image_encoder: Arc<dyn ImageEncoder>) -> Self {
        self.image_encoder = image_encoder;
        self
    }
}

/// Represents the models and provides methods to generate images with them.
///
/// At most one generation runs at a time: a request made while another is in flight fails with
/// [`GenerationError::Busy`].
pub struct Pipeline {
    tokenizer: Tokenizer,
    text_encoder: Arc<dyn FeatureModel>,
    seq_len: usize,
    unet: ModelWeights,
    vae_decoder: ModelWeights,
    image_encoder: Arc<dyn ImageEncoder>,
    params: GenerationParams,
    in_flight: Arc<Semaphore>,
    silent: bool,
}

impl Pipeline {
    /// Load the pipeline.
    ///
    /// The source must contain `model_index.json` and the `tokenizer`, `text_encoder`, `unet` and
    /// `vae_decoder` components. Any missing or unparsable file is an error.
    ///
    /// Note:
    /// - `token` and `revision` are only applicable for Hugging Face models.
    pub fn load(
        source: ModelSource,
        silent: bool,
        token: TokenSource,
        revision: Option<String>,
    ) -> LoadResult<Self> {
        if !silent {
            info!("loading from source: {source}.");
        }

        let loader = FileLoader::from_model_source(&source, silent, token, revision)?;
        let files = loader.list_files()?;

        let index_file = require_file(&loader, &files, "model_index.json")?;
        let ModelIndex { name, params } = read_json(&index_file)?;
        if name != PIPELINE_CLASS_NAME {
            return Err(LoadError::UnknownPipeline(name));
        }

        let mut components = HashMap::new();
        for component in
            NiceProgressBar::<_, 'g'>(ComponentName::ALL.into_iter(), "Loading components")
                .maybe_silent(silent)
        {
            let mut component_files = HashMap::new();
            for file in component.required_files() {
                let name = format!("{component}/{file}");
                component_files.insert(*file, require_file(&loader, &files, &name)?);
            }
            components.insert(component, component_files);
        }
        let mut take = |component: ComponentName, file: &str| {
            components
                .get_mut(&component)
                .and_then(|files| files.remove(file))
                .ok_or_else(|| LoadError::MissingFile(format!("{component}/{file}")))
        };

        let device = default_device()?;
        if !silent {
            info!("loading models on {device:?}");
        }

        let tokenizer = Tokenizer::from_files(
            &take(ComponentName::Tokenizer, "vocab.json")?,
            &take(ComponentName::Tokenizer, "merges.txt")?,
            &take(ComponentName::Tokenizer, "special_tokens_map.json")?,
        )?;

        let text_encoder_cfg: TextEncoderConfig =
            read_json(&take(ComponentName::TextEncoder, "config.json")?)?;
        let text_encoder = LinearTextEncoder::load(
            &text_encoder_cfg,
            &take(ComponentName::TextEncoder, "model.safetensors")?,
            &device,
        )?;
        let unet = ModelWeights::load(
            ComponentName::Unet,
            &take(ComponentName::Unet, "model.safetensors")?,
        )?;
        let vae_decoder = ModelWeights::load(
            ComponentName::VaeDecoder,
            &take(ComponentName::VaeDecoder, "model.safetensors")?,
        )?;
        if !silent {
            info!(
                "loaded tokenizer with {} entries, unet with {} tensors, vae decoder with {} tensors",
                tokenizer.vocab_size(),
                unet.tensor_names().count(),
                vae_decoder.tensor_names().count()
            );
        }

        let components = PipelineComponents::new(tokenizer, Arc::new(text_encoder), unet, vae_decoder)
            .with_seq_len(text_encoder_cfg.max_position_embeddings);
        Self::new(components, params, silent)
    }

    /// Assemble a pipeline from already loaded components.
    pub fn new(
        components: PipelineComponents,
        params: GenerationParams,
        silent: bool,
    ) -> LoadResult<Self> {
        if params.width == 0 || params.height == 0 {
            return Err(LoadError::InvalidConfig(format!(
                "image size must be nonzero, got {}x{}",
                params.width, params.height
            )));
        }
        if components.seq_len == 0 {
            return Err(LoadError::InvalidConfig(
                "text encoder sequence length must be nonzero".to_string(),
            ));
        }

        let PipelineComponents {
            tokenizer,
            text_encoder,
            seq_len,
            unet,
            vae_decoder,
            image_encoder,
        } = components;
        Ok(Self {
            tokenizer,
            text_encoder,
            seq_len,
            unet,
            vae_decoder,
            image_encoder,
            params,
            in_flight: Arc::new(Semaphore::new(1)),
            silent,
        })
    }

    /// Generate an image for `prompt` on the current thread.
    pub fn generate(&self, prompt: &str) -> GenerationResult<GeneratedImage> {
        let _permit = self
            .in_flight
            .try_acquire()
            .map_err(|_| GenerationError::Busy)?;
        self.run(prompt)
    }

    /// Runs every stage. Callers must hold the in-flight permit.
    fn run(&self, prompt: &str) -> GenerationResult<GeneratedImage> {
        let GenerationParams { width, height } = self.params;

        let tokens = self.tokenizer.encode(prompt, true);
        debug!("prompt tokenized to {} ids", tokens.len());

        let hidden = text::encode_text(self.text_encoder.as_ref(), self.seq_len)?;
        let latents = synthesize(&hidden, width as usize, height as usize)?;
        debug!("synthesized {} latents", latents.elem_count());

        let pixels = decode(&latents)?;
        debug!("decoded {} channel values", pixels.len());

        let bytes = self.image_encoder.encode(pixels, width, height)?;
        if !self.silent {
            info!("image generation completed ({width}x{height}, {} bytes).", bytes.len());
        }
        Ok(GeneratedImage::new(bytes, width, height))
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    pub fn params(&self) -> GenerationParams {
        self.params
    }

    pub fn unet(&self) -> &ModelWeights {
        &self.unet
    }

    pub fn vae_decoder(&self) -> &ModelWeights {
        &self.vae_decoder
    }
}

fn require_file(loader: &FileLoader, files: &[String], name: &str) -> LoadResult<FileData> {
    if !files.iter().any(|file| file == name) {
        return Err(LoadError::MissingFile(name.to_string()));
    }
    Ok(loader.read_file(name)?)
}
