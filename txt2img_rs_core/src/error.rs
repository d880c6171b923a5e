use thiserror::Error;

/// Errors raised while constructing a [`crate::Pipeline`]. These are deployment errors: the pipeline
/// cannot serve any request until the model source is fixed.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("model source error: {0}")]
    Source(#[from] anyhow::Error),
    #[error("required file `{0}` is missing from the model source")]
    MissingFile(String),
    #[error("could not read `{path}`: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("could not parse `{path}`: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid safetensors artifact `{path}`: {source}")]
    Safetensors {
        path: String,
        #[source]
        source: safetensors::SafeTensorError,
    },
    #[error("tensor error: {0}")]
    Tensor(#[from] candle_core::Error),
    #[error("unexpected pipeline type `{0}`")]
    UnknownPipeline(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Failure of the image encoding stage. Each way the raster can fail is reported separately.
#[derive(Debug, Error)]
pub enum ImageEncodeError {
    #[error("cannot allocate a {width}x{height} RGB surface")]
    SurfaceAllocation { width: u32, height: u32 },
    #[error("pixel buffer holds {actual} bytes, a {width}x{height} RGB surface needs {expected}")]
    PixelBuffer {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
    #[error("PNG compression failed: {0}")]
    Compression(#[from] image::ImageError),
}

/// Request-time failure of a single generation. No partial image is ever produced.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("a generation is already in flight")]
    Busy,
    #[error("text encoder `{model}` failed: {source}")]
    TextEncoder {
        model: String,
        #[source]
        source: candle_core::Error,
    },
    #[error("`{output}` is missing in the output of `{model}`")]
    MissingOutput { model: String, output: String },
    #[error("hidden state tensor is empty")]
    EmptyHiddenState,
    #[error("tensor error: {0}")]
    Tensor(#[from] candle_core::Error),
    #[error(transparent)]
    Image(#[from] ImageEncodeError),
    #[error("generation task failed: {0}")]
    Task(String),
}

pub type LoadResult<T> = std::result::Result<T, LoadError>;
pub type GenerationResult<T> = std::result::Result<T, GenerationError>;
