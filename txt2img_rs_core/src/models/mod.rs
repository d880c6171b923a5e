mod text_encoder;
mod weights;

use std::collections::HashMap;

use candle_core::{Device, Result, Tensor};

pub use text_encoder::{LinearTextEncoder, TextEncoderConfig, LAST_HIDDEN_STATE, TEXT_INPUT};
pub use weights::ModelWeights;

/// Named input or output features of a model.
pub type Features = HashMap<String, Tensor>;

/// A loaded model which maps named input tensors to named output tensors.
///
/// Implementations must not mutate themselves during `predict`: a single handle is shared by every
/// generation request.
pub trait FeatureModel: Send + Sync {
    fn name(&self) -> &str;
    fn predict(&self, inputs: &Features) -> Result<Features>;
    /// Device the inputs should be placed on.
    fn device(&self) -> Device;
}
