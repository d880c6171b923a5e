use candle_core::{DType, Tensor};
use tracing::debug;

use crate::{
    error::{GenerationError, GenerationResult},
    models::{FeatureModel, Features, LAST_HIDDEN_STATE, TEXT_INPUT},
};

/// Run the text encoder on a `(1, seq_len)` all-zero input and return its last hidden state.
///
/// Note: the prompt's token ids are not written into the input, so every prompt encodes to the
/// same hidden state.
pub(crate) fn encode_text(model: &dyn FeatureModel, seq_len: usize) -> GenerationResult<Tensor> {
    let text_input = Tensor::zeros((1, seq_len), DType::F32, &model.device())?;
    let inputs = Features::from([(TEXT_INPUT.to_string(), text_input)]);

    let mut outputs = model
        .predict(&inputs)
        .map_err(|source| GenerationError::TextEncoder {
            model: model.name().to_string(),
            source,
        })?;

    let hidden = outputs
        .remove(LAST_HIDDEN_STATE)
        .ok_or_else(|| GenerationError::MissingOutput {
            model: model.name().to_string(),
            output: LAST_HIDDEN_STATE.to_string(),
        })?;
    debug!("encoded text to hidden state of shape {:?}", hidden.dims());
    Ok(hidden)
}
