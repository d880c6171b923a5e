use candle_core::{DType, Tensor};

use crate::error::{GenerationError, GenerationResult};

pub const LATENT_ALPHA: f64 = 1.0;
pub const LATENT_BETA: f64 = 1.0;

/// Number of RGB channels in the latent and pixel buffers.
pub const CHANNELS: usize = 3;

/// Expand the hidden state into a flat latent buffer of `width * height * 3` values.
///
/// The hidden state is read cyclically: `latent[i] = ALPHA * hidden[i % len(hidden)] + BETA`.
/// This is a single deterministic pass, there is no noise schedule and no denoising loop.
pub fn synthesize(hidden: &Tensor, width: usize, height: usize) -> GenerationResult<Tensor> {
    let hidden = hidden.flatten_all()?.to_dtype(DType::F32)?;
    let len = hidden.elem_count();
    if len == 0 {
        return Err(GenerationError::EmptyHiddenState);
    }

    let n = width * height * CHANNELS;
    let reps = n.div_ceil(len);
    Ok(hidden
        .unsqueeze(0)?
        .broadcast_as((reps, len))?
        .flatten_all()?
        .narrow(0, 0, n)?
        .affine(LATENT_ALPHA, LATENT_BETA)?)
}
