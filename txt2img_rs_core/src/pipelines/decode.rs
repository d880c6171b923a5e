use candle_core::{DType, Tensor};

use crate::error::GenerationResult;

/// Map latents in `[-1, 1]` to 8-bit channel values.
///
/// `pixel = u8(clamp((latent + 1) / 2, 0, 1) * 255)`, truncating toward zero. Values outside
/// `[-1, 1]` saturate.
pub fn decode(latents: &Tensor) -> GenerationResult<Vec<u8>> {
    let pixels = latents
        .to_dtype(DType::F32)?
        .affine(0.5, 0.5)?
        .clamp(0f32, 1f32)?
        .affine(255., 0.)?
        .floor()?
        .to_dtype(DType::U8)?
        .flatten_all()?
        .to_vec1::<u8>()?;
    Ok(pixels)
}
