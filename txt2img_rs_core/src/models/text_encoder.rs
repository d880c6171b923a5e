use candle_core::{DType, Device, Result, Tensor, D};
use serde::Deserialize;
use txt2img_rs_common::FileData;

use super::{FeatureModel, Features};
use crate::error::{LoadError, LoadResult};

pub const TEXT_INPUT: &str = "text_input";
pub const LAST_HIDDEN_STATE: &str = "last_hidden_state";

const WEIGHT_NAME: &str = "text_projection.weight";
const BIAS_NAME: &str = "text_projection.bias";

fn default_max_position_embeddings() -> usize {
    77
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct TextEncoderConfig {
    /// Sequence length of the encoder input.
    #[serde(default = "default_max_position_embeddings")]
    pub max_position_embeddings: usize,
    pub hidden_size: usize,
}

/// Text encoder made of a single linear projection from the `(batch, seq_len)` text input to a
/// `(batch, hidden_size)` hidden state.
#[derive(Debug)]
pub struct LinearTextEncoder {
    name: String,
    w: Tensor,
    b: Option<Tensor>,
}

impl LinearTextEncoder {
    pub fn new(name: impl ToString, w: Tensor, b: Option<Tensor>) -> Result<Self> {
        let (out_dim, _in_dim) = w.dims2()?;
        if let Some(b) = &b {
            let bias_dim = b.dims1()?;
            if bias_dim != out_dim {
                candle_core::bail!("bias has {bias_dim} elements, expected {out_dim}");
            }
        }
        Ok(Self {
            name: name.to_string(),
            w: w.to_dtype(DType::F32)?,
            b: b.map(|b| b.to_dtype(DType::F32)).transpose()?,
        })
    }

    /// Load the projection from a safetensors artifact and check it against `cfg`.
    pub fn load(cfg: &TextEncoderConfig, weights: &FileData, device: &Device) -> LoadResult<Self> {
        let mut tensors = candle_core::safetensors::load(weights.path(), device)?;
        let w = tensors.remove(WEIGHT_NAME).ok_or_else(|| {
            LoadError::InvalidConfig(format!(
                "`{WEIGHT_NAME}` not found in {}",
                weights.path().display()
            ))
        })?;
        let b = tensors.remove(BIAS_NAME);

        let dims = w.dims2()?;
        if dims != (cfg.hidden_size, cfg.max_position_embeddings) {
            return Err(LoadError::InvalidConfig(format!(
                "`{WEIGHT_NAME}` has shape {dims:?}, config expects ({}, {})",
                cfg.hidden_size, cfg.max_position_embeddings
            )));
        }

        Ok(Self::new("text_encoder", w, b)?)
    }

    pub fn seq_len(&self) -> Result<usize> {
        self.w.dim(D::Minus1)
    }

    pub fn hidden_size(&self) -> Result<usize> {
        self.w.dim(0)
    }

    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let xs = xs.to_dtype(DType::F32)?;
        let ys = xs.matmul(&self.w.t()?)?;
        match &self.b {
            Some(b) => ys.broadcast_add(b),
            None => Ok(ys),
        }
    }
}

impl FeatureModel for LinearTextEncoder {
    fn name(&self) -> &str {
        &self.name
    }

    fn predict(&self, inputs: &Features) -> Result<Features> {
        let Some(xs) = inputs.get(TEXT_INPUT) else {
            candle_core::bail!("missing input feature `{TEXT_INPUT}`")
        };
        let hidden = self.forward(xs)?;
        Ok(Features::from([(LAST_HIDDEN_STATE.to_string(), hidden)]))
    }

    fn device(&self) -> Device {
        self.w.device().clone()
    }
}
