use candle_core::{Device, Result};
use serde::de::DeserializeOwned;
use txt2img_rs_common::FileData;

use crate::error::{LoadError, LoadResult};

/// Device the models are loaded on.
///
/// - With the `metal` feature: the first Metal device.
/// - Otherwise: the first CUDA device if this build has CUDA support and one is present, else the CPU.
pub(crate) fn default_device() -> Result<Device> {
    #[cfg(not(feature = "metal"))]
    let device = Device::cuda_if_available(0)?;
    #[cfg(feature = "metal")]
    let device = Device::new_metal(0)?;
    Ok(device)
}

pub(crate) fn read_text(file: &FileData) -> LoadResult<String> {
    std::fs::read_to_string(file.path()).map_err(|source| LoadError::Io {
        path: file.path().display().to_string(),
        source,
    })
}

pub(crate) fn read_json<T: DeserializeOwned>(file: &FileData) -> LoadResult<T> {
    serde_json::from_str(&read_text(file)?).map_err(|source| LoadError::Json {
        path: file.path().display().to_string(),
        source,
    })
}
