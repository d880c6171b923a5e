use std::{collections::BTreeMap, fmt::Debug, fs::File};

use memmap2::Mmap;
use safetensors::SafeTensors;
use txt2img_rs_common::FileData;

use crate::error::{LoadError, LoadResult};

/// A memory-mapped safetensors artifact. The header and every tensor view are validated when the
/// handle is created; the mapping stays alive for the lifetime of the handle.
pub struct ModelWeights {
    name: String,
    shapes: BTreeMap<String, Vec<usize>>,
    mmap: Mmap,
}

impl Debug for ModelWeights {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelWeights")
            .field("name", &self.name)
            .field("tensors", &self.shapes.len())
            .field("size_in_bytes", &self.size_in_bytes())
            .finish()
    }
}

impl ModelWeights {
    pub fn load(name: impl ToString, file: &FileData) -> LoadResult<Self> {
        let path = file.path().display().to_string();
        let handle = File::open(file.path()).map_err(|source| LoadError::Io {
            path: path.clone(),
            source,
        })?;
        // The artifact is treated as read-only for the lifetime of the pipeline.
        let mmap = unsafe { Mmap::map(&handle) }.map_err(|source| LoadError::Io {
            path: path.clone(),
            source,
        })?;

        let shapes = {
            let st = SafeTensors::deserialize(&mmap)
                .map_err(|source| LoadError::Safetensors { path, source })?;
            st.tensors()
                .into_iter()
                .map(|(name, view)| (name, view.shape().to_vec()))
                .collect::<BTreeMap<_, _>>()
        };

        Ok(Self {
            name: name.to_string(),
            shapes,
            mmap,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tensor_names(&self) -> impl Iterator<Item = &str> {
        self.shapes.keys().map(String::as_str)
    }

    pub fn shape(&self, tensor: &str) -> Option<&[usize]> {
        self.shapes.get(tensor).map(Vec::as_slice)
    }

    pub fn size_in_bytes(&self) -> usize {
        self.mmap.len()
    }
}
