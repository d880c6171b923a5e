use std::{
    fmt::{Debug, Display},
    fs,
    path::{Path, PathBuf},
};

use crate::{get_token, TokenSource};
use hf_hub::{
    api::sync::{ApiBuilder, ApiRepo},
    Repo, RepoType,
};

/// Source from which to load the model. This is easiest to create with the various constructor functions.
#[derive(Clone, Debug)]
pub enum ModelSource {
    /// A directory laid out like a Hugging Face pipeline repository.
    LocalDir(PathBuf),
    ModelId(String),
}

impl Display for ModelSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LocalDir(dir) => write!(f, "local directory: {}", dir.display()),
            Self::ModelId(model_id) => write!(f, "model id: {model_id}"),
        }
    }
}

impl ModelSource {
    /// Load the model from a Hugging Face model ID.
    pub fn from_model_id<S: ToString>(model_id: S) -> Self {
        Self::ModelId(model_id.to_string())
    }

    /// Load the model from a local directory.
    pub fn from_local_dir<P: AsRef<Path>>(dir: P) -> Self {
        Self::LocalDir(dir.as_ref().to_path_buf())
    }
}

pub enum FileLoader {
    Local(PathBuf),
    Api(Box<ApiRepo>),
}

impl FileLoader {
    pub fn from_model_source(
        source: &ModelSource,
        silent: bool,
        token: TokenSource,
        revision: Option<String>,
    ) -> anyhow::Result<Self> {
        match source {
            ModelSource::LocalDir(dir) => {
                if !dir.is_dir() {
                    anyhow::bail!("`{}` is not a directory.", dir.display());
                }
                Ok(Self::Local(dir.clone()))
            }
            ModelSource::ModelId(model_id) => {
                let api_builder = ApiBuilder::new()
                    .with_progress(!silent)
                    .with_token(get_token(&token)?)
                    .build()?;
                let revision = revision.unwrap_or("main".to_string());
                let api = api_builder.repo(Repo::with_revision(
                    model_id.clone(),
                    RepoType::Model,
                    revision,
                ));

                Ok(Self::Api(Box::new(api)))
            }
        }
    }

    /// List every file of the source as a `/`-separated path relative to its root.
    pub fn list_files(&self) -> anyhow::Result<Vec<String>> {
        match self {
            Self::Local(root) => {
                let mut files = Vec::new();
                collect_files(root, root, &mut files)?;
                files.sort();
                Ok(files)
            }
            Self::Api(api) => api
                .info()
                .map(|repo| {
                    repo.siblings
                        .iter()
                        .map(|x| x.rfilename.clone())
                        .collect::<Vec<String>>()
                })
                .map_err(|e| anyhow::Error::msg(e.to_string())),
        }
    }

    /// Read a file.
    ///
    /// - For local directories, the path is checked for existence.
    /// - For Hugging Face model IDs, the file is downloaded to the cache (if needed) first.
    pub fn read_file(&self, name: &str) -> anyhow::Result<FileData> {
        match self {
            Self::Local(root) => {
                let path = root.join(name);
                if !path.is_file() {
                    anyhow::bail!("File `{name}` not found in `{}`.", root.display());
                }
                Ok(FileData(path))
            }
            Self::Api(api) => Ok(FileData(
                api.get(name)
                    .map_err(|e| anyhow::Error::msg(e.to_string()))?,
            )),
        }
    }
}

fn collect_files(root: &Path, dir: &Path, files: &mut Vec<String>) -> anyhow::Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(root, &path, files)?;
        } else {
            let relative = path.strip_prefix(root)?;
            let name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            files.push(name);
        }
    }
    Ok(())
}

/// A resolved file on disk, obtained from a [`FileLoader`].
pub struct FileData(PathBuf);

impl Debug for FileData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "path: {}", self.0.display())
    }
}

impl FileData {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        Self(path.as_ref().to_path_buf())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}
