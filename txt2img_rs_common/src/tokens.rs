use std::{env, fmt, fs, path::PathBuf, str::FromStr};
use thiserror::Error;
use tracing::warn;

use anyhow::Result;

const DEFAULT_TOKEN_ENV_VAR: &str = "HF_TOKEN";

#[derive(Debug, Clone, PartialEq, Eq)]
/// The source of the Hugging Face token used when downloading from the hub.
pub enum TokenSource {
    Literal(String),
    EnvVar(String),
    Path(String),
    CacheToken,
    None,
}

impl FromStr for TokenSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, value) = match s.split_once(':') {
            Some((kind, value)) => (kind, Some(value)),
            None => (s, None),
        };
        match kind {
            "literal" => value
                .map(|value| TokenSource::Literal(value.to_string()))
                .ok_or_else(|| "Expected a value for 'literal'".to_string()),
            "env" => Ok(TokenSource::EnvVar(
                value.unwrap_or(DEFAULT_TOKEN_ENV_VAR).to_string(),
            )),
            "path" => value
                .map(|value| TokenSource::Path(value.to_string()))
                .ok_or_else(|| "Expected a value for 'path'".to_string()),
            "cache" => Ok(TokenSource::CacheToken),
            "none" => Ok(TokenSource::None),
            _ => Err(format!("Invalid token source `{s}`")),
        }
    }
}

impl fmt::Display for TokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenSource::Literal(_) => write!(f, "literal:<redacted>"),
            TokenSource::EnvVar(value) => write!(f, "env:{value}"),
            TokenSource::Path(value) => write!(f, "path:{value}"),
            TokenSource::CacheToken => write!(f, "cache"),
            TokenSource::None => write!(f, "none"),
        }
    }
}

#[derive(Error, Debug)]
enum TokenRetrievalError {
    #[error("No home directory.")]
    HomeDirectoryMissing,
}

fn cache_token_path() -> Result<PathBuf> {
    Ok(dirs::home_dir()
        .ok_or(TokenRetrievalError::HomeDirectoryMissing)?
        .join(".cache")
        .join("huggingface")
        .join("token"))
}

/// This reads a token from a specified source. If the token cannot be read, a warning is logged with `tracing`
/// and *no token is used*.
pub fn get_token(source: &TokenSource) -> Result<Option<String>> {
    fn skip_token(input: &str) -> Option<String> {
        warn!("could not load token at {input:?}, using no HF token.");
        None
    }

    let token = match source {
        TokenSource::Literal(data) => Some(data.clone()),
        TokenSource::EnvVar(envvar) => env::var(envvar).ok().or_else(|| skip_token(envvar)),
        TokenSource::Path(path) => fs::read_to_string(path).ok().or_else(|| skip_token(path)),
        TokenSource::CacheToken => {
            let path = cache_token_path()?;
            fs::read_to_string(&path)
                .ok()
                .or_else(|| skip_token(&path.display().to_string()))
        }
        TokenSource::None => None,
    };

    Ok(token.map(|s| s.trim().to_string()))
}
