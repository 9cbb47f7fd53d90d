use std::path::PathBuf;

use thiserror::Error;

use crate::extract::ExtractError;

#[derive(Error, Debug)]
pub enum DankiError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serde json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("llm request failed: {0}")]
    Llm(String),
    #[error("model reply unusable: {0}")]
    Extract(#[from] ExtractError),
    #[error("model reply has unexpected shape: {0}")]
    Parse(String),
    #[error("worker output missing: {0:?}")]
    MissingPart(PathBuf),
    #[error("no api keys found in {0:?}")]
    NoCredentials(PathBuf),
    #[error("cannot create note: {0}")]
    IncompleteNote(String),
    #[error("speech synthesis failed: {0}")]
    Audio(String),
    #[error("anki: {0}")]
    Anki(String),
    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, DankiError>;

impl From<anyhow::Error> for DankiError {
    fn from(value: anyhow::Error) -> Self {
        Self::Llm(format!("{value:#}"))
    }
}
