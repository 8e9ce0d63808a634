//! Error types for midigen

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MidigenError {
    #[error("Invalid config value for `{field}`: {reason}")]
    InvalidConfig { field: &'static str, reason: String },
    #[error("Missing `[{0}]` section for the selected generation type")]
    MissingSection(&'static str),
    #[error("Unknown mode: {0}")]
    UnknownMode(String),
    #[error("Unknown arpeggiator mode: {0}")]
    UnknownArpMode(String),
    #[error("Invalid note name: {0}")]
    InvalidNoteName(String),
    #[error("Unknown effect: {0}")]
    UnknownEffect(String),
    #[error("Invalid parameter `{param}` for effect {effect}: {reason}")]
    InvalidEffectParam { effect: String, param: String, reason: String },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> MidigenError {
    MidigenError::InvalidConfig { field, reason: reason.into() }
}

pub type Result<T> = std::result::Result<T, MidigenError>;
