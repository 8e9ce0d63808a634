//! Error types for the service layer

use midigen_core::MidigenError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid tempo: {0} BPM")]
    InvalidTempo(u16),
    #[error("Delta of {0} ticks does not fit a MIDI variable-length quantity")]
    TickOverflow(u32),
    #[error(transparent)]
    Core(#[from] MidigenError),
}

pub type Result<T> = std::result::Result<T, ServiceError>;
