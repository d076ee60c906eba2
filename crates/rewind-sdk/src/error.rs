//! Error types for the Rewind SDK.

use rewind_segment::EncoderError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecorderError {
    /// The host cannot deliver tree change notifications.
    #[error("environment does not support recording: {0}")]
    Unsupported(String),

    #[error("encoder error: {0}")]
    Encoder(#[from] EncoderError),
}

pub type Result<T> = std::result::Result<T, RecorderError>;
