//! Error types for segment encoding.

use thiserror::Error;

/// Failures of an encoder stream. All of them are fatal for the stream.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum EncoderError {
    /// The worker answered a write other than the oldest outstanding one.
    #[error("encoder responses out of order: expected {expected:?}, got {actual}")]
    OutOfOrder { expected: Option<u64>, actual: u64 },

    /// The worker hung up while writes were outstanding.
    #[error("encoder worker disconnected")]
    WorkerGone,

    /// The worker could not be started.
    #[error("encoder worker unavailable: {0}")]
    WorkerUnavailable(String),

    /// The worker reported an error for the stream.
    #[error("encoder worker error: {0}")]
    Worker(String),
}

/// Failures when reading a flushed segment back.
#[derive(Debug, Error)]
pub enum SegmentError {
    #[error("invalid segment payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    Encoder(#[from] EncoderError),
}

pub type Result<T> = std::result::Result<T, SegmentError>;
