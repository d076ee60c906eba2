//! Byte encoders.
//!
//! An [`Encoder`] accepts string chunks and produces the bytes of one
//! segment at a time. Completion is reported through
//! [`Encoder::poll_events`] so a worker-backed encoder can answer later
//! than the call that triggered the work.

use crate::error::EncoderError;

/// Identifier of a write, increasing per encoder.
pub type WriteId = u64;

/// Identifier of a finish request.
pub type FinishId = u64;

/// Output of a finished stream.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EncoderResult {
    /// Encoded bytes.
    pub output: Vec<u8>,
    /// Size of the written data before encoding.
    pub raw_bytes_count: usize,
    /// Size of `output`.
    pub encoded_bytes_count: usize,
    /// Data written but not encoded yet. Only set by `finish_sync`.
    pub pending_data: String,
}

impl EncoderResult {
    /// Encoded output followed by the raw pending data.
    pub fn into_bytes(self) -> Vec<u8> {
        let mut bytes = self.output;
        bytes.extend_from_slice(self.pending_data.as_bytes());
        bytes
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EncoderEvent {
    /// A write was encoded, growing the output by `additional_encoded_bytes`.
    Written {
        id: WriteId,
        additional_encoded_bytes: usize,
    },
    /// A finish request completed.
    Finished { id: FinishId, result: EncoderResult },
    /// The stream is aborted. No further events follow.
    Failed(EncoderError),
}

pub trait Encoder {
    /// Queue `data` for encoding.
    fn write(&mut self, data: &str) -> WriteId;

    /// Close the current stream. A `Finished` event with the returned id
    /// carries the result once every outstanding write is encoded.
    fn finish(&mut self) -> FinishId;

    /// Close the current stream now, returning unencoded data as
    /// `pending_data`. Outstanding finish requests are abandoned.
    fn finish_sync(&mut self) -> EncoderResult;

    /// Whether nothing was written since the last finish.
    fn is_empty(&self) -> bool;

    /// Drain the events produced since the last call.
    fn poll_events(&mut self) -> Vec<EncoderEvent>;
}

/// Identity encoder answering every request immediately.
#[derive(Debug, Default)]
pub struct SyncEncoder {
    output: Vec<u8>,
    next_write_id: WriteId,
    next_finish_id: FinishId,
    events: Vec<EncoderEvent>,
}

impl SyncEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    fn consume_result(&mut self) -> EncoderResult {
        let output = std::mem::take(&mut self.output);
        EncoderResult {
            raw_bytes_count: output.len(),
            encoded_bytes_count: output.len(),
            output,
            pending_data: String::new(),
        }
    }
}

impl Encoder for SyncEncoder {
    fn write(&mut self, data: &str) -> WriteId {
        let id = self.next_write_id;
        self.next_write_id += 1;
        self.output.extend_from_slice(data.as_bytes());
        self.events.push(EncoderEvent::Written {
            id,
            additional_encoded_bytes: data.len(),
        });
        id
    }

    fn finish(&mut self) -> FinishId {
        let id = self.next_finish_id;
        self.next_finish_id += 1;
        let result = self.consume_result();
        self.events.push(EncoderEvent::Finished { id, result });
        id
    }

    fn finish_sync(&mut self) -> EncoderResult {
        self.consume_result()
    }

    fn is_empty(&self) -> bool {
        self.output.is_empty()
    }

    fn poll_events(&mut self) -> Vec<EncoderEvent> {
        std::mem::take(&mut self.events)
    }
}
