//! Delivery payloads.

use crate::error::Result;
use crate::segment::SegmentMetadata;
use serde::{Deserialize, Serialize};

/// Description sent alongside the segment bytes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentEvent {
    pub raw_segment_size: usize,
    pub compressed_segment_size: usize,
    #[serde(flatten)]
    pub metadata: SegmentMetadata,
}

/// A flushed segment ready for a [`Transport`](crate::Transport).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplayPayload {
    pub segment: Vec<u8>,
    /// `<session id>-<start>`
    pub filename: String,
    pub event: SegmentEvent,
}

impl ReplayPayload {
    pub fn new(segment: Vec<u8>, metadata: SegmentMetadata, raw_segment_size: usize) -> Self {
        let filename = format!("{}-{}", metadata.session.id, metadata.start);
        Self {
            event: SegmentEvent {
                raw_segment_size,
                compressed_segment_size: segment.len(),
                metadata,
            },
            segment,
            filename,
        }
    }

    pub fn bytes_count(&self) -> usize {
        self.segment.len()
    }

    pub fn event_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.event)
    }

    pub fn decode(&self) -> Result<DecodedSegment> {
        decode_segment(&self.segment)
    }
}

/// A segment read back from its bytes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DecodedSegment {
    /// Records in emission order, kept untyped so sentinels survive.
    pub records: Vec<serde_json::Value>,
    #[serde(flatten)]
    pub metadata: SegmentMetadata,
}

impl DecodedSegment {
    /// Records that parse as [`Record`](rewind_core::Record).
    pub fn typed_records(&self) -> Vec<rewind_core::Record> {
        self.records
            .iter()
            .filter_map(|r| serde_json::from_value(r.clone()).ok())
            .collect()
    }
}

pub fn decode_segment(bytes: &[u8]) -> Result<DecodedSegment> {
    Ok(serde_json::from_slice(bytes)?)
}
