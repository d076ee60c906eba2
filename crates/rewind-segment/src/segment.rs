//! One segment of the replay stream.
//!
//! The encoded bytes of a segment form a single JSON document:
//!
//! ```text
//! {"records":[<record>,<record>,...],"application":{...},...,"source":"browser"}\n
//! ```
//!
//! The records are streamed into the encoder as they arrive. The metadata is
//! only known at flush time and is appended as the trailer, reusing the
//! object opened by the prefix.

use crate::encoder::{Encoder, EncoderResult, FinishId, WriteId};
use rewind_core::record::{Record, TimeStamp};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// Written in place of a record that failed to serialize.
pub const UNSERIALIZABLE_RECORD: &str = "\"[unserializable record]\"";

const RECORDS_PREFIX: &str = "{\"records\":[";

// ============================================================================
// Reasons
// ============================================================================

/// Why a segment was flushed. The flush reason of one segment is the
/// creation reason of the next; the first segment is created with `Init`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlushReason {
    Init,
    SegmentDurationLimit,
    SegmentBytesLimit,
    ViewChange,
    Stop,
    VisibilityHidden,
    BeforeUnload,
    PageHide,
    PageFrozen,
}

impl FlushReason {
    pub fn is_page_exit(&self) -> bool {
        matches!(
            self,
            FlushReason::VisibilityHidden
                | FlushReason::BeforeUnload
                | FlushReason::PageHide
                | FlushReason::PageFrozen
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FlushReason::Init => "init",
            FlushReason::SegmentDurationLimit => "segment_duration_limit",
            FlushReason::SegmentBytesLimit => "segment_bytes_limit",
            FlushReason::ViewChange => "view_change",
            FlushReason::Stop => "stop",
            FlushReason::VisibilityHidden => "visibility_hidden",
            FlushReason::BeforeUnload => "before_unload",
            FlushReason::PageHide => "page_hide",
            FlushReason::PageFrozen => "page_frozen",
        }
    }
}

impl fmt::Display for FlushReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Host signals that the page is going away.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageExitReason {
    VisibilityHidden,
    BeforeUnload,
    PageHide,
    PageFrozen,
}

impl From<PageExitReason> for FlushReason {
    fn from(reason: PageExitReason) -> Self {
        match reason {
            PageExitReason::VisibilityHidden => FlushReason::VisibilityHidden,
            PageExitReason::BeforeUnload => FlushReason::BeforeUnload,
            PageExitReason::PageHide => FlushReason::PageHide,
            PageExitReason::PageFrozen => FlushReason::PageFrozen,
        }
    }
}

impl fmt::Display for PageExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        FlushReason::from(*self).fmt(f)
    }
}

// ============================================================================
// Metadata
// ============================================================================

/// Identifiers of the view a segment belongs to.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SegmentContext {
    pub application_id: String,
    pub session_id: String,
    pub view_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    pub id: String,
}

impl EntityRef {
    fn new(id: &str) -> Self {
        Self { id: id.to_string() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentMetadata {
    pub application: EntityRef,
    pub session: EntityRef,
    pub view: EntityRef,
    pub start: TimeStamp,
    pub end: TimeStamp,
    pub records_count: u64,
    pub has_full_snapshot: bool,
    pub creation_reason: FlushReason,
    pub index_in_view: u32,
    pub source: String,
}

// ============================================================================
// Segment
// ============================================================================

#[derive(Clone, Debug)]
pub struct Segment {
    metadata: SegmentMetadata,
    encoded_bytes_count: usize,
}

impl Segment {
    pub fn new(
        context: &SegmentContext,
        creation_reason: FlushReason,
        index_in_view: u32,
        source: impl Into<String>,
    ) -> Self {
        Self {
            metadata: SegmentMetadata {
                application: EntityRef::new(&context.application_id),
                session: EntityRef::new(&context.session_id),
                view: EntityRef::new(&context.view_id),
                start: TimeStamp::MAX,
                end: TimeStamp::MIN,
                records_count: 0,
                has_full_snapshot: false,
                creation_reason,
                index_in_view,
                source: source.into(),
            },
            encoded_bytes_count: 0,
        }
    }

    pub fn metadata(&self) -> &SegmentMetadata {
        &self.metadata
    }

    pub fn view_id(&self) -> &str {
        &self.metadata.view.id
    }

    pub fn encoded_bytes_count(&self) -> usize {
        self.encoded_bytes_count
    }

    /// Account for bytes the encoder produced for this segment's records.
    pub fn add_encoded_bytes(&mut self, count: usize) -> usize {
        self.encoded_bytes_count += count;
        self.encoded_bytes_count
    }

    /// Stream one record into `encoder`.
    pub fn add_record<E: Encoder + ?Sized>(&mut self, record: &Record, encoder: &mut E) -> WriteId {
        let timestamp = record.timestamp();
        self.metadata.start = self.metadata.start.min(timestamp);
        self.metadata.end = self.metadata.end.max(timestamp);
        self.metadata.records_count += 1;
        self.metadata.has_full_snapshot |= record.is_full_snapshot();

        let prefix = if encoder.is_empty() { RECORDS_PREFIX } else { "," };
        let mut chunk = String::from(prefix);
        chunk.push_str(&serialize_record(record));
        encoder.write(&chunk)
    }

    /// Closing chunk: ends the record array and carries the metadata.
    pub fn trailer(&self) -> String {
        let metadata = match serde_json::to_string(&self.metadata) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "segment metadata serialization failed");
                String::from("{}")
            }
        };
        // Drop the opening brace, the prefix already opened the object.
        let fields = metadata.strip_prefix('{').unwrap_or(&metadata);
        if fields == "}" {
            String::from("]}\n")
        } else {
            format!("],{}\n", fields)
        }
    }

    /// Write the trailer and request an asynchronous finish.
    pub fn flush<E: Encoder + ?Sized>(&self, encoder: &mut E) -> FinishId {
        encoder.write(&self.trailer());
        encoder.finish()
    }

    /// Write the trailer and finish immediately.
    pub fn flush_sync<E: Encoder + ?Sized>(&self, encoder: &mut E) -> EncoderResult {
        encoder.write(&self.trailer());
        encoder.finish_sync()
    }
}

fn serialize_record(record: &Record) -> String {
    match serde_json::to_string(record) {
        Ok(json) => json,
        Err(e) => {
            warn!(error = %e, kind = record.kind_name(), "record serialization failed");
            UNSERIALIZABLE_RECORD.to_string()
        }
    }
}
