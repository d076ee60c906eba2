//! # Rewind WebAssembly Bindings
//!
//! This crate exposes the Rewind segment format to a JavaScript host that
//! records on its own and only needs segments built and read back.
//!
//! ## Features
//!
//! - **SegmentWriter**: streams records into one segment and flushes it to bytes
//! - **decode_segment**: reads a flushed segment back into records and metadata
//!
//! ## Usage
//!
//! ```javascript
//! import init, { SegmentWriter, decode_segment } from 'rewind-wasm';
//!
//! await init();
//!
//! const writer = new SegmentWriter('app', 'session-1', 'view-1', 'init', 0);
//! writer.add_record({ type: 'view_end', timestamp: Date.now() });
//!
//! const bytes = writer.flush();
//! console.log(decode_segment(bytes).records.length);  // 1
//! ```

use rewind_core::Record;
use rewind_segment::{Encoder, EncoderEvent, FlushReason, Segment, SegmentContext, SegmentError, SyncEncoder};
use serde::Serialize;
use wasm_bindgen::prelude::*;

// Initialize panic hook for better error messages in browser console
#[wasm_bindgen(start)]
pub fn init_panic_hook() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

fn to_js_error(error: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&error.to_string())
}

// ============================================================================
// SegmentWriter
// ============================================================================

/// One segment being written.
///
/// Records are encoded as they are added; `flush` closes the segment and
/// returns its bytes. A writer is single use.
#[wasm_bindgen]
pub struct SegmentWriter {
    segment: Segment,
    encoder: SyncEncoder,
}

#[wasm_bindgen]
impl SegmentWriter {
    /// Open a segment.
    ///
    /// # Arguments
    /// * `creation_reason` - Flush reason of the previous segment, `init` for the first one
    /// * `index_in_view` - Number of segments already created for the view
    #[wasm_bindgen(constructor)]
    pub fn new(
        application_id: &str,
        session_id: &str,
        view_id: &str,
        creation_reason: &str,
        index_in_view: u32,
    ) -> Result<SegmentWriter, JsValue> {
        let reason = parse_flush_reason(creation_reason)
            .ok_or_else(|| JsValue::from_str(&format!("unknown creation reason: {}", creation_reason)))?;
        let context = SegmentContext {
            application_id: application_id.to_string(),
            session_id: session_id.to_string(),
            view_id: view_id.to_string(),
        };
        Ok(Self {
            segment: Segment::new(&context, reason, index_in_view, "browser"),
            encoder: SyncEncoder::new(),
        })
    }

    /// Append a record given as a JavaScript object.
    #[wasm_bindgen]
    pub fn add_record(&mut self, record: JsValue) -> Result<(), JsValue> {
        let record: Record = serde_wasm_bindgen::from_value(record).map_err(to_js_error)?;
        self.push(&record);
        Ok(())
    }

    /// Append a record given as JSON text.
    #[wasm_bindgen]
    pub fn add_record_json(&mut self, json: &str) -> Result<(), JsValue> {
        self.push_json(json).map_err(to_js_error)
    }

    #[wasm_bindgen(getter)]
    pub fn view_id(&self) -> String {
        self.segment.view_id().to_string()
    }

    #[wasm_bindgen(getter)]
    pub fn records_count(&self) -> f64 {
        self.segment.metadata().records_count as f64
    }

    /// Bytes written for the records so far.
    #[wasm_bindgen(getter)]
    pub fn encoded_bytes_count(&self) -> usize {
        self.segment.encoded_bytes_count()
    }

    /// Whether the segment has reached `bytes_limit` and should be flushed.
    #[wasm_bindgen]
    pub fn is_over_limit(&self, bytes_limit: usize) -> bool {
        self.segment.encoded_bytes_count() >= bytes_limit
    }

    /// Metadata as it would be written now.
    #[wasm_bindgen]
    pub fn metadata(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(self.segment.metadata()).map_err(to_js_error)
    }

    /// Close the segment and return its bytes.
    #[wasm_bindgen]
    pub fn flush(mut self) -> Vec<u8> {
        self.segment.flush_sync(&mut self.encoder).into_bytes()
    }
}

impl SegmentWriter {
    fn push(&mut self, record: &Record) {
        self.segment.add_record(record, &mut self.encoder);
        for event in self.encoder.poll_events() {
            if let EncoderEvent::Written {
                additional_encoded_bytes,
                ..
            } = event
            {
                self.segment.add_encoded_bytes(additional_encoded_bytes);
            }
        }
    }

    fn push_json(&mut self, json: &str) -> Result<(), SegmentError> {
        let record: Record = serde_json::from_str(json)?;
        self.push(&record);
        Ok(())
    }
}

// ============================================================================
// Reading segments
// ============================================================================

#[derive(Debug, Clone, Serialize)]
struct SegmentSummary {
    view_id: String,
    creation_reason: FlushReason,
    records_count: u64,
    start: u64,
    end: u64,
    has_full_snapshot: bool,
}

/// Decode flushed segment bytes into `{ records, application, session, ... }`.
#[wasm_bindgen]
pub fn decode_segment(bytes: &[u8]) -> Result<JsValue, JsValue> {
    let decoded = rewind_segment::decode_segment(bytes).map_err(to_js_error)?;
    serde_wasm_bindgen::to_value(&decoded).map_err(to_js_error)
}

/// Short description of a flushed segment, as JSON text.
#[wasm_bindgen]
pub fn describe_segment(bytes: &[u8]) -> Result<String, JsValue> {
    summarize(bytes).map_err(to_js_error)
}

fn summarize(bytes: &[u8]) -> Result<String, SegmentError> {
    let metadata = rewind_segment::decode_segment(bytes)?.metadata;
    let summary = SegmentSummary {
        view_id: metadata.view.id,
        creation_reason: metadata.creation_reason,
        records_count: metadata.records_count,
        start: metadata.start,
        end: metadata.end,
        has_full_snapshot: metadata.has_full_snapshot,
    };
    Ok(serde_json::to_string(&summary)?)
}

// ============================================================================
// Utility Functions
// ============================================================================

/// Whether segments flushed for `reason` must be sent synchronously.
#[wasm_bindgen]
pub fn is_page_exit_reason(reason: &str) -> bool {
    parse_flush_reason(reason).is_some_and(|r| r.is_page_exit())
}

/// Current time in milliseconds, as record timestamps expect.
#[wasm_bindgen]
pub fn timestamp_now() -> f64 {
    js_sys::Date::now()
}

/// Log a message to the browser console.
#[wasm_bindgen]
pub fn console_log(message: &str) {
    web_sys::console::log_1(&JsValue::from_str(message));
}

fn parse_flush_reason(reason: &str) -> Option<FlushReason> {
    serde_json::from_value(serde_json::Value::String(reason.to_string())).ok()
}

// ============================================================================
// Tests
// ============================================================================
