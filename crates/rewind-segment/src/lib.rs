//! # rewind-segment
//!
//! Segment encoding and lifecycle for Rewind.
//!
//! This crate implements:
//! - [`Encoder`]: chunk encoders, [`SyncEncoder`] and the worker-backed
//!   [`WorkerEncoder`]
//! - [`Segment`]: one JSON document of records plus metadata
//! - [`SegmentCollector`]: when segments open and flush
//! - [`ReplayStats`]: per-view counters bounded by an LRU
//!
//! ## Flow
//!
//! ```text
//! Record ──► SegmentCollector::add_record ──► Segment ──► Encoder::write
//!                  │ duration / bytes / view change / page exit / stop
//!                  ▼
//!            Encoder::finish ──► ReplayPayload ──► Transport
//! ```

pub mod collector;
pub mod encoder;
pub mod error;
pub mod payload;
pub mod segment;
pub mod stats;
pub mod worker;

pub use collector::{CollectorState, SegmentCollector, SegmentConfig, Transport, ViewContextProvider};
pub use encoder::{Encoder, EncoderEvent, EncoderResult, FinishId, SyncEncoder, WriteId};
pub use error::{EncoderError, Result, SegmentError};
pub use payload::{decode_segment, DecodedSegment, ReplayPayload, SegmentEvent};
pub use segment::{FlushReason, PageExitReason, Segment, SegmentContext, SegmentMetadata};
pub use stats::{ReplayStats, ViewReplayStats, MAX_STATS_HISTORY};
pub use worker::{WorkerEncoder, WorkerRequest, WorkerResponse};
