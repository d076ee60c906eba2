//! Segment lifecycle.
//!
//! ```text
//!                 add_record (context available)
//!  WaitingForInitialRecord ─────────────────────────► SegmentPending
//!        ▲                                                │
//!        │ flush(reason)   duration timer / byte limit /  │
//!        └──────────────── view change / page exit ◄──────┘
//!
//!  any state ── stop / encoder failure ──► Stopped
//! ```
//!
//! The flush reason of a segment becomes the creation reason of the next.
//! A failed encoder never finishes another stream, so the collector stops
//! with it and the open segment is lost.

use crate::encoder::{Encoder, EncoderEvent, EncoderResult, FinishId, WriteId};
use crate::payload::ReplayPayload;
use crate::segment::{FlushReason, Segment, SegmentContext, SegmentMetadata};
use crate::stats::{ReplayStats, ViewReplayStats};
use rewind_core::record::Record;
use rewind_core::scheduler::{Scheduler, TimerId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

// ============================================================================
// Collaborators
// ============================================================================

/// Delivers flushed segments.
pub trait Transport {
    fn send(&self, payload: ReplayPayload);

    /// Delivery while the page is going away.
    fn send_on_exit(&self, payload: ReplayPayload);
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(&self, payload: ReplayPayload) {
        (**self).send(payload)
    }

    fn send_on_exit(&self, payload: ReplayPayload) {
        (**self).send_on_exit(payload)
    }
}

/// Supplies the identifiers of the current view.
pub trait ViewContextProvider {
    fn segment_context(&self) -> Option<SegmentContext>;
}

impl<P: ViewContextProvider + ?Sized> ViewContextProvider for Arc<P> {
    fn segment_context(&self) -> Option<SegmentContext> {
        (**self).segment_context()
    }
}

// ============================================================================
// Configuration
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentConfig {
    /// A segment is flushed this long after its first record.
    pub duration_limit_ms: u64,
    /// A segment is flushed once its encoded size reaches this.
    pub bytes_limit: usize,
    pub source: String,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            duration_limit_ms: 5_000,
            bytes_limit: 60_000,
            source: String::from("browser"),
        }
    }
}

// ============================================================================
// Collector
// ============================================================================

#[derive(Debug)]
pub enum CollectorState {
    WaitingForInitialRecord {
        next_creation_reason: FlushReason,
    },
    SegmentPending {
        segment: Segment,
        generation: u64,
        expiration_timer: TimerId,
    },
    Stopped,
}

pub struct SegmentCollector<E, T, P> {
    config: SegmentConfig,
    encoder: E,
    transport: T,
    provider: P,
    state: CollectorState,
    stats: ReplayStats,
    generation: u64,
    write_generations: HashMap<WriteId, u64>,
    pending_flushes: HashMap<FinishId, SegmentMetadata>,
}

impl<E: Encoder, T: Transport, P: ViewContextProvider> SegmentCollector<E, T, P> {
    pub fn new(config: SegmentConfig, encoder: E, transport: T, provider: P) -> Self {
        Self {
            config,
            encoder,
            transport,
            provider,
            state: CollectorState::WaitingForInitialRecord {
                next_creation_reason: FlushReason::Init,
            },
            stats: ReplayStats::new(),
            generation: 0,
            write_generations: HashMap::new(),
            pending_flushes: HashMap::new(),
        }
    }

    pub fn state(&self) -> &CollectorState {
        &self.state
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self.state, CollectorState::Stopped)
    }

    pub fn config(&self) -> &SegmentConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn encoder(&self) -> &E {
        &self.encoder
    }

    pub fn replay_stats(&self, view_id: &str) -> Option<ViewReplayStats> {
        self.stats.get(view_id)
    }

    /// Append a record to the current segment, opening one if needed.
    /// `expiration_key` is scheduled when a segment opens; pass the fired
    /// timer id to [`on_expiration_timer`](Self::on_expiration_timer).
    pub fn add_record<K>(&mut self, record: &Record, scheduler: &mut Scheduler<K>, expiration_key: K) {
        match &self.state {
            CollectorState::Stopped => return,
            CollectorState::WaitingForInitialRecord {
                next_creation_reason,
            } => {
                let reason = *next_creation_reason;
                let Some(context) = self.provider.segment_context() else {
                    debug!(kind = record.kind_name(), "no segment context, dropping record");
                    return;
                };
                self.open_segment(&context, reason, scheduler, expiration_key);
            }
            CollectorState::SegmentPending { .. } => {}
        }

        if let CollectorState::SegmentPending {
            segment, generation, ..
        } = &mut self.state
        {
            self.stats.add_record(segment.view_id());
            let id = segment.add_record(record, &mut self.encoder);
            self.write_generations.insert(id, *generation);
        }
        self.drain_events(scheduler);
    }

    /// Flush the current segment, if any.
    pub fn flush<K>(&mut self, reason: FlushReason, scheduler: &mut Scheduler<K>) {
        self.flush_segment(reason, scheduler);
        self.drain_events(scheduler);
    }

    /// Handle the duration timer. Stale timers are ignored.
    pub fn on_expiration_timer<K>(&mut self, timer: TimerId, scheduler: &mut Scheduler<K>) {
        let current = matches!(
            &self.state,
            CollectorState::SegmentPending { expiration_timer, .. } if *expiration_timer == timer
        );
        if current {
            self.flush(FlushReason::SegmentDurationLimit, scheduler);
        }
    }

    /// Process encoder progress. Payloads of earlier flushes may still be
    /// delivered after `stop`.
    pub fn poll<K>(&mut self, scheduler: &mut Scheduler<K>) {
        self.drain_events(scheduler);
    }

    pub fn stop<K>(&mut self, scheduler: &mut Scheduler<K>) {
        self.flush(FlushReason::Stop, scheduler);
    }

    fn open_segment<K>(
        &mut self,
        context: &SegmentContext,
        reason: FlushReason,
        scheduler: &mut Scheduler<K>,
        expiration_key: K,
    ) {
        let index_in_view = self.stats.segments_count(&context.view_id);
        let segment = Segment::new(context, reason, index_in_view, self.config.source.as_str());
        self.stats.add_segment(&context.view_id);
        self.generation += 1;
        let expiration_timer = scheduler.set_timeout(self.config.duration_limit_ms, expiration_key);
        self.state = CollectorState::SegmentPending {
            segment,
            generation: self.generation,
            expiration_timer,
        };
    }

    fn flush_segment<K>(&mut self, reason: FlushReason, scheduler: &mut Scheduler<K>) {
        if self.is_stopped() {
            return;
        }
        let next = if reason == FlushReason::Stop {
            CollectorState::Stopped
        } else {
            CollectorState::WaitingForInitialRecord {
                next_creation_reason: reason,
            }
        };

        let CollectorState::SegmentPending {
            segment,
            generation,
            expiration_timer,
        } = std::mem::replace(&mut self.state, next)
        else {
            return;
        };

        scheduler.clear(expiration_timer);
        self.write_generations.retain(|_, g| *g != generation);
        debug!(
            reason = %reason,
            view = segment.view_id(),
            records = segment.metadata().records_count,
            "flushing segment"
        );

        if reason.is_page_exit() {
            let result = segment.flush_sync(&mut self.encoder);
            self.deliver(segment.metadata().clone(), result, true);
        } else {
            let id = segment.flush(&mut self.encoder);
            self.pending_flushes.insert(id, segment.metadata().clone());
        }
    }

    fn drain_events<K>(&mut self, scheduler: &mut Scheduler<K>) {
        loop {
            let events = self.encoder.poll_events();
            if events.is_empty() {
                break;
            }
            for event in events {
                self.handle_event(event, scheduler);
            }
        }
    }

    fn handle_event<K>(&mut self, event: EncoderEvent, scheduler: &mut Scheduler<K>) {
        match event {
            EncoderEvent::Written {
                id,
                additional_encoded_bytes,
            } => {
                let Some(written_generation) = self.write_generations.remove(&id) else {
                    return;
                };
                let over_limit = match &mut self.state {
                    CollectorState::SegmentPending {
                        segment, generation, ..
                    } if *generation == written_generation => {
                        segment.add_encoded_bytes(additional_encoded_bytes) >= self.config.bytes_limit
                    }
                    _ => false,
                };
                if over_limit {
                    self.flush_segment(FlushReason::SegmentBytesLimit, scheduler);
                }
            }
            EncoderEvent::Finished { id, result } => {
                if let Some(metadata) = self.pending_flushes.remove(&id) {
                    self.deliver(metadata, result, false);
                }
            }
            EncoderEvent::Failed(error) => {
                warn!(
                    error = %error,
                    lost_segments = self.pending_flushes.len(),
                    "segment encoder failed, collector stopped"
                );
                self.pending_flushes.clear();
                self.write_generations.clear();
                if let CollectorState::SegmentPending { expiration_timer, .. } =
                    std::mem::replace(&mut self.state, CollectorState::Stopped)
                {
                    scheduler.clear(expiration_timer);
                }
            }
        }
    }

    fn deliver(&mut self, metadata: SegmentMetadata, result: EncoderResult, on_exit: bool) {
        let raw_bytes_count = result.raw_bytes_count + result.pending_data.len();
        self.stats.add_wrote_data(&metadata.view.id, raw_bytes_count);
        let payload = ReplayPayload::new(result.into_bytes(), metadata, raw_bytes_count);
        if on_exit {
            self.transport.send_on_exit(payload);
        } else {
            self.transport.send(payload);
        }
    }
}
