//! Transports and view context providers for hosts and tests.

use parking_lot::{Mutex, RwLock};
use rewind_segment::{ReplayPayload, SegmentContext, Transport, ViewContextProvider};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::warn;

/// How a payload was handed over.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Delivery {
    /// Ordinary delivery, retried by the transport.
    Async,
    /// Best-effort delivery while the page goes away.
    OnExit,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SentPayload {
    pub delivery: Delivery,
    pub payload: ReplayPayload,
}

// ============================================================================
// Memory transport
// ============================================================================

/// Keeps every payload in memory. Clones share the same buffer.
#[derive(Clone, Debug, Default)]
pub struct MemoryTransport {
    sent: Arc<Mutex<Vec<SentPayload>>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<SentPayload> {
        self.sent.lock().clone()
    }

    pub fn payloads(&self) -> Vec<ReplayPayload> {
        self.sent.lock().iter().map(|s| s.payload.clone()).collect()
    }

    pub fn take(&self) -> Vec<SentPayload> {
        std::mem::take(&mut *self.sent.lock())
    }

    pub fn len(&self) -> usize {
        self.sent.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sent.lock().is_empty()
    }

    fn push(&self, delivery: Delivery, payload: ReplayPayload) {
        self.sent.lock().push(SentPayload { delivery, payload });
    }
}

impl Transport for MemoryTransport {
    fn send(&self, payload: ReplayPayload) {
        self.push(Delivery::Async, payload);
    }

    fn send_on_exit(&self, payload: ReplayPayload) {
        self.push(Delivery::OnExit, payload);
    }
}

// ============================================================================
// Channel transport
// ============================================================================

/// Forwards payloads to an async consumer.
#[derive(Clone, Debug)]
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<SentPayload>,
}

impl ChannelTransport {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SentPayload>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn forward(&self, delivery: Delivery, payload: ReplayPayload) {
        let filename = payload.filename.clone();
        if self.tx.send(SentPayload { delivery, payload }).is_err() {
            warn!(%filename, "segment consumer is gone, dropping payload");
        }
    }
}

impl Transport for ChannelTransport {
    fn send(&self, payload: ReplayPayload) {
        self.forward(Delivery::Async, payload);
    }

    fn send_on_exit(&self, payload: ReplayPayload) {
        self.forward(Delivery::OnExit, payload);
    }
}

// ============================================================================
// View context
// ============================================================================

/// View identifiers set by the host as views start and end. Clones share
/// the same state.
#[derive(Clone, Debug, Default)]
pub struct SharedViewContext {
    current: Arc<RwLock<Option<SegmentContext>>>,
}

impl SharedViewContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_context(context: SegmentContext) -> Self {
        let shared = Self::new();
        shared.set(context);
        shared
    }

    pub fn set(&self, context: SegmentContext) {
        *self.current.write() = Some(context);
    }

    pub fn clear(&self) {
        *self.current.write() = None;
    }
}

impl ViewContextProvider for SharedViewContext {
    fn segment_context(&self) -> Option<SegmentContext> {
        self.current.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rewind_segment::{FlushReason, Segment, SyncEncoder};

    fn payload() -> ReplayPayload {
        let context = SegmentContext {
            application_id: "app".into(),
            session_id: "session".into(),
            view_id: "view".into(),
        };
        let mut encoder = SyncEncoder::new();
        let mut segment = Segment::new(&context, FlushReason::Init, 0, "browser");
        segment.add_record(&rewind_core::Record::ViewEnd { timestamp: 1 }, &mut encoder);
        let result = segment.flush_sync(&mut encoder);
        let raw = result.raw_bytes_count;
        ReplayPayload::new(result.into_bytes(), segment.metadata().clone(), raw)
    }

    #[test]
    fn test_memory_transport_shares_buffer() {
        let transport = MemoryTransport::new();
        let clone = transport.clone();

        clone.send(payload());
        clone.send_on_exit(payload());

        let sent = transport.take();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].delivery, Delivery::Async);
        assert_eq!(sent[1].delivery, Delivery::OnExit);
        assert!(transport.is_empty());
    }

    #[test]
    fn test_channel_transport_forwards() {
        let (transport, mut rx) = ChannelTransport::new();
        transport.send(payload());

        let received = tokio_test::block_on(rx.recv()).unwrap();
        assert_eq!(received.delivery, Delivery::Async);
        assert_eq!(received.payload.filename, "session-1");
    }

    #[test]
    fn test_channel_transport_survives_closed_consumer() {
        let (transport, rx) = ChannelTransport::new();
        drop(rx);
        transport.send_on_exit(payload());
    }

    #[test]
    fn test_shared_view_context() {
        let view = SharedViewContext::new();
        assert!(view.segment_context().is_none());

        view.set(SegmentContext {
            application_id: "a".into(),
            session_id: "s".into(),
            view_id: "v".into(),
        });
        assert_eq!(view.clone().segment_context().unwrap().view_id, "v");

        view.clear();
        assert!(view.segment_context().is_none());
    }
}
