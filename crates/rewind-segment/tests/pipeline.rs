//! Segment pipeline tests.
//!
//! Properties covered:
//! - records appended to a segment decode back in emission order
//! - the byte ceiling flushes a segment and chains the creation reason
//! - the worker encoder delivers flushed segments asynchronously
//! - an out-of-order worker response aborts the stream without delivery and
//!   stops the collector
//! - a page exit flush does not leak into the next worker segment

use proptest::prelude::*;
use rewind_core::record::{FocusData, MetaData, Record};
use rewind_core::scheduler::Scheduler;
use rewind_segment::{
    CollectorState, FlushReason, ReplayPayload, SegmentCollector, SegmentConfig, SegmentContext,
    SyncEncoder, Transport, ViewContextProvider, WorkerEncoder, WorkerRequest, WorkerResponse,
};
use std::cell::RefCell;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

#[derive(Default)]
struct Recorded {
    payloads: RefCell<Vec<ReplayPayload>>,
}

impl Transport for Recorded {
    fn send(&self, payload: ReplayPayload) {
        self.payloads.borrow_mut().push(payload);
    }

    fn send_on_exit(&self, payload: ReplayPayload) {
        self.payloads.borrow_mut().push(payload);
    }
}

struct FixedView;

impl ViewContextProvider for FixedView {
    fn segment_context(&self) -> Option<SegmentContext> {
        Some(SegmentContext {
            application_id: "app".into(),
            session_id: "session".into(),
            view_id: "view".into(),
        })
    }
}

/// Identity worker answers for every write queued so far, in order.
fn answer_writes(
    requests: &mut mpsc::UnboundedReceiver<WorkerRequest>,
    responses: &mpsc::UnboundedSender<WorkerResponse>,
) -> usize {
    let mut answered = 0;
    while let Ok(request) = requests.try_recv() {
        if let WorkerRequest::Write { id, stream_id, data } = request {
            responses
                .send(WorkerResponse::Wrote {
                    id,
                    stream_id,
                    additional_bytes_count: data.len(),
                    result: data.into_bytes(),
                })
                .unwrap();
            answered += 1;
        }
    }
    answered
}

fn meta(timestamp: u64, href_len: usize) -> Record {
    Record::Meta {
        timestamp,
        data: MetaData {
            href: "x".repeat(href_len),
            width: 1,
            height: 1,
        },
    }
}

fn record_strategy() -> impl Strategy<Value = Record> {
    prop_oneof![
        (0u64..10_000).prop_map(|timestamp| Record::ViewEnd { timestamp }),
        (0u64..10_000, any::<bool>()).prop_map(|(timestamp, has_focus)| Record::Focus {
            timestamp,
            data: FocusData { has_focus },
        }),
        (0u64..10_000, 0usize..40).prop_map(|(timestamp, len)| meta(timestamp, len)),
    ]
}

proptest! {
    #[test]
    fn records_decode_in_emission_order(records in prop::collection::vec(record_strategy(), 1..50)) {
        let mut scheduler = Scheduler::new(0);
        let mut collector = SegmentCollector::new(
            SegmentConfig::default(),
            SyncEncoder::new(),
            Recorded::default(),
            FixedView,
        );
        for record in &records {
            collector.add_record(record, &mut scheduler, ());
        }
        collector.stop(&mut scheduler);

        let payloads = collector.transport().payloads.borrow();
        prop_assert_eq!(payloads.len(), 1);
        let decoded = payloads[0].decode().unwrap();
        prop_assert_eq!(decoded.metadata.records_count, records.len() as u64);
        prop_assert_eq!(
            decoded.metadata.start,
            records.iter().map(Record::timestamp).min().unwrap()
        );
        prop_assert_eq!(decoded.typed_records(), records);
    }
}

#[test]
fn test_byte_ceiling_flushes_segment() {
    let mut scheduler = Scheduler::new(0);
    let mut collector = SegmentCollector::new(
        SegmentConfig::default(),
        SyncEncoder::new(),
        Recorded::default(),
        FixedView,
    );

    for i in 0..5 {
        collector.add_record(&meta(i, 10_000), &mut scheduler, ());
    }
    assert!(collector.transport().payloads.borrow().is_empty());

    collector.add_record(&meta(5, 10_000), &mut scheduler, ());
    assert!(matches!(
        collector.state(),
        CollectorState::WaitingForInitialRecord {
            next_creation_reason: FlushReason::SegmentBytesLimit
        }
    ));
    // The expiration timer of the flushed segment is gone.
    assert!(scheduler.is_empty());

    collector.add_record(&meta(6, 10), &mut scheduler, ());
    collector.stop(&mut scheduler);

    let payloads = collector.transport().payloads.borrow();
    assert_eq!(payloads.len(), 2);
    assert_eq!(payloads[0].event.metadata.records_count, 6);
    assert!(payloads[0].bytes_count() > 60_000);
    assert_eq!(
        payloads[1].event.metadata.creation_reason,
        FlushReason::SegmentBytesLimit
    );
    assert_eq!(payloads[1].event.metadata.index_in_view, 1);
}

#[test]
fn test_worker_encoder_delivers_asynchronously() {
    let mut scheduler = Scheduler::new(0);
    let mut collector = SegmentCollector::new(
        SegmentConfig::default(),
        WorkerEncoder::spawn(1).unwrap(),
        Recorded::default(),
        FixedView,
    );
    collector.add_record(&Record::ViewEnd { timestamp: 1 }, &mut scheduler, ());
    collector.add_record(&Record::ViewEnd { timestamp: 2 }, &mut scheduler, ());
    collector.flush(FlushReason::ViewChange, &mut scheduler);

    let deadline = Instant::now() + Duration::from_secs(5);
    while collector.transport().payloads.borrow().is_empty() {
        assert!(Instant::now() < deadline, "segment never delivered");
        std::thread::sleep(Duration::from_millis(1));
        collector.poll(&mut scheduler);
    }

    let payloads = collector.transport().payloads.borrow();
    let decoded = payloads[0].decode().unwrap();
    assert_eq!(decoded.records.len(), 2);
    assert_eq!(decoded.metadata.creation_reason, FlushReason::Init);
}

#[test]
fn test_out_of_order_worker_aborts_stream() {
    let (request_tx, mut request_rx) = mpsc::unbounded_channel();
    let (response_tx, response_rx) = mpsc::unbounded_channel();
    let mut scheduler = Scheduler::new(0);
    let mut collector = SegmentCollector::new(
        SegmentConfig::default(),
        WorkerEncoder::from_channels(3, request_tx, response_rx),
        Recorded::default(),
        FixedView,
    );

    collector.add_record(&Record::ViewEnd { timestamp: 1 }, &mut scheduler, ());
    collector.add_record(&Record::ViewEnd { timestamp: 2 }, &mut scheduler, ());
    collector.flush(FlushReason::ViewChange, &mut scheduler);

    let mut writes = Vec::new();
    while let Ok(request) = request_rx.try_recv() {
        if let WorkerRequest::Write { id, data, .. } = request {
            writes.push((id, data));
        }
    }
    assert_eq!(writes.len(), 3);

    // Answer the last write first.
    for (id, data) in writes.into_iter().rev() {
        response_tx
            .send(WorkerResponse::Wrote {
                id,
                stream_id: 3,
                additional_bytes_count: data.len(),
                result: data.into_bytes(),
            })
            .unwrap();
    }
    collector.poll(&mut scheduler);

    assert!(collector.encoder().is_aborted());
    assert!(collector.transport().payloads.borrow().is_empty());
    assert!(collector.is_stopped());

    // Nothing is opened or left waiting on the dead stream.
    for timestamp in 3..103 {
        collector.add_record(&Record::ViewEnd { timestamp }, &mut scheduler, ());
        collector.flush(FlushReason::SegmentDurationLimit, &mut scheduler);
    }
    assert!(scheduler.is_empty());
    assert_eq!(answer_writes(&mut request_rx, &response_tx), 0);
    assert!(collector.transport().payloads.borrow().is_empty());
}

#[test]
fn test_page_exit_then_next_worker_segment() {
    let (request_tx, mut request_rx) = mpsc::unbounded_channel();
    let (response_tx, response_rx) = mpsc::unbounded_channel();
    let mut scheduler = Scheduler::new(0);
    let mut collector = SegmentCollector::new(
        SegmentConfig::default(),
        WorkerEncoder::from_channels(5, request_tx, response_rx),
        Recorded::default(),
        FixedView,
    );

    collector.add_record(&Record::ViewEnd { timestamp: 1 }, &mut scheduler, ());
    collector.add_record(&Record::ViewEnd { timestamp: 2 }, &mut scheduler, ());
    // Nothing answered yet: the exit payload is built from pending writes.
    collector.flush(FlushReason::PageHide, &mut scheduler);
    assert_eq!(collector.transport().payloads.borrow().len(), 1);

    // The worker catches up on the drained writes afterwards.
    assert_eq!(answer_writes(&mut request_rx, &response_tx), 3);
    collector.poll(&mut scheduler);

    collector.add_record(&Record::ViewEnd { timestamp: 3 }, &mut scheduler, ());
    collector.flush(FlushReason::ViewChange, &mut scheduler);
    answer_writes(&mut request_rx, &response_tx);
    collector.poll(&mut scheduler);

    let payloads = collector.transport().payloads.borrow();
    assert_eq!(payloads.len(), 2);
    let exit = payloads[0].decode().unwrap();
    assert_eq!(exit.records.len(), 2);
    let next = payloads[1].decode().unwrap();
    assert_eq!(next.typed_records(), vec![Record::ViewEnd { timestamp: 3 }]);
    assert_eq!(next.metadata.creation_reason, FlushReason::PageHide);
}
