//! Worker-backed encoder.
//!
//! Writes are dispatched to a worker thread as ordered requests carrying a
//! sequence id. Responses must come back in dispatch order:
//!
//! ```text
//! main                              worker
//!  write(a) ── Write{id:0} ───────►  encode
//!  write(b) ── Write{id:1} ───────►  encode
//!  poll     ◄─ Wrote{id:0} ───────
//!           ◄─ Wrote{id:1} ───────
//! ```
//!
//! A response for any id other than the oldest outstanding write aborts the
//! stream. Ordering is never repaired.

use crate::encoder::{Encoder, EncoderEvent, EncoderResult, FinishId, WriteId};
use crate::error::EncoderError;
use std::collections::{HashMap, VecDeque};
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};
use tracing::{trace, warn};

/// Request sent to the worker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorkerRequest {
    Write {
        id: WriteId,
        stream_id: u64,
        data: String,
    },
    /// Drop the worker-side state of a stream.
    Reset { stream_id: u64 },
}

/// Response sent back by the worker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorkerResponse {
    Wrote {
        id: WriteId,
        stream_id: u64,
        result: Vec<u8>,
        additional_bytes_count: usize,
    },
    Errored { stream_id: u64, message: String },
}

#[derive(Debug)]
struct PendingWrite {
    id: WriteId,
    data: String,
    notify_written: bool,
    /// Already handed out by `finish_sync`; the response only advances order.
    discard: bool,
    finish: Option<FinishId>,
}

/// Encoder whose work happens on a worker thread.
#[derive(Debug)]
pub struct WorkerEncoder {
    stream_id: u64,
    requests: UnboundedSender<WorkerRequest>,
    responses: UnboundedReceiver<WorkerResponse>,
    next_write_id: WriteId,
    next_finish_id: FinishId,
    pending: VecDeque<PendingWrite>,
    output: Vec<u8>,
    raw_bytes_count: usize,
    is_empty: bool,
    aborted: bool,
    events: Vec<EncoderEvent>,
}

impl WorkerEncoder {
    /// Start a worker thread serving this encoder's stream.
    pub fn spawn(stream_id: u64) -> Result<Self, EncoderError> {
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (response_tx, response_rx) = mpsc::unbounded_channel();
        std::thread::Builder::new()
            .name(format!("rewind-encoder-{}", stream_id))
            .spawn(move || run_worker(request_rx, response_tx))
            .map_err(|e| EncoderError::WorkerUnavailable(e.to_string()))?;
        Ok(Self::from_channels(stream_id, request_tx, response_rx))
    }

    /// Build an encoder over existing channels, e.g. a shared worker.
    pub fn from_channels(
        stream_id: u64,
        requests: UnboundedSender<WorkerRequest>,
        responses: UnboundedReceiver<WorkerResponse>,
    ) -> Self {
        Self {
            stream_id,
            requests,
            responses,
            next_write_id: 0,
            next_finish_id: 0,
            pending: VecDeque::new(),
            output: Vec::new(),
            raw_bytes_count: 0,
            is_empty: true,
            aborted: false,
            events: Vec::new(),
        }
    }

    pub fn stream_id(&self) -> u64 {
        self.stream_id
    }

    /// Whether the stream was aborted.
    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    fn abort(&mut self, error: EncoderError) {
        warn!(stream_id = self.stream_id, error = %error, "aborting encoder stream");
        self.aborted = true;
        self.pending.clear();
        self.events.push(EncoderEvent::Failed(error));
    }

    fn send_reset_if_needed(&mut self) {
        if self.is_empty {
            return;
        }
        self.is_empty = true;
        let request = WorkerRequest::Reset {
            stream_id: self.stream_id,
        };
        if self.requests.send(request).is_err() && !self.aborted {
            self.abort(EncoderError::WorkerGone);
        }
    }

    fn consume_result(&mut self) -> EncoderResult {
        let output = std::mem::take(&mut self.output);
        let raw_bytes_count = std::mem::take(&mut self.raw_bytes_count);
        EncoderResult {
            encoded_bytes_count: output.len(),
            output,
            raw_bytes_count,
            pending_data: String::new(),
        }
    }

    fn handle_response(&mut self, response: WorkerResponse) {
        match response {
            WorkerResponse::Wrote {
                id,
                stream_id,
                result,
                additional_bytes_count,
            } => {
                if stream_id != self.stream_id {
                    return;
                }
                match self.pending.pop_front() {
                    Some(action) if action.id == id => {
                        if action.discard {
                            trace!(stream_id, id, "dropping response drained by finish_sync");
                            return;
                        }
                        let encoded = result.len();
                        self.raw_bytes_count += additional_bytes_count;
                        self.output.extend(result);
                        if action.notify_written {
                            self.events.push(EncoderEvent::Written {
                                id,
                                additional_encoded_bytes: encoded,
                            });
                        }
                        if let Some(finish) = action.finish {
                            let result = self.consume_result();
                            self.events.push(EncoderEvent::Finished { id: finish, result });
                        }
                    }
                    other => self.abort(EncoderError::OutOfOrder {
                        expected: other.map(|a| a.id),
                        actual: id,
                    }),
                }
            }
            WorkerResponse::Errored { stream_id, message } => {
                if stream_id == self.stream_id {
                    self.abort(EncoderError::Worker(message));
                }
            }
        }
    }
}

impl Encoder for WorkerEncoder {
    fn write(&mut self, data: &str) -> WriteId {
        let id = self.next_write_id;
        self.next_write_id += 1;
        self.is_empty = false;
        if self.aborted {
            return id;
        }
        let request = WorkerRequest::Write {
            id,
            stream_id: self.stream_id,
            data: data.to_string(),
        };
        if self.requests.send(request).is_err() {
            self.abort(EncoderError::WorkerGone);
            return id;
        }
        self.pending.push_back(PendingWrite {
            id,
            data: data.to_string(),
            notify_written: true,
            discard: false,
            finish: None,
        });
        id
    }

    fn finish(&mut self) -> FinishId {
        let id = self.next_finish_id;
        self.next_finish_id += 1;
        self.send_reset_if_needed();
        if self.aborted {
            return id;
        }
        match self.pending.back_mut() {
            None => {
                let result = self.consume_result();
                self.events.push(EncoderEvent::Finished { id, result });
            }
            Some(last) => {
                last.finish = Some(id);
                for action in self.pending.iter_mut() {
                    action.notify_written = false;
                }
            }
        }
        id
    }

    fn finish_sync(&mut self) -> EncoderResult {
        self.send_reset_if_needed();
        let pending_data: String = self.pending.iter().map(|a| a.data.as_str()).collect();
        // Responses for these writes still arrive; they only advance order.
        for action in self.pending.iter_mut() {
            action.notify_written = false;
            action.discard = true;
            action.finish = None;
        }
        EncoderResult {
            pending_data,
            ..self.consume_result()
        }
    }

    fn is_empty(&self) -> bool {
        self.is_empty
    }

    fn poll_events(&mut self) -> Vec<EncoderEvent> {
        while !self.aborted {
            match self.responses.try_recv() {
                Ok(response) => self.handle_response(response),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if !self.pending.is_empty() {
                        self.abort(EncoderError::WorkerGone);
                    }
                    break;
                }
            }
        }
        std::mem::take(&mut self.events)
    }
}

/// Worker loop: identity codec, one response per write, in request order.
fn run_worker(
    mut requests: UnboundedReceiver<WorkerRequest>,
    responses: UnboundedSender<WorkerResponse>,
) {
    let mut streams: HashMap<u64, usize> = HashMap::new();
    while let Some(request) = requests.blocking_recv() {
        match request {
            WorkerRequest::Write {
                id,
                stream_id,
                data,
            } => {
                let result = data.into_bytes();
                let additional_bytes_count = result.len();
                *streams.entry(stream_id).or_default() += additional_bytes_count;
                let response = WorkerResponse::Wrote {
                    id,
                    stream_id,
                    result,
                    additional_bytes_count,
                };
                if responses.send(response).is_err() {
                    break;
                }
            }
            WorkerRequest::Reset { stream_id } => {
                let written = streams.remove(&stream_id).unwrap_or_default();
                trace!(stream_id, written, "encoder stream reset");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn channels() -> (
        WorkerEncoder,
        UnboundedReceiver<WorkerRequest>,
        UnboundedSender<WorkerResponse>,
    ) {
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (response_tx, response_rx) = mpsc::unbounded_channel();
        (
            WorkerEncoder::from_channels(7, request_tx, response_rx),
            request_rx,
            response_tx,
        )
    }

    fn wrote(id: WriteId, data: &str) -> WorkerResponse {
        WorkerResponse::Wrote {
            id,
            stream_id: 7,
            result: data.as_bytes().to_vec(),
            additional_bytes_count: data.len(),
        }
    }

    #[test]
    fn test_requests_carry_sequence_ids() {
        let (mut encoder, mut requests, _responses) = channels();

        encoder.write("a");
        encoder.write("b");
        encoder.finish();

        assert_eq!(
            requests.try_recv().unwrap(),
            WorkerRequest::Write { id: 0, stream_id: 7, data: "a".into() }
        );
        assert_eq!(
            requests.try_recv().unwrap(),
            WorkerRequest::Write { id: 1, stream_id: 7, data: "b".into() }
        );
        assert_eq!(requests.try_recv().unwrap(), WorkerRequest::Reset { stream_id: 7 });
    }

    #[test]
    fn test_in_order_responses() {
        let (mut encoder, _requests, responses) = channels();
        encoder.write("ab");
        responses.send(wrote(0, "ab")).unwrap();

        assert_eq!(
            encoder.poll_events(),
            vec![EncoderEvent::Written { id: 0, additional_encoded_bytes: 2 }]
        );

        encoder.write("c");
        let finish = encoder.finish();
        assert!(encoder.poll_events().is_empty());
        responses.send(wrote(1, "c")).unwrap();

        let events = encoder.poll_events();
        assert_eq!(events.len(), 1);
        match &events[0] {
            EncoderEvent::Finished { id, result } => {
                assert_eq!(*id, finish);
                assert_eq!(result.output, b"abc".to_vec());
                assert_eq!(result.raw_bytes_count, 3);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_out_of_order_response_aborts() {
        let (mut encoder, _requests, responses) = channels();
        encoder.write("a");
        encoder.write("b");

        responses.send(wrote(1, "b")).unwrap();
        responses.send(wrote(0, "a")).unwrap();

        assert_eq!(
            encoder.poll_events(),
            vec![EncoderEvent::Failed(EncoderError::OutOfOrder {
                expected: Some(0),
                actual: 1,
            })]
        );
        assert!(encoder.is_aborted());
        // The late response is never consumed.
        assert!(encoder.poll_events().is_empty());
    }

    #[test]
    fn test_finish_sync_returns_pending_data() {
        let (mut encoder, _requests, responses) = channels();
        encoder.write("ab");
        encoder.write("cd");
        responses.send(wrote(0, "ab")).unwrap();
        encoder.poll_events();

        let result = encoder.finish_sync();

        assert_eq!(result.output, b"ab".to_vec());
        assert_eq!(result.pending_data, "cd");
        assert_eq!(result.into_bytes(), b"abcd".to_vec());
        assert!(encoder.is_empty());
    }

    #[test]
    fn test_late_responses_after_finish_sync_are_dropped() {
        let (mut encoder, _requests, responses) = channels();
        encoder.write("ab");
        assert_eq!(encoder.finish_sync().pending_data, "ab");

        responses.send(wrote(0, "ab")).unwrap();
        assert!(encoder.poll_events().is_empty());

        encoder.write("X");
        let finish = encoder.finish();
        responses.send(wrote(1, "X")).unwrap();

        match encoder.poll_events().as_slice() {
            [EncoderEvent::Finished { id, result }] => {
                assert_eq!(*id, finish);
                assert_eq!(result.output, b"X".to_vec());
                assert_eq!(result.raw_bytes_count, 1);
            }
            other => panic!("unexpected events {:?}", other),
        }
        assert!(!encoder.is_aborted());
    }

    #[test]
    fn test_late_response_still_checks_order() {
        let (mut encoder, _requests, responses) = channels();
        encoder.write("a");
        encoder.write("b");
        encoder.finish_sync();

        responses.send(wrote(1, "b")).unwrap();

        assert_eq!(
            encoder.poll_events(),
            vec![EncoderEvent::Failed(EncoderError::OutOfOrder {
                expected: Some(0),
                actual: 1,
            })]
        );
    }

    #[test]
    fn test_reset_to_gone_worker_aborts() {
        let (mut encoder, requests, _responses) = channels();
        encoder.write("a");
        drop(requests);

        encoder.finish();

        assert!(encoder.is_aborted());
        assert_eq!(encoder.poll_events(), vec![EncoderEvent::Failed(EncoderError::WorkerGone)]);
    }

    #[test]
    fn test_spawned_worker_round_trip() {
        let mut encoder = WorkerEncoder::spawn(1).unwrap();
        encoder.write("hello ");
        encoder.write("world");
        let finish = encoder.finish();

        let deadline = Instant::now() + Duration::from_secs(5);
        let result = loop {
            let finished = encoder.poll_events().into_iter().find_map(|event| match event {
                EncoderEvent::Finished { id, result } if id == finish => Some(result),
                _ => None,
            });
            if let Some(result) = finished {
                break result;
            }
            assert!(Instant::now() < deadline, "worker did not answer");
            std::thread::sleep(Duration::from_millis(1));
        };

        assert_eq!(result.output, b"hello world".to_vec());
        assert!(encoder.is_empty());
    }
}
