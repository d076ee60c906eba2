//! End-to-end recording scenarios: host changes in, decoded segments out.

use rewind_core::dom::{Dom, NodeKey, RuleParent};
use rewind_core::record::{IncrementalData, MutationData, RuleIndex};
use rewind_core::{NodePrivacyLevel, Record};
use rewind_sdk::prelude::*;
use rewind_sdk::{ChannelTransport, Delivery};
use rewind_segment::{FlushReason, WorkerEncoder};
use std::time::Duration;

fn context(view: &str) -> SegmentContext {
    SegmentContext {
        application_id: "app".into(),
        session_id: "session-1".into(),
        view_id: view.into(),
    }
}

fn page() -> (Dom, NodeKey) {
    let mut dom = Dom::new("https://shop.example.com/checkout");
    let html = dom.create_element("html");
    let body = dom.create_element("body");
    dom.append_child(dom.document(), html).unwrap();
    dom.append_child(html, body).unwrap();
    (dom, body)
}

fn record(
    dom: &mut Dom,
    config: RecorderConfig,
) -> (Recorder<SyncEncoder, MemoryTransport, SharedViewContext>, MemoryTransport, SharedViewContext) {
    let transport = MemoryTransport::new();
    let view = SharedViewContext::with_context(context("home"));
    let recorder = Recorder::start(config, dom, 0, SyncEncoder::new(), transport.clone(), view.clone());
    (recorder, transport, view)
}

fn all_records(transport: &MemoryTransport) -> Vec<Record> {
    transport
        .payloads()
        .iter()
        .flat_map(|p| p.decode().unwrap().typed_records())
        .collect()
}

fn mutations(records: &[Record]) -> Vec<MutationData> {
    records
        .iter()
        .filter_map(|r| match r {
            Record::IncrementalSnapshot {
                data: IncrementalData::Mutation(data),
                ..
            } => Some(data.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn test_password_input_is_censored() {
    let (mut dom, body) = page();
    let password = dom.create_element("input");
    dom.set_attribute(password, "type", "password").unwrap();
    dom.append_child(body, password).unwrap();
    let config = RecorderConfigBuilder::new()
        .default_privacy_level(NodePrivacyLevel::Allow)
        .build();
    let (mut recorder, transport, _) = record(&mut dom, config);

    dom.set_value(password, "hunter2").unwrap();
    recorder.handle_event(&mut dom, DomEvent::Input { target: password }, 10);
    recorder.on_page_exit(&mut dom, PageExitReason::PageHide, 20);

    let inputs: Vec<_> = all_records(&transport)
        .into_iter()
        .filter_map(|r| match r {
            Record::IncrementalSnapshot {
                data: IncrementalData::Input(data),
                ..
            } => Some(data),
            _ => None,
        })
        .collect();
    assert_eq!(inputs.len(), 1);
    assert_eq!(inputs[0].text.as_deref(), Some("***"));
    assert_eq!(Some(inputs[0].id), recorder.context().ids.get(password));
}

#[test]
fn test_removed_shadow_host_stops_its_scope() {
    let (mut dom, body) = page();
    let host = dom.create_element("my-widget");
    dom.append_child(body, host).unwrap();
    let root = dom.attach_shadow(host).unwrap();
    let (mut recorder, transport, _) = record(&mut dom, RecorderConfig::default());
    assert!(recorder.shadow_roots().contains(root));

    let label = dom.create_element("span");
    dom.append_child(root, label).unwrap();
    recorder.advance(&mut dom, 5);
    recorder.advance(&mut dom, 200);

    dom.remove_child(body, host).unwrap();
    recorder.advance(&mut dom, 300);
    recorder.advance(&mut dom, 500);
    assert!(!recorder.shadow_roots().contains(root));

    let late = dom.create_element("span");
    dom.append_child(root, late).unwrap();
    recorder.advance(&mut dom, 600);
    recorder.advance(&mut dom, 800);
    recorder.on_page_exit(&mut dom, PageExitReason::PageHide, 900);

    let batches = mutations(&all_records(&transport));
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0].adds.len(), 1);
    assert_eq!(batches[1].removes.len(), 1);
    assert!(!recorder.context().ids.contains(late));
}

#[test]
fn test_added_then_removed_node_leaves_no_trace() {
    let (mut dom, body) = page();
    let (mut recorder, transport, _) = record(&mut dom, RecorderConfig::default());

    let toast = dom.create_element("div");
    dom.append_child(body, toast).unwrap();
    dom.remove_child(body, toast).unwrap();
    recorder.advance(&mut dom, 5);
    recorder.advance(&mut dom, 200);
    recorder.on_page_exit(&mut dom, PageExitReason::PageHide, 300);

    assert!(mutations(&all_records(&transport)).is_empty());
    assert!(!recorder.context().ids.contains(toast));
}

#[test]
fn test_repeated_attribute_changes_collapse() {
    let (mut dom, body) = page();
    let panel = dom.create_element("div");
    dom.append_child(body, panel).unwrap();
    let config = RecorderConfigBuilder::new()
        .default_privacy_level(NodePrivacyLevel::Allow)
        .build();
    let (mut recorder, transport, _) = record(&mut dom, config);

    for state in ["opening", "open", "closed"] {
        dom.set_attribute(panel, "data-state", state).unwrap();
    }
    recorder.flush_mutations(&mut dom, 10);
    recorder.on_page_exit(&mut dom, PageExitReason::PageHide, 20);

    let batches = mutations(&all_records(&transport));
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].attributes.len(), 1);
    assert_eq!(
        batches[0].attributes[0].attributes.get("data-state"),
        Some(&Some("closed".to_string()))
    );
}

#[test]
fn test_view_changes_chain_creation_reasons() {
    let (mut dom, _) = page();
    let (mut recorder, transport, view) = record(&mut dom, RecorderConfig::default());

    view.set(context("cart"));
    recorder.on_view_created(&mut dom, 100);
    recorder.on_view_ended(&mut dom, 150);
    view.set(context("payment"));
    recorder.on_view_created(&mut dom, 200);
    recorder.stop(&mut dom, 300);

    let sent = transport.sent();
    let summary: Vec<_> = sent
        .iter()
        .map(|s| {
            let metadata = &s.payload.event.metadata;
            (metadata.view.id.as_str(), metadata.creation_reason, s.delivery)
        })
        .collect();
    assert_eq!(
        summary,
        vec![
            ("home", FlushReason::Init, Delivery::Async),
            ("cart", FlushReason::ViewChange, Delivery::Async),
            ("payment", FlushReason::ViewChange, Delivery::Async),
        ]
    );

    let cart = sent[1].payload.decode().unwrap().typed_records();
    assert_eq!(cart.last(), Some(&Record::ViewEnd { timestamp: 150 }));
    assert_eq!(recorder.replay_stats("payment").map(|s| s.segments_count), Some(1));
    assert_eq!(recorder.replay_stats("cart").map(|s| s.records_count), Some(4));
}

#[test]
fn test_segment_duration_limit() {
    let (mut dom, _) = page();
    let config = RecorderConfigBuilder::new().segment_duration_limit(1_000).build();
    let (mut recorder, transport, _) = record(&mut dom, config);

    recorder.advance(&mut dom, 999);
    assert!(transport.is_empty());
    recorder.advance(&mut dom, 1_000);
    assert_eq!(transport.len(), 1);

    recorder.add_record(Record::ViewEnd { timestamp: 1_500 });
    recorder.stop(&mut dom, 1_600);
    let sent = transport.payloads();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1].event.metadata.creation_reason, FlushReason::SegmentDurationLimit);
}

#[test]
fn test_stylesheet_rule_changes() {
    let (mut dom, body) = page();
    let style = dom.create_element("style");
    dom.append_child(body, style).unwrap();
    let sheet = dom.create_stylesheet(Some(style), None).unwrap();
    let top = RuleParent::Sheet(sheet);
    dom.insert_rule(top, 0, "body { margin: 0; }").unwrap();
    let media = dom.insert_grouping_rule(top, 1, "@media print").unwrap();
    let (mut recorder, transport, _) = record(&mut dom, RecorderConfig::default());

    let rule = dom.insert_rule(RuleParent::Rule(media), 0, "nav { display: none; }").unwrap();
    recorder.handle_event(
        &mut dom,
        DomEvent::StyleSheetRuleInserted {
            parent: RuleParent::Rule(media),
            index: 0,
            rule,
        },
        10,
    );
    dom.delete_rule(top, 0).unwrap();
    recorder.handle_event(&mut dom, DomEvent::StyleSheetRuleDeleted { parent: top, index: 0 }, 20);
    recorder.on_page_exit(&mut dom, PageExitReason::PageHide, 30);

    let changes: Vec<_> = all_records(&transport)
        .into_iter()
        .filter_map(|r| match r {
            Record::IncrementalSnapshot {
                data: IncrementalData::StyleSheetRule(data),
                ..
            } => Some(data),
            _ => None,
        })
        .collect();
    assert_eq!(changes.len(), 2);
    let style_id = recorder.context().ids.get(style).unwrap();
    assert!(changes.iter().all(|c| c.id == style_id));
    assert_eq!(changes[0].adds.as_ref().unwrap()[0].index, RuleIndex::Path(vec![1, 0]));
    assert_eq!(changes[1].removes.as_ref().unwrap()[0].index, RuleIndex::Flat(0));
}

#[test]
fn test_channel_transport_receives_exit_payload() {
    let (mut dom, _) = page();
    let (transport, mut rx) = ChannelTransport::new();
    let mut recorder = Recorder::start(
        RecorderConfig::default(),
        &mut dom,
        0,
        SyncEncoder::new(),
        transport,
        SharedViewContext::with_context(context("home")),
    );

    recorder.on_page_exit(&mut dom, PageExitReason::BeforeUnload, 10);

    let sent = tokio_test::block_on(rx.recv()).unwrap();
    assert_eq!(sent.delivery, Delivery::OnExit);
    assert_eq!(sent.payload.event.metadata.creation_reason, FlushReason::Init);
}

#[test]
fn test_worker_encoder_recording() {
    let (mut dom, _) = page();
    let transport = MemoryTransport::new();
    let encoder = WorkerEncoder::spawn(1).unwrap();
    let mut recorder = Recorder::start(
        RecorderConfig::default(),
        &mut dom,
        0,
        encoder,
        transport.clone(),
        SharedViewContext::with_context(context("home")),
    );

    recorder.stop(&mut dom, 10);
    for _ in 0..200 {
        if !transport.is_empty() {
            break;
        }
        std::thread::sleep(Duration::from_millis(5));
        recorder.advance(&mut dom, 10);
    }

    let payloads = transport.payloads();
    assert_eq!(payloads.len(), 1);
    let decoded = payloads[0].decode().unwrap();
    assert_eq!(decoded.metadata.creation_reason, FlushReason::Init);
    assert!(decoded.metadata.has_full_snapshot);
}
