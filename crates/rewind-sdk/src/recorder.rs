//! The recorder.
//!
//! ```text
//!                        ┌──────────────── Recorder ────────────────┐
//! Dom mutations ──route──► document scope ─┐                        │
//!                        │ shadow scopes ──┼─► process_mutations ─┐ │
//! DomEvent ──────────────► trackers ───────┴──────────────────────┼─► SegmentCollector ──► Transport
//! view / page signals ───► full snapshot, view end, flush ────────┘ │
//!                        └──────────────────────────────────────────┘
//! ```
//!
//! Every entry point takes the live [`Dom`] and the current time. Timers
//! that came due are dispatched first, then the tree notifications queued
//! in the `Dom` are drained and routed to the scope owning their target.

use crate::config::{EnvironmentCapabilities, RecorderConfig};
use crate::error::{RecorderError, Result};
use crate::scope::{ScopeId, ScopeTrackers, TimerKey};
use crate::shadow::ShadowRootController;
use crate::trackers::focus::focus_data;
use crate::trackers::frustration::{frustration_data, RecordIds};
use crate::trackers::media::media_interaction;
use crate::trackers::mouse::{interaction_data, MouseTracker, PointerMove};
use crate::trackers::scroll::scroll_data;
use crate::trackers::stylesheet::{rule_deleted, rule_inserted};
use crate::trackers::viewport::{viewport_resize_data, visual_viewport_data, ViewportKind, ViewportTracker};
use rewind_core::dom::{Dom, NodeKey, RawMutation};
use rewind_core::events::{DomEvent, EventId};
use rewind_core::record::{
    FocusData, FrustrationType, FullSnapshotData, IncrementalData, MetaData, Record, ScrollPosition, TimeStamp,
};
use rewind_core::scheduler::{Scheduler, TimerId};
use rewind_delta::process_mutations;
use rewind_segment::{
    Encoder, FlushReason, PageExitReason, SegmentCollector, Transport, ViewContextProvider, ViewReplayStats,
    WorkerEncoder,
};
use rewind_snapshot::{serialize_document, RecordingContext, SerializationScope, SerializationStatus};
use tracing::{debug, trace, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecorderStatus {
    Recording,
    /// The environment cannot be observed. Every operation is a no-op.
    Disabled,
    /// Terminal. Payloads of segments flushed before stopping may still be
    /// delivered by [`Recorder::advance`].
    Stopped,
}

/// Fail when the environment cannot deliver tree change notifications.
pub fn check_environment(capabilities: &EnvironmentCapabilities) -> Result<()> {
    if capabilities.mutation_observer {
        Ok(())
    } else {
        Err(RecorderError::Unsupported(
            "tree change notifications are not available".to_string(),
        ))
    }
}

/// Start a worker-backed encoder for a recorder.
pub fn worker_encoder(stream_id: u64) -> Result<WorkerEncoder> {
    Ok(WorkerEncoder::spawn(stream_id)?)
}

pub struct Recorder<E, T, P> {
    config: RecorderConfig,
    status: RecorderStatus,
    ctx: RecordingContext,
    scheduler: Scheduler<TimerKey>,
    collector: SegmentCollector<E, T, P>,
    document: ScopeTrackers,
    shadow_roots: ShadowRootController,
    mouse: MouseTracker,
    viewport: ViewportTracker,
    record_ids: RecordIds,
}

impl<E: Encoder, T: Transport, P: ViewContextProvider> Recorder<E, T, P> {
    /// Start recording `dom`: take the initial full snapshot and begin
    /// observing. Returns a disabled recorder when the environment cannot
    /// be observed.
    pub fn start(
        config: RecorderConfig,
        dom: &mut Dom,
        now: TimeStamp,
        encoder: E,
        transport: T,
        provider: P,
    ) -> Self {
        let mut recorder = Self {
            status: RecorderStatus::Recording,
            ctx: RecordingContext::new(),
            scheduler: Scheduler::new(now),
            collector: SegmentCollector::new(config.segment.clone(), encoder, transport, provider),
            document: ScopeTrackers::new(dom.document(), &config),
            shadow_roots: ShadowRootController::new(config.clone()),
            mouse: MouseTracker::new(config.mouse_move_throttle_ms),
            viewport: ViewportTracker::new(config.viewport_resize_throttle_ms),
            record_ids: RecordIds::new(),
            config,
        };

        if let Err(e) = check_environment(&recorder.config.capabilities) {
            warn!(error = %e, "session recording disabled");
            recorder.status = RecorderStatus::Disabled;
            return recorder;
        }

        // Anything queued so far is part of the initial snapshot.
        dom.take_mutations();
        recorder.snapshot(dom, now, SerializationStatus::InitialFullSnapshot);
        recorder
    }

    pub fn status(&self) -> RecorderStatus {
        self.status
    }

    pub fn is_recording(&self) -> bool {
        self.status == RecorderStatus::Recording
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    pub fn context(&self) -> &RecordingContext {
        &self.ctx
    }

    pub fn collector(&self) -> &SegmentCollector<E, T, P> {
        &self.collector
    }

    pub fn transport(&self) -> &T {
        self.collector.transport()
    }

    pub fn shadow_roots(&self) -> &ShadowRootController {
        &self.shadow_roots
    }

    /// When the next timer is due. Hosts call [`advance`](Self::advance)
    /// no later than this.
    pub fn next_deadline(&self) -> Option<TimeStamp> {
        self.scheduler.next_deadline()
    }

    pub fn replay_stats(&self, view_id: &str) -> Option<ViewReplayStats> {
        self.collector.replay_stats(view_id)
    }

    // ========================================================================
    // Host entry points
    // ========================================================================

    /// Route pending notifications and dispatch every timer due at `now`.
    pub fn advance(&mut self, dom: &mut Dom, now: TimeStamp) {
        match self.status {
            RecorderStatus::Recording => self.tick(dom, now),
            RecorderStatus::Stopped => self.collector.poll(&mut self.scheduler),
            RecorderStatus::Disabled => {}
        }
    }

    pub fn handle_event(&mut self, dom: &mut Dom, event: DomEvent, now: TimeStamp) {
        if !self.is_recording() {
            return;
        }
        self.tick(dom, now);
        let level = self.config.default_privacy_level;

        match event {
            DomEvent::PointerMove {
                target,
                client_x,
                client_y,
                is_touch,
            } => {
                let moved = PointerMove {
                    target,
                    client_x,
                    client_y,
                    is_touch,
                };
                if let Some(data) =
                    self.mouse
                        .on_move(dom, &self.ctx, moved, level, &mut self.scheduler, TimerKey::MouseMove)
                {
                    self.emit(Record::incremental(now, data));
                }
            }
            DomEvent::MouseInteraction {
                event_id,
                kind,
                target,
                client_x,
                client_y,
            } => {
                if let Some(data) = interaction_data(dom, &self.ctx, kind, target, client_x, client_y, level) {
                    let id = self.record_ids.id_for_event(event_id);
                    self.emit(Record::IncrementalSnapshot {
                        timestamp: now,
                        id: Some(id),
                        data: IncrementalData::MouseInteraction(data),
                    });
                }
            }
            DomEvent::Scroll { target } => {
                let Some(scope) = self.scope_of(dom, target) else {
                    return;
                };
                let Some(trackers) = scope_trackers(&mut self.document, &mut self.shadow_roots, scope) else {
                    return;
                };
                if let Some(target) = trackers
                    .scroll
                    .on_scroll(target, &mut self.scheduler, TimerKey::Scroll { scope })
                {
                    self.record_scroll(dom, target, now);
                }
            }
            DomEvent::Resize => {
                let key = TimerKey::Viewport(ViewportKind::Layout);
                if self.viewport.on_change(ViewportKind::Layout, &mut self.scheduler, key) {
                    self.record_viewport(dom, ViewportKind::Layout, now);
                }
            }
            DomEvent::VisualViewportResize => {
                let key = TimerKey::Viewport(ViewportKind::Visual);
                if self.config.capabilities.visual_viewport
                    && self.viewport.on_change(ViewportKind::Visual, &mut self.scheduler, key)
                {
                    self.record_viewport(dom, ViewportKind::Visual, now);
                }
            }
            DomEvent::Input { target } => {
                let Some(scope) = self.scope_of(dom, target) else {
                    return;
                };
                let Some(trackers) = scope_trackers(&mut self.document, &mut self.shadow_roots, scope) else {
                    return;
                };
                let root = trackers.root;
                let changes = trackers.input.on_input(dom, &self.ctx, root, target, level);
                for data in changes {
                    self.emit(Record::incremental(now, IncrementalData::Input(data)));
                }
            }
            DomEvent::Media { target, kind } => {
                if let Some(data) = media_interaction(dom, &self.ctx, target, kind, level) {
                    self.emit(Record::incremental(now, IncrementalData::MediaInteraction(data)));
                }
            }
            DomEvent::StyleSheetRuleInserted { parent, index, rule } => {
                if let Some(data) = rule_inserted(dom, &self.ctx, parent, index, rule) {
                    self.emit(Record::incremental(now, IncrementalData::StyleSheetRule(data)));
                }
            }
            DomEvent::StyleSheetRuleDeleted { parent, index } => {
                if let Some(data) = rule_deleted(dom, &self.ctx, parent, index) {
                    self.emit(Record::incremental(now, IncrementalData::StyleSheetRule(data)));
                }
            }
            DomEvent::FocusChange { has_focus } => {
                self.emit(Record::Focus {
                    timestamp: now,
                    data: FocusData { has_focus },
                });
            }
        }
    }

    /// Resolve every pending batch now.
    pub fn flush_mutations(&mut self, dom: &mut Dom, now: TimeStamp) {
        if !self.is_recording() {
            return;
        }
        self.route_mutations(dom);
        let batch = self.document.take_batch(&mut self.scheduler);
        self.process_batch(dom, batch, now);
        for (_, batch) in self.shadow_roots.flush(&mut self.scheduler) {
            self.process_batch(dom, batch, now);
        }
    }

    /// Take a full snapshot of the current document.
    pub fn take_full_snapshot(&mut self, dom: &mut Dom, now: TimeStamp) {
        if !self.is_recording() {
            return;
        }
        self.tick(dom, now);
        self.flush_mutations(dom, now);
        self.snapshot(dom, now, SerializationStatus::SubsequentFullSnapshot);
    }

    /// A new view started: close the segment and seed the next one with a
    /// full snapshot.
    pub fn on_view_created(&mut self, dom: &mut Dom, now: TimeStamp) {
        if !self.is_recording() {
            return;
        }
        self.tick(dom, now);
        self.flush_mutations(dom, now);
        self.collector.flush(FlushReason::ViewChange, &mut self.scheduler);
        self.snapshot(dom, now, SerializationStatus::SubsequentFullSnapshot);
    }

    pub fn on_view_ended(&mut self, dom: &mut Dom, now: TimeStamp) {
        if !self.is_recording() {
            return;
        }
        self.tick(dom, now);
        self.flush_mutations(dom, now);
        self.emit(Record::ViewEnd { timestamp: now });
    }

    /// The page is going away: flush through the synchronous path.
    pub fn on_page_exit(&mut self, dom: &mut Dom, reason: PageExitReason, now: TimeStamp) {
        if !self.is_recording() {
            return;
        }
        self.tick(dom, now);
        self.flush_mutations(dom, now);
        self.collector.flush(reason.into(), &mut self.scheduler);
    }

    /// Record a frustration signal derived from the given host events.
    pub fn on_frustration(&mut self, types: &[FrustrationType], events: &[EventId], now: TimeStamp) {
        if !self.is_recording() {
            return;
        }
        if let Some(data) = frustration_data(types, events, &mut self.record_ids) {
            self.emit(Record::Frustration { timestamp: now, data });
        }
    }

    /// Append a record produced outside the recorder.
    pub fn add_record(&mut self, record: Record) {
        if self.is_recording() {
            self.emit(record);
        }
    }

    /// Flush pending mutations, stop every scope and timer and flush the
    /// segment. Nothing is recorded afterwards.
    pub fn stop(&mut self, dom: &mut Dom, now: TimeStamp) {
        if !self.is_recording() {
            return;
        }
        self.tick(dom, now);
        self.flush_mutations(dom, now);
        self.document.stop(&mut self.scheduler);
        self.shadow_roots.stop(&mut self.scheduler);
        self.mouse.cancel(&mut self.scheduler);
        self.viewport.cancel(&mut self.scheduler);
        self.scheduler.clear_all();
        self.collector.stop(&mut self.scheduler);
        self.status = RecorderStatus::Stopped;
        debug!("recorder stopped");
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn emit(&mut self, record: Record) {
        self.collector
            .add_record(&record, &mut self.scheduler, TimerKey::SegmentExpiration);
    }

    /// Fire the timers that came due before `now`, then route what the host
    /// queued since the last call. Routed notifications are timed from `now`.
    fn tick(&mut self, dom: &mut Dom, now: TimeStamp) {
        while let Some((id, key)) = self.scheduler.pop_due(now) {
            let at = self.scheduler.now();
            self.dispatch_timer(dom, id, key, at);
        }
        self.route_mutations(dom);
        for root in self.shadow_roots.prune(dom, &mut self.scheduler) {
            trace!(?root, "dropped scope of a discarded shadow root");
        }
        self.collector.poll(&mut self.scheduler);
    }

    fn dispatch_timer(&mut self, dom: &Dom, id: TimerId, key: TimerKey, at: TimeStamp) {
        match key {
            TimerKey::Mutations { scope, .. } => self.flush_scope(dom, scope, at),
            TimerKey::Scroll { scope } => {
                let target = scope_trackers(&mut self.document, &mut self.shadow_roots, scope)
                    .and_then(|trackers| trackers.scroll.on_timer());
                if let Some(target) = target {
                    self.record_scroll(dom, target, at);
                }
            }
            TimerKey::MouseMove => self.mouse.on_timer(),
            TimerKey::Viewport(kind) => {
                if self.viewport.on_timer(kind) {
                    self.record_viewport(dom, kind, at);
                }
            }
            TimerKey::SegmentExpiration => self.collector.on_expiration_timer(id, &mut self.scheduler),
        }
    }

    /// Drain the notifications queued in `dom` into the scope owning their
    /// target. Notifications for unobserved trees are dropped.
    fn route_mutations(&mut self, dom: &mut Dom) {
        let mutations = dom.take_mutations();
        if mutations.is_empty() {
            return;
        }
        let document = dom.document();
        let mut document_batch = Vec::new();
        let mut shadow_batches: Vec<(NodeKey, Vec<RawMutation>)> = Vec::new();
        let mut dropped = 0usize;

        for mutation in mutations {
            let root = dom.root_of(mutation.target());
            if root == document {
                document_batch.push(mutation);
            } else if self.shadow_roots.contains(root) {
                match shadow_batches.iter_mut().find(|(r, _)| *r == root) {
                    Some((_, batch)) => batch.push(mutation),
                    None => shadow_batches.push((root, vec![mutation])),
                }
            } else {
                dropped += 1;
            }
        }
        if dropped > 0 {
            trace!(dropped, "notifications outside observed trees");
        }

        self.document
            .observe(ScopeId::Document, document_batch, &mut self.scheduler);
        for (root, batch) in shadow_batches {
            if let Some(trackers) = self.shadow_roots.get_mut(root) {
                trackers.observe(ScopeId::Shadow(root), batch, &mut self.scheduler);
            }
        }
    }

    fn flush_scope(&mut self, dom: &Dom, scope: ScopeId, at: TimeStamp) {
        let batch = match scope_trackers(&mut self.document, &mut self.shadow_roots, scope) {
            Some(trackers) => trackers.take_batch(&mut self.scheduler),
            None => return,
        };
        self.process_batch(dom, batch, at);
    }

    fn process_batch(&mut self, dom: &Dom, batch: Vec<RawMutation>, at: TimeStamp) {
        if batch.is_empty() {
            return;
        }
        let outcome = process_mutations(dom, batch, &mut self.ctx, self.config.default_privacy_level);
        for root in outcome.removed_shadow_roots {
            self.shadow_roots.remove_shadow_root(root, &mut self.scheduler);
        }
        for root in outcome.added_shadow_roots {
            self.shadow_roots.add_shadow_root(root);
        }
        if let Some(data) = outcome.data {
            self.emit(Record::incremental(at, IncrementalData::Mutation(data)));
        }
    }

    fn scope_of(&self, dom: &Dom, target: NodeKey) -> Option<ScopeId> {
        let root = dom.root_of(target);
        if root == dom.document() {
            Some(ScopeId::Document)
        } else if self.shadow_roots.contains(root) {
            Some(ScopeId::Shadow(root))
        } else {
            None
        }
    }

    fn record_scroll(&mut self, dom: &Dom, target: NodeKey, at: TimeStamp) {
        if let Some(data) = scroll_data(dom, &mut self.ctx, target, self.config.default_privacy_level) {
            self.emit(Record::incremental(at, IncrementalData::Scroll(data)));
        }
    }

    fn record_viewport(&mut self, dom: &Dom, kind: ViewportKind, at: TimeStamp) {
        match kind {
            ViewportKind::Layout => {
                let data = viewport_resize_data(dom);
                self.emit(Record::incremental(at, IncrementalData::ViewportResize(data)));
            }
            ViewportKind::Visual => {
                if let Some(data) = visual_viewport_data(dom) {
                    self.emit(Record::VisualViewport { timestamp: at, data });
                }
            }
        }
    }

    /// Meta, focus, full snapshot and visual viewport records.
    fn snapshot(&mut self, dom: &Dom, now: TimeStamp, status: SerializationStatus) {
        let window = dom.window();
        self.emit(Record::Meta {
            timestamp: now,
            data: MetaData {
                href: window.href.clone(),
                width: window.width,
                height: window.height,
            },
        });
        self.emit(Record::Focus {
            timestamp: now,
            data: focus_data(dom),
        });

        let mut scope = SerializationScope::new(status);
        match serialize_document(dom, &mut self.ctx, &mut scope, self.config.default_privacy_level) {
            Some(node) => {
                debug!(nodes = scope.serialized_ids.len(), ?status, "full snapshot taken");
                self.emit(Record::FullSnapshot {
                    timestamp: now,
                    data: FullSnapshotData {
                        node,
                        initial_offset: ScrollPosition {
                            top: window.scroll_y,
                            left: window.scroll_x,
                        },
                    },
                });
            }
            None => warn!("document could not be serialized"),
        }
        for root in scope.discovered_shadow_roots {
            self.shadow_roots.add_shadow_root(root);
        }

        if self.config.capabilities.visual_viewport {
            if let Some(data) = visual_viewport_data(dom) {
                self.emit(Record::VisualViewport { timestamp: now, data });
            }
        }
    }
}

fn scope_trackers<'a>(
    document: &'a mut ScopeTrackers,
    shadow_roots: &'a mut ShadowRootController,
    scope: ScopeId,
) -> Option<&'a mut ScopeTrackers> {
    match scope {
        ScopeId::Document => Some(document),
        ScopeId::Shadow(root) => shadow_roots.get_mut(root),
    }
}
