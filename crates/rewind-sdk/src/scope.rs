//! Observation scopes and timer keys.
//!
//! The document and every registered shadow root are observed separately.
//! Each scope owns a mutation buffer, an input tracker and a scroll tracker;
//! their timers are registered in the recorder's scheduler under a
//! [`TimerKey`] naming the scope.

use crate::config::RecorderConfig;
use crate::trackers::input::InputTracker;
use crate::trackers::scroll::ScrollTracker;
use crate::trackers::viewport::ViewportKind;
use rewind_core::dom::{NodeKey, RawMutation};
use rewind_core::scheduler::Scheduler;
use rewind_delta::{BatchTimer, MutationBuffer};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScopeId {
    Document,
    Shadow(NodeKey),
}

/// Everything the recorder schedules.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TimerKey {
    Mutations { scope: ScopeId, timer: BatchTimer },
    Scroll { scope: ScopeId },
    MouseMove,
    Viewport(ViewportKind),
    SegmentExpiration,
}

impl TimerKey {
    /// Scope owning the timer, if it belongs to one.
    pub fn scope(&self) -> Option<ScopeId> {
        match self {
            TimerKey::Mutations { scope, .. } | TimerKey::Scroll { scope } => Some(*scope),
            _ => None,
        }
    }
}

/// Per-scope trackers.
#[derive(Debug)]
pub struct ScopeTrackers {
    pub root: NodeKey,
    pub mutations: MutationBuffer,
    pub input: InputTracker,
    pub scroll: ScrollTracker,
}

impl ScopeTrackers {
    pub fn new(root: NodeKey, config: &RecorderConfig) -> Self {
        Self {
            root,
            mutations: MutationBuffer::new(config.batch.clone()),
            input: InputTracker::new(),
            scroll: ScrollTracker::new(config.scroll_throttle_ms),
        }
    }

    pub fn observe(&mut self, scope: ScopeId, mutations: Vec<RawMutation>, scheduler: &mut Scheduler<TimerKey>) {
        self.mutations
            .add_mutations(mutations, scheduler, |timer| TimerKey::Mutations { scope, timer });
    }

    pub fn take_batch(&mut self, scheduler: &mut Scheduler<TimerKey>) -> Vec<RawMutation> {
        self.mutations.take_batch(scheduler)
    }

    /// Cancel every timer and drop pending state.
    pub fn stop(&mut self, scheduler: &mut Scheduler<TimerKey>) {
        self.mutations.stop(scheduler);
        self.scroll.cancel(scheduler);
        self.input.clear();
    }
}
