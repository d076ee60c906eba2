//! Pointer moves and mouse interactions.

use super::recordable_target;
use rewind_core::dom::{Dom, NodeKey, WindowState};
use rewind_core::privacy::NodePrivacyLevel;
use rewind_core::record::{IncrementalData, MouseInteractionData, MouseInteractionType, MouseMoveData, MousePosition};
use rewind_core::scheduler::{Scheduler, Throttle, ThrottleOptions};
use rewind_snapshot::RecordingContext;

/// Past this distance the visual viewport offset is already part of the
/// client coordinates.
const VISUAL_VIEWPORT_SCROLL_THRESHOLD: f64 = 2.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointerMove {
    pub target: NodeKey,
    pub client_x: f64,
    pub client_y: f64,
    pub is_touch: bool,
}

/// Leading-edge throttle over pointer moves.
#[derive(Debug)]
pub struct MouseTracker {
    throttle: Throttle<PointerMove>,
}

impl MouseTracker {
    pub fn new(wait: u64) -> Self {
        Self {
            throttle: Throttle::new(wait, ThrottleOptions::leading_only()),
        }
    }

    /// Offer a move. Returns a payload for the first move of a window.
    pub fn on_move<K>(
        &mut self,
        dom: &Dom,
        ctx: &RecordingContext,
        moved: PointerMove,
        default_level: NodePrivacyLevel,
        scheduler: &mut Scheduler<K>,
        key: K,
    ) -> Option<IncrementalData> {
        let moved = self.throttle.call(moved, scheduler, key)?;
        move_data(dom, ctx, moved, default_level)
    }

    /// Close the throttle window. Moves are never replayed on the trailing
    /// edge.
    pub fn on_timer(&mut self) {
        self.throttle.on_timer();
    }

    pub fn cancel<K>(&mut self, scheduler: &mut Scheduler<K>) {
        self.throttle.cancel(scheduler);
    }
}

pub fn move_data(
    dom: &Dom,
    ctx: &RecordingContext,
    moved: PointerMove,
    default_level: NodePrivacyLevel,
) -> Option<IncrementalData> {
    let (id, _) = recordable_target(dom, ctx, moved.target, default_level)?;
    let (x, y) = layout_coordinates(dom.window(), moved.client_x, moved.client_y);
    let data = MouseMoveData {
        positions: vec![MousePosition {
            id,
            x,
            y,
            time_offset: 0,
        }],
    };
    Some(if moved.is_touch {
        IncrementalData::TouchMove(data)
    } else {
        IncrementalData::MouseMove(data)
    })
}

pub fn interaction_data(
    dom: &Dom,
    ctx: &RecordingContext,
    kind: MouseInteractionType,
    target: NodeKey,
    client_x: f64,
    client_y: f64,
    default_level: NodePrivacyLevel,
) -> Option<MouseInteractionData> {
    let (id, _) = recordable_target(dom, ctx, target, default_level)?;
    let (x, y) = if kind.has_coordinates() {
        let (x, y) = layout_coordinates(dom.window(), client_x, client_y);
        (Some(x), Some(y))
    } else {
        (None, None)
    };
    Some(MouseInteractionData { kind, id, x, y })
}

/// Convert client coordinates to the layout viewport.
///
/// Some hosts report client coordinates relative to the visual viewport
/// while it is panned away from the layout viewport; the visual viewport
/// offset is added back in that case.
pub fn layout_coordinates(window: &WindowState, client_x: f64, client_y: f64) -> (f64, f64) {
    match &window.visual_viewport {
        Some(vv)
            if (vv.page_top - vv.offset_top - window.scroll_y).abs() > VISUAL_VIEWPORT_SCROLL_THRESHOLD
                || (vv.page_left - vv.offset_left - window.scroll_x).abs()
                    > VISUAL_VIEWPORT_SCROLL_THRESHOLD =>
        {
            (
                (client_x + vv.offset_left).round(),
                (client_y + vv.offset_top).round(),
            )
        }
        _ => (client_x, client_y),
    }
}
