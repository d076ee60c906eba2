//! Layout and visual viewport changes.

use rewind_core::dom::Dom;
use rewind_core::record::{ViewportResizeData, VisualViewportData};
use rewind_core::scheduler::{Scheduler, Throttle, ThrottleOptions};

/// Which viewport changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ViewportKind {
    Layout,
    Visual,
}

/// Trailing-edge throttles over viewport changes. Only the state at the end
/// of a window is recorded.
#[derive(Debug)]
pub struct ViewportTracker {
    layout: Throttle<()>,
    visual: Throttle<()>,
}

impl ViewportTracker {
    pub fn new(wait: u64) -> Self {
        Self {
            layout: Throttle::new(wait, ThrottleOptions::trailing_only()),
            visual: Throttle::new(wait, ThrottleOptions::trailing_only()),
        }
    }

    /// Returns whether the change is recorded right away. With trailing-only
    /// windows it never is; the timer records it.
    pub fn on_change<K>(&mut self, kind: ViewportKind, scheduler: &mut Scheduler<K>, key: K) -> bool {
        self.throttle(kind).call((), scheduler, key).is_some()
    }

    /// Close the window of `kind`. Returns whether the change is recorded.
    pub fn on_timer(&mut self, kind: ViewportKind) -> bool {
        self.throttle(kind).on_timer().is_some()
    }

    pub fn cancel<K>(&mut self, scheduler: &mut Scheduler<K>) {
        self.layout.cancel(scheduler);
        self.visual.cancel(scheduler);
    }

    fn throttle(&mut self, kind: ViewportKind) -> &mut Throttle<()> {
        match kind {
            ViewportKind::Layout => &mut self.layout,
            ViewportKind::Visual => &mut self.visual,
        }
    }
}

pub fn viewport_resize_data(dom: &Dom) -> ViewportResizeData {
    let window = dom.window();
    ViewportResizeData {
        width: window.width,
        height: window.height,
    }
}

pub fn visual_viewport_data(dom: &Dom) -> Option<VisualViewportData> {
    dom.window().visual_viewport.clone()
}
