//! Scroll positions.

use super::recordable_target;
use rewind_core::dom::{Dom, NodeKey};
use rewind_core::privacy::NodePrivacyLevel;
use rewind_core::record::{ScrollData, ScrollPosition};
use rewind_core::scheduler::{Scheduler, Throttle, ThrottleOptions};
use rewind_snapshot::RecordingContext;

/// Leading and trailing throttle over the scroll events of one scope.
/// Offsets are read when the throttle runs, not when the event arrived.
#[derive(Debug)]
pub struct ScrollTracker {
    throttle: Throttle<NodeKey>,
}

impl ScrollTracker {
    pub fn new(wait: u64) -> Self {
        Self {
            throttle: Throttle::new(wait, ThrottleOptions::default()),
        }
    }

    /// Offer a scrolled target. Returns it when it must be recorded now.
    pub fn on_scroll<K>(&mut self, target: NodeKey, scheduler: &mut Scheduler<K>, key: K) -> Option<NodeKey> {
        self.throttle.call(target, scheduler, key)
    }

    /// Close the window, returning the trailing target.
    pub fn on_timer(&mut self) -> Option<NodeKey> {
        self.throttle.on_timer()
    }

    pub fn cancel<K>(&mut self, scheduler: &mut Scheduler<K>) {
        self.throttle.cancel(scheduler);
    }
}

/// Read the offsets of `target`, remember them and build the payload.
/// The document reports the window scroll.
pub fn scroll_data(
    dom: &Dom,
    ctx: &mut RecordingContext,
    target: NodeKey,
    default_level: NodePrivacyLevel,
) -> Option<ScrollData> {
    let (id, _) = recordable_target(dom, ctx, target, default_level)?;
    let position = if target == dom.document() {
        let window = dom.window();
        ScrollPosition {
            top: window.scroll_y.round(),
            left: window.scroll_x.round(),
        }
    } else {
        let offset = dom.element(target)?.scroll;
        ScrollPosition {
            top: offset.top.round(),
            left: offset.left.round(),
        }
    };
    ctx.scroll_positions.set(target, position.clone());
    Some(ScrollData {
        id,
        x: position.left,
        y: position.top,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scroll_updates_position_table() {
        let mut dom = Dom::new("https://example.com/");
        let list = dom.create_element("ul");
        dom.append_child(dom.document(), list).unwrap();
        dom.set_scroll(list, 40.4, 3.6).unwrap();
        let mut ctx = RecordingContext::new();
        let id = ctx.ids.get_or_assign(list);

        let data = scroll_data(&dom, &mut ctx, list, NodePrivacyLevel::Allow).unwrap();

        assert_eq!(data, ScrollData { id, x: 4.0, y: 40.0 });
        assert_eq!(
            ctx.scroll_positions.get(list),
            Some(&ScrollPosition { top: 40.0, left: 4.0 })
        );
    }

    #[test]
    fn test_document_uses_window_scroll() {
        let mut dom = Dom::new("https://example.com/");
        dom.window_mut().scroll_y = 120.0;
        let mut ctx = RecordingContext::new();
        let id = ctx.ids.get_or_assign(dom.document());

        let data = scroll_data(&dom, &mut ctx, dom.document(), NodePrivacyLevel::Allow).unwrap();

        assert_eq!(data, ScrollData { id, x: 0.0, y: 120.0 });
    }

    #[test]
    fn test_trailing_scroll_is_kept() {
        let mut dom = Dom::new("https://example.com/");
        let a = dom.create_element("div");
        let b = dom.create_element("div");
        let mut scheduler = Scheduler::new(0);
        let mut tracker = ScrollTracker::new(100);

        assert_eq!(tracker.on_scroll(a, &mut scheduler, ()), Some(a));
        assert_eq!(tracker.on_scroll(b, &mut scheduler, ()), None);
        scheduler.pop_due(100).unwrap();
        assert_eq!(tracker.on_timer(), Some(b));
    }
}
